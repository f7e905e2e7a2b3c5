//! Metric formatters. Every function here is total: any input, including a
//! missing value, produces a display string.

use crate::types::{Fraction, Percent, RagStatus, Tone, Trend};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

/// How a missing value is displayed. One convention per document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullDisplay {
    #[default]
    Zero,
    NotAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyStyle {
    /// Use `K`/`M` suffixes above 1,000 / 1,000,000
    pub compact: bool,
    /// Decimal places for whole and `K` values (`M` always shows one)
    pub decimals: usize,
    pub null: NullDisplay,
}

impl CurrencyStyle {
    pub const WHOLE: CurrencyStyle = CurrencyStyle {
        compact: false,
        decimals: 0,
        null: NullDisplay::Zero,
    };

    pub const COMPACT: CurrencyStyle = CurrencyStyle {
        compact: true,
        decimals: 0,
        null: NullDisplay::Zero,
    };

    pub fn with_null(self, null: NullDisplay) -> Self {
        Self { null, ..self }
    }

    pub fn with_decimals(self, decimals: usize) -> Self {
        Self { decimals, ..self }
    }
}

/// Thousands-grouped fixed-point rendering of a non-negative number
fn grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };
    let mut out = int_part
        .parse::<u64>()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn signed(value: f64, body: String) -> String {
    if value < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", body)
    } else {
        body
    }
}

/// `$1,234`, or `$1.2M` / `$344K` in compact mode. Negative values render as `-$...`.
pub fn format_currency(value: Option<f64>, style: CurrencyStyle) -> String {
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => {
            return match style.null {
                NullDisplay::Zero => "$0".to_string(),
                NullDisplay::NotAvailable => "N/A".to_string(),
            }
        }
    };

    let magnitude = value.abs();
    let body = if style.compact && magnitude >= 1_000_000.0 {
        format!("${:.1}M", magnitude / 1_000_000.0)
    } else if style.compact && magnitude >= 1_000.0 {
        format!("${:.*}K", style.decimals, magnitude / 1_000.0)
    } else {
        format!("${}", grouped(magnitude, style.decimals))
    };
    signed(value, body)
}

/// Inverse of [`format_currency`] up to display precision
pub fn parse_currency_display(display: &str) -> Option<f64> {
    let trimmed = display.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let rest = rest.strip_prefix('$')?;
    let (digits, scale) = if let Some(d) = rest.strip_suffix('M') {
        (d, 1_000_000.0)
    } else if let Some(d) = rest.strip_suffix('K') {
        (d, 1_000.0)
    } else {
        (rest, 1.0)
    };
    let number: f64 = digits.replace(',', "").parse().ok()?;
    let value = number * scale;
    Some(if negative { -value } else { value })
}

/// Pre-multiplied percentage, e.g. `87.5` → `88%`
pub fn format_percent(value: Option<Percent>, decimals: usize, null: NullDisplay) -> String {
    match value {
        Some(Percent(p)) if p.is_finite() => format!("{:.*}%", decimals, p),
        _ => match null {
            NullDisplay::Zero => format!("{:.*}%", decimals, 0.0),
            NullDisplay::NotAvailable => "N/A".to_string(),
        },
    }
}

/// Raw ratio, e.g. `0.875` → `87.5%` with one decimal
pub fn format_fraction(value: Option<Fraction>, decimals: usize, null: NullDisplay) -> String {
    format_percent(value.map(Fraction::to_percent), decimals, null)
}

/// Whole-percent display that truncates toward zero, `N/A` when missing
pub fn format_percent_truncated(value: Option<Percent>) -> String {
    match value {
        Some(Percent(p)) if p.is_finite() => format!("{}%", p.trunc() as i64),
        _ => "N/A".to_string(),
    }
}

/// Coverage or ROI multiple, e.g. `2.4x`
pub fn format_multiple(value: f64, decimals: usize) -> String {
    format!("{:.*}x", decimals, value)
}

/// Signed whole number, e.g. `+12` / `-4`
pub fn format_signed(value: f64) -> String {
    format!("{:+.0}", value)
}

/// Count with thousands separators, truncating any fraction
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let whole = value.trunc();
    signed(whole, grouped(whole, 0))
}

pub fn rag_class(status: RagStatus) -> &'static str {
    match status {
        RagStatus::Green => "green",
        RagStatus::Yellow => "yellow",
        RagStatus::Red => "red",
    }
}

pub fn tone_color(tone: Tone) -> &'static str {
    match tone {
        Tone::Good => "#28a745",
        Tone::Warning => "#ffc107",
        Tone::Bad => "#dc3545",
        Tone::Neutral => "#6c757d",
    }
}

pub fn rag_color(status: RagStatus) -> &'static str {
    tone_color(status.tone())
}

/// Glyph family for trend rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphSet {
    Arrows,
    Emoji,
}

pub fn trend_glyph(trend: Trend, glyphs: GlyphSet) -> &'static str {
    match (glyphs, trend) {
        (GlyphSet::Arrows, Trend::Improving) => "↑",
        (GlyphSet::Arrows, Trend::Declining) => "↓",
        (GlyphSet::Arrows, Trend::Neutral) => "→",
        (GlyphSet::Emoji, Trend::Improving) => "⬆️",
        (GlyphSet::Emoji, Trend::Declining) => "⬇️",
        (GlyphSet::Emoji, Trend::Neutral) => "➡️",
    }
}

/// Pipeline coverage: `>= 3x` good, `>= 2x` warning
pub fn coverage_tone(coverage: f64) -> Tone {
    if coverage >= 3.0 {
        Tone::Good
    } else if coverage >= 2.0 {
        Tone::Warning
    } else {
        Tone::Bad
    }
}

/// Status glyph for a pacing fraction, using the RAG thresholds
pub fn pacing_indicator(pacing: Fraction) -> &'static str {
    match RagStatus::classify(Some(pacing.to_percent())) {
        RagStatus::Green => "✓",
        RagStatus::Yellow => "⚠️",
        RagStatus::Red => "🔴",
    }
}

/// Status glyph for a pacing percentage; `N/A` when missing
pub fn rag_glyph(pacing: Option<Percent>) -> &'static str {
    match pacing {
        None => "N/A",
        Some(p) => match RagStatus::classify(Some(p)) {
            RagStatus::Green => "✅",
            RagStatus::Yellow => "⚠️",
            RagStatus::Red => "🔴",
        },
    }
}

/// Horizon attainment glyph: on target, close (no glyph), behind, far behind
pub fn attainment_indicator(attainment: Option<Fraction>) -> &'static str {
    match attainment {
        None => "",
        Some(Fraction(a)) if a >= 1.0 => "✓",
        Some(Fraction(a)) if a >= 0.8 => "",
        Some(Fraction(a)) if a >= 0.5 => "⚠️",
        Some(_) => "🔴",
    }
}

pub const LABEL_WIDTH: usize = 25;

/// Shorten a free-text label to [`LABEL_WIDTH`] characters with an ellipsis
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() > LABEL_WIDTH {
        let head: String = label.chars().take(LABEL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_whole_and_compact() {
        assert_eq!(format_currency(Some(1234567.0), CurrencyStyle::WHOLE), "$1,234,567");
        assert_eq!(format_currency(Some(999.4), CurrencyStyle::WHOLE), "$999");
        assert_eq!(format_currency(Some(1234567.0), CurrencyStyle::COMPACT), "$1.2M");
        assert_eq!(format_currency(Some(344_000.0), CurrencyStyle::COMPACT), "$344K");
        assert_eq!(format_currency(Some(512.0), CurrencyStyle::COMPACT), "$512");
        assert_eq!(
            format_currency(Some(1234.5), CurrencyStyle::COMPACT.with_decimals(2)),
            "$1.23K"
        );
    }

    #[test]
    fn test_currency_null_and_negative() {
        assert_eq!(format_currency(None, CurrencyStyle::WHOLE), "$0");
        assert_eq!(
            format_currency(None, CurrencyStyle::WHOLE.with_null(NullDisplay::NotAvailable)),
            "N/A"
        );
        assert_eq!(format_currency(Some(-45_250.0), CurrencyStyle::WHOLE), "-$45,250");
        assert_eq!(format_currency(Some(-2_500_000.0), CurrencyStyle::COMPACT), "-$2.5M");
        assert_eq!(format_currency(Some(-0.3), CurrencyStyle::WHOLE), "$0");
        assert_eq!(format_currency(Some(f64::NAN), CurrencyStyle::WHOLE), "$0");
    }

    #[test]
    fn test_currency_display_round_trips_within_precision() {
        let mut value = 0.0;
        while value < 50_000_000.0 {
            let whole = parse_currency_display(&format_currency(Some(value), CurrencyStyle::WHOLE)).unwrap();
            assert!((whole - value).abs() <= 0.5, "whole {} -> {}", value, whole);

            let compact = parse_currency_display(&format_currency(Some(value), CurrencyStyle::COMPACT)).unwrap();
            let tolerance = if value >= 1_000_000.0 {
                50_000.0
            } else if value >= 1_000.0 {
                500.0
            } else {
                0.5
            };
            assert!((compact - value).abs() <= tolerance, "compact {} -> {}", value, compact);

            value = value * 1.37 + 7.3;
        }
    }

    #[test]
    fn test_percent_conventions() {
        assert_eq!(format_percent(Some(Percent(87.5)), 1, NullDisplay::Zero), "87.5%");
        assert_eq!(format_percent(Some(Percent(94.6)), 0, NullDisplay::Zero), "95%");
        assert_eq!(format_percent(None, 0, NullDisplay::Zero), "0%");
        assert_eq!(format_percent(None, 0, NullDisplay::NotAvailable), "N/A");
        assert_eq!(format_fraction(Some(Fraction(0.875)), 1, NullDisplay::Zero), "87.5%");
        assert_eq!(format_percent_truncated(Some(Percent(89.99))), "89%");
        assert_eq!(format_percent_truncated(None), "N/A");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format_multiple(2.44, 1), "2.4x");
        assert_eq!(format_signed(12.4), "+12");
        assert_eq!(format_signed(-4.0), "-4");
        assert_eq!(format_count(12345.9), "12,345");
        assert_eq!(format_count(-1500.0), "-1,500");
    }

    #[test]
    fn test_glyphs_and_tones() {
        assert_eq!(trend_glyph(Trend::Improving, GlyphSet::Arrows), "↑");
        assert_eq!(trend_glyph(Trend::parse("sideways"), GlyphSet::Arrows), "→");
        assert_eq!(trend_glyph(Trend::Declining, GlyphSet::Emoji), "⬇️");
        assert_eq!(coverage_tone(3.0), Tone::Good);
        assert_eq!(coverage_tone(2.5), Tone::Warning);
        assert_eq!(coverage_tone(1.9), Tone::Bad);
        assert_eq!(pacing_indicator(Fraction(0.95)), "✓");
        assert_eq!(pacing_indicator(Fraction(0.7)), "⚠️");
        assert_eq!(pacing_indicator(Fraction(0.2)), "🔴");
        assert_eq!(rag_glyph(None), "N/A");
        assert_eq!(rag_glyph(Some(Percent(91.0))), "✅");
        assert_eq!(rag_class(RagStatus::Yellow), "yellow");
        assert_eq!(rag_color(RagStatus::Red), "#dc3545");
    }

    #[test]
    fn test_attainment_indicator_bands() {
        assert_eq!(attainment_indicator(None), "");
        assert_eq!(attainment_indicator(Some(Fraction(1.0))), "✓");
        assert_eq!(attainment_indicator(Some(Fraction(0.85))), "");
        assert_eq!(attainment_indicator(Some(Fraction(0.5))), "⚠️");
        assert_eq!(attainment_indicator(Some(Fraction(0.49))), "🔴");
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Price"), "Price");
        assert_eq!(truncate_label("Exactly twenty-five chars"), "Exactly twenty-five chars");
        assert_eq!(
            truncate_label("Went with a competitor on price and features"),
            "Went with a competitor..."
        );
    }
}

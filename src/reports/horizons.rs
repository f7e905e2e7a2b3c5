//! Multi-horizon risk report: per region, the top funnel pockets with
//! MTD / QTD / rolling 7d / rolling 30d attainment side by side.

use super::formatters::{attainment_indicator, format_currency, format_fraction, trend_glyph, CurrencyStyle, GlyphSet, NullDisplay};
use crate::payload::horizons::{ExpansionStatus, GlobalTargetSummary, HorizonMetrics, HorizonRisk, HorizonRiskDocument};
use crate::types::{Fraction, Trend};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn money(value: Option<f64>) -> String {
    format_currency(value, CurrencyStyle::COMPACT)
}

fn pct(value: Option<Fraction>) -> String {
    format_fraction(value, 0, NullDisplay::NotAvailable)
}

/// Whole numbers without a decimal point, anything else as-is
fn count(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// `actual/target (pct)`, or `actual/0` when there is no target
pub fn format_attainment(actual: Option<f64>, target: Option<f64>, attainment: Option<Fraction>) -> String {
    let actual = actual.unwrap_or(0.0);
    let target = target.unwrap_or(0.0);
    if target == 0.0 {
        return format!("{}/0", count(actual));
    }
    format!("{}/{} ({})", count(actual), count(target), pct(attainment))
}

fn stage_line(label: &str, actual: Option<f64>, target: Option<f64>, attainment: Option<Fraction>) -> String {
    format!(
        "  • {}: {} {}",
        label,
        format_attainment(actual, target, attainment),
        attainment_indicator(attainment)
    )
    .trim_end()
    .to_string()
}

#[derive(Debug, Clone)]
pub struct HorizonReportOptions {
    pub product: String,
    pub regions: Vec<String>,
    /// Include the global target validation and expansion rollup sections
    pub validate_targets: bool,
}

pub struct HorizonReportBuilder<'a> {
    doc: &'a HorizonRiskDocument,
    options: &'a HorizonReportOptions,
}

impl<'a> HorizonReportBuilder<'a> {
    pub fn new(doc: &'a HorizonRiskDocument, options: &'a HorizonReportOptions) -> Self {
        Self { doc, options }
    }

    fn as_of(&self) -> &str {
        self.doc.date_windows.as_of_date.as_deref().unwrap_or("N/A")
    }

    fn window(&self, start: &Option<String>) -> String {
        format!("{} to {}", start.as_deref().unwrap_or("N/A"), self.as_of())
    }

    pub fn build(&self) -> String {
        let doc = self.doc;
        let windows = &doc.date_windows;
        let mut lines = vec![
            rule(),
            format!("📊 {} Risk Analysis Report", self.options.product),
            "   Multi-Horizon Attainment Tracking".to_string(),
            rule(),
            format!("Generated: {}", doc.generated_at_utc.as_deref().unwrap_or("N/A")),
            format!("As of Date: {}", doc.as_of_date.as_deref().unwrap_or("N/A")),
            format!("Actuals Source: {}", doc.actuals_source()),
            String::new(),
            "📅 Time Windows:".to_string(),
            format!("  • MTD: {}", self.window(&windows.mtd_start)),
            format!("  • QTD: {}", self.window(&windows.qtd_start)),
            format!("  • Rolling 7d: {}", self.window(&windows.rolling_7d_start)),
            format!("  • Rolling 30d: {}", self.window(&windows.rolling_30d_start)),
            rule(),
            String::new(),
            "🎯 Legend:".to_string(),
            "  ✓ = At or above target | ⚠️ = 50-79% | 🔴 = Below 50%".to_string(),
            "  ⬆️ = Improving | ⬇️ = Declining | ➡️ = Stable".to_string(),
            String::new(),
            "📋 Funnel Stages: MQL/EQL → SQL → SQO → Won → ACV".to_string(),
            "   (SAL removed due to data quality issues)".to_string(),
        ];

        if self.options.validate_targets {
            if let Some(summary) = &doc.global_target_summary {
                lines.extend(global_target_lines(summary));
            }
            lines.extend(expansion_lines(&doc.expansion_rollup_status));
        }

        for region in &self.options.regions {
            lines.extend(self.region_lines(region));
        }
        lines.join("\n")
    }

    fn region_lines(&self, region: &str) -> Vec<String> {
        let risks = self.doc.risks(region);
        if risks.is_empty() {
            return vec![String::new(), rule(), format!("{}: No risks identified", region), rule()];
        }
        let mut lines = vec![
            String::new(),
            rule(),
            format!("📌 {} - Top {} Risks by Annual ACV Gap", region, risks.len()),
            rule(),
        ];
        for (i, risk) in risks.iter().enumerate() {
            lines.extend(self.risk_lines(risk, i + 1));
        }
        lines
    }

    fn risk_lines(&self, risk: &HorizonRisk, rank: usize) -> Vec<String> {
        let windows = &self.doc.date_windows;
        let mut lines = vec![
            String::new(),
            "─".repeat(RULE_WIDTH),
            format!("🔴 *Risk #{}*", rank),
            format!(
                "📍 {} | {} | {}",
                risk.funnel_type.as_deref().unwrap_or("N/A"),
                risk.source.as_deref().unwrap_or("N/A"),
                risk.segment.as_deref().unwrap_or("N/A")
            ),
            format!("💰 {} annual target gap", money(Some(risk.annual_acv_gap.unwrap_or(0.0)))),
        ];
        let horizons = [
            ("MTD Attainment", &windows.mtd_start, &risk.mtd),
            ("QTD Attainment", &windows.qtd_start, &risk.qtd),
            ("Rolling 7d Attainment", &windows.rolling_7d_start, &risk.rolling_7d),
            ("Rolling 30d Attainment", &windows.rolling_30d_start, &risk.rolling_30d),
        ];
        for (name, start, metrics) in horizons {
            lines.extend(horizon_lines(name, &self.window(start), metrics));
        }
        lines.extend(trend_lines(risk));
        lines
    }
}

pub fn horizon_report(doc: &HorizonRiskDocument, options: &HorizonReportOptions) -> String {
    HorizonReportBuilder::new(doc, options).build()
}

fn horizon_lines(name: &str, range: &str, m: &HorizonMetrics) -> Vec<String> {
    vec![
        String::new(),
        format!("📊 {} ({}):", name, range),
        stage_line("MQL", m.actual_mql, m.target_mql, m.mql_attainment),
        stage_line("SQL", m.actual_sql, m.target_sql, m.sql_attainment),
        stage_line("SQO", m.actual_sqo, m.target_sqo, m.sqo_attainment),
        stage_line("Won", m.actual_won, m.target_won, m.won_attainment),
        format!(
            "  • ACV: {}/{} ({}) {}",
            money(Some(m.actual_acv.unwrap_or(0.0))),
            money(Some(m.target_acv.unwrap_or(0.0))),
            pct(m.acv_attainment),
            attainment_indicator(m.acv_attainment)
        )
        .trim_end()
        .to_string(),
    ]
}

fn trend_line(label: &str, raw: Option<&str>, recent: Option<Fraction>, month: Option<Fraction>) -> Option<String> {
    let (recent, month) = (recent?, month?);
    let trend = Trend::from_option(raw);
    Some(format!(
        "  • {}: {} {} (7d: {} vs MTD: {})",
        label,
        trend_glyph(trend, GlyphSet::Emoji),
        trend.label(),
        pct(Some(recent)),
        pct(Some(month))
    ))
}

/// Rolling 7d against MTD, per tracked metric
fn trend_lines(risk: &HorizonRisk) -> Vec<String> {
    let (mtd, r7d, trends) = (&risk.mtd, &risk.rolling_7d, &risk.trends);
    let mut lines = vec![String::new(), "📈 Trend Analysis (Rolling 7d vs MTD):".to_string()];

    lines.extend(trend_line("MQL", trends.mql_trend.as_deref(), r7d.mql_attainment, mtd.mql_attainment));
    match trend_line("Won", trends.won_trend.as_deref(), r7d.won_attainment, mtd.won_attainment) {
        Some(line) => lines.push(line),
        None if mtd.target_won.unwrap_or(0.0) == 0.0 && r7d.target_won.unwrap_or(0.0) == 0.0 => {
            lines.push("  • Won: No targets in period".to_string())
        }
        None => {}
    }
    lines.extend(trend_line("ACV", trends.acv_trend.as_deref(), r7d.acv_attainment, mtd.acv_attainment));
    lines
}

fn status_icon(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "⚠️"
    }
}

fn global_target_lines(summary: &GlobalTargetSummary) -> Vec<String> {
    let annual_ok = summary.annual_validation_status.as_deref() == Some("OK");
    let mut lines = vec![
        String::new(),
        rule(),
        "🎯 GLOBAL NEW LOGO SMB TARGET VALIDATION".to_string(),
        rule(),
        String::new(),
        "📊 Annual Target Check:".to_string(),
        format!("  • Expected (2026 Plan): {}", money(summary.expected_annual_target)),
        format!("  • SOP Regional Sum:     {}", money(summary.sop_annual_target)),
        format!(
            "  • Variance:             {} {}",
            money(summary.annual_target_variance),
            if annual_ok { "✓" } else { "⚠️ MISMATCH" }
        ),
        String::new(),
        "📊 Q1 Target Check:".to_string(),
        format!("  • Expected (Q1 Plan):   {}", money(summary.expected_q1_target)),
        format!("  • SOP Regional Sum:     {}", money(summary.sop_q1_target)),
        format!("  • Variance:             {}", money(summary.q1_target_variance)),
    ];

    if !summary.source_validation.is_empty() {
        lines.push(String::new());
        lines.push("📋 Per-Source Validation:".to_string());
        for source in &summary.source_validation {
            lines.push(format!(
                "  • {:<15}: Expected {:>8} | SOP {:>8} | Var {:>8} {}",
                source.source.as_deref().unwrap_or("N/A"),
                money(source.expected_annual_acv),
                money(source.sop_annual_acv),
                money(source.annual_variance),
                status_icon(source.validation_status.as_deref() == Some("OK"))
            ));
        }
    }
    lines
}

fn expansion_lines(statuses: &[ExpansionStatus]) -> Vec<String> {
    if statuses.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![
        String::new(),
        rule(),
        "📈 EXPANSION ROLLUP STATUS BY REGION".to_string(),
        rule(),
        "(EXPANSION detail rows excluded from top risks when rollup >= 100%)".to_string(),
        String::new(),
    ];
    for status in statuses {
        lines.push(format!(
            "  {}: {}/{} ({}) {}",
            status.region.as_deref().unwrap_or("N/A"),
            money(status.expansion_actual_acv),
            money(status.expansion_target_acv),
            pct(Some(status.expansion_attainment.unwrap_or(Fraction(0.0)))),
            status_icon(status.expansion_at_target.unwrap_or(false))
        ));
        lines.push(format!("      → {}", status.filter_status.as_deref().unwrap_or("N/A")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(validate_targets: bool) -> HorizonReportOptions {
        HorizonReportOptions {
            product: "R360".to_string(),
            regions: vec!["AMER".to_string(), "EMEA".to_string()],
            validate_targets,
        }
    }

    fn document() -> HorizonRiskDocument {
        serde_json::from_value(json!({
            "generated_at_utc": "2026-01-10T06:00:00Z",
            "as_of_date": "2026-01-10",
            "actuals_source": "close_date",
            "date_windows": {
                "as_of_date": "2026-01-10", "mtd_start": "2026-01-01", "qtd_start": "2026-01-01",
                "rolling_7d_start": "2026-01-03", "rolling_30d_start": "2025-12-11"
            },
            "top_risks_by_region": {
                "EMEA": [{
                    "funnel_type": "NEW LOGO", "source": "INBOUND", "segment": "SMB",
                    "annual_acv_gap": 344000,
                    "mtd": {"actual_mql": 40, "target_mql": 50, "mql_attainment": 0.8,
                            "actual_sql": 3, "target_sql": 0,
                            "actual_won": 1, "target_won": 4, "won_attainment": 0.25,
                            "actual_acv": 12000, "target_acv": 48000, "acv_attainment": 0.25},
                    "rolling_7d": {"mql_attainment": 1.1, "target_won": 0},
                    "trends": {"mql_trend": "improving"}
                }]
            },
            "global_target_summary": {
                "expected_annual_target": 2000000, "sop_annual_target": 1900000,
                "annual_target_variance": -100000, "annual_validation_status": "MISMATCH",
                "source_validation": [{"source": "INBOUND", "expected_annual_acv": 1000000,
                                       "sop_annual_acv": 1000000, "annual_variance": 0, "validation_status": "OK"}]
            },
            "expansion_rollup_status": [
                {"region": "AMER", "expansion_target_acv": 500000, "expansion_actual_acv": 550000,
                 "expansion_attainment": 1.1, "expansion_at_target": true, "filter_status": "EXPANSION filtered"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_attainment_formatting() {
        assert_eq!(format_attainment(Some(40.0), Some(50.0), Some(Fraction(0.8))), "40/50 (80%)");
        assert_eq!(format_attainment(Some(3.0), Some(0.0), None), "3/0");
        assert_eq!(format_attainment(Some(2.5), Some(4.0), None), "2.5/4 (N/A)");
    }

    #[test]
    fn test_region_blocks() {
        let report = horizon_report(&document(), &options(false));
        assert!(report.contains("\nAMER: No risks identified\n"));
        assert!(report.contains("📌 EMEA - Top 1 Risks by Annual ACV Gap"));
        assert!(report.contains("📍 NEW LOGO | INBOUND | SMB"));
        assert!(report.contains("💰 $344K annual target gap"));
        assert!(report.contains("📊 MTD Attainment (2026-01-01 to 2026-01-10):"));
        assert!(report.contains("  • MQL: 40/50 (80%)\n"));
        assert!(report.contains("  • SQL: 3/0\n"));
        assert!(report.contains("  • Won: 1/4 (25%) 🔴"));
        assert!(report.contains("  • ACV: $12K/$48K (25%) 🔴"));
        assert!(!report.contains("GLOBAL NEW LOGO SMB TARGET VALIDATION"));
    }

    #[test]
    fn test_trend_summary() {
        let report = horizon_report(&document(), &options(false));
        assert!(report.contains("  • MQL: ⬆️ Improving (7d: 110% vs MTD: 80%)"));
        assert!(!report.contains("  • Won: No targets in period"));
        assert!(!report.contains("  • ACV: ➡️"));
    }

    #[test]
    fn test_target_validation_sections() {
        let report = horizon_report(&document(), &options(true));
        assert!(report.contains("🎯 GLOBAL NEW LOGO SMB TARGET VALIDATION"));
        assert!(report.contains("  • Variance:             -$100K ⚠️ MISMATCH"));
        assert!(report.contains("  • INBOUND        : Expected    $1.0M | SOP    $1.0M | Var       $0 ✓"));
        assert!(report.contains("  AMER: $550K/$500K (110%) ✓\n      → EXPANSION filtered"));
    }
}

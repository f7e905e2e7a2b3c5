//! Top-of-funnel pacing report: an executive summary and a fixed-width
//! detail view of regional pacing, conversion, forecast and trends.

use super::formatters::{
    format_count, format_currency, format_percent_truncated, rag_glyph, trend_glyph, CurrencyStyle, GlyphSet,
};
use crate::payload::funnel::{FunnelTotals, RegionAlert, StageTrends, TofDocument};
use crate::types::{Fraction, Percent};

const SUMMARY_WIDTH: usize = 80;
const DETAIL_WIDTH: usize = 100;

fn money(value: Option<f64>) -> String {
    format_currency(Some(value.unwrap_or(0.0)), CurrencyStyle::COMPACT)
}

fn cents(value: Option<f64>) -> String {
    format_currency(Some(value.unwrap_or(0.0)), CurrencyStyle::COMPACT.with_decimals(2))
}

fn number(value: Option<f64>) -> String {
    format_count(value.unwrap_or(0.0))
}

fn whole(value: Option<f64>) -> i64 {
    value.unwrap_or(0.0) as i64
}

fn rate(value: Option<Percent>) -> String {
    format!("{:.1}%", value.map_or(0.0, Percent::value))
}

fn flagged(value: Option<Percent>, below_benchmark: Option<bool>) -> String {
    let flag = if below_benchmark.unwrap_or(false) { "*" } else { "" };
    format!("{}{}", rate(value), flag)
}

/// One arrow of the full-funnel waterfall
fn step(lines: &mut Vec<String>, note: String) {
    lines.push("      |".to_string());
    lines.push(format!("      v{}", note));
}

fn heading(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(DETAIL_WIDTH));
    lines.push(title.to_string());
    lines.push("=".repeat(DETAIL_WIDTH));
    lines.push(String::new());
}

pub struct TofReport<'a> {
    doc: &'a TofDocument,
    products: &'a [String],
}

impl<'a> TofReport<'a> {
    pub fn new(doc: &'a TofDocument, products: &'a [String]) -> Self {
        Self { doc, products }
    }

    /// Advertising, pacing, attribution, alerts and recommendations
    pub fn summary(&self) -> String {
        let doc = self.doc;
        let mut lines = vec![
            "=".repeat(SUMMARY_WIDTH),
            "TOP OF FUNNEL PACING REPORT - EXECUTIVE SUMMARY".to_string(),
            format!("Generated: {}", doc.generated_at),
            format!(
                "Period: {} to {} ({} days)",
                doc.period.start,
                doc.period.end,
                doc.period.days_elapsed.unwrap_or(0)
            ),
            "=".repeat(SUMMARY_WIDTH),
            String::new(),
            "GOOGLE ADS PERFORMANCE (MTD)".to_string(),
            "-".repeat(40),
        ];

        for product in self.products {
            if let Some(ads) = doc.google_ads.get(product) {
                lines.push(format!("{}:", product));
                lines.push(format!("  Impressions: {}", number(ads.impressions)));
                lines.push(format!(
                    "  Clicks: {} (CTR: {:.2}%)",
                    number(ads.clicks),
                    ads.ctr_pct.map_or(0.0, Percent::value)
                ));
                lines.push(format!("  Spend: {}", cents(ads.ad_spend_usd)));
                lines.push(format!("  Conversions: {}", number(ads.conversions)));
                lines.push(format!("  CPC: {} | CPA: {}", cents(ads.cpc_usd), cents(ads.cpa_usd)));
                lines.push(String::new());
            }
        }

        lines.push("INBOUND FUNNEL PACING (MTD)".to_string());
        lines.push("-".repeat(40));
        for product in self.products {
            if let Some(summary) = doc.funnel_metrics.get(product).and_then(|f| f.summary.as_ref()) {
                lines.push(format!("{} Total:", product));
                lines.extend(pacing_lines(summary));
                lines.push(String::new());
            }
        }

        lines.push("MARKETING ATTRIBUTION (MTD)".to_string());
        lines.push("-".repeat(40));
        for product in self.products {
            if let Some(attribution) = doc.attribution.get(product) {
                lines.push(format!("{}:", product));
                lines.push(format!("  Cost per MQL: {}", cents(attribution.cost_per_mql)));
                lines.push(format!("  Cost per SQL: {}", cents(attribution.cost_per_sql)));
                lines.push(format!("  Cost per Won: {}", cents(attribution.cost_per_won)));
                lines.push(format!("  Marketing ROI: {:.2}x", attribution.marketing_roi.unwrap_or(0.0)));
                lines.push(String::new());
            }
        }

        lines.extend(self.alert_lines());

        let recommendations: Vec<&str> = doc.insights.recommendations().collect();
        if !recommendations.is_empty() {
            lines.push(String::new());
            lines.push("RECOMMENDATIONS:".to_string());
            lines.extend(recommendations.iter().map(|r| format!("  - {}", r)));
        }

        lines.push(String::new());
        lines.push("=".repeat(SUMMARY_WIDTH));
        lines.join("\n")
    }

    fn alert_lines(&self) -> Vec<String> {
        let alerts = &self.doc.insights.alerts;
        let mut lines = vec!["ALERTS & INSIGHTS".to_string(), "-".repeat(40)];

        let zero = |alert: &RegionAlert, stage: &str| format!("  - {} {}: {} at 0% pacing", alert.product, alert.region, stage);
        let low = |alert: &RegionAlert, stage: &str| {
            format!(
                "  - {} {}: {} at {} (gap: {})",
                alert.product,
                alert.region,
                stage,
                format_percent_truncated(alert.pacing),
                number(alert.gap)
            )
        };
        let win = |alert: &RegionAlert, stage: &str| {
            format!(
                "  - {} {}: {} at {} (exceeding target)",
                alert.product,
                alert.region,
                stage,
                format_percent_truncated(alert.pacing)
            )
        };

        if alerts.critical_count() > 0 {
            lines.push(format!("CRITICAL ({}):", alerts.critical_count()));
            lines.extend(alerts.critical_mql_zero.iter().map(|a| zero(a, "MQL")));
            lines.extend(alerts.critical_won_zero.iter().map(|a| zero(a, "Won")));
        }
        if alerts.warning_count() > 0 {
            lines.push(format!("WARNINGS ({}):", alerts.warning_count()));
            lines.extend(alerts.warning_mql_low.iter().map(|a| low(a, "MQL")));
            lines.extend(alerts.warning_won_low.iter().map(|a| low(a, "Won")));
            lines.extend(
                alerts
                    .warning_cpa_high
                    .iter()
                    .map(|a| format!("  - {}: CPA at {} (>$500)", a.product, cents(a.cpa_usd))),
            );
        }
        if !alerts.wins_mql_exceeding.is_empty() || !alerts.wins_sql_exceeding.is_empty() {
            lines.push("WINS:".to_string());
            lines.extend(alerts.wins_mql_exceeding.iter().map(|a| win(a, "MQL")));
            lines.extend(alerts.wins_sql_exceeding.iter().map(|a| win(a, "SQL")));
        }
        lines
    }

    /// Regional pacing, conversion rates, waterfall, forecast and trends
    pub fn detail(&self) -> String {
        let mut lines = vec![String::new()];
        self.pacing_table(&mut lines);
        self.conversion_table(&mut lines);
        self.full_funnel(&mut lines);
        self.forecast_table(&mut lines);
        self.trend_table(&mut lines);
        lines.push(String::new());
        lines.join("\n")
    }

    fn regions(&self, product: &str) -> &'a [FunnelTotals] {
        self.doc
            .funnel_metrics
            .get(product)
            .map(|f| f.by_region.as_slice())
            .unwrap_or(&[])
    }

    fn pacing_table(&self, lines: &mut Vec<String>) {
        heading(lines, "DETAILED PACING BY REGION (MTD)");
        lines.push(format!(
            "{:<8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>15}",
            "Product", "Region", "MQL", "SQL", "SAL", "SQO", "Won", "ACV"
        ));
        lines.push("-".repeat(DETAIL_WIDTH));

        for product in self.products {
            for r in self.regions(product) {
                let stage = |actual: Option<f64>, target: Option<f64>, pacing: Option<Percent>| {
                    format!("{}/{} ({})", whole(actual), whole(target), format_percent_truncated(pacing))
                };
                lines.push(format!(
                    "{} {:<6} {:<8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>15}",
                    rag_glyph(r.mql_pacing_pct),
                    product,
                    r.region.as_deref().unwrap_or("N/A"),
                    stage(r.actual_mql, r.target_mql, r.mql_pacing_pct),
                    stage(r.actual_sql, r.target_sql, r.sql_pacing_pct),
                    stage(r.actual_sal, r.target_sal, r.sal_pacing_pct),
                    stage(r.actual_sqo, r.target_sqo, r.sqo_pacing_pct),
                    stage(r.actual_won, r.target_won, r.won_pacing_pct),
                    money(r.actual_acv)
                ));
            }
            lines.push(String::new());
        }
        lines.push(String::new());
    }

    fn conversion_table(&self, lines: &mut Vec<String>) {
        heading(lines, "CONVERSION RATES (MTD)");
        lines.push(format!(
            "{:<8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Product", "Region", "MQL>SQL", "SQL>SAL", "SAL>SQO", "SQO>Won", "MQL>Won"
        ));
        let benchmarks = &self.doc.benchmarks;
        let benchmark = |value: Option<Fraction>| format_percent_truncated(Some(value.unwrap_or(Fraction(0.0)).to_percent()));
        lines.push(format!(
            "{:8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "",
            "Benchmark",
            benchmark(benchmarks.mql_to_sql),
            benchmark(benchmarks.sql_to_sal),
            benchmark(benchmarks.sal_to_sqo),
            benchmark(benchmarks.sqo_to_won),
            "N/A"
        ));
        lines.push("-".repeat(DETAIL_WIDTH));

        for product in self.products {
            for r in self.regions(product) {
                lines.push(format!(
                    "{:<8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>12}",
                    product,
                    r.region.as_deref().unwrap_or("N/A"),
                    flagged(r.mql_to_sql_rate, r.mql_to_sql_below_benchmark),
                    flagged(r.sql_to_sal_rate, r.sql_to_sal_below_benchmark),
                    flagged(r.sal_to_sqo_rate, r.sal_to_sqo_below_benchmark),
                    flagged(r.sqo_to_won_rate, r.sqo_to_won_below_benchmark),
                    rate(r.mql_to_won_rate)
                ));
            }
            lines.push(String::new());
        }
        lines.push("* = Below benchmark".to_string());
        lines.push(String::new());
    }

    fn full_funnel(&self, lines: &mut Vec<String>) {
        heading(lines, "FULL FUNNEL VISUALIZATION (MTD)");
        for product in self.products {
            let Some(ff) = self.doc.full_funnel.get(product) else {
                continue;
            };
            lines.push(format!("{} Full Funnel:", product));
            lines.push(format!("  Impressions: {:>12}", number(ff.impressions)));
            step(lines, format!("  ({:.2}% CTR)", ff.impressions_to_clicks_rate.unwrap_or(0.0)));
            lines.push(format!("  Clicks:      {:>12}", number(ff.clicks)));
            step(lines, format!("  ({:.2}%)", ff.clicks_to_conversions_rate.unwrap_or(0.0)));
            lines.push(format!("  Conversions: {:>12}", number(ff.conversions)));
            step(lines, format!("  ({:.2}%)", ff.conversions_to_mql_rate.unwrap_or(0.0)));
            lines.push(format!("  MQL:         {:>12}", number(ff.actual_mql)));
            step(lines, format!("  ({:.1}%)", ff.mql_to_sql_rate.unwrap_or(0.0)));
            lines.push(format!("  SQL:         {:>12}", number(ff.actual_sql)));
            step(lines, format!("  ({:.1}%)", ff.sql_to_sal_rate.unwrap_or(0.0)));
            lines.push(format!("  SAL:         {:>12}", number(ff.actual_sal)));
            step(lines, format!("  ({:.1}%)", ff.sal_to_sqo_rate.unwrap_or(0.0)));
            lines.push(format!("  SQO:         {:>12}", number(ff.actual_sqo)));
            step(lines, format!("  ({:.1}%)", ff.sqo_to_won_rate.unwrap_or(0.0)));
            lines.push(format!("  Won:         {:>12}", number(ff.actual_won)));
            step(lines, String::new());
            lines.push(format!("  ACV:         {:>12}", money(ff.actual_acv)));
            lines.push(String::new());
            lines.push(format!(
                "  Funnel Efficiency (MQL to Won): {:.1}%",
                ff.funnel_efficiency.unwrap_or(0.0)
            ));
            lines.push(String::new());
        }
    }

    fn forecast_table(&self, lines: &mut Vec<String>) {
        heading(lines, "MONTH-END FORECAST");
        lines.push(format!(
            "{:<8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>15}",
            "Product", "Region", "Proj MQL", "Proj SQL", "Proj SQO", "Proj Won", "Proj ACV"
        ));
        lines.push("-".repeat(DETAIL_WIDTH));
        for product in self.products {
            for f in self.doc.forecasting.get(product).map(Vec::as_slice).unwrap_or(&[]) {
                lines.push(format!(
                    "{:<8} {:<8} {:>12} {:>12} {:>12} {:>12} {:>15}",
                    f.product.as_deref().unwrap_or("N/A"),
                    f.region.as_deref().unwrap_or("N/A"),
                    number(f.projected_mql),
                    number(f.projected_sql),
                    number(f.projected_sqo),
                    number(f.projected_won),
                    money(f.projected_acv)
                ));
            }
            lines.push(String::new());
        }
    }

    fn trend_table(&self, lines: &mut Vec<String>) {
        heading(lines, "MONTH-OVER-MONTH TRENDS");
        lines.push(format!(
            "{:<8} {:<8} {:>15} {:>15} {:>15} {:>15}",
            "Product", "Region", "MQL Trend", "SQL Trend", "SQO Trend", "Won Trend"
        ));
        lines.push("-".repeat(DETAIL_WIDTH));
        for product in self.products {
            for t in self.doc.trends.get(product).map(Vec::as_slice).unwrap_or(&[]) {
                lines.push(trend_row(t));
            }
            lines.push(String::new());
        }
    }
}

fn pacing_lines(summary: &FunnelTotals) -> Vec<String> {
    let stage = |label: &str, actual: Option<f64>, target: Option<f64>, pacing: Option<Percent>| {
        format!(
            "  {}: {}/{} ({})",
            label,
            number(actual),
            number(target),
            format_percent_truncated(pacing)
        )
    };
    vec![
        stage("MQL", summary.actual_mql, summary.target_mql, summary.mql_pacing_pct),
        stage("SQL", summary.actual_sql, summary.target_sql, summary.sql_pacing_pct),
        stage("SQO", summary.actual_sqo, summary.target_sqo, summary.sqo_pacing_pct),
        stage("Won", summary.actual_won, summary.target_won, summary.won_pacing_pct),
        format!(
            "  ACV: {}/{} ({})",
            money(summary.actual_acv),
            money(summary.target_acv),
            format_percent_truncated(summary.acv_pacing_pct)
        ),
    ]
}

fn trend_row(t: &StageTrends) -> String {
    let cell = |trend, change: Option<f64>| {
        format!("{} {:+.1}%{:>6}", trend_glyph(trend, GlyphSet::Arrows), change.unwrap_or(0.0), "")
    };
    format!(
        "{:<8} {:<8} {} {} {} {}",
        t.product.as_deref().unwrap_or("N/A"),
        t.region.as_deref().unwrap_or("N/A"),
        cell(t.mql_trend, t.mql_change_pct),
        cell(t.sql_trend, t.sql_change_pct),
        cell(t.sqo_trend, t.sqo_change_pct),
        format!("{} {:+.1}%", trend_glyph(t.won_trend, GlyphSet::Arrows), t.won_change_pct.unwrap_or(0.0))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn products() -> Vec<String> {
        vec!["POR".to_string(), "R360".to_string()]
    }

    fn document() -> TofDocument {
        serde_json::from_value(json!({
            "generated_at": "2026-02-10T08:00:00Z",
            "period": {"start": "2026-02-01", "end": "2026-02-10", "days_elapsed": 10},
            "google_ads": {
                "POR": {"impressions": 125000, "clicks": 3400, "ctr_pct": 2.72, "ad_spend_usd": 15250.5,
                        "cpc_usd": 4.49, "conversions": 85, "cpa_usd": 179.42}
            },
            "funnel_metrics": {
                "POR": {
                    "summary": {"actual_mql": 120, "target_mql": 150, "mql_pacing_pct": 80.6,
                                "actual_acv": 250000, "target_acv": 400000, "acv_pacing_pct": 62.5},
                    "by_region": [
                        {"region": "AMER", "actual_mql": 60, "target_mql": 50, "mql_pacing_pct": 120,
                         "actual_sql": 20, "target_sql": 25, "sql_pacing_pct": 80,
                         "actual_acv": 125000, "mql_to_sql_rate": 33.333,
                         "mql_to_sql_below_benchmark": false, "sql_to_sal_rate": 40, "sql_to_sal_below_benchmark": true}
                    ]
                }
            },
            "attribution": {"POR": {"cost_per_mql": 127.09, "marketing_roi": 3.456}},
            "insights": {
                "alerts": {
                    "critical_mql_zero": [{"product": "R360", "region": "APAC", "pacing": 0, "gap": -30}],
                    "warning_mql_low": [{"product": "POR", "region": "EMEA", "pacing": 55.9, "gap": -1250}],
                    "wins_sql_exceeding": [{"product": "POR", "region": "AMER", "pacing": 130.2}]
                },
                "recommendations": ["Shift spend to EMEA", null]
            },
            "benchmarks": {"mql_to_sql": 0.3, "sql_to_sal": 0.5},
            "full_funnel": {"POR": {"impressions": 125000, "impressions_to_clicks_rate": 2.72,
                                     "actual_mql": 120, "actual_acv": 250000, "funnel_efficiency": 4.2}},
            "forecasting": {"POR": [{"product": "POR", "region": "AMER", "projected_mql": 1860.4, "projected_acv": 380000}]},
            "trends": {"POR": [{"product": "POR", "region": "AMER", "mql_trend": "IMPROVING", "mql_change_pct": 12.5,
                                "won_trend": "DECLINING", "won_change_pct": -4}]}
        }))
        .unwrap()
    }

    #[test]
    fn test_summary_sections() {
        let doc = document();
        let products = products();
        let summary = TofReport::new(&doc, &products).summary();

        assert!(summary.contains("Period: 2026-02-01 to 2026-02-10 (10 days)"));
        assert!(summary.contains("  Impressions: 125,000"));
        assert!(summary.contains("  Clicks: 3,400 (CTR: 2.72%)"));
        assert!(summary.contains("  Spend: $15.25K"));
        assert!(summary.contains("  CPC: $4.49 | CPA: $179.42"));
        assert!(summary.contains("POR Total:\n  MQL: 120/150 (80%)"));
        assert!(summary.contains("  ACV: $250K/$400K (62%)"));
        assert!(summary.contains("  Cost per MQL: $127.09"));
        assert!(summary.contains("  Marketing ROI: 3.46x"));
        assert!(!summary.contains("R360:"));
    }

    #[test]
    fn test_summary_alerts_and_recommendations() {
        let doc = document();
        let products = products();
        let summary = TofReport::new(&doc, &products).summary();

        assert!(summary.contains("CRITICAL (1):\n  - R360 APAC: MQL at 0% pacing"));
        assert!(summary.contains("WARNINGS (1):\n  - POR EMEA: MQL at 55% (gap: -1,250)"));
        assert!(summary.contains("WINS:\n  - POR AMER: SQL at 130% (exceeding target)"));
        assert!(summary.contains("RECOMMENDATIONS:\n  - Shift spend to EMEA"));
        assert!(summary.ends_with(&"=".repeat(SUMMARY_WIDTH)));
    }

    #[test]
    fn test_detail_tables() {
        let doc = document();
        let products = products();
        let detail = TofReport::new(&doc, &products).detail();

        assert!(detail.contains("✅ POR    AMER"));
        assert!(detail.contains("60/50 (120%)"));
        assert!(detail.contains("20/25 (80%)"));
        assert!(detail.contains("0/0 (N/A)"));
        assert!(detail.contains("         Benchmark          30%"));
        assert!(detail.contains("33.3%"));
        assert!(detail.contains("40.0%*"));
        assert!(detail.contains("  Impressions:      125,000"));
        assert!(detail.contains("      v  (2.72% CTR)"));
        assert!(detail.contains("  ACV:                $250K"));
        assert!(detail.contains("  Funnel Efficiency (MQL to Won): 4.2%"));
        assert!(detail.contains("POR      AMER            1,860"));
        assert!(detail.contains("POR      AMER     ↑ +12.5%       → +0.0%       → +0.0%       ↓ -4.0%"));
    }
}

//! Slack-flavoured daily revenue messages: a short main post, a detailed
//! thread reply, and the JSON bundle a downstream poster consumes.

use super::formatters::{
    format_currency, format_fraction, pacing_indicator, trend_glyph, CurrencyStyle, GlyphSet, NullDisplay,
};
use crate::payload::daily::{DailyDetailData, DailyReportData, PocketVariance, Scorecard, SegmentSummary};
use crate::query::Fetched;
use crate::types::{Fraction, Trend};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MAIN_MESSAGE_LIMIT: usize = 1800;

const SNAPSHOT_CAP: usize = 4;
const ALERTS_CAP: usize = 3;
const GAPS_CAP: usize = 6;
const WINS_CAP: usize = 3;
const PERFORMERS_CAP: usize = 6;
const INBOUND_CAP: usize = 6;
const ACTIONS_CAP: usize = 8;
const MISSED_LEAD_WINDOW_MIN: f64 = 50.0;

fn money(value: Option<f64>) -> String {
    format_currency(value, CurrencyStyle::COMPACT)
}

fn pct(value: Option<Fraction>) -> String {
    format_fraction(value, 1, NullDisplay::Zero)
}

fn frac(value: f64) -> String {
    pct(Some(Fraction(value)))
}

fn num(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

fn whole(value: Option<f64>) -> i64 {
    num(value) as i64
}

/// A set, nonzero fraction
fn nonzero(value: Option<Fraction>) -> Option<f64> {
    value.map(|f| f.value()).filter(|v| *v != 0.0)
}

/// Output of one daily run, written as JSON for the poster
#[derive(Debug, Clone, Serialize)]
pub struct SlackBundle {
    pub run_id: Uuid,
    pub main_message: String,
    pub thread_message: String,
    pub report_payload_json: String,
    pub detail_payload_json: String,
    pub query_1_sql: String,
    pub query_2_sql: String,
    pub errors: Vec<String>,
}

impl SlackBundle {
    pub fn build(
        report: &Fetched<DailyReportData>,
        detail: &Fetched<DailyDetailData>,
        main_message_limit: usize,
    ) -> Result<Self> {
        let builder = DailyMessageBuilder::new(&report.document, &detail.document);
        let report_payload_json = serde_json::to_string(&report.payload)?;
        let detail_payload_json = serde_json::to_string(&detail.payload)?;
        Ok(Self {
            run_id: run_id(&report_payload_json, &detail_payload_json),
            main_message: fit_to_limit(&builder.main_message(), main_message_limit),
            thread_message: builder.thread_message(),
            report_payload_json,
            detail_payload_json,
            query_1_sql: report.sql.clone(),
            query_2_sql: detail.sql.clone(),
            errors: Vec::new(),
        })
    }
}

/// Name-based id over both payloads; the same inputs always give the same id
pub fn run_id(report_payload_json: &str, detail_payload_json: &str) -> Uuid {
    let name = format!("{}\n{}", report_payload_json, detail_payload_json);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Drop trailing lines until the message fits in `limit` characters
pub fn fit_to_limit(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        return message.to_string();
    }
    let mut lines: Vec<&str> = message.lines().collect();
    let original = lines.len();
    while !lines.is_empty() && lines.join("\n").chars().count() > limit {
        lines.pop();
    }
    warn!(
        "Main message exceeded {} characters; dropped {} trailing lines",
        limit,
        original - lines.len()
    );
    lines.join("\n")
}

/// Builds the daily messages from the two daily payloads
pub struct DailyMessageBuilder<'a> {
    report: &'a DailyReportData,
    detail: &'a DailyDetailData,
    wtd: Scorecard,
    mtd: Scorecard,
}

impl<'a> DailyMessageBuilder<'a> {
    pub fn new(report: &'a DailyReportData, detail: &'a DailyDetailData) -> Self {
        Self {
            report,
            detail,
            wtd: report.scorecard("WTD"),
            mtd: report.scorecard("MTD"),
        }
    }

    fn snapshot_bullets(&self) -> Vec<String> {
        let (wtd, mtd) = (&self.wtd, &self.mtd);
        let mut bullets = Vec::new();

        let mtd_pacing = mtd.revenue_pacing.map_or(0.0, Fraction::value);
        if mtd_pacing < 0.7 {
            let gap = num(mtd.target_acv) - num(mtd.actual_acv);
            bullets.push(format!(
                "MTD revenue at {} - need {} to hit target",
                frac(mtd_pacing),
                money(Some(gap))
            ));
        } else {
            bullets.push(format!(
                "MTD tracking {} to target ({} booked)",
                frac(mtd_pacing),
                money(mtd.actual_acv)
            ));
        }

        let volume = wtd.volume_pacing.map_or(0.0, Fraction::value);
        let won = whole(wtd.actual_won);
        if volume > 1.2 {
            bullets.push(format!("WTD deal volume strong at {} ({} wins)", frac(volume), won));
        } else if volume < 0.8 {
            let needed = (num(wtd.target_won) - won as f64) as i64;
            bullets.push(format!(
                "WTD deal volume lagging at {} (need {} more wins)",
                frac(volume),
                needed
            ));
        } else {
            bullets.push(format!("WTD deal volume on track at {} ({} wins)", frac(volume), won));
        }

        if let Some(prior) = nonzero(mtd.prior_revenue_pacing) {
            let change = mtd_pacing - prior;
            if change.abs() > 0.05 {
                let direction = if change > 0.0 { "up" } else { "down" };
                bullets.push(format!("Pacing {} {} vs last month", direction, frac(change.abs())));
            }
        }

        if bullets.len() < 3 {
            if let Some(sql_to_sal) = nonzero(mtd.sql_to_sal).filter(|v| *v < -0.05) {
                bullets.push(format!("SQL→SAL conversion down {} from target", frac(sql_to_sal.abs())));
            }
        }

        bullets.truncate(SNAPSHOT_CAP);
        bullets
    }

    fn top_constraint(&self) -> String {
        match &self.mtd.worst_slippage {
            Some(slippage) => format!(
                "{} stage slipping {}",
                slippage.stage.as_deref().unwrap_or("Unknown"),
                money(Some(num(slippage.value).abs()))
            ),
            None => {
                debug!("No Worst_Slippage in MTD scorecard");
                "No stage slippage reported".to_string()
            }
        }
    }

    fn alert_bullets(&self) -> Vec<String> {
        let alerts = &self.detail.alerts;
        let mut bullets = Vec::new();
        if num(alerts.past_due_under_pacing_count) > 0.0 {
            bullets.push(format!(
                "*{} past due deals* worth {} need immediate attention",
                whole(alerts.past_due_under_pacing_count),
                money(alerts.past_due_under_pacing_sum)
            ));
        }
        if num(alerts.upcoming_won_risk_next_14_days_count) > 0.0 {
            bullets.push(format!(
                "*{} at-risk deals* (next 14d) totaling {}",
                whole(alerts.upcoming_won_risk_next_14_days_count),
                money(alerts.upcoming_won_risk_next_14_days_sum)
            ));
        }
        if num(alerts.missed_lead_window_count) > MISSED_LEAD_WINDOW_MIN {
            bullets.push(format!(
                "*{} missed lead windows* ({} revenue impact)",
                whole(alerts.missed_lead_window_count),
                money(alerts.missed_lead_window_sum)
            ));
        }
        bullets.truncate(ALERTS_CAP);
        bullets
    }

    /// One data-driven observation explaining the headline numbers
    pub fn key_insight(&self) -> String {
        if let Some(sql_to_sal) = self.mtd.sql_to_sal.map(Fraction::value).filter(|v| *v < -0.1) {
            return format!(
                "SQL→SAL conversion down {} - sales team may need more qualified leads",
                frac(sql_to_sal.abs())
            );
        }
        if let Some(top) = self.detail.top_positive_mtd.first() {
            return format!(
                "{}|{} driving wins this month - replicate success in other regions",
                top.r, top.src
            );
        }
        if let Some(worst) = self
            .report
            .worst_revenue_pacing_by_horizon
            .get("MTD")
            .and_then(|pockets| pockets.first())
        {
            return format!(
                "{} struggling with {} gap - may need pipeline acceleration",
                worst.r,
                money(Some(num(worst.acv_gap)))
            );
        }
        format!(
            "MTD pacing at {} requires focused execution to close gap",
            pct(self.mtd.revenue_pacing)
        )
    }

    fn pacing_line(card: &Scorecard) -> String {
        format!(
            "• {}: {} of {} ({} {}) | {}/{} wins",
            card.horizon,
            money(Some(num(card.actual_acv))),
            money(Some(num(card.target_acv))),
            pct(card.revenue_pacing),
            trend_glyph(card.revenue_trend.unwrap_or(Trend::Neutral), GlyphSet::Arrows),
            whole(card.actual_won),
            whole(card.target_won)
        )
    }

    /// The short executive post; callers bound it with [`fit_to_limit`]
    pub fn main_message(&self) -> String {
        let report = self.report;
        let mut lines = vec![
            "*Daily Revenue Performance Report*".to_string(),
            format!(
                "{} | {} targets | Week starts {}",
                report.as_of_date.as_deref().unwrap_or("N/A"),
                report.percentile.as_deref().unwrap_or("N/A"),
                report.week_starts_on.as_deref().unwrap_or("N/A")
            ),
            String::new(),
            "*🎯 Today's Snapshot*".to_string(),
        ];
        lines.extend(self.snapshot_bullets().into_iter().map(|b| format!("• {}", b)));

        lines.push(String::new());
        lines.push("*📊 Pacing vs Target*".to_string());
        lines.push(Self::pacing_line(&self.wtd));
        lines.push(Self::pacing_line(&self.mtd));

        lines.push(String::new());
        lines.push("*🚨 Top Constraint*".to_string());
        lines.push(format!("• {}", self.top_constraint()));

        lines.push(String::new());
        lines.push("*⚠️ Critical Alerts*".to_string());
        let alerts = self.alert_bullets();
        if alerts.is_empty() {
            lines.push("• No critical alerts".to_string());
        } else {
            lines.extend(alerts.into_iter().map(|b| format!("• {}", b)));
        }

        lines.push(String::new());
        lines.push("*💡 Key Insight*".to_string());
        lines.push(format!("• {}", self.key_insight()));

        lines.push(String::new());
        lines.push("→ Thread below for detailed breakdowns and actions".to_string());
        lines.join("\n")
    }

    fn pocket_lines(
        lines: &mut Vec<String>,
        heading: &str,
        pockets: &[PocketVariance],
        cap: usize,
        render: impl Fn(&PocketVariance) -> String,
    ) {
        lines.push(heading.to_string());
        for (i, item) in pockets.iter().take(cap).enumerate() {
            lines.push(format!(
                "  {}. {}: {} - {}",
                i + 1,
                item.pocket(),
                render(item),
                item.ft.as_deref().unwrap_or("")
            ));
        }
        lines.push(String::new());
    }

    fn summary_lines(lines: &mut Vec<String>, rows: &[SegmentSummary], name: impl Fn(&SegmentSummary) -> Option<&str>, empty: &str) {
        if rows.is_empty() {
            lines.push(format!("  {}", empty));
            return;
        }
        for item in rows {
            let pacing = item.revenue_pacing.unwrap_or(Fraction(0.0));
            lines.push(format!(
                "  {} *{}*: {} of {} ({}) | {}/{} wins | {} gap",
                pacing_indicator(pacing),
                name(item).unwrap_or("N/A"),
                money(Some(num(item.actual_acv))),
                money(Some(num(item.target_acv))),
                pct(Some(pacing)),
                whole(item.actual_won),
                whole(item.target_won),
                money(Some(num(item.acv_gap)))
            ));
        }
    }

    /// The full-detail thread reply
    pub fn thread_message(&self) -> String {
        let detail = self.detail;
        let mut lines = Vec::new();

        Self::pocket_lines(
            &mut lines,
            "*📉 MTD Biggest Gaps* (ranked by $ impact)",
            &detail.top_variance_mtd,
            GAPS_CAP,
            |item| format!("{} gap (at {})", money(Some(num(item.acv_var).abs())), pct(Some(item.pacing()))),
        );
        Self::pocket_lines(
            &mut lines,
            "*📈 MTD Wins* (learn from success)",
            &detail.top_positive_mtd,
            WINS_CAP,
            |item| format!("+{} ({} to target)", money(Some(num(item.acv_var))), pct(Some(item.pacing()))),
        );
        Self::pocket_lines(
            &mut lines,
            "*🏆 MTD Top Performers* (celebrate)",
            &detail.top_booked_mtd,
            PERFORMERS_CAP,
            |item| format!("{} booked", money(Some(num(item.a_acv)))),
        );

        lines.push("*🎣 Inbound MQL WTD Status*".to_string());
        for (i, item) in detail.inbound_mql_wtd.iter().take(INBOUND_CAP).enumerate() {
            lines.push(format!(
                "  {}. {}|{}: {}/{} ({}) - {} gap",
                i + 1,
                item.r,
                item.seg,
                whole(item.a_mql),
                whole(item.t_mql),
                pct(Some(item.mql_attainment.unwrap_or(Fraction(0.0)))),
                whole(item.mql_gap)
            ));
        }
        lines.push(String::new());

        lines.push("*🌍 Region Summary - MTD*".to_string());
        Self::summary_lines(
            &mut lines,
            &self.report.region_summary_mtd,
            |item| item.region.as_deref(),
            "No region data available",
        );
        lines.push(String::new());

        lines.push("*🎯 Product Performance - MTD*".to_string());
        Self::summary_lines(
            &mut lines,
            &self.report.opportunity_type_summary_mtd,
            |item| item.opp_type.as_deref(),
            "No opportunity type data available",
        );
        lines.push(String::new());

        lines.push("*🎬 Actions Required - Next 48 Hours*".to_string());
        for (i, action) in self.specific_actions().iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, action));
        }
        lines.push(String::new());

        let alerts = &detail.alerts;
        lines.push("*📋 Alert Details*".to_string());
        lines.push(format!(
            "• Past due under pacing: {} deals totaling {}",
            whole(alerts.past_due_under_pacing_count),
            money(alerts.past_due_under_pacing_sum)
        ));
        lines.push(format!(
            "• Missed lead windows: {} opportunities ({} impact)",
            whole(alerts.missed_lead_window_count),
            money(alerts.missed_lead_window_sum)
        ));
        lines.push(format!(
            "• At-risk (next 14d): {} deals worth {}",
            whole(alerts.upcoming_won_risk_next_14_days_count),
            money(alerts.upcoming_won_risk_next_14_days_sum)
        ));
        lines.push(String::new());

        let anomalies = &detail.anomaly_counts;
        lines.push("*🔍 Data Quality Notes*".to_string());
        if anomalies.total() > 0.0 {
            lines.push(format!(
                "• Anomalies (MTD): SAL>SQL {}, SQO>SAL {}, WON>SQO {}",
                whole(anomalies.rows_sal_gt_sql),
                whole(anomalies.rows_sqo_gt_sal),
                whole(anomalies.rows_won_gt_sqo)
            ));
        } else {
            lines.push("• All clear - no data anomalies detected".to_string());
        }
        lines.push(format!(
            "• Actual ACV basis: {}",
            detail.actuals_date_basis.as_deref().unwrap_or("N/A")
        ));
        lines.push(format!(
            "• Generated: {}",
            detail.generated_at_utc.as_deref().unwrap_or("N/A")
        ));

        lines.join("\n")
    }

    /// Stage-tagged actions for the next 48 hours
    pub fn specific_actions(&self) -> Vec<String> {
        let detail = self.detail;
        let mtd = &self.mtd;
        let mut actions = Vec::new();

        if let Some(biggest) = detail.inbound_mql_wtd.first() {
            let gap = whole(biggest.mql_gap);
            if gap > 0 {
                actions.push(format!(
                    "*[MQL]* Marketing to launch targeted campaign for {}|{} (need {} MQLs) - target 50% gap closure by Friday",
                    biggest.r, biggest.seg, gap
                ));
            }
        }

        match nonzero(mtd.sql_to_sal).filter(|v| *v < -0.05) {
            Some(sql_to_sal) => actions.push(format!(
                "*[SQL]* Sales leadership to audit SQL qualification criteria - conversion rate down {} vs target",
                frac(sql_to_sal.abs())
            )),
            None => actions.push(
                "*[SQL]* Sales ops to review SQL pipeline velocity - ensure timely follow-up on qualified leads"
                    .to_string(),
            ),
        }

        if nonzero(mtd.sal_to_sqo).is_some_and(|v| v < 0.2) {
            actions.push(
                "*[SAL]* AE team to accelerate SAL→SQO progression with discovery call blitz this week".to_string(),
            );
        } else {
            actions.push(
                "*[SAL]* AE team to maintain SAL→SQO momentum - schedule technical demos for pending SALs".to_string(),
            );
        }

        match nonzero(mtd.sqo_to_won).filter(|v| *v < -0.1) {
            Some(sqo_to_won) => actions.push(format!(
                "*[SQO]* Sales ops to identify stuck SQO deals (review conversion funnel) - targeting {} improvement",
                frac(sqo_to_won.abs())
            )),
            None => actions.push(
                "*[SQO]* Sales leadership to review SQO pipeline health - identify deals needing executive engagement"
                    .to_string(),
            ),
        }

        if let Some(worst) = detail.top_variance_mtd.first() {
            let gap = num(worst.acv_var).abs();
            if gap > 0.0 {
                actions.push(format!(
                    "*[WON]* Account management to accelerate {} deals - {} at risk",
                    worst.pocket(),
                    money(Some(gap))
                ));
            }
        }

        let at_risk = num(detail.alerts.upcoming_won_risk_next_14_days_count);
        if at_risk > 10.0 {
            actions.push(format!(
                "*[RISK]* Sales leadership to review {} at-risk deals (worth {}) - weekly checkpoints required",
                at_risk as i64,
                money(Some(num(detail.alerts.upcoming_won_risk_next_14_days_sum)))
            ));
        }

        let sal_gt_sql = whole(detail.anomaly_counts.rows_sal_gt_sql);
        if sal_gt_sql > 50 {
            actions.push(format!(
                "*[PROCESS]* Data team to investigate {} rows where SAL>SQL - likely data entry issue",
                sal_gt_sql
            ));
        }

        if let Some(best) = detail.top_positive_mtd.first() {
            let overperformance = num(best.acv_var);
            if overperformance > 0.0 {
                actions.push(format!(
                    "*[OPPORTUNITY]* Replicate {}|{} success playbook to other regions - generated +{} this month",
                    best.r,
                    best.src,
                    money(Some(overperformance))
                ));
            }
        }

        actions.truncate(ACTIONS_CAP);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> DailyReportData {
        serde_json::from_value(json!({
            "as_of_date": "2026-02-10",
            "percentile": "P50",
            "week_starts_on": "Monday",
            "scorecard_all_sources": [
                {"horizon": "WTD", "Target_ACV": 200000, "Actual_ACV": 150000, "Target_Won": 10, "Actual_Won": 7,
                 "Revenue_Pacing_Score": 0.75, "Volume_Pacing_Score": 0.7, "Revenue_Trend": "improving"},
                {"horizon": "MTD", "Target_ACV": 1000000, "Actual_ACV": 600000, "Target_Won": 40, "Actual_Won": 25,
                 "Revenue_Pacing_Score": 0.6, "Prior_Revenue_Pacing": 0.5, "Revenue_Trend": "worsening",
                 "SQL_to_SAL": -0.12, "SAL_to_SQO": 0.15, "SQO_to_Won": -0.2,
                 "Worst_Slippage": {"stage": "SQO", "value": -42000}}
            ],
            "region_summary_mtd": [
                {"region": "AMER", "Actual_ACV": 400000, "Target_ACV": 500000, "Revenue_Pacing": 0.8,
                 "ACV_Gap": 100000, "Actual_Won": 12, "Target_Won": 15}
            ]
        }))
        .unwrap()
    }

    fn detail() -> DailyDetailData {
        serde_json::from_value(json!({
            "alerts": {
                "past_due_under_pacing_count": 4, "past_due_under_pacing_sum": 120000,
                "upcoming_won_risk_next_14_days_count": 12, "upcoming_won_risk_next_14_days_sum": 2500000,
                "missed_lead_window_count": 20, "missed_lead_window_sum": 5000
            },
            "top_variance_mtd": [
                {"r": "EMEA", "seg": "ENT", "src": "OUTBOUND", "acv_var": -80000, "a_acv": 20000, "t_acv": 100000, "ft": "Behind"}
            ],
            "top_positive_mtd": [
                {"r": "AMER", "seg": "SMB", "src": "INBOUND", "acv_var": 30000, "a_acv": 130000, "t_acv": 100000, "ft": "Ahead"}
            ],
            "inbound_mql_wtd": [
                {"r": "APAC", "seg": "MM", "a_mql": 40, "t_mql": 60, "mql_attainment": 0.6667, "mql_gap": 20}
            ],
            "anomaly_counts": {"rows_sal_gt_sql": 60, "rows_sqo_gt_sal": 0, "rows_won_gt_sqo": 1},
            "actuals_date_basis": "close_date",
            "generated_at_utc": "2026-02-10T08:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_main_message_sections() {
        let (report, detail) = (report(), detail());
        let message = DailyMessageBuilder::new(&report, &detail).main_message();

        assert!(message.starts_with("*Daily Revenue Performance Report*\n2026-02-10 | P50 targets | Week starts Monday"));
        assert!(message.contains("• MTD revenue at 60.0% - need $400K to hit target"));
        assert!(message.contains("• WTD deal volume lagging at 70.0% (need 3 more wins)"));
        assert!(message.contains("• Pacing up 10.0% vs last month"));
        assert!(message.contains("• WTD: $150K of $200K (75.0% ↑) | 7/10 wins"));
        assert!(message.contains("• MTD: $600K of $1.0M (60.0% ↓) | 25/40 wins"));
        assert!(message.contains("• SQO stage slipping $42K"));
        assert!(message.contains("• *4 past due deals* worth $120K need immediate attention"));
        assert!(message.contains("• *12 at-risk deals* (next 14d) totaling $2.5M"));
        assert!(!message.contains("missed lead windows"));
        assert!(message.contains("• SQL→SAL conversion down 12.0% - sales team may need more qualified leads"));
        assert!(message.ends_with("→ Thread below for detailed breakdowns and actions"));
    }

    #[test]
    fn test_quiet_day_keeps_alert_heading_with_placeholder() {
        let (report, detail) = (report(), DailyDetailData::default());
        let message = DailyMessageBuilder::new(&report, &detail).main_message();
        assert!(message.contains("*⚠️ Critical Alerts*\n• No critical alerts\n"));
        assert!(!message.contains("past due deals"));
    }

    #[test]
    fn test_key_insight_fallbacks() {
        let report = DailyReportData::default();
        let mut detail = detail();
        let builder = DailyMessageBuilder::new(&report, &detail);
        assert_eq!(
            builder.key_insight(),
            "AMER|INBOUND driving wins this month - replicate success in other regions"
        );

        detail.top_positive_mtd.clear();
        let builder = DailyMessageBuilder::new(&report, &detail);
        assert_eq!(
            builder.key_insight(),
            "MTD pacing at 0.0% requires focused execution to close gap"
        );
    }

    #[test]
    fn test_thread_message_sections() {
        let (report, detail) = (report(), detail());
        let thread = DailyMessageBuilder::new(&report, &detail).thread_message();

        assert!(thread.contains("  1. EMEA|ENT|OUTBOUND: $80K gap (at 20.0%) - Behind"));
        assert!(thread.contains("  1. AMER|SMB|INBOUND: +$30K (130.0% to target) - Ahead"));
        assert!(thread.contains("  1. APAC|MM: 40/60 (66.7%) - 20 gap"));
        assert!(thread.contains("  ⚠️ *AMER*: $400K of $500K (80.0%) | 12/15 wins | $100K gap"));
        assert!(thread.contains("  No opportunity type data available"));
        assert!(thread.contains("• Anomalies (MTD): SAL>SQL 60, SQO>SAL 0, WON>SQO 1"));
        assert!(thread.ends_with("• Generated: 2026-02-10T08:00:00Z"));
    }

    #[test]
    fn test_actions_are_capped_and_tagged() {
        let (report, detail) = (report(), detail());
        let actions = DailyMessageBuilder::new(&report, &detail).specific_actions();

        assert_eq!(actions.len(), ACTIONS_CAP);
        assert!(actions[0].starts_with("*[MQL]* Marketing to launch targeted campaign for APAC|MM (need 20 MQLs)"));
        assert!(actions[1].contains("conversion rate down 12.0% vs target"));
        assert!(actions[2].starts_with("*[SAL]* AE team to accelerate"));
        assert!(actions[3].contains("targeting 20.0% improvement"));
        assert_eq!(actions[4], "*[WON]* Account management to accelerate EMEA|ENT|OUTBOUND deals - $80K at risk");
        assert!(actions[5].starts_with("*[RISK]* Sales leadership to review 12 at-risk deals"));
        assert!(actions[6].starts_with("*[PROCESS]* Data team to investigate 60 rows"));
        assert!(actions[7].starts_with("*[OPPORTUNITY]* Replicate AMER|INBOUND success playbook"));
    }

    #[test]
    fn test_fit_to_limit_drops_whole_lines() {
        let message = "header\nline one\nline two";
        assert_eq!(fit_to_limit(message, 100), message);
        assert_eq!(fit_to_limit(message, 15), "header\nline one");
        assert_eq!(fit_to_limit(message, 3), "");
    }

    #[test]
    fn test_bundle_carries_payloads_and_sql() {
        let report = Fetched {
            document: report(),
            payload: json!({"as_of_date": "2026-02-10"}),
            sql: "SELECT 1".to_string(),
        };
        let detail = Fetched {
            document: detail(),
            payload: json!({"alerts": {}}),
            sql: "SELECT 2".to_string(),
        };
        let bundle = SlackBundle::build(&report, &detail, MAIN_MESSAGE_LIMIT).unwrap();
        assert!(bundle.main_message.chars().count() <= MAIN_MESSAGE_LIMIT);
        assert_eq!(bundle.report_payload_json, r#"{"as_of_date":"2026-02-10"}"#);
        assert_eq!(bundle.query_2_sql, "SELECT 2");
        assert!(bundle.errors.is_empty());

        let value = serde_json::to_value(&bundle).unwrap();
        assert!(value.get("thread_message").is_some());
        assert!(value.get("run_id").is_some());
    }

    #[test]
    fn test_bundle_is_identical_for_identical_inputs() {
        let fetch = |payload: serde_json::Value| Fetched {
            document: report(),
            payload,
            sql: "SELECT 1".to_string(),
        };
        let detail = Fetched {
            document: detail(),
            payload: json!({"alerts": {}}),
            sql: "SELECT 2".to_string(),
        };
        let report = fetch(json!({"as_of_date": "2026-02-10"}));

        let first = SlackBundle::build(&report, &detail, MAIN_MESSAGE_LIMIT).unwrap();
        let second = SlackBundle::build(&report, &detail, MAIN_MESSAGE_LIMIT).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let later = fetch(json!({"as_of_date": "2026-02-11"}));
        let third = SlackBundle::build(&later, &detail, MAIN_MESSAGE_LIMIT).unwrap();
        assert_ne!(first.run_id, third.run_id);
    }
}

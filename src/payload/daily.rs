use super::Payload;
use crate::types::{nullable, Fraction, Trend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Daily pacing scorecards (first query of the daily run)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyReportData {
    pub as_of_date: Option<String>,
    pub percentile: Option<String>,
    pub week_starts_on: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub scorecard_all_sources: Vec<Scorecard>,
    #[serde(deserialize_with = "nullable")]
    pub worst_revenue_pacing_by_horizon: BTreeMap<String, Vec<PocketGap>>,
    #[serde(deserialize_with = "nullable")]
    pub region_summary_mtd: Vec<SegmentSummary>,
    #[serde(deserialize_with = "nullable")]
    pub opportunity_type_summary_mtd: Vec<SegmentSummary>,
}

/// Pacing for one horizon (`WTD`, `MTD`, ...). Pacing values are fractions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scorecard {
    #[serde(deserialize_with = "nullable")]
    pub horizon: String,
    #[serde(rename = "Target_ACV")]
    pub target_acv: Option<f64>,
    #[serde(rename = "Actual_ACV")]
    pub actual_acv: Option<f64>,
    #[serde(rename = "Target_Won")]
    pub target_won: Option<f64>,
    #[serde(rename = "Actual_Won")]
    pub actual_won: Option<f64>,
    #[serde(rename = "Revenue_Trend")]
    pub revenue_trend: Option<Trend>,
    #[serde(rename = "Revenue_Pacing_Score")]
    pub revenue_pacing: Option<Fraction>,
    #[serde(rename = "Volume_Pacing_Score")]
    pub volume_pacing: Option<Fraction>,
    #[serde(rename = "Prior_Revenue_Pacing")]
    pub prior_revenue_pacing: Option<Fraction>,
    #[serde(rename = "SQL_to_SAL")]
    pub sql_to_sal: Option<Fraction>,
    #[serde(rename = "SAL_to_SQO")]
    pub sal_to_sqo: Option<Fraction>,
    #[serde(rename = "SQO_to_Won")]
    pub sqo_to_won: Option<Fraction>,
    #[serde(rename = "Worst_Slippage")]
    pub worst_slippage: Option<Slippage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Slippage {
    pub stage: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketGap {
    #[serde(deserialize_with = "nullable")]
    pub r: String,
    #[serde(rename = "ACV_Gap")]
    pub acv_gap: Option<f64>,
}

/// MTD rollup for one region or opportunity type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentSummary {
    pub region: Option<String>,
    pub opp_type: Option<String>,
    #[serde(rename = "Actual_ACV")]
    pub actual_acv: Option<f64>,
    #[serde(rename = "Target_ACV")]
    pub target_acv: Option<f64>,
    #[serde(rename = "Revenue_Pacing")]
    pub revenue_pacing: Option<Fraction>,
    #[serde(rename = "ACV_Gap")]
    pub acv_gap: Option<f64>,
    #[serde(rename = "Actual_Won")]
    pub actual_won: Option<f64>,
    #[serde(rename = "Target_Won")]
    pub target_won: Option<f64>,
}

impl DailyReportData {
    /// Scorecard for a horizon; an absent horizon reads as all zeros
    pub fn scorecard(&self, horizon: &str) -> Scorecard {
        self.scorecard_all_sources
            .iter()
            .find(|s| s.horizon.eq_ignore_ascii_case(horizon))
            .cloned()
            .unwrap_or_else(|| {
                debug!("No {} scorecard in daily payload", horizon);
                Scorecard {
                    horizon: horizon.to_string(),
                    ..Scorecard::default()
                }
            })
    }
}

impl Payload for DailyReportData {
    const NAME: &'static str = "daily report";

    fn check(&self) {
        if self.scorecard_all_sources.is_empty() {
            debug!("scorecard_all_sources missing; pacing lines will render as zero");
        }
    }
}

/// Alerts and ranked pockets (second query of the daily run)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyDetailData {
    #[serde(deserialize_with = "nullable")]
    pub alerts: Alerts,
    #[serde(deserialize_with = "nullable")]
    pub top_variance_mtd: Vec<PocketVariance>,
    #[serde(deserialize_with = "nullable")]
    pub top_positive_mtd: Vec<PocketVariance>,
    #[serde(deserialize_with = "nullable")]
    pub top_booked_mtd: Vec<PocketVariance>,
    #[serde(deserialize_with = "nullable")]
    pub inbound_mql_wtd: Vec<InboundMql>,
    #[serde(deserialize_with = "nullable")]
    pub anomaly_counts: AnomalyCounts,
    pub actuals_date_basis: Option<String>,
    pub generated_at_utc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub past_due_under_pacing_count: Option<f64>,
    pub past_due_under_pacing_sum: Option<f64>,
    pub upcoming_won_risk_next_14_days_count: Option<f64>,
    pub upcoming_won_risk_next_14_days_sum: Option<f64>,
    pub missed_lead_window_count: Option<f64>,
    pub missed_lead_window_sum: Option<f64>,
}

/// A `region|segment|source` pocket with its MTD variance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketVariance {
    #[serde(deserialize_with = "nullable")]
    pub r: String,
    #[serde(deserialize_with = "nullable")]
    pub seg: String,
    #[serde(deserialize_with = "nullable")]
    pub src: String,
    pub acv_var: Option<f64>,
    pub a_acv: Option<f64>,
    pub t_acv: Option<f64>,
    pub ft: Option<String>,
}

impl PocketVariance {
    pub fn pocket(&self) -> String {
        format!("{}|{}|{}", self.r, self.seg, self.src)
    }

    /// Actual over target, zero when there is no target
    pub fn pacing(&self) -> Fraction {
        let target = self.t_acv.unwrap_or(0.0);
        if target > 0.0 {
            Fraction(self.a_acv.unwrap_or(0.0) / target)
        } else {
            Fraction(0.0)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundMql {
    #[serde(deserialize_with = "nullable")]
    pub r: String,
    #[serde(deserialize_with = "nullable")]
    pub seg: String,
    pub a_mql: Option<f64>,
    pub t_mql: Option<f64>,
    pub mql_attainment: Option<Fraction>,
    pub mql_gap: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyCounts {
    pub rows_sal_gt_sql: Option<f64>,
    pub rows_sqo_gt_sal: Option<f64>,
    pub rows_won_gt_sqo: Option<f64>,
}

impl AnomalyCounts {
    pub fn total(&self) -> f64 {
        self.rows_sal_gt_sql.unwrap_or(0.0)
            + self.rows_sqo_gt_sal.unwrap_or(0.0)
            + self.rows_won_gt_sqo.unwrap_or(0.0)
    }
}

impl Payload for DailyDetailData {
    const NAME: &'static str = "daily detail";

    fn check(&self) {
        let total = self.anomaly_counts.total();
        if total > 0.0 {
            warn!("Upstream flagged {} funnel ordering anomalies", total);
        }
    }
}

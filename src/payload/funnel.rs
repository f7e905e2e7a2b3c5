use super::risk::AdsMetrics;
use super::Payload;
use crate::types::{nullable, Fraction, Percent, Trend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Month-to-date top-of-funnel pacing document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TofDocument {
    #[serde(deserialize_with = "nullable")]
    pub generated_at: String,
    #[serde(deserialize_with = "nullable")]
    pub period: TofPeriod,
    #[serde(deserialize_with = "nullable")]
    pub google_ads: BTreeMap<String, AdsMetrics>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_metrics: BTreeMap<String, ProductFunnel>,
    #[serde(deserialize_with = "nullable")]
    pub attribution: BTreeMap<String, Attribution>,
    #[serde(deserialize_with = "nullable")]
    pub insights: Insights,
    #[serde(deserialize_with = "nullable")]
    pub benchmarks: Benchmarks,
    #[serde(deserialize_with = "nullable")]
    pub full_funnel: BTreeMap<String, FullFunnel>,
    #[serde(deserialize_with = "nullable")]
    pub forecasting: BTreeMap<String, Vec<Forecast>>,
    #[serde(deserialize_with = "nullable")]
    pub trends: BTreeMap<String, Vec<StageTrends>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TofPeriod {
    #[serde(deserialize_with = "nullable")]
    pub start: String,
    #[serde(deserialize_with = "nullable")]
    pub end: String,
    pub days_elapsed: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFunnel {
    pub summary: Option<FunnelTotals>,
    #[serde(deserialize_with = "nullable")]
    pub by_region: Vec<FunnelTotals>,
}

/// Actuals, targets, pacing and conversion rates for a product or region.
/// Pacing and rate values are percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelTotals {
    pub region: Option<String>,
    pub actual_mql: Option<f64>,
    pub target_mql: Option<f64>,
    pub mql_pacing_pct: Option<Percent>,
    pub actual_sql: Option<f64>,
    pub target_sql: Option<f64>,
    pub sql_pacing_pct: Option<Percent>,
    pub actual_sal: Option<f64>,
    pub target_sal: Option<f64>,
    pub sal_pacing_pct: Option<Percent>,
    pub actual_sqo: Option<f64>,
    pub target_sqo: Option<f64>,
    pub sqo_pacing_pct: Option<Percent>,
    pub actual_won: Option<f64>,
    pub target_won: Option<f64>,
    pub won_pacing_pct: Option<Percent>,
    pub actual_acv: Option<f64>,
    pub target_acv: Option<f64>,
    pub acv_pacing_pct: Option<Percent>,
    pub mql_to_sql_rate: Option<Percent>,
    pub sql_to_sal_rate: Option<Percent>,
    pub sal_to_sqo_rate: Option<Percent>,
    pub sqo_to_won_rate: Option<Percent>,
    pub mql_to_won_rate: Option<Percent>,
    pub mql_to_sql_below_benchmark: Option<bool>,
    pub sql_to_sal_below_benchmark: Option<bool>,
    pub sal_to_sqo_below_benchmark: Option<bool>,
    pub sqo_to_won_below_benchmark: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribution {
    pub cost_per_mql: Option<f64>,
    pub cost_per_sql: Option<f64>,
    pub cost_per_won: Option<f64>,
    pub marketing_roi: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    #[serde(deserialize_with = "nullable")]
    pub alerts: TofAlerts,
    #[serde(deserialize_with = "nullable")]
    pub recommendations: Vec<Option<String>>,
}

impl Insights {
    /// Recommendations with the blank and null entries dropped
    pub fn recommendations(&self) -> impl Iterator<Item = &str> {
        self.recommendations
            .iter()
            .filter_map(|r| r.as_deref())
            .filter(|r| !r.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TofAlerts {
    #[serde(deserialize_with = "nullable")]
    pub critical_mql_zero: Vec<RegionAlert>,
    #[serde(deserialize_with = "nullable")]
    pub critical_won_zero: Vec<RegionAlert>,
    #[serde(deserialize_with = "nullable")]
    pub warning_mql_low: Vec<RegionAlert>,
    #[serde(deserialize_with = "nullable")]
    pub warning_won_low: Vec<RegionAlert>,
    #[serde(deserialize_with = "nullable")]
    pub warning_cpa_high: Vec<CpaAlert>,
    #[serde(deserialize_with = "nullable")]
    pub wins_mql_exceeding: Vec<RegionAlert>,
    #[serde(deserialize_with = "nullable")]
    pub wins_sql_exceeding: Vec<RegionAlert>,
}

impl TofAlerts {
    pub fn critical_count(&self) -> usize {
        self.critical_mql_zero.len() + self.critical_won_zero.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warning_mql_low.len() + self.warning_won_low.len() + self.warning_cpa_high.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionAlert {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub pacing: Option<Percent>,
    pub gap: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpaAlert {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    pub cpa_usd: Option<f64>,
}

/// Benchmark conversion rates, expressed as fractions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Benchmarks {
    pub mql_to_sql: Option<Fraction>,
    pub sql_to_sal: Option<Fraction>,
    pub sal_to_sqo: Option<Fraction>,
    pub sqo_to_won: Option<Fraction>,
}

/// Impressions through ACV for one product
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FullFunnel {
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub conversions: Option<f64>,
    pub impressions_to_clicks_rate: Option<f64>,
    pub clicks_to_conversions_rate: Option<f64>,
    pub conversions_to_mql_rate: Option<f64>,
    pub actual_mql: Option<f64>,
    pub actual_sql: Option<f64>,
    pub actual_sal: Option<f64>,
    pub actual_sqo: Option<f64>,
    pub actual_won: Option<f64>,
    pub actual_acv: Option<f64>,
    pub mql_to_sql_rate: Option<f64>,
    pub sql_to_sal_rate: Option<f64>,
    pub sal_to_sqo_rate: Option<f64>,
    pub sqo_to_won_rate: Option<f64>,
    pub funnel_efficiency: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Forecast {
    pub product: Option<String>,
    pub region: Option<String>,
    pub projected_mql: Option<f64>,
    pub projected_sql: Option<f64>,
    pub projected_sqo: Option<f64>,
    pub projected_won: Option<f64>,
    pub projected_acv: Option<f64>,
}

/// Month-over-month movement per stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTrends {
    pub product: Option<String>,
    pub region: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub mql_trend: Trend,
    #[serde(deserialize_with = "nullable")]
    pub sql_trend: Trend,
    #[serde(deserialize_with = "nullable")]
    pub sqo_trend: Trend,
    #[serde(deserialize_with = "nullable")]
    pub won_trend: Trend,
    pub mql_change_pct: Option<f64>,
    pub sql_change_pct: Option<f64>,
    pub sqo_change_pct: Option<f64>,
    pub won_change_pct: Option<f64>,
}

impl Payload for TofDocument {
    const NAME: &'static str = "top of funnel";

    fn check(&self) {
        if self.funnel_metrics.is_empty() {
            debug!("funnel_metrics missing; pacing sections will be empty");
        }
    }
}

use super::Payload;
use crate::types::{nullable, Fraction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-product risk document tracked over four time horizons
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonRiskDocument {
    pub generated_at_utc: Option<String>,
    pub as_of_date: Option<String>,
    pub actuals_source: Option<String>,
    pub actuals_date_basis: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub date_windows: DateWindows,
    #[serde(deserialize_with = "nullable")]
    pub top_risks_by_region: BTreeMap<String, Vec<HorizonRisk>>,
    pub global_target_summary: Option<GlobalTargetSummary>,
    #[serde(deserialize_with = "nullable")]
    pub expansion_rollup_status: Vec<ExpansionStatus>,
}

impl HorizonRiskDocument {
    pub fn actuals_source(&self) -> &str {
        self.actuals_source
            .as_deref()
            .or(self.actuals_date_basis.as_deref())
            .unwrap_or("N/A")
    }

    pub fn risks(&self, region: &str) -> &[HorizonRisk] {
        self.top_risks_by_region
            .get(region)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateWindows {
    pub as_of_date: Option<String>,
    pub mtd_start: Option<String>,
    pub qtd_start: Option<String>,
    pub rolling_7d_start: Option<String>,
    pub rolling_30d_start: Option<String>,
}

/// A funnel pocket with an annual ACV gap
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonRisk {
    pub funnel_type: Option<String>,
    pub source: Option<String>,
    pub segment: Option<String>,
    pub annual_acv_gap: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub mtd: HorizonMetrics,
    #[serde(deserialize_with = "nullable")]
    pub qtd: HorizonMetrics,
    #[serde(deserialize_with = "nullable")]
    pub rolling_7d: HorizonMetrics,
    #[serde(deserialize_with = "nullable")]
    pub rolling_30d: HorizonMetrics,
    #[serde(deserialize_with = "nullable")]
    pub trends: HorizonTrends,
}

/// Actual vs target for one window; attainment values are fractions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonMetrics {
    pub actual_mql: Option<f64>,
    pub target_mql: Option<f64>,
    pub mql_attainment: Option<Fraction>,
    pub actual_sql: Option<f64>,
    pub target_sql: Option<f64>,
    pub sql_attainment: Option<Fraction>,
    pub actual_sqo: Option<f64>,
    pub target_sqo: Option<f64>,
    pub sqo_attainment: Option<Fraction>,
    pub actual_won: Option<f64>,
    pub target_won: Option<f64>,
    pub won_attainment: Option<Fraction>,
    pub actual_acv: Option<f64>,
    pub target_acv: Option<f64>,
    pub acv_attainment: Option<Fraction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonTrends {
    pub mql_trend: Option<String>,
    pub won_trend: Option<String>,
    pub acv_trend: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalTargetSummary {
    pub expected_annual_target: Option<f64>,
    pub sop_annual_target: Option<f64>,
    pub annual_target_variance: Option<f64>,
    pub annual_validation_status: Option<String>,
    pub expected_q1_target: Option<f64>,
    pub sop_q1_target: Option<f64>,
    pub q1_target_variance: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub source_validation: Vec<SourceValidation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceValidation {
    pub source: Option<String>,
    pub expected_annual_acv: Option<f64>,
    pub sop_annual_acv: Option<f64>,
    pub annual_variance: Option<f64>,
    pub validation_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionStatus {
    pub region: Option<String>,
    pub expansion_target_acv: Option<f64>,
    pub expansion_actual_acv: Option<f64>,
    pub expansion_attainment: Option<Fraction>,
    pub expansion_at_target: Option<bool>,
    pub filter_status: Option<String>,
}

impl Payload for HorizonRiskDocument {
    const NAME: &'static str = "horizon risk analysis";

    fn check(&self) {
        if self.top_risks_by_region.is_empty() {
            debug!("top_risks_by_region missing; every region will report no risks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actuals_source_falls_back_to_date_basis() {
        let doc: HorizonRiskDocument =
            serde_json::from_value(json!({"actuals_date_basis": "close_date"})).unwrap();
        assert_eq!(doc.actuals_source(), "close_date");
        assert!(doc.risks("AMER").is_empty());
        assert!(doc.global_target_summary.is_none());
    }

    #[test]
    fn test_risk_windows_decode() {
        let doc: HorizonRiskDocument = serde_json::from_value(json!({
            "top_risks_by_region": {
                "EMEA": [{
                    "funnel_type": "NEW LOGO", "source": "INBOUND", "segment": "SMB",
                    "annual_acv_gap": -250000,
                    "mtd": {"actual_mql": 40, "target_mql": 50, "mql_attainment": 0.8},
                    "rolling_7d": null
                }]
            }
        }))
        .unwrap();

        let risk = &doc.risks("EMEA")[0];
        assert_eq!(risk.mtd.mql_attainment, Some(Fraction(0.8)));
        assert!(risk.rolling_7d.actual_mql.is_none());
        assert!(risk.trends.mql_trend.is_none());
    }
}

use super::{num, Payload};
use crate::types::{nullable, Percent, PipelineHealth, RagStatus, Severity, Stage, Trend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub type ByProduct<T> = BTreeMap<String, Vec<T>>;

/// Consolidated quarterly risk document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskReportDocument {
    pub report_date: Option<String>,
    pub generated_at_utc: Option<String>,
    pub query_version: Option<String>,
    pub percentile: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub period: Period,
    #[serde(deserialize_with = "nullable")]
    pub grand_total: Totals,
    #[serde(deserialize_with = "nullable")]
    pub executive_counts: ExecutiveCounts,
    #[serde(deserialize_with = "nullable")]
    pub product_totals: BTreeMap<String, Totals>,
    #[serde(deserialize_with = "nullable")]
    pub attainment_detail: ByProduct<AttainmentRow>,
    #[serde(deserialize_with = "nullable")]
    pub top_risk_pockets: Vec<AttainmentRow>,
    #[serde(deserialize_with = "nullable")]
    pub wins_bright_spots: ByProduct<WinRow>,
    #[serde(deserialize_with = "nullable")]
    pub momentum_indicators: ByProduct<MomentumRow>,
    #[serde(deserialize_with = "nullable")]
    pub source_attainment: ByProduct<SourceAttainmentRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_pacing: ByProduct<FunnelPacingRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_health: ByProduct<FunnelHealthRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_by_category: ByProduct<FunnelStageRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_by_source: ByProduct<FunnelStageRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_trends: ByProduct<FunnelTrendRow>,
    #[serde(deserialize_with = "nullable")]
    pub funnel_rca_insights: ByProduct<FunnelRcaInsight>,
    #[serde(deserialize_with = "nullable")]
    pub loss_reasons: ByProduct<LossReasonRow>,
    #[serde(deserialize_with = "nullable")]
    pub loss_reason_rca: ByProduct<LossReasonRow>,
    #[serde(deserialize_with = "nullable")]
    pub pipeline_rca: ByProduct<PipelineRow>,
    #[serde(deserialize_with = "nullable")]
    pub trend_rca: ByProduct<TrendRcaRow>,
    #[serde(deserialize_with = "nullable")]
    pub google_ads: BTreeMap<String, AdsMetrics>,
    #[serde(deserialize_with = "nullable")]
    pub google_ads_rca: BTreeMap<String, AdsRca>,
    #[serde(deserialize_with = "nullable")]
    pub action_items: ActionItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Period {
    pub as_of_date: Option<String>,
    pub quarter_start: Option<String>,
    pub quarter_end: Option<String>,
    pub days_elapsed: Option<i64>,
    pub total_days: Option<i64>,
    pub quarter_pct_complete: Option<Percent>,
}

impl Period {
    pub const DEFAULT_TOTAL_DAYS: i64 = 90;

    pub fn days_elapsed(&self) -> i64 {
        self.days_elapsed.unwrap_or(0)
    }

    pub fn total_days(&self) -> i64 {
        self.total_days.unwrap_or(Self::DEFAULT_TOTAL_DAYS)
    }

    pub fn as_of(&self) -> &str {
        self.as_of_date.as_deref().unwrap_or("N/A")
    }
}

/// Aggregate metrics for the whole business or one product
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Totals {
    pub total_q1_target: Option<f64>,
    pub total_qtd_target: Option<f64>,
    pub total_qtd_acv: Option<f64>,
    pub total_qtd_gap: Option<f64>,
    pub total_qtd_attainment_pct: Option<Percent>,
    pub total_q1_progress_pct: Option<Percent>,
    pub total_pipeline_acv: Option<f64>,
    pub total_pipeline_coverage_x: Option<f64>,
    pub total_win_rate_pct: Option<Percent>,
    pub total_qtd_deals: Option<f64>,
    pub total_lost_deals: Option<f64>,
    pub total_lost_acv: Option<f64>,
}

impl Totals {
    pub fn attainment(&self) -> Option<Percent> {
        self.total_qtd_attainment_pct
            .or_else(|| Percent::from_ratio(num(self.total_qtd_acv), num(self.total_qtd_target)))
    }

    pub fn gap(&self) -> f64 {
        self.total_qtd_gap
            .unwrap_or_else(|| num(self.total_qtd_acv) - num(self.total_qtd_target))
    }
}

/// Upstream tallies for the executive stat tiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutiveCounts {
    pub areas_exceeding_target: Option<i64>,
    pub areas_at_risk: Option<i64>,
    pub areas_needing_attention: Option<i64>,
    pub areas_with_momentum: Option<i64>,
}

/// One `(region, category)` attainment row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttainmentRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub category: String,
    pub q1_target: Option<f64>,
    pub qtd_target: Option<f64>,
    pub qtd_acv: Option<f64>,
    pub qtd_gap: Option<f64>,
    pub qtd_attainment_pct: Option<Percent>,
    pub pipeline_acv: Option<f64>,
    pub pipeline_coverage_x: Option<f64>,
    pub pipeline_opps: Option<f64>,
    pub pipeline_avg_age_days: Option<f64>,
    pub win_rate_pct: Option<Percent>,
    pub qtd_lost_deals: Option<f64>,
    pub qtd_lost_acv: Option<f64>,
    pub rag_status: Option<RagStatus>,
}

impl AttainmentRow {
    /// Upstream attainment, or `100 * acv / target` when only the raw values exist
    pub fn attainment(&self) -> Option<Percent> {
        self.qtd_attainment_pct
            .or_else(|| Percent::from_ratio(num(self.qtd_acv), num(self.qtd_target)))
    }

    pub fn gap(&self) -> f64 {
        self.qtd_gap
            .unwrap_or_else(|| num(self.qtd_acv) - num(self.qtd_target))
    }

    /// Upstream tag when present, otherwise derived from attainment
    pub fn rag(&self) -> RagStatus {
        self.rag_status
            .unwrap_or_else(|| RagStatus::classify(self.attainment()))
    }

    pub fn is_hit(&self) -> bool {
        self.rag() == RagStatus::Green
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceAttainmentRow {
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub source: String,
    pub q1_target: Option<f64>,
    pub qtd_target: Option<f64>,
    pub qtd_acv: Option<f64>,
    pub attainment_pct: Option<Percent>,
    pub gap: Option<f64>,
    pub rag_status: Option<RagStatus>,
}

impl SourceAttainmentRow {
    pub fn attainment(&self) -> Option<Percent> {
        self.attainment_pct
            .or_else(|| Percent::from_ratio(num(self.qtd_acv), num(self.qtd_target)))
    }

    pub fn rag(&self) -> RagStatus {
        self.rag_status
            .unwrap_or_else(|| RagStatus::classify(self.attainment()))
    }
}

/// Counts for one funnel stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageMetrics {
    pub q1_target: f64,
    pub qtd_target: f64,
    pub actual: f64,
    pub pacing: Option<Percent>,
    pub gap: f64,
}

/// Per-stage columns shared by the funnel sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageColumns {
    pub q1_target_mql: Option<f64>,
    pub q1_target_sql: Option<f64>,
    pub q1_target_sal: Option<f64>,
    pub q1_target_sqo: Option<f64>,
    pub qtd_target_mql: Option<f64>,
    pub qtd_target_sql: Option<f64>,
    pub qtd_target_sal: Option<f64>,
    pub qtd_target_sqo: Option<f64>,
    pub actual_mql: Option<f64>,
    pub actual_sql: Option<f64>,
    pub actual_sal: Option<f64>,
    pub actual_sqo: Option<f64>,
    pub mql_pacing_pct: Option<Percent>,
    pub sql_pacing_pct: Option<Percent>,
    pub sal_pacing_pct: Option<Percent>,
    pub sqo_pacing_pct: Option<Percent>,
    pub mql_gap: Option<f64>,
    pub sql_gap: Option<f64>,
    pub sal_gap: Option<f64>,
    pub sqo_gap: Option<f64>,
}

impl StageColumns {
    pub fn get(&self, stage: Stage) -> StageMetrics {
        let (q1_target, qtd_target, actual, pacing, gap) = match stage {
            Stage::Mql => (
                self.q1_target_mql,
                self.qtd_target_mql,
                self.actual_mql,
                self.mql_pacing_pct,
                self.mql_gap,
            ),
            Stage::Sql => (
                self.q1_target_sql,
                self.qtd_target_sql,
                self.actual_sql,
                self.sql_pacing_pct,
                self.sql_gap,
            ),
            Stage::Sal => (
                self.q1_target_sal,
                self.qtd_target_sal,
                self.actual_sal,
                self.sal_pacing_pct,
                self.sal_gap,
            ),
            Stage::Sqo => (
                self.q1_target_sqo,
                self.qtd_target_sqo,
                self.actual_sqo,
                self.sqo_pacing_pct,
                self.sqo_gap,
            ),
        };
        StageMetrics {
            q1_target: num(q1_target),
            qtd_target: num(qtd_target),
            actual: num(actual),
            pacing,
            gap: num(gap),
        }
    }

    /// Stage pairs where the later stage outnumbers the earlier one
    pub fn anomalies(&self) -> Vec<(Stage, Stage)> {
        Stage::ALL
            .windows(2)
            .filter(|pair| self.get(pair[1]).actual > self.get(pair[0]).actual)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }
}

/// Full-funnel row keyed by category (and source, for the source breakdown)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelStageRow {
    #[serde(deserialize_with = "nullable")]
    pub category: String,
    #[serde(deserialize_with = "nullable")]
    pub source: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub weighted_tof_score: Option<Percent>,
    #[serde(flatten)]
    pub stages: StageColumns,
}

/// Inbound pacing row with upstream per-stage RAG tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelPacingRow {
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub actual_mql: Option<f64>,
    pub actual_sql: Option<f64>,
    pub actual_sal: Option<f64>,
    pub actual_sqo: Option<f64>,
    pub target_mql: Option<f64>,
    pub target_sql: Option<f64>,
    pub target_sal: Option<f64>,
    pub target_sqo: Option<f64>,
    pub mql_pacing_pct: Option<Percent>,
    pub sql_pacing_pct: Option<Percent>,
    pub sal_pacing_pct: Option<Percent>,
    pub sqo_pacing_pct: Option<Percent>,
    pub mql_rag: Option<RagStatus>,
    pub sql_rag: Option<RagStatus>,
    pub sal_rag: Option<RagStatus>,
    pub sqo_rag: Option<RagStatus>,
}

impl FunnelPacingRow {
    /// `(actual, target, pacing, rag)` for one stage
    pub fn stage(&self, stage: Stage) -> (f64, f64, Option<Percent>, RagStatus) {
        let (actual, target, pacing, rag) = match stage {
            Stage::Mql => (self.actual_mql, self.target_mql, self.mql_pacing_pct, self.mql_rag),
            Stage::Sql => (self.actual_sql, self.target_sql, self.sql_pacing_pct, self.sql_rag),
            Stage::Sal => (self.actual_sal, self.target_sal, self.sal_pacing_pct, self.sal_rag),
            Stage::Sqo => (self.actual_sqo, self.target_sqo, self.sqo_pacing_pct, self.sqo_rag),
        };
        (
            num(actual),
            num(target),
            pacing,
            rag.unwrap_or_else(|| RagStatus::classify(pacing)),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelHealthRow {
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub primary_bottleneck: Option<String>,
    pub actual_mql_to_sql_rate: Option<Percent>,
    pub target_mql_to_sql_rate: Option<Percent>,
    pub actual_sql_to_sal_rate: Option<Percent>,
    pub target_sql_to_sal_rate: Option<Percent>,
    pub actual_sal_to_sqo_rate: Option<Percent>,
    pub target_sal_to_sqo_rate: Option<Percent>,
    #[serde(flatten)]
    pub stages: StageColumns,
}

impl FunnelHealthRow {
    /// `(label, actual, target)` conversion rates in stage order
    pub fn conversions(&self) -> [(&'static str, Option<Percent>, Option<Percent>); 3] {
        [
            ("MQL→SQL", self.actual_mql_to_sql_rate, self.target_mql_to_sql_rate),
            ("SQL→SAL", self.actual_sql_to_sal_rate, self.target_sql_to_sal_rate),
            ("SAL→SQO", self.actual_sal_to_sqo_rate, self.target_sal_to_sqo_rate),
        ]
    }
}

/// An area pacing at or above target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WinRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub category: String,
    pub qtd_attainment_pct: Option<Percent>,
    pub qtd_acv: Option<f64>,
    pub qtd_target: Option<f64>,
    pub win_rate_pct: Option<Percent>,
    pub pipeline_coverage_x: Option<f64>,
    pub contributing_factor: Option<String>,
    pub performance_tier: Option<String>,
    pub success_commentary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub momentum_tier: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub mql_trend: Trend,
    #[serde(deserialize_with = "nullable")]
    pub sql_trend: Trend,
    pub mql_wow_pct: Option<f64>,
    pub sql_wow_pct: Option<f64>,
    pub momentum_commentary: Option<String>,
}

impl MomentumRow {
    pub const STRONG: &'static str = "STRONG_MOMENTUM";
    pub const MODERATE: &'static str = "MODERATE_MOMENTUM";

    /// Only strong and moderate tiers are reported
    pub fn is_reportable(&self) -> bool {
        matches!(self.momentum_tier.as_deref(), Some(Self::STRONG | Self::MODERATE))
    }

    /// `STRONG_MOMENTUM` reads as `Strong Momentum`
    pub fn tier_label(&self) -> String {
        self.momentum_tier
            .as_deref()
            .unwrap_or_default()
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let lower = word.to_ascii_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Current versus prior seven-day stage counts for one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelTrendRow {
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub mql_current_7d: Option<f64>,
    pub mql_prior_7d: Option<f64>,
    pub mql_wow_change: Option<f64>,
    pub mql_wow_pct: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub mql_trend: Trend,
    pub sql_current_7d: Option<f64>,
    pub sql_prior_7d: Option<f64>,
    pub sql_wow_change: Option<f64>,
    pub sql_wow_pct: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub sql_trend: Trend,
    pub sal_current_7d: Option<f64>,
    pub sal_prior_7d: Option<f64>,
    pub sal_wow_change: Option<f64>,
    pub sal_wow_pct: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub sal_trend: Trend,
    pub sqo_current_7d: Option<f64>,
    pub sqo_prior_7d: Option<f64>,
    pub sqo_wow_change: Option<f64>,
    pub sqo_wow_pct: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub sqo_trend: Trend,
}

/// Week-over-week counts for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTrend {
    pub current: f64,
    pub prior: f64,
    pub change: f64,
    pub pct: f64,
    pub trend: Trend,
}

impl FunnelTrendRow {
    pub fn get(&self, stage: Stage) -> StageTrend {
        let (current, prior, change, pct, trend) = match stage {
            Stage::Mql => (
                self.mql_current_7d,
                self.mql_prior_7d,
                self.mql_wow_change,
                self.mql_wow_pct,
                self.mql_trend,
            ),
            Stage::Sql => (
                self.sql_current_7d,
                self.sql_prior_7d,
                self.sql_wow_change,
                self.sql_wow_pct,
                self.sql_trend,
            ),
            Stage::Sal => (
                self.sal_current_7d,
                self.sal_prior_7d,
                self.sal_wow_change,
                self.sal_wow_pct,
                self.sal_trend,
            ),
            Stage::Sqo => (
                self.sqo_current_7d,
                self.sqo_prior_7d,
                self.sqo_wow_change,
                self.sqo_wow_pct,
                self.sqo_trend,
            ),
        };
        StageTrend {
            current: num(current),
            prior: num(prior),
            change: num(change),
            pct: num(pct),
            trend,
        }
    }
}

/// A region whose funnel stages are declining week over week
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendRcaRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub declining_stage_count: Option<i64>,
    pub mql_wow_pct: Option<f64>,
    pub sql_wow_pct: Option<f64>,
    pub severity: Option<Severity>,
    pub rca_commentary: Option<String>,
    pub recommended_action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelRcaInsight {
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub primary_bottleneck: Option<String>,
    pub severity: Option<Severity>,
    pub rca_commentary: Option<String>,
    pub recommended_action: Option<String>,
    #[serde(flatten)]
    pub stages: StageColumns,
}

/// Lost deals grouped by reason for one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LossReasonRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    pub loss_reason: Option<String>,
    pub deal_count: Option<f64>,
    pub lost_acv: Option<f64>,
    pub severity: Option<Severity>,
    pub rca_commentary: Option<String>,
    pub recommended_action: Option<String>,
    pub action_category: Option<String>,
    pub pct_of_regional_loss: Option<Percent>,
}

impl LossReasonRow {
    pub fn reason(&self) -> &str {
        self.loss_reason.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRow {
    #[serde(deserialize_with = "nullable")]
    pub product: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub category: String,
    pub pipeline_acv: Option<f64>,
    pub pipeline_coverage_x: Option<f64>,
    pub pipeline_avg_age_days: Option<f64>,
    pub pipeline_health: Option<PipelineHealth>,
    pub severity: Option<Severity>,
    pub rca_commentary: Option<String>,
    pub recommended_action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsMetrics {
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub ctr_pct: Option<Percent>,
    pub ad_spend_usd: Option<f64>,
    pub cpc_usd: Option<f64>,
    pub conversions: Option<f64>,
    pub cpa_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsRca {
    pub ctr_pct: Option<Percent>,
    pub cpc_usd: Option<f64>,
    pub cpa_usd: Option<f64>,
    pub ctr_performance: Option<String>,
    pub cpa_performance: Option<String>,
    pub rca_commentary: Option<String>,
    pub recommended_action: Option<String>,
}

impl AdsRca {
    pub fn is_empty(&self) -> bool {
        self.ctr_pct.is_none()
            && self.cpa_usd.is_none()
            && self.rca_commentary.is_none()
            && self.recommended_action.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItems {
    #[serde(deserialize_with = "nullable")]
    pub immediate: Vec<ActionItem>,
    #[serde(deserialize_with = "nullable")]
    pub short_term: Vec<ActionItem>,
    #[serde(deserialize_with = "nullable")]
    pub strategic: Vec<ActionItem>,
}

impl ActionItems {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.short_term.is_empty() && self.strategic.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
    pub product: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    pub issue: Option<String>,
    pub action: Option<String>,
}

impl RiskReportDocument {
    pub fn product_totals(&self, product: &str) -> Totals {
        self.product_totals.get(product).cloned().unwrap_or_default()
    }

    pub fn rows<'a, T>(map: &'a ByProduct<T>, product: &str) -> &'a [T] {
        map.get(product).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Payload for RiskReportDocument {
    const NAME: &'static str = "risk report";

    fn normalize(&mut self) {
        for (product, rows) in self.attainment_detail.iter_mut() {
            for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                row.product = product.clone();
            }
        }
        for (product, rows) in self.pipeline_rca.iter_mut() {
            for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                row.product = product.clone();
            }
        }
        for (product, rows) in self.wins_bright_spots.iter_mut() {
            for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                row.product = product.clone();
            }
        }
        for (product, rows) in self.momentum_indicators.iter_mut() {
            for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                row.product = product.clone();
            }
        }
        for (product, rows) in self.trend_rca.iter_mut() {
            for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                row.product = product.clone();
            }
        }
        for map in [&mut self.loss_reasons, &mut self.loss_reason_rca] {
            for (product, rows) in map.iter_mut() {
                for row in rows.iter_mut().filter(|r| r.product.is_empty()) {
                    row.product = product.clone();
                }
            }
        }
    }

    fn check(&self) {
        if let (Some(elapsed), Some(total)) = (self.period.days_elapsed, self.period.total_days) {
            if elapsed > total {
                warn!("Period reports {} days elapsed of {} total", elapsed, total);
            }
        }

        if self.attainment_detail.is_empty() {
            debug!("attainment_detail missing; attainment tables will be empty");
        }
        if self.product_totals.is_empty() {
            debug!("product_totals missing; product columns will render as zero");
        }

        for (product, rows) in &self.funnel_by_category {
            for row in rows {
                for (earlier, later) in row.stages.anomalies() {
                    warn!(
                        "Funnel anomaly for {} {} {}: {} exceeds {}",
                        product,
                        row.region,
                        row.category,
                        later.label(),
                        earlier.label()
                    );
                }
            }
        }
    }
}

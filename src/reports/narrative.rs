//! Narrative generators: short commentary assembled from several payload
//! sections for one product/region pair. Deterministic and stateless.

use super::formatters::{format_currency, format_signed, CurrencyStyle};
use crate::payload::num;
use crate::payload::risk::{FunnelRcaInsight, FunnelStageRow, LossReasonRow, PipelineRow};
use crate::types::{Percent, Stage};
use std::fmt;

pub const INSUFFICIENT_DATA: &str = "Insufficient data for analysis.";

const STRENGTHS_CAP: usize = 3;
const WEAKNESSES_CAP: usize = 3;
const TOP_SOURCES_CAP: usize = 2;
const WEAK_SOURCES_CAP: usize = 2;
const LOSS_REASONS_CAP: usize = 2;

const STRENGTH_PCT: f64 = 100.0;
const WEAKNESS_PCT: f64 = 70.0;

/// One labelled group of fragments, e.g. `Strengths: a; b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativePart {
    pub label: &'static str,
    pub items: Vec<String>,
}

impl NarrativePart {
    pub fn text(&self) -> String {
        self.items.join("; ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narrative {
    parts: Vec<NarrativePart>,
}

impl Narrative {
    pub fn parts(&self) -> &[NarrativePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn push(&mut self, label: &'static str, mut items: Vec<String>, cap: usize) {
        items.truncate(cap);
        if !items.is_empty() {
            self.parts.push(NarrativePart { label, items });
        }
    }
}

impl fmt::Display for Narrative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str(INSUFFICIENT_DATA);
        }
        let joined: Vec<String> = self
            .parts
            .iter()
            .map(|p| format!("{}: {}", p.label, p.text()))
            .collect();
        f.write_str(&joined.join(" | "))
    }
}

fn pct_value(pct: Option<Percent>) -> f64 {
    pct.map_or(0.0, Percent::value)
}

/// Strengths and weaknesses by category, source performance at SQO, and the
/// largest loss reasons for one region.
pub fn funnel_narrative(
    region: &str,
    category_rows: &[FunnelStageRow],
    source_rows: &[FunnelStageRow],
    loss_rows: &[LossReasonRow],
) -> Narrative {
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for row in category_rows.iter().filter(|r| r.region == region) {
        for stage in Stage::ALL {
            let m = row.stages.get(stage);
            if m.qtd_target <= 0.0 {
                continue;
            }
            let pct = pct_value(m.pacing);
            let label = stage.label_for(&row.category);
            if pct >= STRENGTH_PCT {
                strengths.push(format!(
                    "{} {} at {:.0}% ({})",
                    row.category,
                    label,
                    pct,
                    format_signed(m.gap)
                ));
            } else if pct < WEAKNESS_PCT {
                weaknesses.push(format!(
                    "{} {} at {:.0}% ({})",
                    row.category,
                    label,
                    pct,
                    format_signed(m.gap)
                ));
            }
        }
    }

    let mut top_sources = Vec::new();
    let mut weak_sources = Vec::new();
    for row in source_rows.iter().filter(|r| r.region == region) {
        let sqo = row.stages.get(Stage::Sqo);
        if sqo.qtd_target <= 0.0 {
            continue;
        }
        let pct = pct_value(sqo.pacing);
        if pct >= STRENGTH_PCT {
            top_sources.push(format!("{} SQO at {:.0}%", row.source, pct));
        } else if pct < WEAKNESS_PCT {
            weak_sources.push(format!("{} SQO at {:.0}%", row.source, pct));
        }
    }

    let losses: Vec<String> = loss_rows
        .iter()
        .filter(|r| r.region == region && num(r.lost_acv) > 0.0)
        .map(|r| format!("{} ({})", r.reason(), format_currency(r.lost_acv, CurrencyStyle::WHOLE)))
        .collect();

    let mut narrative = Narrative::default();
    narrative.push("Strengths", strengths, STRENGTHS_CAP);
    narrative.push("Weaknesses", weaknesses, WEAKNESSES_CAP);
    narrative.push("Top Sources", top_sources, TOP_SOURCES_CAP);
    narrative.push("Underperforming Sources", weak_sources, WEAK_SOURCES_CAP);
    narrative.push("Top Loss Reasons", losses, LOSS_REASONS_CAP);
    narrative
}

/// Root cause and recommended action for a missed attainment row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcaSummary {
    pub rca: String,
    pub action: String,
}

impl fmt::Display for RcaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.rca, self.action)
    }
}

/// Upstream sections consulted when explaining a miss
#[derive(Debug, Clone, Copy, Default)]
pub struct RcaSources<'a> {
    pub category_rows: &'a [FunnelStageRow],
    pub source_rows: &'a [FunnelStageRow],
    pub loss_rows: &'a [LossReasonRow],
    pub pipeline_rows: &'a [PipelineRow],
    pub funnel_rca: &'a [FunnelRcaInsight],
}

const FUNNEL_GAP_FLOOR: f64 = -5.0;
const LOSS_DEAL_FLOOR: f64 = 2.0;

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

/// Combine funnel gaps, weak sources, repeated loss reasons and the upstream
/// pipeline/funnel commentary into one RCA line plus an action.
pub fn enhanced_rca(region: &str, sources: &RcaSources<'_>) -> RcaSummary {
    let mut rca_parts: Vec<String> = Vec::new();
    let mut action_parts: Vec<String> = Vec::new();

    let mut funnel_issues: Vec<(Stage, String)> = Vec::new();
    for row in sources.category_rows.iter().filter(|r| r.region == region) {
        for stage in Stage::ALL {
            let m = row.stages.get(stage);
            let pct = pct_value(m.pacing);
            if pct < WEAKNESS_PCT && m.gap < FUNNEL_GAP_FLOOR {
                funnel_issues.push((
                    stage,
                    format!("{} {} at {:.0}%", row.category, stage.label_for(&row.category), pct),
                ));
            }
        }
    }
    if !funnel_issues.is_empty() {
        let shown: Vec<&str> = funnel_issues.iter().take(2).map(|(_, s)| s.as_str()).collect();
        rca_parts.push(format!("Funnel gaps: {}", shown.join(", ")));
    }

    let weak_sources: Vec<String> = sources
        .source_rows
        .iter()
        .filter(|r| r.region == region)
        .filter_map(|r| {
            let pct = pct_value(r.stages.get(Stage::Sqo).pacing);
            (pct < WEAKNESS_PCT).then(|| format!("{} ({:.0}%)", r.source, pct))
        })
        .collect();
    if !weak_sources.is_empty() {
        rca_parts.push(format!("Weak sources: {}", weak_sources[..weak_sources.len().min(2)].join(", ")));
    }

    let repeated_losses: Vec<&str> = sources
        .loss_rows
        .iter()
        .filter(|r| r.region == region && num(r.deal_count) >= LOSS_DEAL_FLOOR)
        .map(|r| r.loss_reason.as_deref().unwrap_or(""))
        .collect();
    if !repeated_losses.is_empty() {
        rca_parts.push(format!("Top losses: {}", repeated_losses[..repeated_losses.len().min(2)].join(", ")));
    }

    if let Some(pipeline) = sources.pipeline_rows.iter().find(|p| p.region == region) {
        if let Some(rca) = non_empty(&pipeline.rca_commentary) {
            if !rca_parts.iter().any(|part| part.contains(rca)) {
                rca_parts.push(rca.to_string());
            }
        }
        if let Some(action) = non_empty(&pipeline.recommended_action) {
            action_parts.push(action.to_string());
        }
    }

    if let Some(insight) = sources.funnel_rca.iter().find(|i| i.region == region) {
        if let Some(action) = non_empty(&insight.recommended_action) {
            if !action_parts.iter().any(|part| part.contains(action)) {
                action_parts.push(action.to_string());
            }
        }
    }

    if funnel_issues.iter().any(|(stage, _)| *stage == Stage::Mql) {
        action_parts.push("Increase top-of-funnel marketing".to_string());
    }
    if funnel_issues.iter().any(|(stage, _)| *stage == Stage::Sqo) {
        action_parts.push("Improve qualification process".to_string());
    }
    if repeated_losses.iter().any(|r| r.contains("Competitor")) {
        action_parts.push("Enhance competitive positioning".to_string());
    }
    if repeated_losses.iter().any(|r| r.contains("Price")) {
        action_parts.push("Review pricing strategy".to_string());
    }

    let rca = if rca_parts.is_empty() {
        "Analysis in progress".to_string()
    } else {
        rca_parts.iter().take(3).cloned().collect::<Vec<_>>().join(". ")
    };
    let action = if action_parts.is_empty() {
        "Review pipeline".to_string()
    } else {
        action_parts.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
    };
    RcaSummary { rca, action }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn funnel(rows: serde_json::Value) -> Vec<FunnelStageRow> {
        serde_json::from_value(rows).unwrap()
    }

    fn losses(rows: serde_json::Value) -> Vec<LossReasonRow> {
        serde_json::from_value(rows).unwrap()
    }

    #[test]
    fn test_empty_inputs_yield_sentinel() {
        let narrative = funnel_narrative("AMER", &[], &[], &[]);
        assert!(narrative.is_empty());
        assert_eq!(narrative.to_string(), INSUFFICIENT_DATA);
    }

    #[test]
    fn test_strengths_weaknesses_and_caps() {
        let categories = funnel(json!([
            {"region": "AMER", "category": "NEW LOGO",
             "qtd_target_mql": 100, "mql_pacing_pct": 120, "mql_gap": 20,
             "qtd_target_sql": 50, "sql_pacing_pct": 60, "sql_gap": -20,
             "qtd_target_sal": 40, "sal_pacing_pct": 50, "sal_gap": -20,
             "qtd_target_sqo": 30, "sqo_pacing_pct": 40, "sqo_gap": -18},
            {"region": "AMER", "category": "EXPANSION",
             "qtd_target_mql": 10, "mql_pacing_pct": 30, "mql_gap": -7},
            {"region": "EMEA", "category": "NEW LOGO",
             "qtd_target_mql": 10, "mql_pacing_pct": 300, "mql_gap": 20}
        ]));
        let narrative = funnel_narrative("AMER", &categories, &[], &[]);
        assert_eq!(
            narrative.to_string(),
            "Strengths: NEW LOGO MQL at 120% (+20) | Weaknesses: NEW LOGO SQL at 60% (-20); NEW LOGO SAL at 50% (-20); NEW LOGO SQO at 40% (-18)"
        );
    }

    #[test]
    fn test_sources_and_losses() {
        let sources = funnel(json!([
            {"region": "APAC", "source": "INBOUND", "qtd_target_sqo": 10, "sqo_pacing_pct": 110},
            {"region": "APAC", "source": "OUTBOUND", "qtd_target_sqo": 10, "sqo_pacing_pct": 20},
            {"region": "APAC", "source": "PARTNERSHIPS", "qtd_target_sqo": 0, "sqo_pacing_pct": 0}
        ]));
        let lost = losses(json!([
            {"region": "APAC", "loss_reason": "Price", "lost_acv": 45000},
            {"region": "APAC", "loss_reason": "Timing", "lost_acv": 0},
            {"region": "APAC", "lost_acv": 1200}
        ]));
        let narrative = funnel_narrative("APAC", &[], &sources, &lost);
        assert_eq!(
            narrative.to_string(),
            "Top Sources: INBOUND SQO at 110% | Underperforming Sources: OUTBOUND SQO at 20% | Top Loss Reasons: Price ($45,000); Unknown ($1,200)"
        );
    }

    #[test]
    fn test_eql_label_for_expansion() {
        let categories = funnel(json!([
            {"region": "EMEA", "category": "EXPANSION", "qtd_target_mql": 10, "mql_pacing_pct": 20, "mql_gap": -8}
        ]));
        let narrative = funnel_narrative("EMEA", &categories, &[], &[]);
        assert_eq!(narrative.parts()[0].text(), "EXPANSION EQL at 20% (-8)");
    }

    #[test]
    fn test_narrative_is_deterministic() {
        let categories = funnel(json!([
            {"region": "AMER", "category": "NEW LOGO", "qtd_target_sqo": 30, "sqo_pacing_pct": 40, "sqo_gap": -18}
        ]));
        let a = funnel_narrative("AMER", &categories, &categories, &[]).to_string();
        let b = funnel_narrative("AMER", &categories, &categories, &[]).to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_enhanced_rca_defaults() {
        let summary = enhanced_rca("AMER", &RcaSources::default());
        assert_eq!(summary.to_string(), "Analysis in progress → Review pipeline");
    }

    #[test]
    fn test_enhanced_rca_combines_sections() {
        let categories = funnel(json!([
            {"region": "AMER", "category": "NEW LOGO",
             "mql_pacing_pct": 50, "mql_gap": -30,
             "sqo_pacing_pct": 40, "sqo_gap": -10}
        ]));
        let sources = funnel(json!([
            {"region": "AMER", "source": "INBOUND", "sqo_pacing_pct": 30}
        ]));
        let lost = losses(json!([
            {"region": "AMER", "loss_reason": "Competitor", "deal_count": 3},
            {"region": "AMER", "loss_reason": "Price", "deal_count": 1}
        ]));
        let pipeline: Vec<PipelineRow> = serde_json::from_value(json!([
            {"region": "AMER", "rca_commentary": "Thin late-stage pipeline", "recommended_action": "Accelerate SQO reviews"}
        ]))
        .unwrap();

        let summary = enhanced_rca(
            "AMER",
            &RcaSources {
                category_rows: &categories,
                source_rows: &sources,
                loss_rows: &lost,
                pipeline_rows: &pipeline,
                funnel_rca: &[],
            },
        );
        assert_eq!(
            summary.rca,
            "Funnel gaps: NEW LOGO MQL at 50%, NEW LOGO SQO at 40%. Weak sources: INBOUND (30%). Top losses: Competitor"
        );
        assert_eq!(summary.action, "Accelerate SQO reviews; Increase top-of-funnel marketing");
    }
}

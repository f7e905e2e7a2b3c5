//! Section reducers: ordering, filtering and classification of payload rows
//! ahead of rendering. Nothing here mutates the payload; results borrow it.

use crate::payload::num;
use crate::payload::risk::{
    AttainmentRow, FunnelStageRow, LossReasonRow, PipelineRow, RiskReportDocument, StageColumns,
    StageMetrics,
};
use crate::types::{Percent, Stage};
use std::cmp::Ordering;

pub const HITS_CAP: usize = 5;
pub const MISSES_CAP: usize = 10;
pub const RISK_POCKETS_CAP: usize = 10;
pub const LOSS_REASONS_CAP: usize = 15;
pub const ACTION_ITEMS_CAP: usize = 5;

fn ascending(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Stable ascending sort by percentage, null treated as 0 (worst)
pub fn sort_worst_first<'a, T, F>(rows: impl IntoIterator<Item = &'a T>, pct: F) -> Vec<&'a T>
where
    T: 'a,
    F: Fn(&T) -> Option<Percent>,
{
    let mut sorted: Vec<&T> = rows.into_iter().collect();
    sorted.sort_by(|a, b| {
        ascending(
            pct(*a).map_or(0.0, Percent::value),
            pct(*b).map_or(0.0, Percent::value),
        )
    });
    sorted
}

/// Stable ascending sort by signed gap (most negative first), truncated to `n`
pub fn top_n_by_gap<'a, T, F>(rows: impl IntoIterator<Item = &'a T>, gap: F, n: usize) -> Vec<&'a T>
where
    T: 'a,
    F: Fn(&T) -> f64,
{
    let mut sorted: Vec<&T> = rows.into_iter().collect();
    sorted.sort_by(|a, b| ascending(gap(*a), gap(*b)));
    sorted.truncate(n);
    sorted
}

/// Split into `(hits, misses)`. A hit is GREEN; everything else is a miss.
pub fn partition_hits_misses<'a>(
    rows: impl IntoIterator<Item = &'a AttainmentRow>,
) -> (Vec<&'a AttainmentRow>, Vec<&'a AttainmentRow>) {
    rows.into_iter().partition(|row| row.is_hit())
}

/// Attainment rows for every listed product, in product order
pub fn all_attainment<'a>(doc: &'a RiskReportDocument, products: &[String]) -> Vec<&'a AttainmentRow> {
    products
        .iter()
        .flat_map(|p| RiskReportDocument::rows(&doc.attainment_detail, p))
        .collect()
}

/// Hits ranked by attainment, best first
pub fn top_hits<'a>(hits: &[&'a AttainmentRow]) -> Vec<&'a AttainmentRow> {
    let mut ranked = hits.to_vec();
    ranked.sort_by(|a, b| {
        ascending(
            b.attainment().map_or(0.0, Percent::value),
            a.attainment().map_or(0.0, Percent::value),
        )
    });
    ranked.truncate(HITS_CAP);
    ranked
}

/// Misses ranked by gap, largest shortfall first
pub fn top_misses<'a>(misses: &[&'a AttainmentRow]) -> Vec<&'a AttainmentRow> {
    top_n_by_gap(misses.iter().copied(), AttainmentRow::gap, MISSES_CAP)
}

/// Risk pockets: the upstream list when present, else every attainment row;
/// misses only, top N by gap
pub fn risk_pockets<'a>(doc: &'a RiskReportDocument, products: &[String]) -> Vec<&'a AttainmentRow> {
    let candidates: Vec<&AttainmentRow> = if doc.top_risk_pockets.is_empty() {
        all_attainment(doc, products)
    } else {
        doc.top_risk_pockets.iter().collect()
    };
    top_n_by_gap(
        candidates.into_iter().filter(|row| !row.is_hit()),
        AttainmentRow::gap,
        RISK_POCKETS_CAP,
    )
}

/// Weighted top-of-funnel score.
///
/// Sum of `pacing * weight / 100` over the stages with a positive QTD target.
/// Weights of absent stages are dropped, not redistributed.
pub fn tof_score(stages: &StageColumns) -> f64 {
    Stage::ALL
        .iter()
        .map(|&stage| (stage, stages.get(stage)))
        .filter(|(_, m)| m.qtd_target > 0.0)
        .map(|(stage, m)| m.pacing.map_or(0.0, Percent::value) * stage.tof_weight() / 100.0)
        .sum()
}

/// Upstream score when supplied, otherwise [`tof_score`]
pub fn displayed_tof_score(row: &FunnelStageRow) -> Percent {
    row.weighted_tof_score
        .unwrap_or_else(|| Percent(tof_score(&row.stages)))
}

fn pacing_sum(stages: &StageColumns) -> f64 {
    Stage::ALL
        .iter()
        .map(|&s| stages.get(s).pacing.map_or(0.0, Percent::value))
        .sum()
}

/// Category funnel rows, worst average stage pacing first
pub fn sort_funnel_by_category(rows: &[FunnelStageRow]) -> Vec<&FunnelStageRow> {
    let mut sorted: Vec<&FunnelStageRow> = rows.iter().collect();
    sorted.sort_by(|a, b| ascending(pacing_sum(&a.stages) / 4.0, pacing_sum(&b.stages) / 4.0));
    sorted
}

/// Source funnel rows by category, then source, then pacing
pub fn sort_funnel_by_source(rows: &[FunnelStageRow]) -> Vec<&FunnelStageRow> {
    let mut sorted: Vec<&FunnelStageRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| ascending(pacing_sum(&a.stages), pacing_sum(&b.stages)))
    });
    sorted
}

/// A stage shown in a funnel table, labelled for the row's category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleStage {
    pub stage: Stage,
    pub label: &'static str,
    pub metrics: StageMetrics,
}

/// Stages with a positive Q1 target, in funnel order
pub fn visible_stages(row: &FunnelStageRow) -> Vec<VisibleStage> {
    Stage::ALL
        .iter()
        .map(|&stage| VisibleStage {
            stage,
            label: stage.label_for(&row.category),
            metrics: row.stages.get(stage),
        })
        .filter(|v| v.metrics.q1_target > 0.0)
        .collect()
}

/// Pipeline rows across products, sorted by region, product, category
pub fn pipeline_rows<'a>(doc: &'a RiskReportDocument, products: &[String]) -> Vec<&'a PipelineRow> {
    let mut rows: Vec<&PipelineRow> = products
        .iter()
        .flat_map(|p| RiskReportDocument::rows(&doc.pipeline_rca, p))
        .collect();
    rows.sort_by(|a, b| {
        a.region
            .cmp(&b.region)
            .then_with(|| a.product.cmp(&b.product))
            .then_with(|| a.category.cmp(&b.category))
    });
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductLosses {
    pub product: String,
    pub deals: f64,
    pub acv: f64,
    pub avg_deal: f64,
}

fn avg(acv: f64, deals: f64) -> f64 {
    if deals > 0.0 {
        acv / deals
    } else {
        0.0
    }
}

/// Lost deals per product plus a trailing `TOTAL` row
pub fn losses_by_product(doc: &RiskReportDocument, products: &[String]) -> Vec<ProductLosses> {
    let mut rows: Vec<ProductLosses> = products
        .iter()
        .map(|p| {
            let totals = doc.product_totals(p);
            let deals = num(totals.total_lost_deals);
            let acv = num(totals.total_lost_acv);
            ProductLosses {
                product: p.clone(),
                deals,
                acv,
                avg_deal: avg(acv, deals),
            }
        })
        .collect();

    let deals: f64 = rows.iter().map(|r| r.deals).sum();
    let acv: f64 = rows.iter().map(|r| r.acv).sum();
    rows.push(ProductLosses {
        product: "TOTAL".to_string(),
        deals,
        acv,
        avg_deal: avg(acv, deals),
    });
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionLosses {
    pub region: String,
    /// `(deals, acv)` per product, in product order
    pub by_product: Vec<(f64, f64)>,
}

impl RegionLosses {
    pub fn total_acv(&self) -> f64 {
        self.by_product.iter().map(|(_, acv)| acv).sum()
    }
}

/// Lost deals per region aggregated from the attainment rows, largest ACV lost first
pub fn losses_by_region(doc: &RiskReportDocument, products: &[String]) -> Vec<RegionLosses> {
    let mut regions: Vec<RegionLosses> = Vec::new();
    for (index, product) in products.iter().enumerate() {
        for row in RiskReportDocument::rows(&doc.attainment_detail, product) {
            let name = if row.region.is_empty() { "Unknown" } else { row.region.as_str() };
            let position = match regions.iter().position(|r| r.region == name) {
                Some(position) => position,
                None => {
                    regions.push(RegionLosses {
                        region: name.to_string(),
                        by_product: vec![(0.0, 0.0); products.len()],
                    });
                    regions.len() - 1
                }
            };
            let slot = &mut regions[position].by_product[index];
            slot.0 += num(row.qtd_lost_deals);
            slot.1 += num(row.qtd_lost_acv);
        }
    }
    regions.sort_by(|a, b| ascending(b.total_acv(), a.total_acv()));
    regions
}

/// Loss-reason rows across products, largest ACV lost first, capped
pub fn top_loss_reasons<'a>(doc: &'a RiskReportDocument, products: &[String]) -> Vec<&'a LossReasonRow> {
    let mut rows: Vec<&LossReasonRow> = products
        .iter()
        .flat_map(|p| RiskReportDocument::rows(&doc.loss_reason_rca, p))
        .collect();
    rows.sort_by(|a, b| ascending(num(b.lost_acv), num(a.lost_acv)));
    rows.truncate(LOSS_REASONS_CAP);
    rows
}

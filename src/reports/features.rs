//! Report versions and the section flags each one enables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportVersion {
    #[serde(rename = "2.5")]
    V2_5,
    #[serde(rename = "2.6")]
    V2_6,
    #[serde(rename = "2.7")]
    #[default]
    V2_7,
}

impl ReportVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportVersion::V2_5 => "2.5",
            ReportVersion::V2_6 => "2.6",
            ReportVersion::V2_7 => "2.7",
        }
    }

    pub fn features(self) -> FeatureSet {
        FeatureSet::preset(self)
    }
}

impl fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "2.5" => Ok(ReportVersion::V2_5),
            "2.6" => Ok(ReportVersion::V2_6),
            "2.7" => Ok(ReportVersion::V2_7),
            other => Err(anyhow::anyhow!(
                "Unsupported report version: {} (expected 2.5, 2.6 or 2.7)",
                other
            )),
        }
    }
}

/// Which optional subsections a risk report renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    pub executive_counts: bool,
    pub q1_progress: bool,
    pub wins_bright_spots: bool,
    pub momentum_indicators: bool,
    pub funnel_trends: bool,
    pub trend_rca: bool,
    pub top_risk_pockets: bool,
    pub funnel_pacing: bool,
    pub funnel_health: bool,
    pub source_attainment: bool,
    pub funnel_by_category: bool,
    pub funnel_by_source: bool,
    pub funnel_narrative: bool,
    pub funnel_rca_cards: bool,
    pub hits_misses: bool,
    pub loss_reason_rca_cards: bool,
    pub loss_reasons_by_product: bool,
    pub lost_opportunities: bool,
    pub action_items: bool,
    pub pipeline_commentary: bool,
}

impl FeatureSet {
    pub fn preset(version: ReportVersion) -> Self {
        match version {
            ReportVersion::V2_5 => FeatureSet {
                executive_counts: true,
                q1_progress: true,
                wins_bright_spots: true,
                momentum_indicators: true,
                funnel_trends: true,
                trend_rca: true,
                top_risk_pockets: true,
                funnel_pacing: true,
                funnel_health: true,
                funnel_rca_cards: true,
                loss_reason_rca_cards: true,
                loss_reasons_by_product: true,
                action_items: true,
                pipeline_commentary: true,
                ..FeatureSet::default()
            },
            ReportVersion::V2_6 => FeatureSet {
                source_attainment: true,
                funnel_by_category: true,
                hits_misses: true,
                lost_opportunities: true,
                ..FeatureSet::default()
            },
            ReportVersion::V2_7 => FeatureSet {
                funnel_by_source: true,
                funnel_narrative: true,
                ..FeatureSet::preset(ReportVersion::V2_6)
            },
        }
    }

    /// Apply per-flag overrides on top of this set
    pub fn with_overrides(mut self, overrides: &FeatureOverrides) -> Self {
        let pairs: [(&mut bool, Option<bool>); 20] = [
            (&mut self.executive_counts, overrides.executive_counts),
            (&mut self.q1_progress, overrides.q1_progress),
            (&mut self.wins_bright_spots, overrides.wins_bright_spots),
            (&mut self.momentum_indicators, overrides.momentum_indicators),
            (&mut self.funnel_trends, overrides.funnel_trends),
            (&mut self.trend_rca, overrides.trend_rca),
            (&mut self.top_risk_pockets, overrides.top_risk_pockets),
            (&mut self.funnel_pacing, overrides.funnel_pacing),
            (&mut self.funnel_health, overrides.funnel_health),
            (&mut self.source_attainment, overrides.source_attainment),
            (&mut self.funnel_by_category, overrides.funnel_by_category),
            (&mut self.funnel_by_source, overrides.funnel_by_source),
            (&mut self.funnel_narrative, overrides.funnel_narrative),
            (&mut self.funnel_rca_cards, overrides.funnel_rca_cards),
            (&mut self.hits_misses, overrides.hits_misses),
            (&mut self.loss_reason_rca_cards, overrides.loss_reason_rca_cards),
            (&mut self.loss_reasons_by_product, overrides.loss_reasons_by_product),
            (&mut self.lost_opportunities, overrides.lost_opportunities),
            (&mut self.action_items, overrides.action_items),
            (&mut self.pipeline_commentary, overrides.pipeline_commentary),
        ];
        for (flag, value) in pairs {
            if let Some(value) = value {
                *flag = value;
            }
        }
        self
    }
}

/// Optional per-flag settings from configuration; unset keeps the preset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executive_counts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q1_progress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wins_bright_spots: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum_indicators: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_trends: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_rca: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_risk_pockets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_pacing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_health: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_attainment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_by_category: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_by_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_narrative: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_rca_cards: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_misses: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_reason_rca_cards: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_reasons_by_product: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_opportunities: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_commentary: Option<bool>,
}

impl FeatureOverrides {
    pub fn is_empty(&self) -> bool {
        *self == FeatureOverrides::default()
    }
}

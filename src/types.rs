//! Core metric and status types shared by payloads and renderers

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A percentage already multiplied by 100 (`87.5` means 87.5%).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(pub f64);

/// A raw ratio in `0..1` (`0.875` means 87.5%).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fraction(pub f64);

impl Percent {
    pub fn value(self) -> f64 {
        self.0
    }

    /// `100 * actual / target`, or `None` when there is no positive target
    pub fn from_ratio(actual: f64, target: f64) -> Option<Percent> {
        if target > 0.0 {
            Some(Percent(100.0 * actual / target))
        } else {
            None
        }
    }
}

impl Fraction {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn to_percent(self) -> Percent {
        Percent(self.0 * 100.0)
    }
}

impl From<Fraction> for Percent {
    fn from(fraction: Fraction) -> Self {
        fraction.to_percent()
    }
}

/// Red/Amber/Green attainment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RagStatus {
    Green,
    Yellow,
    Red,
}

impl RagStatus {
    pub const GREEN_THRESHOLD: f64 = 90.0;
    pub const YELLOW_THRESHOLD: f64 = 70.0;

    /// `>= 90` green, `>= 70` yellow, anything else (including null) red
    pub fn classify(pct: Option<Percent>) -> Self {
        match pct {
            Some(Percent(p)) if p >= Self::GREEN_THRESHOLD => RagStatus::Green,
            Some(Percent(p)) if p >= Self::YELLOW_THRESHOLD => RagStatus::Yellow,
            _ => RagStatus::Red,
        }
    }

    /// Parse an upstream tag; unknown tags count as red
    pub fn parse_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "GREEN" => RagStatus::Green,
            "YELLOW" | "AMBER" => RagStatus::Yellow,
            _ => RagStatus::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RagStatus::Green => "GREEN",
            RagStatus::Yellow => "YELLOW",
            RagStatus::Red => "RED",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            RagStatus::Green => Tone::Good,
            RagStatus::Yellow => Tone::Warning,
            RagStatus::Red => Tone::Bad,
        }
    }
}

impl From<String> for RagStatus {
    fn from(tag: String) -> Self {
        RagStatus::parse_tag(&tag)
    }
}

impl From<RagStatus> for String {
    fn from(status: RagStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a metric over time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trend {
    Improving,
    Declining,
    #[default]
    Neutral,
}

impl Trend {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "improving" | "up" => Trend::Improving,
            "declining" | "down" | "worsening" => Trend::Declining,
            _ => Trend::Neutral,
        }
    }

    pub fn from_option(raw: Option<&str>) -> Self {
        raw.map(Trend::parse).unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Trend::Improving => "Improving",
            Trend::Declining => "Declining",
            Trend::Neutral => "Stable",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            Trend::Improving => Tone::Good,
            Trend::Declining => Tone::Bad,
            Trend::Neutral => Tone::Neutral,
        }
    }
}

impl From<String> for Trend {
    fn from(raw: String) -> Self {
        Trend::parse(&raw)
    }
}

impl From<Trend> for String {
    fn from(trend: Trend) -> Self {
        trend.label().to_ascii_lowercase()
    }
}

/// Upstream pipeline health tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineHealth {
    Healthy,
    Adequate,
    AtRisk,
    Other(String),
}

impl PipelineHealth {
    pub fn label(&self) -> &str {
        match self {
            PipelineHealth::Healthy => "HEALTHY",
            PipelineHealth::Adequate => "ADEQUATE",
            PipelineHealth::AtRisk => "AT_RISK",
            PipelineHealth::Other(tag) => tag,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            PipelineHealth::Healthy => Tone::Good,
            PipelineHealth::Adequate => Tone::Warning,
            _ => Tone::Bad,
        }
    }
}

impl From<String> for PipelineHealth {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "HEALTHY" => PipelineHealth::Healthy,
            "ADEQUATE" => PipelineHealth::Adequate,
            "AT_RISK" => PipelineHealth::AtRisk,
            _ => PipelineHealth::Other(tag),
        }
    }
}

impl From<PipelineHealth> for String {
    fn from(health: PipelineHealth) -> Self {
        health.label().to_string()
    }
}

/// Upstream severity tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Other(String),
}

impl Severity {
    pub fn label(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Other(tag) => tag,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Severity::Critical => Tone::Bad,
            Severity::High => Tone::Warning,
            _ => Tone::Neutral,
        }
    }

    /// Severities that warrant a row in the pipeline issue table
    pub fn is_actionable(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High | Severity::Medium)
    }
}

impl From<String> for Severity {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Other(tag),
        }
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.label().to_string()
    }
}

/// Presentation tone used by renderers to color a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warning,
    Bad,
    Neutral,
}

impl Tone {
    /// Green when non-negative, red otherwise
    pub fn of_sign(value: f64) -> Self {
        if value < 0.0 {
            Tone::Bad
        } else {
            Tone::Good
        }
    }
}

/// Funnel stages in their fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Mql,
    Sql,
    Sal,
    Sqo,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Mql, Stage::Sql, Stage::Sal, Stage::Sqo];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Mql => "MQL",
            Stage::Sql => "SQL",
            Stage::Sal => "SAL",
            Stage::Sqo => "SQO",
        }
    }

    /// Expansion and migration deals qualify as EQL rather than MQL
    pub fn label_for(self, category: &str) -> &'static str {
        match self {
            Stage::Mql if is_eql_category(category) => "EQL",
            other => other.label(),
        }
    }

    /// Weight in the top-of-funnel composite score
    pub fn tof_weight(self) -> f64 {
        match self {
            Stage::Mql => 10.0,
            Stage::Sql => 20.0,
            Stage::Sal => 30.0,
            Stage::Sqo => 40.0,
        }
    }
}

pub fn is_eql_category(category: &str) -> bool {
    let upper = category.trim().to_ascii_uppercase();
    upper == "EXPANSION" || upper == "MIGRATION"
}

/// Treat an explicit JSON `null` the same as a missing key
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

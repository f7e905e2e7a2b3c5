//! Typed views of the report documents produced by the warehouse queries.
//!
//! Every field carries a serde default so that a missing or `null` key
//! decodes to zero, an empty list or an empty string. Nothing in here fails
//! on an absent key; only a type mismatch makes a payload malformed.

pub mod daily;
pub mod funnel;
pub mod horizons;
pub mod risk;

use serde::de::DeserializeOwned;

pub use daily::{DailyDetailData, DailyReportData};
pub use funnel::TofDocument;
pub use horizons::HorizonRiskDocument;
pub use risk::RiskReportDocument;

/// A decodable report document
pub trait Payload: DeserializeOwned + Send {
    /// Human-readable name used in logs and errors
    const NAME: &'static str;

    /// Fill in values that are implied by the document layout
    fn normalize(&mut self) {}

    /// Log upstream invariant violations; never fails
    fn check(&self) {}
}

/// Unwrap an optional number, treating null as zero
pub(crate) fn num(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

pub mod features;
pub mod formatters;
pub mod funnel;
pub mod generator;
pub mod horizons;
pub mod html;
pub mod layout;
pub mod narrative;
pub mod reducers;
pub mod risk;
pub mod slack;
pub mod text;

pub use features::{FeatureOverrides, FeatureSet, ReportVersion};
pub use funnel::TofReport;
pub use generator::{ReportFormat, ReportGenerator};
pub use horizons::{horizon_report, HorizonReportOptions};
pub use layout::Document;
pub use risk::{RiskReportBuilder, RiskReportOptions};
pub use slack::{DailyMessageBuilder, SlackBundle};

use super::html::render_html;
use super::layout::Document;
use super::text::render_text;
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Output formats for a rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Html,
    Text,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Html => "html",
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(ReportFormat::Html),
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported format: {}", s)),
        }
    }
}

/// Report generator for creating various output formats
#[derive(Debug, Default)]
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate the document in the requested format; `json` writes the decoded payload
    pub fn generate<T: Serialize>(&self, document: &Document, payload: &T, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Html => Ok(render_html(document)),
            ReportFormat::Text => Ok(render_text(document)),
            ReportFormat::Json => self.generate_json(payload),
        }
    }

    fn generate_json<T: Serialize>(&self, payload: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_parsing() {
        assert_eq!("HTML".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert_eq!("txt".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!(ReportFormat::Text.extension(), "txt");
        let err = "pdf".parse::<ReportFormat>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported format: pdf");
    }

    #[test]
    fn test_generate_dispatches_by_format() {
        let generator = ReportGenerator::new();
        let document = Document::new("Risk");
        let payload = json!({"report_date": "2026-02-10"});

        let html = generator.generate(&document, &payload, ReportFormat::Html).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));

        let text = generator.generate(&document, &payload, ReportFormat::Text).unwrap();
        assert!(text.starts_with("Risk\n===="));

        let raw = generator.generate(&document, &payload, ReportFormat::Json).unwrap();
        let back: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, payload);
    }
}

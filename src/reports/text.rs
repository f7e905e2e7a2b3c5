//! Plain-text rendering of a [`Document`] for terminals and mail bodies.

use super::layout::{plain_text, Align, Block, Card, Document, Section, Table};
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};

pub fn render_text(document: &Document) -> String {
    let mut out = String::new();
    out.push_str(&document.title);
    out.push('\n');
    out.push_str(&"=".repeat(document.title.chars().count()));
    out.push('\n');
    for (label, value) in &document.meta {
        out.push_str(&format!("{}: {}\n", label, value));
    }
    for section in &document.sections {
        out.push('\n');
        render_section(&mut out, section);
    }
    if !document.footer.is_empty() {
        out.push('\n');
        out.push_str(&document.footer);
        out.push('\n');
    }
    out
}

fn render_section(out: &mut String, section: &Section) {
    out.push_str(&section.title);
    out.push('\n');
    out.push_str(&"-".repeat(section.title.chars().count()));
    out.push('\n');
    for block in &section.blocks {
        match block {
            Block::Subheading { text } => out.push_str(&format!("\n{}\n", text)),
            Block::Note { text } => out.push_str(&format!("  {}\n", text)),
            Block::Paragraph { spans } => out.push_str(&format!("{}\n", plain_text(spans))),
            Block::Placeholder { text } => out.push_str(&format!("  {}\n", text)),
            Block::Table { table } => {
                out.push_str(&render_table(table));
                out.push('\n');
            }
            Block::Card { card } => render_card(out, card),
            Block::KeyValues { pairs } => {
                for (key, value) in pairs {
                    out.push_str(&format!("  {}: {}\n", key, value));
                }
            }
        }
    }
}

fn render_table(table: &Table) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.columns.iter().map(|c| c.header.clone()));
    for line in table.grid() {
        builder.push_record(line);
    }

    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    for (index, column) in table.columns.iter().enumerate() {
        match column.align {
            Align::Left => {}
            Align::Right => {
                rendered.modify(Columns::single(index), Alignment::right());
            }
            Align::Center => {
                rendered.modify(Columns::single(index), Alignment::center());
            }
        }
    }
    rendered.to_string()
}

fn render_card(out: &mut String, card: &Card) {
    match &card.badge {
        Some((label, _)) => out.push_str(&format!("* {} [{}]\n", card.title, label)),
        None => out.push_str(&format!("* {}\n", card.title)),
    }
    for paragraph in &card.body {
        out.push_str(&format!("    {}\n", paragraph));
    }
    if let Some(action) = &card.action {
        out.push_str(&format!("    → {}\n", action));
    }
    if let Some(footer) = &card.footer {
        out.push_str(&format!("    {}\n", footer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::layout::{Cell, Column, Row};
    use crate::types::Tone;

    #[test]
    fn test_text_document_layout() {
        let mut document = Document::new("Weekly Risk");
        document.meta.push(("Version".to_string(), "2.7".to_string()));
        let mut section = Section::new("1. Executive Summary");
        let mut table = Table::new(vec![Column::left("Metric"), Column::right("Total")]);
        table.push(Row::new(vec!["Q1 Target".into(), "$1,000,000".into()]));
        section.table_or(table, "No data");
        section.card(
            Card::new("AMER")
                .with_badge("HIGH", Tone::Warning)
                .with_body("Coverage thin")
                .with_action(Some("Add pipeline".to_string())),
        );
        section.placeholder("No lost deals recorded");
        document.sections.push(section);
        document.footer = "Generated 2026-02-10 08:30".to_string();

        let text = render_text(&document);
        assert!(text.starts_with("Weekly Risk\n===========\nVersion: 2.7\n"));
        assert!(text.contains("1. Executive Summary\n--------------------\n"));
        assert!(text.contains("Q1 Target"));
        assert!(text.contains("$1,000,000"));
        assert!(text.contains("* AMER [HIGH]\n    Coverage thin\n    → Add pipeline\n"));
        assert!(text.contains("  No lost deals recorded\n"));
        assert!(text.ends_with("Generated 2026-02-10 08:30\n"));
    }

    #[test]
    fn test_row_spanned_cells_render_blank() {
        let mut table = Table::new(vec![Column::left("Category"), Column::left("Stage")]);
        table.push(Row::new(vec![Cell::text("NEW LOGO").with_row_span(2), "MQL".into()]));
        table.push(Row::new(vec!["SQL".into()]));
        let rendered = render_table(&table);
        assert_eq!(rendered.matches("NEW LOGO").count(), 1);
        assert!(rendered.contains("SQL"));
    }
}

//! Self-contained HTML rendering of a [`Document`]: inline CSS, no scripts,
//! every text value escaped.

use super::layout::{Align, Block, Card, Cell, Document, Section, Span, Table};
use crate::types::Tone;

pub fn render_html(document: &Document) -> String {
    let meta: String = document
        .meta
        .iter()
        .map(|(label, value)| format!("<span>{}: {}</span>", html_escape(label), html_escape(value)))
        .collect();
    let sections: String = document.sections.iter().map(render_section).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        <div class="meta">{meta}</div>
{sections}
        <div class="footer"><p>{footer}</p></div>
    </div>
</body>
</html>
"#,
        title = html_escape(&document.title),
        css = inline_css(),
        meta = meta,
        sections = sections,
        footer = html_escape(&document.footer),
    )
}

fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Good => "green",
        Tone::Warning => "yellow",
        Tone::Bad => "red",
        Tone::Neutral => "muted",
    }
}

fn align_class(align: Align) -> Option<&'static str> {
    match align {
        Align::Left => None,
        Align::Right => Some("right"),
        Align::Center => Some("center"),
    }
}

fn render_section(section: &Section) -> String {
    let mut html = format!("        <h2>{}</h2>\n", html_escape(&section.title));
    for block in &section.blocks {
        html.push_str(&render_block(block));
    }
    html
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Subheading { text } => format!("        <h3>{}</h3>\n", html_escape(text)),
        Block::Note { text } => format!("        <p class=\"note\">{}</p>\n", html_escape(text)),
        Block::Paragraph { spans } => format!("        <p>{}</p>\n", render_spans(spans)),
        Block::Placeholder { text } => {
            format!("        <p class=\"placeholder\">{}</p>\n", html_escape(text))
        }
        Block::Table { table } => render_table(table),
        Block::Card { card } => render_card(card),
        Block::KeyValues { pairs } => {
            let items: String = pairs
                .iter()
                .map(|(k, v)| format!("<li><strong>{}:</strong> {}</li>", html_escape(k), html_escape(v)))
                .collect();
            format!("        <ul class=\"kv\">{}</ul>\n", items)
        }
    }
}

fn render_spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| {
            if span.strong {
                format!("<strong>{}</strong>", html_escape(&span.text))
            } else {
                html_escape(&span.text)
            }
        })
        .collect()
}

fn render_table(table: &Table) -> String {
    let mut html = String::from("        <table>\n            <tr>");
    for column in &table.columns {
        match align_class(column.align) {
            Some(class) => html.push_str(&format!("<th class=\"{}\">{}</th>", class, html_escape(&column.header))),
            None => html.push_str(&format!("<th>{}</th>", html_escape(&column.header))),
        }
    }
    html.push_str("</tr>\n");

    let width = table.columns.len();
    let mut pending = vec![0usize; width];
    for row in &table.rows {
        if row.emphasis {
            html.push_str("            <tr class=\"total\">");
        } else {
            html.push_str("            <tr>");
        }
        // Positions covered by a rowspan above take no cell of their own
        let mut col = 0;
        let mut cells = row.cells.iter();
        while col < width {
            if pending[col] > 0 {
                pending[col] -= 1;
                col += 1;
                continue;
            }
            let Some(cell) = cells.next() else {
                break;
            };
            let align = table.columns.get(col).and_then(|c| align_class(c.align));
            html.push_str(&render_cell(cell, align));
            if cell.row_span > 1 {
                pending[col] = cell.row_span - 1;
            }
            col += cell.col_span;
        }
        html.push_str("</tr>\n");
    }
    html.push_str("        </table>\n");
    html
}

fn render_cell(cell: &Cell, align: Option<&str>) -> String {
    let classes: Vec<&str> = cell.tone.map(tone_class).into_iter().chain(align).collect();
    let mut attrs = String::new();
    if !classes.is_empty() {
        attrs.push_str(&format!(" class=\"{}\"", classes.join(" ")));
    }
    if cell.row_span > 1 {
        attrs.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
    }
    if cell.col_span > 1 {
        attrs.push_str(&format!(" colspan=\"{}\"", cell.col_span));
    }
    let body = render_spans(&cell.spans);
    if cell.strong {
        format!("<td{}><strong>{}</strong></td>", attrs, body)
    } else {
        format!("<td{}>{}</td>", attrs, body)
    }
}

fn render_card(card: &Card) -> String {
    let tone = card.badge.as_ref().map_or(Tone::Neutral, |(_, tone)| *tone);
    let mut html = format!(
        "        <div class=\"card {}\">\n            <div class=\"card-header\"><span class=\"card-title\">{}</span>",
        tone_class(tone),
        html_escape(&card.title)
    );
    if let Some((label, tone)) = &card.badge {
        html.push_str(&format!(
            "<span class=\"badge {}\">{}</span>",
            tone_class(*tone),
            html_escape(label)
        ));
    }
    html.push_str("</div>\n");
    for paragraph in &card.body {
        html.push_str(&format!("            <div class=\"card-body\">{}</div>\n", html_escape(paragraph)));
    }
    if let Some(action) = &card.action {
        html.push_str(&format!("            <div class=\"action\">→ {}</div>\n", html_escape(action)));
    }
    if let Some(footer) = &card.footer {
        html.push_str(&format!("            <div class=\"card-footer\">{}</div>\n", html_escape(footer)));
    }
    html.push_str("        </div>\n");
    html
}

fn inline_css() -> &'static str {
    r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; font-size: 12px; line-height: 1.3; color: #333; background: #f5f5f5; padding: 10px; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 15px; border-radius: 6px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }
        h1 { font-size: 18px; color: #1a1a2e; margin-bottom: 4px; }
        h2 { font-size: 14px; color: #16213e; margin: 18px 0 8px; padding-bottom: 4px; border-bottom: 2px solid #0f3460; }
        h3 { font-size: 12px; color: #333; margin: 12px 0 6px; }
        .meta { font-size: 10px; color: #666; margin-bottom: 10px; }
        .meta span { margin-right: 12px; }
        .note { font-size: 10px; color: #666; margin: 3px 0; }
        .placeholder { font-style: italic; color: #6c757d; margin: 6px 0; }
        table { width: 100%; border-collapse: collapse; margin: 6px 0; font-size: 10px; border: 1px solid #1a1a2e; }
        th { background-color: #1a1a2e; color: white; padding: 3px 2px; text-align: left; font-weight: 600; font-size: 9px; border: 1px solid #1a1a2e; }
        td { padding: 2px 3px; border: 1px solid #dee2e6; word-wrap: break-word; }
        tr.total { font-weight: bold; background: #f8f9fa; }
        .right { text-align: right; }
        .center { text-align: center; }
        .green { color: #28a745; font-weight: 600; }
        .yellow { color: #b8860b; font-weight: 600; }
        .red { color: #dc3545; font-weight: 600; }
        .muted { color: #6c757d; }
        .card { border: 1px solid #ccc; border-left: 4px solid #6c757d; padding: 8px 10px; margin: 8px 0; background: #f8f9fa; border-radius: 3px; font-size: 11px; }
        .card.green { border-left-color: #28a745; }
        .card.yellow { border-left-color: #ffc107; }
        .card.red { border-left-color: #dc3545; }
        .card-header { display: flex; justify-content: space-between; font-weight: 600; margin-bottom: 4px; }
        .badge { padding: 1px 6px; border-radius: 3px; font-size: 9px; }
        .card-body { margin-top: 4px; color: #333; }
        .card-footer { margin-top: 6px; font-size: 10px; color: #6c757d; }
        .action { font-size: 10px; color: #0066cc; margin-top: 3px; font-style: italic; }
        .kv { list-style: none; margin: 6px 0; }
        .footer { margin-top: 20px; padding-top: 10px; border-top: 1px solid #dee2e6; font-size: 9px; color: #666; text-align: center; }
    "#
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::layout::{Column, Row};

    fn sample() -> Document {
        let mut document = Document::new("Risk <Report>");
        document.meta = vec![("Report Date".to_string(), "2026-02-10".to_string())];
        let mut section = Section::new("1. Funnel");
        let mut table = Table::new(vec![Column::left("Cat"), Column::left("Stage"), Column::right("Att%")]);
        table.push(Row::new(vec![
            Cell::text("NEW LOGO").bold().with_row_span(2),
            "MQL".into(),
            Cell::toned("120%", Tone::Good),
        ]));
        table.push(Row::new(vec!["SQL".into(), Cell::toned("40%", Tone::Bad)]));
        section.table_or(table, "No funnel data");
        section.card(
            Card::new("AMER - Bottleneck: SQL")
                .with_badge("HIGH", Tone::Warning)
                .with_body("Reps <slow> to follow up & qualify")
                .with_action(Some("Tighten SLAs".to_string())),
        );
        section.placeholder("No risk pockets");
        document.sections.push(section);
        document.footer = "Generated 2026-02-10 08:30".to_string();
        document
    }

    #[test]
    fn test_escapes_free_text() {
        let html = render_html(&sample());
        assert!(html.contains("<title>Risk &lt;Report&gt;</title>"));
        assert!(html.contains("Reps &lt;slow&gt; to follow up &amp; qualify"));
        assert!(!html.contains("<slow>"));
        assert_eq!(html_escape("O'Brien \"x\""), "O&#39;Brien &quot;x&quot;");
    }

    #[test]
    fn test_row_spans_and_tones() {
        let html = render_html(&sample());
        assert!(html.contains("<td rowspan=\"2\"><strong>NEW LOGO</strong></td><td>MQL</td><td class=\"green right\">120%</td>"));
        assert!(html.contains("<tr><td>SQL</td><td class=\"red right\">40%</td></tr>"));
    }

    #[test]
    fn test_cards_placeholders_and_footer() {
        let html = render_html(&sample());
        assert!(html.contains("<span class=\"badge yellow\">HIGH</span>"));
        assert!(html.contains("<div class=\"action\">→ Tighten SLAs</div>"));
        assert!(html.contains("<p class=\"placeholder\">No risk pockets</p>"));
        assert!(html.contains("<div class=\"footer\"><p>Generated 2026-02-10 08:30</p></div>"));
        assert!(html.contains("<span>Report Date: 2026-02-10</span>"));
    }

    #[test]
    fn test_stat_tiles_and_bold_label_notes() {
        let mut document = Document::new("Risk");
        let mut section = Section::new("1. Executive Summary");
        section.key_values(vec![("Areas At Risk (RED)".to_string(), "2".to_string())]);
        section.paragraph(vec![Span::strong("Alert:"), Span::plain(" declining <MQL>")]);
        document.sections.push(section);

        let html = render_html(&document);
        assert!(html.contains("<ul class=\"kv\"><li><strong>Areas At Risk (RED):</strong> 2</li></ul>"));
        assert!(html.contains("<p><strong>Alert:</strong> declining &lt;MQL&gt;</p>"));
    }
}

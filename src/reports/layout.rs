//! Backend-neutral document model.
//!
//! Report builders assemble a [`Document`] once; the HTML and text renderers
//! walk it without knowing which report produced it. Cell text is stored
//! raw and escaped by the backend that needs it.

use crate::types::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub align: Align,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Left,
        }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Right,
        }
    }

    pub fn center(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Center,
        }
    }
}

/// A run of text, optionally emphasised
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub strong: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            strong: false,
        }
    }

    pub fn strong(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            strong: true,
        }
    }
}

pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub spans: Vec<Span>,
    pub tone: Option<Tone>,
    pub strong: bool,
    pub row_span: usize,
    pub col_span: usize,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_spans(vec![Span::plain(text)])
    }

    pub fn from_spans(spans: Vec<Span>) -> Self {
        Self {
            spans,
            tone: None,
            strong: false,
            row_span: 1,
            col_span: 1,
        }
    }

    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self::text(text).with_tone(tone)
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn bold(mut self) -> Self {
        self.strong = true;
        self
    }

    pub fn with_row_span(mut self, rows: usize) -> Self {
        self.row_span = rows.max(1);
        self
    }

    pub fn with_col_span(mut self, cols: usize) -> Self {
        self.col_span = cols.max(1);
        self
    }

    pub fn plain_text(&self) -> String {
        plain_text(&self.spans)
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::text(text)
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::text(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub emphasis: bool,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            emphasis: false,
        }
    }

    /// A totals-style row
    pub fn emphasised(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            emphasis: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain-text grid, one string per column, with spanned positions left blank
    pub fn grid(&self) -> Vec<Vec<String>> {
        let width = self.columns.len();
        let mut pending = vec![0usize; width];
        let mut lines = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let mut line = Vec::with_capacity(width);
            let mut cells = row.cells.iter();
            let mut col = 0;
            while col < width {
                if pending[col] > 0 {
                    pending[col] -= 1;
                    line.push(String::new());
                    col += 1;
                    continue;
                }
                match cells.next() {
                    Some(cell) => {
                        line.push(cell.plain_text());
                        if cell.row_span > 1 {
                            pending[col] = cell.row_span - 1;
                        }
                        for _ in 1..cell.col_span {
                            line.push(String::new());
                        }
                        col += cell.col_span;
                    }
                    None => {
                        line.push(String::new());
                        col += 1;
                    }
                }
            }
            line.truncate(width);
            lines.push(line);
        }
        lines
    }
}

/// A boxed callout: RCA insight, loss reason, advertising finding
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub badge: Option<(String, Tone)>,
    /// Paragraphs, in order
    pub body: Vec<String>,
    pub action: Option<String>,
    pub footer: Option<String>,
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            badge: None,
            body: Vec::new(),
            action: None,
            footer: None,
        }
    }

    pub fn with_badge(mut self, label: impl Into<String>, tone: Tone) -> Self {
        self.badge = Some((label.into(), tone));
        self
    }

    /// Append a paragraph; blank text is skipped
    pub fn with_body(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.body.push(text);
        }
        self
    }

    pub fn with_action(mut self, action: Option<String>) -> Self {
        self.action = action.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Subheading { text: String },
    Note { text: String },
    Paragraph { spans: Vec<Span> },
    Table { table: Table },
    Placeholder { text: String },
    Card { card: Card },
    KeyValues { pairs: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn subheading(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Subheading { text: text.into() });
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Note { text: text.into() });
    }

    pub fn paragraph(&mut self, spans: Vec<Span>) {
        self.blocks.push(Block::Paragraph { spans });
    }

    pub fn placeholder(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Placeholder { text: text.into() });
    }

    pub fn card(&mut self, card: Card) {
        self.blocks.push(Block::Card { card });
    }

    pub fn key_values(&mut self, pairs: Vec<(String, String)>) {
        self.blocks.push(Block::KeyValues { pairs });
    }

    /// Push the table, or the placeholder text when it has no rows
    pub fn table_or(&mut self, table: Table, empty: &str) {
        if table.is_empty() {
            self.placeholder(empty);
        } else {
            self.blocks.push(Block::Table { table });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub meta: Vec<(String, String)>,
    pub sections: Vec<Section>,
    pub footer: String,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            meta: Vec::new(),
            sections: Vec::new(),
            footer: String::new(),
        }
    }

    pub fn section_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_blanks_row_spanned_cells() {
        let mut table = Table::new(vec![Column::left("Category"), Column::left("Stage"), Column::right("Actual")]);
        table.push(Row::new(vec![Cell::text("NEW LOGO").with_row_span(2), "MQL".into(), "10".into()]));
        table.push(Row::new(vec!["SQL".into(), "4".into()]));
        table.push(Row::new(vec!["EXPANSION".into(), "EQL".into(), "3".into()]));

        assert_eq!(
            table.grid(),
            vec![
                vec!["NEW LOGO", "MQL", "10"],
                vec!["", "SQL", "4"],
                vec!["EXPANSION", "EQL", "3"],
            ]
        );
    }

    #[test]
    fn test_grid_pads_col_spans_and_short_rows() {
        let mut table = Table::new(vec![Column::left("Metric"), Column::right("Total"), Column::right("POR")]);
        table.push(Row::new(vec!["Hits / Misses".into(), Cell::text("2 on track / 1 need attention").with_col_span(2)]));
        table.push(Row::new(vec!["Only".into()]));

        assert_eq!(
            table.grid(),
            vec![
                vec!["Hits / Misses", "2 on track / 1 need attention", ""],
                vec!["Only", "", ""],
            ]
        );
    }

    #[test]
    fn test_empty_table_becomes_placeholder() {
        let mut section = Section::new("Pipeline");
        section.table_or(Table::new(vec![Column::left("Region")]), "No pipeline data");
        assert_eq!(
            section.blocks,
            vec![Block::Placeholder {
                text: "No pipeline data".to_string()
            }]
        );
    }

    #[test]
    fn test_card_drops_blank_action() {
        let card = Card::new("AMER")
            .with_body("Pipeline thin")
            .with_body("")
            .with_action(Some("  ".to_string()));
        assert!(card.action.is_none());
        assert_eq!(card.body, vec!["Pipeline thin".to_string()]);
        assert_eq!(plain_text(&[Span::strong("A: "), Span::plain("b")]), "A: b");
    }
}

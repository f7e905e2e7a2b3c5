//! Consolidated risk report: builds the section layout for one decoded
//! risk document. Section order is fixed; each optional subsection is gated
//! by a [`FeatureSet`] flag.

use super::features::{FeatureSet, ReportVersion};
use super::formatters::{
    coverage_tone, format_count, format_currency, format_multiple, format_percent, format_signed,
    trend_glyph, truncate_label, CurrencyStyle, GlyphSet, NullDisplay,
};
use super::layout::{Card, Cell, Column, Document, Row, Section, Span, Table};
use super::narrative::{enhanced_rca, funnel_narrative, Narrative, RcaSources};
use super::reducers::{
    all_attainment, displayed_tof_score, losses_by_product, losses_by_region, partition_hits_misses,
    pipeline_rows, risk_pockets, sort_funnel_by_category, sort_funnel_by_source, sort_worst_first,
    top_hits, top_loss_reasons, top_misses, visible_stages, ACTION_ITEMS_CAP,
};
use crate::payload::num;
use crate::payload::risk::{
    ActionItem, AttainmentRow, FunnelHealthRow, FunnelStageRow, MomentumRow, RiskReportDocument,
    SourceAttainmentRow, StageTrend, Totals, WinRow,
};
use crate::types::{Percent, RagStatus, Severity, Stage, Tone, Trend};
use chrono::NaiveDateTime;
use tracing::debug;

pub const DEFAULT_TITLE: &str = "Revenue Risk Analysis Report";

#[derive(Debug, Clone)]
pub struct RiskReportOptions {
    pub version: ReportVersion,
    pub features: FeatureSet,
    pub products: Vec<String>,
    pub regions: Vec<String>,
    pub title: String,
    pub missing_currency: NullDisplay,
    pub generated_at: NaiveDateTime,
}

impl Default for RiskReportOptions {
    fn default() -> Self {
        let version = ReportVersion::default();
        Self {
            version,
            features: version.features(),
            products: vec!["POR".to_string(), "R360".to_string()],
            regions: vec!["AMER".to_string(), "EMEA".to_string(), "APAC".to_string()],
            title: DEFAULT_TITLE.to_string(),
            missing_currency: NullDisplay::Zero,
            generated_at: NaiveDateTime::default(),
        }
    }
}

fn pct_tone(pct: Option<Percent>) -> Tone {
    RagStatus::classify(pct).tone()
}

fn pct0(pct: Option<Percent>) -> String {
    format_percent(pct, 0, NullDisplay::Zero)
}

fn severity_badge(severity: Option<&Severity>) -> (String, Tone) {
    match severity {
        Some(s) => (s.label().to_string(), s.tone()),
        None => ("MEDIUM".to_string(), Tone::Neutral),
    }
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

/// Week-over-week percent with one decimal; missing reads as zero
fn wow_pct(pct: Option<f64>) -> String {
    format_percent(pct.map(Percent), 1, NullDisplay::Zero)
}

/// `↓ -3 (-20.0%)`, toned by direction
fn wow_cell(stage: StageTrend) -> Cell {
    Cell::toned(
        format!(
            "{} {} ({})",
            trend_glyph(stage.trend, GlyphSet::Arrows),
            format_signed(stage.change),
            wow_pct(Some(stage.pct))
        ),
        stage.trend.tone(),
    )
    .bold()
}

fn trend_cell(trend: Trend, pct: Option<f64>) -> Cell {
    Cell::toned(
        format!("{} {}", trend_glyph(trend, GlyphSet::Arrows), wow_pct(pct)),
        trend.tone(),
    )
    .bold()
}

pub struct RiskReportBuilder<'a> {
    doc: &'a RiskReportDocument,
    options: &'a RiskReportOptions,
    money: CurrencyStyle,
}

impl<'a> RiskReportBuilder<'a> {
    pub fn new(doc: &'a RiskReportDocument, options: &'a RiskReportOptions) -> Self {
        Self {
            doc,
            options,
            money: CurrencyStyle::WHOLE.with_null(options.missing_currency),
        }
    }

    fn features(&self) -> &FeatureSet {
        &self.options.features
    }

    fn products(&self) -> &[String] {
        &self.options.products
    }

    fn money(&self, value: Option<f64>) -> String {
        format_currency(value, self.money)
    }

    fn version_label(&self) -> String {
        self.doc
            .query_version
            .clone()
            .unwrap_or_else(|| self.options.version.to_string())
    }

    fn progress(&self) -> String {
        let period = &self.doc.period;
        format!(
            "{:.1}% ({}/{} days)",
            period.quarter_pct_complete.map_or(0.0, Percent::value),
            period.days_elapsed(),
            period.total_days()
        )
    }

    pub fn build(&self) -> Document {
        let mut document = Document::new(self.options.title.clone());
        document.meta = vec![
            ("Report Date".to_string(), self.doc.period.as_of().to_string()),
            ("Q1 Progress".to_string(), self.progress()),
            ("Version".to_string(), self.version_label()),
        ];

        let mut sections = vec![
            self.executive_summary(),
            self.attainment(),
            self.funnel_detail(),
            self.root_cause_analysis(),
            self.pipeline(),
            self.loss_analysis(),
            self.advertising(),
        ];
        if let Some(actions) = self.action_items() {
            sections.push(actions);
        }

        for (index, mut section) in sections.into_iter().enumerate() {
            if section.is_empty() {
                debug!("Section {} has no content", section.title);
                section.placeholder("No data available for this section.");
            }
            section.title = format!("{}. {}", index + 1, section.title);
            document.sections.push(section);
        }

        document.footer = format!(
            "Generated {} | Version {} | Data as of {}",
            self.options.generated_at.format("%Y-%m-%d %H:%M"),
            self.version_label(),
            self.doc.period.as_of()
        );
        document
    }

    fn executive_summary(&self) -> Section {
        let mut section = Section::new("Executive Summary");
        let features = *self.features();
        if features.executive_counts {
            let counts = &self.doc.executive_counts;
            let tiles = [
                ("Areas Exceeding Target", counts.areas_exceeding_target),
                ("Areas At Risk (RED)", counts.areas_at_risk),
                ("Needs Attention (YELLOW)", counts.areas_needing_attention),
                ("Areas With Momentum", counts.areas_with_momentum),
            ];
            section.key_values(
                tiles
                    .into_iter()
                    .map(|(label, count)| (label.to_string(), count.unwrap_or(0).to_string()))
                    .collect(),
            );
        }

        let mut columns = vec![Column::left("Metric"), Column::right("Total")];
        columns.extend(self.products().iter().map(|p| Column::right(p.as_str())));
        let mut table = Table::new(columns);

        let mut totals: Vec<Totals> = vec![self.doc.grand_total.clone()];
        totals.extend(self.products().iter().map(|p| self.doc.product_totals(p)));

        let money_rows: [(&str, fn(&Totals) -> Option<f64>, bool); 3] = [
            ("Q1 Target", |t| t.total_q1_target, false),
            ("QTD Target", |t| t.total_qtd_target, false),
            ("QTD Actual", |t| t.total_qtd_acv, true),
        ];
        for (label, pick, strong) in money_rows {
            let mut cells = vec![Cell::text(label)];
            for t in &totals {
                let cell = Cell::text(self.money(pick(t)));
                cells.push(if strong { cell.bold() } else { cell });
            }
            table.push(Row::new(cells));
        }

        let mut attainment = vec![Cell::text("QTD Attainment")];
        let mut q1_progress = vec![Cell::text("Q1 Progress")];
        let mut coverage = vec![Cell::text("Pipeline Coverage")];
        let mut win_rate = vec![Cell::text("Win Rate")];
        for t in &totals {
            let att = t.attainment();
            attainment.push(Cell::toned(pct0(att), pct_tone(att)).bold());
            q1_progress.push(Cell::text(pct0(t.total_q1_progress_pct)));
            let cov = num(t.total_pipeline_coverage_x);
            coverage.push(Cell::toned(format_multiple(cov, 1), coverage_tone(cov)));
            win_rate.push(Cell::text(pct0(t.total_win_rate_pct)));
        }
        table.push(Row::new(attainment));
        if features.q1_progress {
            table.push(Row::new(q1_progress));
        }
        table.push(Row::new(coverage));
        table.push(Row::new(win_rate));

        let (hits, misses) = partition_hits_misses(all_attainment(self.doc, self.products()));
        table.push(Row::new(vec![
            Cell::text("Hits / Misses"),
            Cell::from_spans(vec![
                Span::strong(hits.len().to_string()),
                Span::plain(" on track / "),
                Span::strong(misses.len().to_string()),
                Span::plain(" need attention"),
            ])
            .with_col_span(totals.len()),
        ]));

        section.table_or(table, "No summary data");

        if features.wins_bright_spots {
            self.wins(&mut section);
        }
        if features.momentum_indicators {
            self.momentum(&mut section);
        }
        section
    }

    fn wins(&self, section: &mut Section) {
        let wins: Vec<&WinRow> = self
            .products()
            .iter()
            .flat_map(|p| RiskReportDocument::rows(&self.doc.wins_bright_spots, p))
            .collect();
        if wins.is_empty() {
            return;
        }
        section.subheading("Wins & Bright Spots");
        section.note("Areas pacing at or above 100% of target - celebrating strong performance!");
        for win in wins {
            let mut stats = format!(
                "{} of {} target | Win Rate: {} | Pipeline: {}",
                self.money(win.qtd_acv),
                self.money(win.qtd_target),
                pct0(win.win_rate_pct),
                format_multiple(num(win.pipeline_coverage_x), 1)
            );
            if let Some(factor) = non_blank(&win.contributing_factor) {
                stats.push_str(&format!(" | {}", factor));
            }
            section.card(
                Card::new(format!("{} - {} {}", win.product, win.region, win.category))
                    .with_badge(pct0(win.qtd_attainment_pct), Tone::Good)
                    .with_body(stats)
                    .with_body(win.success_commentary.clone().unwrap_or_default()),
            );
        }
    }

    fn momentum(&self, section: &mut Section) {
        let rows: Vec<&MomentumRow> = self
            .products()
            .iter()
            .flat_map(|p| RiskReportDocument::rows(&self.doc.momentum_indicators, p))
            .filter(|m| m.is_reportable())
            .collect();
        if rows.is_empty() {
            return;
        }
        section.subheading("Momentum Indicators");
        section.paragraph(vec![
            Span::strong("Positive Trends:"),
            Span::plain(" Areas showing improving week-over-week performance even if not yet at target."),
        ]);
        let mut table = Table::new(vec![
            Column::left("Product"),
            Column::left("Region"),
            Column::center("Momentum"),
            Column::right("MQL Trend"),
            Column::right("SQL Trend"),
            Column::left("Commentary"),
        ]);
        for row in rows {
            let tier_tone = if row.momentum_tier.as_deref() == Some(MomentumRow::STRONG) {
                Tone::Good
            } else {
                Tone::Neutral
            };
            table.push(Row::new(vec![
                row.product.as_str().into(),
                row.region.as_str().into(),
                Cell::toned(row.tier_label(), tier_tone),
                trend_cell(row.mql_trend, row.mql_wow_pct),
                trend_cell(row.sql_trend, row.sql_wow_pct),
                non_blank(&row.momentum_commentary).unwrap_or("").into(),
            ]));
        }
        section.table_or(table, "No momentum data");
    }

    fn attainment(&self) -> Section {
        let mut section = Section::new("Attainment by Region & Product");
        for product in self.products() {
            section.subheading(format!("{} (sorted worst → best)", product));
            let rows = RiskReportDocument::rows(&self.doc.attainment_detail, product);
            let mut table = Table::new(vec![
                Column::left("Region"),
                Column::left("Cat"),
                Column::right("Q1 Tgt"),
                Column::right("QTD Act"),
                Column::right("Att%"),
                Column::right("Gap"),
                Column::right("Pipe"),
                Column::right("Cov"),
                Column::right("Win%"),
                Column::center("RAG"),
            ]);
            for row in sort_worst_first(rows, AttainmentRow::attainment) {
                let rag = row.rag();
                let gap = row.gap();
                table.push(Row::new(vec![
                    row.region.as_str().into(),
                    row.category.as_str().into(),
                    self.money(row.q1_target).into(),
                    self.money(row.qtd_acv).into(),
                    Cell::toned(pct0(row.attainment()), rag.tone()),
                    Cell::toned(self.money(Some(gap)), Tone::of_sign(gap)),
                    self.money(row.pipeline_acv).into(),
                    format_multiple(num(row.pipeline_coverage_x), 1).into(),
                    pct0(row.win_rate_pct).into(),
                    Cell::toned(rag.as_str(), rag.tone()),
                ]));
            }
            section.table_or(table, "No attainment data");
        }

        if self.features().top_risk_pockets {
            section.subheading("Top Risk Pockets");
            section.note("Areas requiring immediate attention, sorted by gap to QTD target.");
            let mut table = Table::new(vec![
                Column::left("Product"),
                Column::left("Region"),
                Column::left("Category"),
                Column::right("QTD Target"),
                Column::right("QTD Actual"),
                Column::right("Gap"),
                Column::right("Attainment"),
                Column::right("Win Rate"),
                Column::right("Pipeline"),
                Column::right("Coverage"),
                Column::center("Status"),
            ]);
            for pocket in risk_pockets(self.doc, self.products()) {
                let rag = pocket.rag();
                table.push(Row::new(vec![
                    pocket.product.as_str().into(),
                    pocket.region.as_str().into(),
                    pocket.category.as_str().into(),
                    self.money(pocket.qtd_target).into(),
                    self.money(pocket.qtd_acv).into(),
                    Cell::toned(self.money(Some(pocket.gap())), Tone::Bad),
                    format_percent(pocket.attainment(), 1, NullDisplay::NotAvailable).into(),
                    format_percent(pocket.win_rate_pct, 1, NullDisplay::NotAvailable).into(),
                    self.money(pocket.pipeline_acv).into(),
                    format_multiple(num(pocket.pipeline_coverage_x), 1).into(),
                    Cell::toned(rag.as_str(), rag.tone()),
                ]));
            }
            section.table_or(table, "No risk pockets");
        }
        section
    }

    fn funnel_detail(&self) -> Section {
        let mut section = Section::new("Funnel Detail");
        let features = *self.features();
        if features.funnel_pacing {
            self.funnel_pacing(&mut section);
        }
        if features.funnel_health {
            self.funnel_health(&mut section);
        }
        if features.funnel_trends {
            self.funnel_trends(&mut section);
        }
        if features.source_attainment {
            self.source_attainment(&mut section);
        }
        if features.funnel_by_category {
            section.subheading("Full Funnel Attainment by Category (EQL/MQL → SQO)");
            section.note(
                "EQL for EXPANSION/MIGRATION, MQL for NEW LOGO | TOF Score: weighted attainment (EQL/MQL=10%, SQL=20%, SAL=30%, SQO=40%)",
            );
            for product in self.products() {
                let rows = RiskReportDocument::rows(&self.doc.funnel_by_category, product);
                section.subheading(product.as_str());
                section.table_or(self.stage_table(&sort_funnel_by_category(rows), false), "No funnel data");
            }
        }
        if features.funnel_by_source {
            section.subheading("Full Funnel Attainment by Category & Source (EQL/MQL → SQO)");
            section.note("Only INBOUND carries EQL/MQL targets");
            for product in self.products() {
                let rows = RiskReportDocument::rows(&self.doc.funnel_by_source, product);
                section.subheading(product.as_str());
                section.table_or(self.stage_table(&sort_funnel_by_source(rows), true), "No funnel data");
            }
        }
        if features.funnel_narrative {
            self.narratives(&mut section);
        }
        section
    }

    fn funnel_trends(&self, section: &mut Section) {
        section.subheading("Funnel Trend Analysis (Week-over-Week)");
        section.paragraph(vec![
            Span::strong("Historical comparison:"),
            Span::plain(" Current 7-day period vs prior 7-day period to identify momentum shifts."),
        ]);
        let mut columns = vec![Column::left("Product"), Column::left("Region")];
        for stage in Stage::ALL {
            columns.push(Column::right(format!("{} (7d)", stage.label())));
            columns.push(Column::right(format!("{} Prior", stage.label())));
            columns.push(Column::right(format!("{} WoW", stage.label())));
        }
        let mut table = Table::new(columns);
        for product in self.products() {
            for row in RiskReportDocument::rows(&self.doc.funnel_trends, product) {
                let mut cells: Vec<Cell> = vec![product.as_str().into(), row.region.as_str().into()];
                for stage in Stage::ALL {
                    let trend = row.get(stage);
                    cells.push(format_count(trend.current).into());
                    cells.push(format_count(trend.prior).into());
                    cells.push(wow_cell(trend));
                }
                table.push(Row::new(cells));
            }
        }
        section.table_or(table, "No week-over-week trend data");
    }

    fn funnel_pacing(&self, section: &mut Section) {
        section.subheading("Inbound Funnel Pacing");
        section.note("MQL targets are INBOUND channel only.");
        for product in self.products() {
            section.subheading(format!("{} Funnel Pacing", product));
            let mut columns = vec![Column::left("Region")];
            for stage in Stage::ALL {
                columns.push(Column::right(format!("{} Actual", stage.label())));
                columns.push(Column::right(format!("{} Target", stage.label())));
                columns.push(Column::right(format!("{} %", stage.label())));
            }
            let mut table = Table::new(columns);
            for row in RiskReportDocument::rows(&self.doc.funnel_pacing, product) {
                let mut cells = vec![Cell::text(row.region.as_str())];
                for stage in Stage::ALL {
                    let (actual, target, pacing, rag) = row.stage(stage);
                    cells.push(format_count(actual).into());
                    cells.push(format_count(target).into());
                    cells.push(Cell::toned(pct0(pacing), rag.tone()));
                }
                table.push(Row::new(cells));
            }
            section.table_or(table, "No funnel data");
        }
    }

    fn funnel_health(&self, section: &mut Section) {
        let mut conversions = Table::new({
            let mut columns = vec![Column::left("Product"), Column::left("Region")];
            for (label, _, _) in FunnelHealthRow::default().conversions() {
                columns.push(Column::right(format!("{} Actual", label)));
                columns.push(Column::right(format!("{} Target", label)));
                columns.push(Column::right("Gap"));
            }
            columns
        });

        for product in self.products() {
            let rows = RiskReportDocument::rows(&self.doc.funnel_health, product);
            if rows.is_empty() {
                continue;
            }
            section.subheading(format!("{} Funnel Health by Region", product));
            let mut columns = vec![Column::left("Region")];
            for stage in Stage::ALL {
                columns.push(Column::right(stage.label()));
                columns.push(Column::right(format!("{} Gap", stage.label())));
            }
            columns.push(Column::left("Bottleneck"));
            let mut table = Table::new(columns);

            for row in rows {
                let mut cells = vec![Cell::text(row.region.as_str())];
                for stage in Stage::ALL {
                    let m = row.stages.get(stage);
                    cells.push(Cell::toned(
                        format!("{} / {} ({})", format_count(m.actual), format_count(m.qtd_target), pct0(m.pacing)),
                        pct_tone(m.pacing),
                    ));
                    cells.push(Cell::toned(format_signed(m.gap), Tone::of_sign(m.gap)));
                }
                cells.push(Cell::text(row.primary_bottleneck.as_deref().unwrap_or("N/A")).bold());
                table.push(Row::new(cells));

                let mut conversion = vec![Cell::text(product.as_str()), Cell::text(row.region.as_str())];
                for (_, actual, target) in row.conversions() {
                    let a = actual.map_or(0.0, Percent::value);
                    let t = target.map_or(0.0, Percent::value);
                    let gap = a - t;
                    let tone = if gap < -5.0 {
                        Tone::Bad
                    } else if gap > 0.0 {
                        Tone::Good
                    } else {
                        Tone::Neutral
                    };
                    conversion.push(format!("{:.1}%", a).into());
                    conversion.push(format!("{:.1}%", t).into());
                    conversion.push(Cell::toned(format!("{:+.1}%", gap), tone));
                }
                conversions.push(Row::new(conversion));
            }
            section.table_or(table, "No funnel data");
        }

        if !conversions.is_empty() {
            section.subheading("Conversion Rate Analysis: Actual vs Target");
            section.table_or(conversions, "No funnel data");
        }
    }

    fn source_attainment(&self, section: &mut Section) {
        let period = &self.doc.period;
        for product in self.products() {
            section.subheading(format!("{} ACV by Source (sorted worst → best)", product));
            section.note(format!(
                "As of {} ({:.1}% Q1 - Day {}/{})",
                period.as_of(),
                period.quarter_pct_complete.map_or(0.0, Percent::value),
                period.days_elapsed(),
                period.total_days()
            ));
            let rows = RiskReportDocument::rows(&self.doc.source_attainment, product);
            let mut table = Table::new(vec![
                Column::left("Region"),
                Column::left("Source"),
                Column::right("Q1 Tgt"),
                Column::right("QTD Tgt"),
                Column::right("QTD Act"),
                Column::right("Att%"),
                Column::right("Gap"),
                Column::center("RAG"),
            ]);
            for row in sort_worst_first(rows, SourceAttainmentRow::attainment) {
                let rag = row.rag();
                let gap = num(row.gap);
                table.push(Row::new(vec![
                    row.region.as_str().into(),
                    row.source.as_str().into(),
                    self.money(row.q1_target).into(),
                    self.money(row.qtd_target).into(),
                    self.money(row.qtd_acv).into(),
                    Cell::toned(pct0(row.attainment()), pct_tone(row.attainment())),
                    Cell::toned(self.money(Some(gap)), Tone::of_sign(gap)),
                    Cell::toned(rag.as_str(), rag.tone()),
                ]));
            }
            section.table_or(table, "No source data");
        }
    }

    /// One row group per funnel row, spanning the stages that carry a Q1 target
    fn stage_table(&self, rows: &[&FunnelStageRow], with_source: bool) -> Table {
        let mut columns = vec![Column::left("Cat")];
        if with_source {
            columns.push(Column::left("Source"));
        }
        columns.extend([
            Column::left("Region"),
            Column::right("TOF Score"),
            Column::left("Stage"),
            Column::right("Q1 Tgt"),
            Column::right("QTD Tgt"),
            Column::right("Actual"),
            Column::right("Att%"),
            Column::right("Gap"),
        ]);
        let mut table = Table::new(columns);

        for row in rows {
            let stages = visible_stages(row);
            let span = stages.len();
            for (i, visible) in stages.iter().enumerate() {
                let m = visible.metrics;
                let mut cells = Vec::new();
                if i == 0 {
                    let score = displayed_tof_score(row);
                    cells.push(Cell::text(row.category.as_str()).bold().with_row_span(span));
                    if with_source {
                        cells.push(Cell::text(row.source.as_str()).bold().with_row_span(span));
                    }
                    cells.push(Cell::text(row.region.as_str()).with_row_span(span));
                    cells.push(
                        Cell::toned(pct0(Some(score)), pct_tone(Some(score)))
                            .bold()
                            .with_row_span(span),
                    );
                }
                cells.extend([
                    Cell::text(visible.label),
                    format!("{:.0}", m.q1_target).into(),
                    format!("{:.0}", m.qtd_target).into(),
                    format!("{:.0}", m.actual).into(),
                    Cell::toned(pct0(m.pacing), pct_tone(m.pacing)),
                    Cell::toned(format_signed(m.gap), Tone::of_sign(m.gap)),
                ]);
                table.push(Row::new(cells));
            }
        }
        table
    }

    fn narratives(&self, section: &mut Section) {
        section.subheading("Funnel Analysis by Region");
        section.note("Strengths, weaknesses, and loss analysis by region/product");
        for product in self.products() {
            section.subheading(product.as_str());
            let mut table = Table::new(vec![Column::left("Region"), Column::left("Analysis")]);
            for region in &self.options.regions {
                let narrative = funnel_narrative(
                    region,
                    RiskReportDocument::rows(&self.doc.funnel_by_category, product),
                    RiskReportDocument::rows(&self.doc.funnel_by_source, product),
                    RiskReportDocument::rows(&self.doc.loss_reason_rca, product),
                );
                table.push(Row::new(vec![
                    Cell::text(region.as_str()).bold(),
                    Cell::from_spans(narrative_spans(&narrative)),
                ]));
            }
            section.table_or(table, "No funnel data");
        }
    }

    fn root_cause_analysis(&self) -> Section {
        let mut section = Section::new("Root Cause Analysis");
        let features = *self.features();

        if features.funnel_rca_cards {
            for product in self.products() {
                let insights = RiskReportDocument::rows(&self.doc.funnel_rca_insights, product);
                if insights.is_empty() {
                    continue;
                }
                section.subheading(format!("{} Funnel RCA", product));
                for insight in insights {
                    let (label, tone) = severity_badge(insight.severity.as_ref());
                    let pacing: Vec<String> = Stage::ALL
                        .iter()
                        .map(|&s| format!("{} {}", s.label(), pct0(insight.stages.get(s).pacing)))
                        .collect();
                    section.card(
                        Card::new(format!(
                            "{} - Bottleneck: {}",
                            insight.region,
                            insight.primary_bottleneck.as_deref().unwrap_or("N/A")
                        ))
                        .with_badge(label, tone)
                        .with_body(insight.rca_commentary.clone().unwrap_or_default())
                        .with_action(insight.recommended_action.clone())
                        .with_footer(format!("Pacing: {}", pacing.join(" | "))),
                    );
                }
            }
        }

        if features.hits_misses {
            self.hits_and_misses(&mut section);
        }

        if features.loss_reason_rca_cards {
            for product in self.products() {
                section.subheading(format!("{} Loss Reason RCA", product));
                let rows = RiskReportDocument::rows(&self.doc.loss_reason_rca, product);
                if rows.is_empty() {
                    section.placeholder("No significant loss reasons to analyze this quarter.");
                    continue;
                }
                for row in rows {
                    let (label, tone) = severity_badge(row.severity.as_ref());
                    section.card(
                        Card::new(format!("{} - {}", row.region, row.reason()))
                            .with_badge(label, tone)
                            .with_body(row.rca_commentary.clone().unwrap_or_default())
                            .with_action(row.recommended_action.clone())
                            .with_footer(format!(
                                "{} deals | {} lost | {:.1}% of regional losses | Action: {}",
                                format_count(num(row.deal_count)),
                                self.money(row.lost_acv),
                                row.pct_of_regional_loss.map_or(0.0, Percent::value),
                                row.action_category.as_deref().unwrap_or("PROCESS_REVIEW")
                            )),
                    );
                }
            }
        }

        if features.trend_rca {
            self.trend_rca(&mut section);
        }
        section
    }

    fn trend_rca(&self, section: &mut Section) {
        let rows: Vec<_> = self
            .products()
            .iter()
            .flat_map(|p| RiskReportDocument::rows(&self.doc.trend_rca, p))
            .collect();
        if rows.is_empty() {
            return;
        }
        section.subheading("Trend Analysis RCA");
        section.paragraph(vec![
            Span::strong("Alert:"),
            Span::plain(" Areas showing declining week-over-week trends requiring investigation."),
        ]);
        let mut table = Table::new(vec![
            Column::left("Product"),
            Column::left("Region"),
            Column::right("Declining Stages"),
            Column::right("MQL WoW"),
            Column::right("SQL WoW"),
            Column::center("Severity"),
            Column::left("RCA Commentary"),
            Column::left("Recommended Action"),
        ]);
        for row in rows {
            let declining = row.declining_stage_count.unwrap_or(0);
            let (severity, tone) = severity_badge(row.severity.as_ref());
            let mql = num(row.mql_wow_pct);
            let sql = num(row.sql_wow_pct);
            table.push(Row::new(vec![
                row.product.as_str().into(),
                row.region.as_str().into(),
                format!("{} stage{}", declining, if declining == 1 { "" } else { "s" }).into(),
                Cell::toned(format!("{:+.0}%", mql), Tone::of_sign(mql)),
                Cell::toned(format!("{:+.0}%", sql), Tone::of_sign(sql)),
                Cell::toned(severity, tone).bold(),
                non_blank(&row.rca_commentary).unwrap_or("").into(),
                non_blank(&row.recommended_action).unwrap_or("").into(),
            ]));
        }
        section.table_or(table, "No declining trends");
    }

    fn hits_and_misses(&self, section: &mut Section) {
        let (hits, misses) = partition_hits_misses(all_attainment(self.doc, self.products()));

        if !hits.is_empty() {
            section.subheading("HITS - On Track");
            let mut table = Table::new(vec![
                Column::left("Prod"),
                Column::left("Region"),
                Column::left("Cat"),
                Column::right("Att%"),
                Column::right("QTD Act"),
                Column::right("Cov"),
                Column::right("Win%"),
            ]);
            for hit in top_hits(&hits) {
                table.push(Row::new(vec![
                    hit.product.as_str().into(),
                    hit.region.as_str().into(),
                    hit.category.as_str().into(),
                    Cell::toned(pct0(hit.attainment()), Tone::Good).bold(),
                    self.money(hit.qtd_acv).into(),
                    format_multiple(num(hit.pipeline_coverage_x), 1).into(),
                    pct0(hit.win_rate_pct).into(),
                ]));
            }
            section.table_or(table, "No hits");
        }

        if !misses.is_empty() {
            section.subheading("MISSES - Needs Attention");
            let mut table = Table::new(vec![
                Column::left("Prod"),
                Column::left("Region"),
                Column::left("Cat"),
                Column::right("Att%"),
                Column::right("Gap"),
                Column::right("Cov"),
                Column::left("RCA / Action (incl. funnel & loss analysis)"),
            ]);
            for miss in top_misses(&misses) {
                let product = miss.product.as_str();
                let sources = RcaSources {
                    category_rows: RiskReportDocument::rows(&self.doc.funnel_by_category, product),
                    source_rows: RiskReportDocument::rows(&self.doc.funnel_by_source, product),
                    loss_rows: RiskReportDocument::rows(&self.doc.loss_reason_rca, product),
                    pipeline_rows: RiskReportDocument::rows(&self.doc.pipeline_rca, product),
                    funnel_rca: RiskReportDocument::rows(&self.doc.funnel_rca_insights, product),
                };
                let summary = enhanced_rca(&miss.region, &sources);
                let tone = if miss.rag() == RagStatus::Yellow {
                    Tone::Warning
                } else {
                    Tone::Bad
                };
                table.push(Row::new(vec![
                    product.into(),
                    miss.region.as_str().into(),
                    miss.category.as_str().into(),
                    Cell::toned(pct0(miss.attainment()), tone).bold(),
                    Cell::toned(self.money(Some(miss.gap())), Tone::Bad),
                    format_multiple(num(miss.pipeline_coverage_x), 1).into(),
                    summary.to_string().into(),
                ]));
            }
            section.table_or(table, "No misses");
        }
    }

    fn pipeline(&self) -> Section {
        let mut section = Section::new("Pipeline Coverage by Region & Product");
        let rows = pipeline_rows(self.doc, self.products());
        let mut table = Table::new(vec![
            Column::left("Region"),
            Column::left("Prod"),
            Column::left("Cat"),
            Column::right("Pipe"),
            Column::right("Cov"),
            Column::right("Age"),
            Column::center("Health"),
        ]);
        for row in &rows {
            let coverage = num(row.pipeline_coverage_x);
            let (health, health_tone) = match &row.pipeline_health {
                Some(h) => (h.label().to_string(), h.tone()),
                None => ("UNKNOWN".to_string(), Tone::Bad),
            };
            table.push(Row::new(vec![
                row.region.as_str().into(),
                row.product.as_str().into(),
                row.category.as_str().into(),
                self.money(row.pipeline_acv).into(),
                Cell::toned(format_multiple(coverage, 1), coverage_tone(coverage)),
                format!("{:.0} days", num(row.pipeline_avg_age_days)).into(),
                Cell::toned(health, health_tone),
            ]));
        }
        section.table_or(table, "No pipeline data");

        if self.features().pipeline_commentary {
            let issues: Vec<_> = rows
                .iter()
                .filter(|r| r.severity.as_ref().is_some_and(Severity::is_actionable))
                .collect();
            if !issues.is_empty() {
                section.subheading("Pipeline Issues");
                section.note("Pipeline health and coverage analysis with root cause insights.");
                let mut table = Table::new(vec![
                    Column::left("Product"),
                    Column::left("Region"),
                    Column::left("Category"),
                    Column::right("Pipeline"),
                    Column::right("Coverage"),
                    Column::center("Severity"),
                    Column::left("RCA Commentary"),
                ]);
                for row in issues {
                    let (severity, tone) = severity_badge(row.severity.as_ref());
                    table.push(Row::new(vec![
                        row.product.as_str().into(),
                        row.region.as_str().into(),
                        row.category.as_str().into(),
                        self.money(row.pipeline_acv).into(),
                        format_multiple(num(row.pipeline_coverage_x), 1).into(),
                        Cell::toned(severity, tone).bold(),
                        non_blank(&row.rca_commentary).unwrap_or("").into(),
                    ]));
                }
                section.table_or(table, "No pipeline issues");
            }
        }
        section
    }

    fn loss_analysis(&self) -> Section {
        let mut section = Section::new("Lost Opportunities Analysis");
        let features = *self.features();

        if features.loss_reasons_by_product {
            for product in self.products() {
                let rows = RiskReportDocument::rows(&self.doc.loss_reasons, product);
                if rows.is_empty() {
                    section.placeholder(format!("No lost deals recorded for {} this quarter.", product));
                    continue;
                }
                section.subheading(format!("{} Loss Reasons", product));
                let mut table = Table::new(vec![
                    Column::left("Region"),
                    Column::left("Loss Reason"),
                    Column::right("Deal Count"),
                    Column::right("Lost ACV"),
                ]);
                for row in rows {
                    table.push(Row::new(vec![
                        row.region.as_str().into(),
                        row.reason().into(),
                        format_count(num(row.deal_count)).into(),
                        self.money(row.lost_acv).into(),
                    ]));
                }
                section.table_or(table, "No lost deals recorded");
            }
        }

        if features.lost_opportunities {
            self.lost_opportunities(&mut section);
        }
        section
    }

    fn lost_opportunities(&self, section: &mut Section) {
        let by_product = losses_by_product(self.doc, self.products());
        let by_region = losses_by_region(self.doc, self.products());
        let reasons = top_loss_reasons(self.doc, self.products());

        let nothing_lost = by_product.iter().all(|p| p.deals == 0.0 && p.acv == 0.0)
            && by_region.iter().all(|r| r.total_acv() == 0.0)
            && reasons.is_empty();
        if nothing_lost {
            section.placeholder("No lost deals recorded");
            return;
        }

        section.subheading("Lost Deals by Product");
        let mut table = Table::new(vec![
            Column::left("Product"),
            Column::right("Deals Lost"),
            Column::right("ACV Lost"),
            Column::right("Avg Deal Size"),
        ]);
        for row in &by_product {
            let cells = vec![
                Cell::text(row.product.as_str()),
                format_count(row.deals).into(),
                Cell::toned(self.money(Some(row.acv)), Tone::Bad),
                self.money(Some(row.avg_deal)).into(),
            ];
            table.push(if row.product == "TOTAL" {
                Row::emphasised(cells)
            } else {
                Row::new(cells)
            });
        }
        section.table_or(table, "No lost deals recorded");

        section.subheading("Lost Deals by Region (sorted by ACV lost)");
        let mut columns = vec![Column::left("Region")];
        for product in self.products() {
            columns.push(Column::right(format!("{} Deals", product)));
            columns.push(Column::right(format!("{} ACV", product)));
        }
        columns.push(Column::right("Total ACV"));
        let mut table = Table::new(columns);
        for region in &by_region {
            let mut cells = vec![Cell::text(region.region.as_str())];
            for (deals, acv) in &region.by_product {
                cells.push(format_count(*deals).into());
                cells.push(self.money(Some(*acv)).into());
            }
            cells.push(Cell::toned(self.money(Some(region.total_acv())), Tone::Bad).bold());
            table.push(Row::new(cells));
        }
        section.table_or(table, "No lost deals recorded");

        section.subheading("Top Loss Reasons (sorted by ACV impact)");
        let mut table = Table::new(vec![
            Column::left("Prod"),
            Column::left("Region"),
            Column::left("Reason"),
            Column::right("Deals"),
            Column::right("ACV Lost"),
            Column::center("Severity"),
        ]);
        for row in reasons {
            let severity = row.severity.clone().unwrap_or(Severity::Low);
            let cell = match severity {
                Severity::Critical => Cell::toned(severity.label(), Tone::Bad),
                Severity::High => Cell::toned(severity.label(), Tone::Warning),
                _ => Cell::text(severity.label()),
            };
            table.push(Row::new(vec![
                row.product.as_str().into(),
                row.region.as_str().into(),
                truncate_label(row.reason()).into(),
                format_count(num(row.deal_count)).into(),
                Cell::toned(self.money(row.lost_acv), Tone::Bad),
                cell,
            ]));
        }
        section.table_or(table, "No lost deals recorded");
    }

    fn advertising(&self) -> Section {
        let mut section = Section::new("Google Ads Performance");
        let mut table = Table::new(vec![
            Column::left("Prod"),
            Column::right("Impr"),
            Column::right("Clicks"),
            Column::right("CTR"),
            Column::right("Spend"),
            Column::right("CPC"),
            Column::right("Conv"),
            Column::right("CPA"),
        ]);
        let cents = CurrencyStyle::WHOLE.with_decimals(2);
        for product in self.products() {
            let Some(ads) = self.doc.google_ads.get(product) else {
                continue;
            };
            table.push(Row::new(vec![
                product.as_str().into(),
                format_count(num(ads.impressions)).into(),
                format_count(num(ads.clicks)).into(),
                format_percent(ads.ctr_pct, 2, NullDisplay::Zero).into(),
                self.money(ads.ad_spend_usd).into(),
                format_currency(ads.cpc_usd, cents).into(),
                format_count(num(ads.conversions)).into(),
                format_currency(ads.cpa_usd, CurrencyStyle::WHOLE).into(),
            ]));
        }
        section.table_or(table, "No advertising data");

        for product in self.products() {
            let Some(rca) = self.doc.google_ads_rca.get(product).filter(|r| !r.is_empty()) else {
                continue;
            };
            section.card(
                Card::new(format!("{} Google Ads", product))
                    .with_body(format!(
                        "CTR {} ({}) | CPC {} | CPA {} ({})",
                        format_percent(rca.ctr_pct, 2, NullDisplay::Zero),
                        rca.ctr_performance.as_deref().unwrap_or(""),
                        format_currency(rca.cpc_usd, cents),
                        format_currency(rca.cpa_usd, CurrencyStyle::WHOLE),
                        rca.cpa_performance.as_deref().unwrap_or("")
                    ))
                    .with_body(rca.rca_commentary.clone().unwrap_or_default())
                    .with_action(rca.recommended_action.clone()),
            );
        }
        section
    }

    fn action_items(&self) -> Option<Section> {
        let items = &self.doc.action_items;
        if !self.features().action_items || items.is_empty() {
            return None;
        }
        let mut section = Section::new("Recommended Action Items");
        section.note("Consolidated action items from all analyses, grouped by urgency.");
        let groups = [
            ("IMMEDIATE (This Week)", items.immediate.as_slice()),
            ("SHORT-TERM (This Month)", items.short_term.as_slice()),
            ("STRATEGIC (This Quarter)", items.strategic.as_slice()),
        ];
        for (label, group) in groups {
            if group.is_empty() {
                continue;
            }
            section.subheading(label);
            for item in group.iter().take(ACTION_ITEMS_CAP) {
                section.card(action_card(item));
            }
        }
        Some(section)
    }
}

fn action_card(item: &ActionItem) -> Card {
    let title: Vec<&str> = [
        non_blank(&item.product),
        Some(non_blank(&item.region).unwrap_or("All Regions")),
        non_blank(&item.category),
    ]
    .into_iter()
    .flatten()
    .collect();
    let mut card = Card::new(title.join(" | "))
        .with_body(item.issue.clone().unwrap_or_default())
        .with_action(item.action.clone());
    if let Some(severity) = &item.severity {
        card = card.with_badge(severity.label(), severity.tone());
    }
    card
}

/// `Label:` prefixes in bold, parts separated by ` | `
pub fn narrative_spans(narrative: &Narrative) -> Vec<Span> {
    if narrative.is_empty() {
        return vec![Span::plain(narrative.to_string())];
    }
    let mut spans = Vec::new();
    for (i, part) in narrative.parts().iter().enumerate() {
        if i > 0 {
            spans.push(Span::plain(" | "));
        }
        spans.push(Span::strong(format!("{}:", part.label)));
        spans.push(Span::plain(format!(" {}", part.text())));
    }
    spans
}

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::retro::config_reader::Settings;
use crate::retro::io_xlsx::LoadedData;
use crate::retro::json_output::*;
use crate::retro::pptx::*;
use crate::retro::*;

/// The default qualitative palette of the dashboard charts.
pub const PALETTE: [&str; 10] = [
    "1F77B4", "FF7F0E", "2CA02C", "D62728", "9467BD", "8C564B", "E377C2", "7F7F7F", "BCBD22",
    "17BECF",
];

const TITLE_COLOR: &str = "1F2937";
const MUTED_COLOR: &str = "6B7280";
const AXIS_COLOR: &str = "9CA3AF";
const MAX_LEGEND_ENTRIES: usize = 12;

/// The body of a single question export, as sent by the dashboard.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExportRequest {
    pub question: Option<String>,
    /// Period -> answer -> percentage, as served by the trends endpoint.
    pub trends: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    #[serde(rename = "directorAnalysis")]
    pub director_analysis: Option<DirectorAnalysisView>,
}

/// The percentages to chart, oldest period first.
#[derive(PartialEq, Debug, Clone)]
pub struct TrendSeries {
    pub question: String,
    pub periods: Vec<(String, Vec<(String, f64)>)>,
}

impl TrendSeries {
    pub fn from_report(report: &TrendReport) -> TrendSeries {
        TrendSeries {
            question: report.question.clone(),
            periods: report
                .periods
                .iter()
                .map(|p| {
                    (
                        p.period.clone(),
                        p.answers
                            .iter()
                            .map(|(a, s)| (a.clone(), s.percentage))
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn from_map(
        question: &str,
        trends: &BTreeMap<String, BTreeMap<String, f64>>,
        order: &PeriodOrder,
    ) -> TrendSeries {
        let mut labels: Vec<String> = trends.keys().cloned().collect();
        order.sort(&mut labels);
        let periods = labels
            .into_iter()
            .map(|label| {
                let mut answers: Vec<(String, f64)> = trends
                    .get(&label)
                    .map(|m| m.iter().map(|(a, pct)| (a.clone(), *pct)).collect())
                    .unwrap_or_default();
                answers.sort_by(|(a1, p1), (a2, p2)| p2.total_cmp(p1).then_with(|| a1.cmp(a2)));
                (label, answers)
            })
            .collect();
        TrendSeries {
            question: question.to_string(),
            periods,
        }
    }

    pub fn has_data(&self) -> bool {
        self.periods.iter().any(|(_, a)| !a.is_empty())
    }

    /// The distinct answers, sorted, which gives each answer the same color on every bar.
    pub fn answers(&self) -> Vec<String> {
        let s: BTreeSet<&String> = self
            .periods
            .iter()
            .flat_map(|(_, a)| a.iter().map(|(x, _)| x))
            .collect();
        s.into_iter().cloned().collect()
    }
}

fn color_of(answers: &[String], answer: &str) -> &'static str {
    let idx = answers.iter().position(|a| a == answer).unwrap_or(0);
    PALETTE[idx % PALETTE.len()]
}

fn title_box(slide: &mut Slide, title: &str, subtitle: &str) {
    slide.text(
        Frame::new(inches(0.5), inches(0.3), inches(12.3), inches(0.8)),
        vec![Paragraph::new(title, 24).bold().color(TITLE_COLOR)],
    );
    slide.text(
        Frame::new(inches(0.5), inches(1.0), inches(12.3), inches(0.4)),
        vec![Paragraph::new(subtitle, 14).color(MUTED_COLOR)],
    );
}

/// A stacked bar per period, one segment per answer, with a legend on the right.
fn trend_slide(series: &TrendSeries) -> Slide {
    let mut slide = Slide::new();
    title_box(&mut slide, &series.question, "Answer distribution by period (%)");

    let answers = series.answers();
    let chart_x = inches(0.7);
    let chart_y = inches(1.6);
    let chart_w = inches(8.6);
    let chart_h = inches(4.6);
    let label_h = inches(0.4);
    let slot = chart_w / (series.periods.len().max(1) as i64);
    let bar_w = slot * 6 / 10;
    let baseline = chart_y + chart_h;

    slide.rect(Frame::new(chart_x, baseline, chart_w, inches(0.02)), AXIS_COLOR);
    for (idx, (period, period_answers)) in series.periods.iter().enumerate() {
        let x = chart_x + slot * (idx as i64) + (slot - bar_w) / 2;
        let mut top = baseline;
        for (answer, pct) in period_answers.iter() {
            let h = ((pct.clamp(0.0, 100.0) / 100.0) * chart_h as f64).round() as i64;
            if h <= 0 {
                continue;
            }
            top -= h;
            slide.rect(Frame::new(x, top, bar_w, h), color_of(&answers, answer));
            if *pct >= 8.0 {
                slide.text(
                    Frame::new(x, top, bar_w, h.min(inches(0.35))),
                    vec![Paragraph::new(&format!("{:.1}%", pct), 10).color("FFFFFF")],
                );
            }
        }
        let label = if period_answers.is_empty() {
            format!("{} (no answers)", period)
        } else {
            period.clone()
        };
        slide.text(
            Frame::new(chart_x + slot * (idx as i64), baseline + inches(0.05), slot, label_h),
            vec![Paragraph::new(&label, 11)],
        );
    }

    let legend_x = inches(9.8);
    let entry_h = inches(0.35);
    for (idx, answer) in answers.iter().take(MAX_LEGEND_ENTRIES).enumerate() {
        let y = chart_y + entry_h * (idx as i64);
        slide.rect(
            Frame::new(legend_x, y + inches(0.08), inches(0.2), inches(0.2)),
            color_of(&answers, answer),
        );
        slide.text(
            Frame::new(legend_x + inches(0.3), y, inches(3.0), entry_h),
            vec![Paragraph::new(answer, 11)],
        );
    }
    if answers.len() > MAX_LEGEND_ENTRIES {
        slide.text(
            Frame::new(
                legend_x,
                chart_y + entry_h * (MAX_LEGEND_ENTRIES as i64),
                inches(3.3),
                entry_h,
            ),
            vec![Paragraph::new(
                &format!("... and {} more", answers.len() - MAX_LEGEND_ENTRIES),
                11,
            )
            .color(MUTED_COLOR)],
        );
    }
    slide
}

fn row_line(cells: &[String]) -> String {
    cells.join(" | ")
}

fn pct_cell(cells: &[AnswerCell], answer: &str) -> String {
    cells
        .iter()
        .find(|c| c.answer == answer)
        .map(|c| format!("{:.2}% ({})", c.percentage, c.count))
        .unwrap_or_else(|| "-".to_string())
}

/// The director breakdown of the most recent period, as a text table.
fn director_slide(question: &str, director: Option<&DirectorPeriodView>) -> Slide {
    let mut slide = Slide::new();
    let frame = Frame::new(inches(0.5), inches(1.6), inches(12.3), inches(5.6));
    match director {
        Some(view) if !view.rows.is_empty() => {
            title_box(
                &mut slide,
                &format!("{}: by director", question),
                &format!("{} (percentages of each director's respondents)", view.period),
            );
            let mut header: Vec<String> = vec!["Director".to_string(), "Total".to_string()];
            header.extend(view.answers.iter().cloned());
            let mut paragraphs = vec![Paragraph::new(&row_line(&header), 12).bold()];
            for row in view.rows.iter() {
                let mut cells = vec![row.director.clone(), row.total.to_string()];
                cells.extend(view.answers.iter().map(|a| pct_cell(&row.answers, a)));
                paragraphs.push(Paragraph::new(&row_line(&cells), 12));
            }
            let mut footer = vec!["Total".to_string(), view.grand_total.to_string()];
            footer.extend(view.answers.iter().map(|a| pct_cell(&view.answer_totals, a)));
            paragraphs.push(Paragraph::new(&row_line(&footer), 12).bold());
            slide.text(frame, paragraphs);
        }
        _ => {
            title_box(&mut slide, &format!("{}: by director", question), "");
            slide.text(
                frame,
                vec![Paragraph::new("No director breakdown available for this question.", 14)
                    .color(MUTED_COLOR)],
            );
        }
    }
    slide
}

/// The two slides of one question: the trend chart and the director table.
pub fn question_slides(
    series: &TrendSeries,
    director: Option<&DirectorPeriodView>,
) -> RetroResult<Vec<Slide>> {
    if !series.has_data() {
        return NoTrendDataSnafu {
            question: series.question.clone(),
        }
        .fail();
    }
    Ok(vec![
        trend_slide(series),
        director_slide(&series.question, director),
    ])
}

fn title_slide(loaded: &LoadedData, settings: &Settings) -> Slide {
    let chrono = loaded.dataset.chronological(&settings.period_order);
    let span = match (chrono.first(), chrono.last()) {
        (Some(first), Some(last)) if first.label != last.label => {
            format!("{} to {}", first.label, last.label)
        }
        (Some(first), _) => first.label.clone(),
        _ => String::new(),
    };
    let mut slide = Slide::new();
    slide.text(
        Frame::new(inches(0.8), inches(2.4), inches(11.7), inches(1.2)),
        vec![Paragraph::new("Retrospective Trends", 40)
            .bold()
            .color(TITLE_COLOR)],
    );
    slide.text(
        Frame::new(inches(0.8), inches(3.7), inches(11.7), inches(1.0)),
        vec![
            Paragraph::new(&span, 20).color(MUTED_COLOR),
            Paragraph::new(
                &format!(
                    "{} responses across {} files",
                    loaded.dataset.total_responses(),
                    loaded.files.len()
                ),
                16,
            )
            .color(MUTED_COLOR),
        ],
    );
    slide
}

/// The deck of every question of the most recent period, two slides each.
///
/// The metadata columns are left out. A question that cannot be rendered is
/// logged and skipped.
pub fn export_all(loaded: &LoadedData, settings: &Settings) -> RetroResult<Deck> {
    let resolver = settings.trend_resolver();
    let cross_resolver = ColumnResolver::for_cross_tab();
    let mut deck = Deck::new();
    deck.push(title_slide(loaded, settings));

    let questions: Vec<String> = question_list(&loaded.dataset, settings)
        .into_iter()
        .filter(|q| !settings.export_skip_columns.contains(q))
        .collect();
    let mut skipped = 0;
    for q in questions.iter() {
        let report = aggregate_trends(&loaded.dataset, q, &resolver, &settings.period_order);
        let tables = cross_tabulate(
            &loaded.dataset,
            q,
            &settings.director_column,
            settings.recent_periods,
            &cross_resolver,
            &settings.period_order,
        );
        let view = cross_tab_view(q, &settings.director_column, &tables);
        match question_slides(&TrendSeries::from_report(&report), view.latest()) {
            Ok(slides) => deck.extend(slides),
            Err(e) => {
                warn!("export_all: skipping question {:?}: {}", q, e);
                skipped += 1;
            }
        }
    }
    info!(
        "export_all: {} questions, {} skipped, {} slides",
        questions.len(),
        skipped,
        deck.slides.len()
    );
    Ok(deck)
}

/// The deck of one question, from the data already shown by the dashboard.
pub fn export_single(request: &ExportRequest, order: &PeriodOrder) -> RetroResult<Deck> {
    let question = match request.question.as_deref() {
        Some(q) if !q.trim().is_empty() => q,
        _ => {
            return MissingFieldSnafu {
                field: "question".to_string(),
            }
            .fail()
        }
    };
    let trends = request.trends.as_ref().context(MissingFieldSnafu {
        field: "trends".to_string(),
    })?;
    let series = TrendSeries::from_map(question, trends, order);
    let director = request
        .director_analysis
        .as_ref()
        .and_then(|d| d.latest());
    let mut deck = Deck::new();
    deck.extend(question_slides(&series, director)?);
    Ok(deck)
}

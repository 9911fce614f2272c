use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::collections::BTreeSet;

use crate::retro::config_reader::Settings;
use crate::retro::io_xlsx::LoadedData;
use crate::retro::*;

/// Placeholder shown by the summary cards until participation is tracked.
pub const RESPONSE_RATE_PLACEHOLDER: u64 = 85;

// ********* Director analysis ***********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerCell {
    pub answer: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DirectorRowView {
    pub director: String,
    pub total: u64,
    #[serde(default)]
    pub answers: Vec<AnswerCell>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DirectorPeriodView {
    pub period: String,
    #[serde(rename = "questionColumn", default)]
    pub question_column: String,
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<DirectorRowView>,
    #[serde(rename = "answerTotals", default)]
    pub answer_totals: Vec<AnswerCell>,
    #[serde(rename = "grandTotal", default)]
    pub grand_total: u64,
}

/// The director breakdown as served by the API, and as sent back by the
/// dashboard when it asks for a single question deck.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DirectorAnalysisView {
    #[serde(default)]
    pub question: String,
    #[serde(rename = "directorColumn", default)]
    pub director_column: String,
    #[serde(default)]
    pub periods: Vec<DirectorPeriodView>,
}

impl DirectorAnalysisView {
    /// The most recent table, which is the one shown on the slides.
    pub fn latest(&self) -> Option<&DirectorPeriodView> {
        self.periods.last()
    }
}

fn cells(answers: &[(String, AnswerStats)]) -> Vec<AnswerCell> {
    answers
        .iter()
        .map(|(a, s)| AnswerCell {
            answer: a.clone(),
            count: s.count,
            percentage: s.percentage,
        })
        .collect()
}

pub fn cross_tab_view(
    question: &str,
    director_column: &str,
    tables: &[CrossTabTable],
) -> DirectorAnalysisView {
    let periods = tables
        .iter()
        .map(|t| {
            let grand_total = t.grand_total();
            DirectorPeriodView {
                period: t.period.clone(),
                question_column: t.question_column.clone(),
                answers: t.answers.clone(),
                rows: t
                    .rows
                    .iter()
                    .map(|r| DirectorRowView {
                        director: r.director.clone(),
                        total: r.total,
                        answers: cells(&r.answers),
                    })
                    .collect(),
                answer_totals: t
                    .answer_totals()
                    .into_iter()
                    .map(|(answer, count)| AnswerCell {
                        answer,
                        count,
                        percentage: percentage(count, grand_total),
                    })
                    .collect(),
                grand_total,
            }
        })
        .collect();
    DirectorAnalysisView {
        question: question.to_string(),
        director_column: director_column.to_string(),
        periods,
    }
}

// ********* Trends ***********

/// The trend payload: percentages per period and answer, plus the flat rows used by the tables.
pub fn trends_json(report: &TrendReport) -> JSValue {
    let mut trends: JSMap<String, JSValue> = JSMap::new();
    let mut response_counts: JSMap<String, JSValue> = JSMap::new();
    let mut resolved: JSMap<String, JSValue> = JSMap::new();
    let mut summary_data: Vec<JSValue> = Vec::new();
    for p in report.periods.iter() {
        let mut answers: JSMap<String, JSValue> = JSMap::new();
        for (answer, stats) in p.answers.iter() {
            answers.insert(answer.clone(), json!(stats.percentage));
            summary_data.push(json!({
                "period": p.period,
                "answer": answer,
                "count": stats.count,
                "percentage": stats.percentage,
            }));
        }
        trends.insert(p.period.clone(), JSValue::Object(answers));
        response_counts.insert(p.period.clone(), json!(p.response_count));
        resolved.insert(p.period.clone(), json!(p.resolved_column));
    }
    json!({
        "question": report.question,
        "trends": trends,
        "responseCounts": response_counts,
        "summaryData": summary_data,
        "resolvedColumns": resolved,
    })
}

// ********* Dataset overviews ***********

/// The questions of the most recent period, in column order. The timestamp is not a question.
pub fn question_list(dataset: &Dataset, settings: &Settings) -> Vec<String> {
    match dataset.most_recent(&settings.period_order) {
        Some(p) => p
            .columns
            .iter()
            .filter(|c| **c != settings.timestamp_column)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

fn categories_json(categories: Vec<(String, Vec<String>)>) -> JSValue {
    let l: Vec<JSValue> = categories
        .into_iter()
        .map(|(name, questions)| json!({"name": name, "questions": questions}))
        .collect();
    json!(l)
}

pub fn response_counts_json(dataset: &Dataset, order: &PeriodOrder) -> JSValue {
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    let mut sorted: Vec<JSValue> = Vec::new();
    for p in dataset.chronological(order) {
        counts.insert(p.label.clone(), json!(p.response_count()));
        sorted.push(json!({"period": p.label, "count": p.response_count()}));
    }
    json!({"responseCounts": counts, "sorted": sorted})
}

pub fn summary_json(dataset: &Dataset, settings: &Settings) -> JSValue {
    let questions: BTreeSet<&String> = dataset
        .chronological(&settings.period_order)
        .into_iter()
        .flat_map(|p| p.columns.iter())
        .filter(|c| **c != settings.timestamp_column)
        .collect();
    json!({
        "totalResponses": dataset.total_responses(),
        "totalQuestions": questions.len(),
        "responseRate": RESPONSE_RATE_PLACEHOLDER,
    })
}

pub fn questions_json(dataset: &Dataset, settings: &Settings) -> JSValue {
    let questions = question_list(dataset, settings);
    let categories = Categorizer::compact().categorize(&questions);
    json!({
        "questions": questions,
        "categories": categories_json(categories),
    })
}

pub fn releases_json(dataset: &Dataset, order: &PeriodOrder) -> JSValue {
    let l: Vec<JSValue> = dataset
        .chronological(order)
        .iter()
        .map(|p| {
            json!({
                "period": p.label,
                "responseCount": p.response_count(),
                "questionCount": p.columns.len(),
            })
        })
        .collect();
    json!(l)
}

pub fn data_summary_json(loaded: &LoadedData, settings: &Settings) -> JSValue {
    let most_recent = loaded.dataset.most_recent(&settings.period_order);
    json!({
        "totalFiles": loaded.files.len(),
        "totalResponses": loaded.dataset.total_responses(),
        "mostRecent": most_recent.map(|p| p.label.clone()),
        "mostRecentResponses": most_recent.map(|p| p.response_count()).unwrap_or(0),
    })
}

/// The overview of `/data`: the summary cards, the questions and their detailed grouping.
pub fn data_json(loaded: &LoadedData, settings: &Settings) -> JSValue {
    let questions = question_list(&loaded.dataset, settings);
    let categories = Categorizer::detailed().categorize(&questions);
    json!({
        "summary": data_summary_json(loaded, settings),
        "questions": questions,
        "categories": categories_json(categories),
        "loadFailures": loaded.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retro::io_xlsx::load_dataset;
    use crate::retro::test_utils::*;

    fn loaded() -> (tempfile::TempDir, LoadedData, Settings) {
        let dir = tempfile::tempdir().unwrap();
        write_team_fixtures(dir.path());
        let settings = settings_for(dir.path());
        let loaded = load_dataset(&settings).unwrap();
        (dir, loaded, settings)
    }

    #[test]
    fn team_trends() {
        let (_dir, loaded, settings) = loaded();
        let report = aggregate_trends(
            &loaded.dataset,
            "Team",
            &settings.trend_resolver(),
            &settings.period_order,
        );
        let js = trends_json(&report);
        assert_eq!(js["trends"]["August"], json!({"A": 66.67, "B": 33.33}));
        assert_eq!(js["trends"]["September"], json!({"A": 50.0, "B": 50.0}));
        assert_eq!(js["responseCounts"], json!({"August": 3, "September": 2}));
        assert_eq!(js["summaryData"].as_array().unwrap().len(), 4);
        assert_eq!(js["resolvedColumns"]["August"], json!("Team"));
    }

    #[test]
    fn overviews() {
        let (_dir, loaded, settings) = loaded();
        let ds = &loaded.dataset;
        let summary = summary_json(ds, &settings);
        assert_eq!(summary["totalResponses"], json!(5));
        assert_eq!(summary["totalQuestions"], json!(3));
        assert_eq!(summary["responseRate"], json!(85));

        let releases = releases_json(ds, &settings.period_order);
        assert_eq!(
            releases,
            json!([
                {"period": "August", "responseCount": 3, "questionCount": 4},
                {"period": "September", "responseCount": 2, "questionCount": 4},
            ])
        );

        let counts = response_counts_json(ds, &settings.period_order);
        assert_eq!(counts["sorted"][1], json!({"period": "September", "count": 2}));

        let qs = questions_json(ds, &settings);
        assert_eq!(qs["categories"][0]["name"], json!("Team & Organization"));
        assert_eq!(
            qs["categories"][0]["questions"],
            json!(["Team", "Director Org"])
        );
        assert_eq!(qs["categories"][2]["questions"], json!(["Comments"]));

        let data = data_json(&loaded, &settings);
        assert_eq!(data["summary"]["totalFiles"], json!(2));
        assert_eq!(data["summary"]["mostRecent"], json!("September"));
        assert_eq!(data["summary"]["mostRecentResponses"], json!(2));
        assert_eq!(data["categories"].as_array().unwrap().len(), 6);
        assert_eq!(data["loadFailures"], json!([]));
    }

    #[test]
    fn director_view() {
        let (_dir, loaded, settings) = loaded();
        let tables = cross_tabulate(
            &loaded.dataset,
            "Team",
            &settings.director_column,
            settings.recent_periods,
            &ColumnResolver::for_cross_tab(),
            &settings.period_order,
        );
        let view = cross_tab_view("Team", &settings.director_column, &tables);
        assert_eq!(view.periods.len(), 2);
        let latest = view.latest().unwrap();
        assert_eq!(latest.period, "September");
        assert_eq!(latest.grand_total, 2);
        assert_eq!(latest.answer_totals[0].percentage, 50.0);
        let js = serde_json::to_value(&view).unwrap();
        assert_eq!(js["periods"][0]["rows"][0]["director"], json!("Ann"));
        assert_eq!(js["periods"][0]["rows"][0]["answers"][0]["percentage"], json!(100.0));
        let back: DirectorAnalysisView = serde_json::from_value(js).unwrap();
        assert_eq!(back, view);
    }
}

use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

use crate::config::*;
use crate::resolver::ColumnResolver;

/// The answers of one period for one question.
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodTrend {
    pub period: String,
    /// The column that held the question in this period, if one was found.
    pub resolved_column: Option<String>,
    /// Most frequent answers first. Empty when the column is missing or nobody answered.
    pub answers: Vec<(String, AnswerStats)>,
    /// The number of valid answers, or the number of rows of the period when
    /// there are none, so that participation can still be charted.
    pub response_count: u64,
}

impl PeriodTrend {
    pub fn has_answers(&self) -> bool {
        !self.answers.is_empty()
    }
}

/// The evolution of the answers to one question, oldest period first.
#[derive(PartialEq, Debug, Clone)]
pub struct TrendReport {
    pub question: String,
    pub periods: Vec<PeriodTrend>,
}

impl TrendReport {
    /// True if at least one period has answers for this question.
    pub fn has_data(&self) -> bool {
        self.periods.iter().any(|p| p.has_answers())
    }

    /// All the answers seen across the periods, sorted.
    pub fn all_answers(&self) -> Vec<String> {
        let s: BTreeSet<String> = self
            .periods
            .iter()
            .flat_map(|p| p.answers.iter().map(|(a, _)| a.clone()))
            .collect();
        s.into_iter().collect()
    }
}

/// Computes the answer distribution of a question for every period of the dataset.
///
/// Every period gets an entry, including the ones in which the question cannot be found.
pub fn aggregate_trends(
    dataset: &Dataset,
    question: &str,
    resolver: &ColumnResolver,
    order: &PeriodOrder,
) -> TrendReport {
    let mut periods: Vec<PeriodTrend> = Vec::new();
    for period in dataset.chronological(order) {
        periods.push(period_trend(period, question, resolver));
    }
    info!(
        "aggregate_trends: question {:?}: {} periods, {} with answers",
        question,
        periods.len(),
        periods.iter().filter(|p| p.has_answers()).count()
    );
    TrendReport {
        question: question.to_string(),
        periods,
    }
}

fn period_trend(period: &PeriodData, question: &str, resolver: &ColumnResolver) -> PeriodTrend {
    let resolved = resolver.resolve(question, &period.columns);
    let mut counts: HashMap<String, u64> = HashMap::new();
    if let Some(rc) = resolved.as_ref() {
        for r in period.records.iter() {
            if let Some(answer) = r.answer(&rc.column) {
                *counts.entry(answer).or_insert(0) += 1;
            }
        }
    }
    let total: u64 = counts.values().sum();
    debug!(
        "period_trend: period {:?} resolved: {:?} valid answers: {}",
        period.label, resolved, total
    );
    if total == 0 {
        PeriodTrend {
            period: period.label.clone(),
            resolved_column: resolved.map(|rc| rc.column),
            answers: Vec::new(),
            response_count: period.response_count(),
        }
    } else {
        PeriodTrend {
            period: period.label.clone(),
            resolved_column: resolved.map(|rc| rc.column),
            answers: distribution(&counts),
            response_count: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team_dataset() -> Dataset {
        let mut ds = Dataset::new();
        let cols = vec!["Timestamp".to_string(), "Team".to_string()];
        ds.add_file(
            "August",
            cols.clone(),
            vec![
                RowRecord::from_pairs(&[("Team", "A")]),
                RowRecord::from_pairs(&[("Team", "A")]),
                RowRecord::from_pairs(&[("Team", "B")]),
            ],
        );
        ds.add_file(
            "September",
            cols,
            vec![
                RowRecord::from_pairs(&[("Team", "A")]),
                RowRecord::from_pairs(&[("Team", "B")]),
            ],
        );
        ds
    }

    fn pct(t: &PeriodTrend, answer: &str) -> f64 {
        t.answers
            .iter()
            .find(|(a, _)| a == answer)
            .map(|(_, s)| s.percentage)
            .unwrap()
    }

    #[test]
    fn two_months_of_teams() {
        let _ = env_logger::builder().is_test(true).try_init();
        let report = aggregate_trends(
            &team_dataset(),
            "Team",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        assert!(report.has_data());
        let aug = &report.periods[0];
        let sep = &report.periods[1];
        assert_eq!(aug.period, "August");
        assert_eq!(pct(aug, "A"), 66.67);
        assert_eq!(pct(aug, "B"), 33.33);
        assert_eq!(aug.response_count, 3);
        assert_eq!(pct(sep, "A"), 50.0);
        assert_eq!(pct(sep, "B"), 50.0);
        assert_eq!(sep.response_count, 2);
        assert_eq!(report.all_answers(), vec!["A", "B"]);
    }

    #[test]
    fn percentages_sum_to_hundred() {
        let mut ds = Dataset::new();
        let answers = ["x", "y", "z", "x", "y", "w", "x"];
        let records: Vec<RowRecord> = answers
            .iter()
            .map(|a| RowRecord::from_pairs(&[("Q", a)]))
            .collect();
        ds.add_file("May", vec!["Q".to_string()], records);
        let report = aggregate_trends(
            &ds,
            "Q",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        let p = &report.periods[0];
        let sum: f64 = p.answers.iter().map(|(_, s)| s.percentage).sum();
        assert!((sum - 100.0).abs() <= 0.01 * (p.answers.len() as f64));
    }

    #[test]
    fn empty_answers_are_not_counted() {
        let mut ds = Dataset::new();
        ds.add_file(
            "June",
            vec!["Q".to_string()],
            vec![
                RowRecord::from_pairs(&[("Q", "yes")]),
                RowRecord::from_pairs(&[("Q", "")]),
                RowRecord::from_pairs(&[]),
            ],
        );
        let report = aggregate_trends(
            &ds,
            "Q",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        let p = &report.periods[0];
        assert_eq!(pct(p, "yes"), 100.0);
        assert_eq!(p.response_count, 1);
    }

    #[test]
    fn missing_column_keeps_the_period() {
        let mut ds = team_dataset();
        ds.add_file(
            "October",
            vec!["Other".to_string()],
            vec![RowRecord::from_pairs(&[("Other", "1")]); 4],
        );
        let report = aggregate_trends(
            &ds,
            "Team",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        assert_eq!(report.periods.len(), 3);
        let oct = &report.periods[2];
        assert_eq!(oct.period, "October");
        assert!(oct.answers.is_empty());
        assert_eq!(oct.resolved_column, None);
        assert_eq!(oct.response_count, 4);
    }

    #[test]
    fn column_without_answers_reports_row_count() {
        let mut ds = Dataset::new();
        ds.add_file(
            "July",
            vec!["Team".to_string()],
            vec![RowRecord::from_pairs(&[("Team", "")]); 5],
        );
        let report = aggregate_trends(
            &ds,
            "Team",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        let p = &report.periods[0];
        assert_eq!(p.resolved_column, Some("Team".to_string()));
        assert!(p.answers.is_empty());
        assert_eq!(p.response_count, 5);
        assert!(!report.has_data());
    }

    #[test]
    fn reworded_question_is_followed() {
        let mut ds = team_dataset();
        ds.add_file(
            "October",
            vec!["Which scrum team are you part of?".to_string()],
            vec![RowRecord::from_pairs(&[("Which scrum team are you part of?", "C")]); 2],
        );
        let report = aggregate_trends(
            &ds,
            "Which scrum team are you in?",
            &ColumnResolver::default(),
            &PeriodOrder::months(),
        );
        let oct = report.periods.last().unwrap();
        assert_eq!(
            oct.resolved_column,
            Some("Which scrum team are you part of?".to_string())
        );
        assert_eq!(pct(oct, "C"), 100.0);
    }
}

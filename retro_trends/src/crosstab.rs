use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::*;
use crate::resolver::ColumnResolver;

/// The answers of the respondents of one director, normalized against their own total.
#[derive(PartialEq, Debug, Clone)]
pub struct DirectorRow {
    pub director: String,
    pub total: u64,
    pub answers: Vec<(String, AnswerStats)>,
}

impl DirectorRow {
    pub fn get(&self, answer: &str) -> Option<&AnswerStats> {
        self.answers
            .iter()
            .find(|(a, _)| a == answer)
            .map(|(_, s)| s)
    }
}

/// Director × answer contingency table for one period.
///
/// Only the rows are stored. The footer (totals per answer) is derived with
/// `answer_totals`.
#[derive(PartialEq, Debug, Clone)]
pub struct CrossTabTable {
    pub period: String,
    pub question_column: String,
    /// All the answers given in this period, sorted.
    pub answers: Vec<String>,
    /// Sorted by director name.
    pub rows: Vec<DirectorRow>,
}

impl CrossTabTable {
    /// Column sums: the number of respondents that gave each answer, across directors.
    pub fn answer_totals(&self) -> Vec<(String, u64)> {
        self.answers
            .iter()
            .map(|a| {
                let total = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(a))
                    .map(|s| s.count)
                    .sum();
                (a.clone(), total)
            })
            .collect()
    }

    pub fn grand_total(&self) -> u64 {
        self.rows.iter().map(|r| r.total).sum()
    }
}

/// Breaks down the answers to a question by director, for the most recent periods.
///
/// At most `recent_periods` periods are considered. A period is left out when
/// the director column (exact name only) or the question cannot be found.
/// The tables are returned oldest first.
pub fn cross_tabulate(
    dataset: &Dataset,
    question: &str,
    director_column: &str,
    recent_periods: usize,
    resolver: &ColumnResolver,
    order: &PeriodOrder,
) -> Vec<CrossTabTable> {
    let chrono = dataset.chronological(order);
    let start = chrono.len().saturating_sub(recent_periods);
    let mut res: Vec<CrossTabTable> = Vec::new();
    for period in chrono[start..].iter() {
        if !period.columns.iter().any(|c| c == director_column) {
            debug!(
                "cross_tabulate: period {:?}: no director column {:?}",
                period.label, director_column
            );
            continue;
        }
        let resolved = match resolver.resolve(question, &period.columns) {
            Some(rc) => rc,
            None => {
                debug!(
                    "cross_tabulate: period {:?}: question {:?} not found",
                    period.label, question
                );
                continue;
            }
        };
        res.push(period_table(period, &resolved.column, director_column));
    }
    info!(
        "cross_tabulate: question {:?}: {} tables",
        question,
        res.len()
    );
    res
}

fn period_table(period: &PeriodData, question_column: &str, director_column: &str) -> CrossTabTable {
    let mut counts: BTreeMap<String, HashMap<String, u64>> = BTreeMap::new();
    let mut answers: BTreeSet<String> = BTreeSet::new();
    for r in period.records.iter() {
        if let (Some(director), Some(answer)) =
            (r.answer(director_column), r.answer(question_column))
        {
            answers.insert(answer.clone());
            *counts
                .entry(director)
                .or_default()
                .entry(answer)
                .or_insert(0) += 1;
        }
    }
    let rows: Vec<DirectorRow> = counts
        .iter()
        .map(|(director, c)| DirectorRow {
            director: director.clone(),
            total: c.values().sum(),
            answers: distribution(c),
        })
        .collect();
    CrossTabTable {
        period: period.label.clone(),
        question_column: question_column.to_string(),
        answers: answers.into_iter().collect(),
        rows,
    }
}

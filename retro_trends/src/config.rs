// ********* Input data structures ***********

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// The content of one spreadsheet cell, as handed over by the readers.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    /// A missing or blank cell. Never counted as an answer.
    Empty,
}

impl Cell {
    /// The answer carried by this cell, or None if the cell does not hold a response.
    ///
    /// Whole numbers are rendered without a fractional part so that a numeric
    /// rating of `4` and a text rating of `"4"` land in the same bucket.
    pub fn answer(&self) -> Option<String> {
        match self {
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(f) if f.is_nan() => None,
            Cell::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
                Some(format!("{}", *f as i64))
            }
            Cell::Number(f) => Some(f.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Empty => None,
        }
    }
}

/// One survey response: the cells of a row keyed by column header.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RowRecord {
    values: HashMap<String, Cell>,
}

impl RowRecord {
    pub fn new(values: HashMap<String, Cell>) -> RowRecord {
        RowRecord { values }
    }

    /// Builds a record out of text cells. Mostly useful for tests and small fixtures.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> RowRecord {
        RowRecord {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Cell::Text(v.to_string())))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values.get(column)
    }

    pub fn answer(&self, column: &str) -> Option<String> {
        self.values.get(column).and_then(|c| c.answer())
    }
}

/// All the responses collected for one period (one or several files).
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodData {
    pub label: String,
    /// The headers in file order. When several files share the period, the
    /// headers of the later files are appended if they were not seen before.
    pub columns: Vec<String>,
    pub records: Vec<RowRecord>,
}

impl PeriodData {
    pub fn new(label: &str, columns: Vec<String>, records: Vec<RowRecord>) -> PeriodData {
        PeriodData {
            label: label.to_string(),
            columns,
            records,
        }
    }

    /// Concatenates the records of another file of the same period. No deduplication.
    pub fn extend(&mut self, columns: &[String], records: Vec<RowRecord>) {
        for c in columns {
            if !self.columns.contains(c) {
                self.columns.push(c.clone());
            }
        }
        self.records.extend(records);
    }

    pub fn response_count(&self) -> u64 {
        self.records.len() as u64
    }
}

/// The loaded periods, keyed by label.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    periods: BTreeMap<String, PeriodData>,
}

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    /// Adds the content of one file. If the period already exists, the records are appended.
    pub fn add_file(&mut self, label: &str, columns: Vec<String>, records: Vec<RowRecord>) {
        match self.periods.get_mut(label) {
            Some(existing) => existing.extend(&columns, records),
            None => {
                self.periods
                    .insert(label.to_string(), PeriodData::new(label, columns, records));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn period(&self, label: &str) -> Option<&PeriodData> {
        self.periods.get(label)
    }

    /// The periods, oldest first.
    pub fn chronological(&self, order: &PeriodOrder) -> Vec<&PeriodData> {
        let mut res: Vec<&PeriodData> = self.periods.values().collect();
        res.sort_by(|a, b| order.compare(&a.label, &b.label));
        res
    }

    /// The canonical period: the last one in chronological order.
    pub fn most_recent(&self, order: &PeriodOrder) -> Option<&PeriodData> {
        self.chronological(order).last().cloned()
    }

    pub fn total_responses(&self) -> u64 {
        self.periods.values().map(|p| p.response_count()).sum()
    }
}

// ******** Output data structures *********

/// Count and share of one answer.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct AnswerStats {
    pub count: u64,
    /// Percentage in [0, 100], rounded to 2 decimals.
    pub percentage: f64,
}

/// Rounds a ratio to a percentage with two decimals.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (count as f64) / (total as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Turns answer counts into a distribution, most frequent answers first.
/// Ties are broken by answer text to keep the output stable.
pub fn distribution(counts: &HashMap<String, u64>) -> Vec<(String, AnswerStats)> {
    let total: u64 = counts.values().sum();
    let mut res: Vec<(String, AnswerStats)> = counts
        .iter()
        .map(|(answer, count)| {
            (
                answer.clone(),
                AnswerStats {
                    count: *count,
                    percentage: percentage(*count, total),
                },
            )
        })
        .collect();
    res.sort_by(|(a1, s1), (a2, s2)| s2.count.cmp(&s1.count).then_with(|| a1.cmp(a2)));
    res
}

// ********* Configuration **********

/// The chronological order of the period labels.
///
/// Labels that are not listed sort after all the listed ones, in alphabetical order,
/// so that a file with an unexpected prefix still shows up instead of failing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PeriodOrder {
    labels: Vec<String>,
}

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl PeriodOrder {
    pub fn new(labels: &[String]) -> PeriodOrder {
        PeriodOrder {
            labels: labels.to_vec(),
        }
    }

    pub fn months() -> PeriodOrder {
        PeriodOrder {
            labels: MONTHS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The position of the label. Unknown labels all get the same rank, after the known ones.
    pub fn rank(&self, label: &str) -> usize {
        self.labels
            .iter()
            .position(|l| l == label)
            .unwrap_or(self.labels.len())
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.rank(a).cmp(&self.rank(b)).then_with(|| a.cmp(b))
    }

    /// Sorts the labels chronologically, oldest first.
    pub fn sort(&self, labels: &mut [String]) {
        labels.sort_by(|a, b| self.compare(a, b));
    }
}

impl Default for PeriodOrder {
    fn default() -> Self {
        PeriodOrder::months()
    }
}

/// The column holding the submission time in form exports. It is never a question.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Timestamp";

/// The column holding the organization of the respondent.
pub const DEFAULT_DIRECTOR_COLUMN: &str = "Director Org";

pub const DEFAULT_RECENT_PERIODS: usize = 3;

/*!
Aggregation of monthly survey exports ("retrospectives").

The input is a [`Dataset`]: the rows of every spreadsheet, grouped by period.
From it, this crate computes:
* the answer distribution of one question for every period ([`aggregate_trends`])
* the answers of the most recent periods broken down by director ([`cross_tabulate`])
* a keyword grouping of the questions ([`Categorizer`])

Questions get reworded between forms. The [`ColumnResolver`] finds the column of
a question in each period with an ordered list of strategies.

```
use retro_trends::*;

let mut dataset = Dataset::new();
dataset.add_file(
    "August",
    vec!["Team".to_string()],
    vec![
        RowRecord::from_pairs(&[("Team", "A")]),
        RowRecord::from_pairs(&[("Team", "B")]),
    ],
);
let report = aggregate_trends(
    &dataset,
    "Team",
    &ColumnResolver::default(),
    &PeriodOrder::months(),
);
assert_eq!(report.periods[0].answers[0].1.percentage, 50.0);
```
*/

mod categories;
mod config;
mod crosstab;
mod resolver;
mod trends;

pub use crate::categories::*;
pub use crate::config::*;
pub use crate::crosstab::*;
pub use crate::resolver::*;
pub use crate::trends::*;

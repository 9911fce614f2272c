// Primitives for writing CSV downloads.

use csv::Writer;

use crate::retro::*;

pub const TREND_CSV_HEADER: [&str; 4] = ["Period", "Answer", "Count", "Percentage"];

/// One row per period and answer, in period order. Periods without answers have no rows.
pub fn trends_to_csv(report: &TrendReport) -> RetroResult<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(TREND_CSV_HEADER)
        .context(WritingCsvSnafu {})?;
    for p in report.periods.iter() {
        for (answer, stats) in p.answers.iter() {
            let count = stats.count.to_string();
            let pct = format!("{:.2}", stats.percentage);
            wtr.write_record([p.period.as_str(), answer.as_str(), count.as_str(), pct.as_str()])
                .context(WritingCsvSnafu {})?;
        }
    }
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
        .context(WritingCsvSnafu {})?;
    debug!(
        "trends_to_csv: question {:?}: {} bytes",
        report.question,
        data.len()
    );
    Ok(data)
}

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod json_output;
pub mod pptx;
pub mod slides;
#[cfg(test)]
pub mod test_utils;

use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use retro_trends::*;

use crate::retro::config_reader::Settings;
use crate::retro::io_xlsx::load_dataset;
use crate::retro::json_output::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RetroError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet or header row in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("No retrospective files found in {directories}"))]
    NoSourceFiles { directories: String },
    #[snafu(display("None of the retrospective files could be read ({count} failures)"))]
    NoUsableFiles { count: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("No trend data available for question {question:?}"))]
    NoTrendData { question: String },
    #[snafu(display("Missing required field {field:?}"))]
    MissingField { field: String },
    #[snafu(display("Error writing the slide deck"))]
    WritingDeck { source: zip::result::ZipError },
    #[snafu(display("Error writing the slide deck"))]
    WritingDeckIo { source: std::io::Error },
    #[snafu(display("Error writing CSV content"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error starting the server on {address}"))]
    StartingServer {
        source: std::io::Error,
        address: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type RetroResult<T> = Result<T, RetroError>;

/// The questions to report: the requested one, or every question of the most recent period.
fn report_questions(dataset: &Dataset, settings: &Settings, question: Option<String>) -> Vec<String> {
    match question {
        Some(q) => vec![q],
        None => question_list(dataset, settings),
    }
}

fn build_report_js(
    loaded: &io_xlsx::LoadedData,
    settings: &Settings,
    question: Option<String>,
) -> JSValue {
    let resolver = ColumnResolver::for_trends(&settings.timestamp_column);
    let questions = report_questions(&loaded.dataset, settings, question);
    let mut trends: Vec<JSValue> = Vec::new();
    for q in questions.iter() {
        let report = aggregate_trends(&loaded.dataset, q, &resolver, &settings.period_order);
        if !report.has_data() {
            warn!("build_report_js: no answers found for question {:?}", q);
        }
        trends.push(trends_json(&report));
    }
    json!({
        "summary": data_summary_json(loaded, settings),
        "responseCounts": response_counts_json(&loaded.dataset, &settings.period_order),
        "trends": trends,
    })
}

/// Reads a reference report, as written by a previous run of the report.
pub fn read_reference(path: String) -> RetroResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Loads the spreadsheets once and writes the analysis, without starting the server.
pub fn run_report(
    settings: &Settings,
    question: Option<String>,
    check_reference_path: Option<String>,
    out: Option<String>,
) -> RetroResult<()> {
    info!("run_report: settings: {:?}", settings);
    let loaded = load_dataset(settings)?;
    for f in loaded.failures.iter() {
        warn!("run_report: could not read {}: {}", f.file, f.error);
    }

    let result_js = build_report_js(&loaded, settings, question);
    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match out.as_deref() {
        None | Some("stdout") | Some("") => {
            println!("{}", pretty_js);
        }
        Some(path) => {
            info!("run_report: writing report to {:?}", path);
            fs::write(path, &pretty_js).context(WritingFileSnafu { path })?;
        }
    }

    // The reference report, if provided for comparison
    if let Some(reference_p) = check_reference_path {
        let reference = read_reference(reference_p)?;
        debug!("run_report: reference: {:?}", reference);
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js {
            warn!("Found differences with the reference report");
            print_diff(pretty_js_reference.as_str(), pretty_js.as_str(), "\n");
            whatever!("Difference detected between the computed report and the reference report")
        }
        info!("run_report: the report matches the reference");
    }

    Ok(())
}

use calamine::{open_workbook, DataType, Reader, Xlsx};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::retro::config_reader::Settings;
use crate::retro::io_common::*;
use crate::retro::*;

/// A file that was found but could not be read.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub file: String,
    pub error: String,
}

/// The outcome of one scan of the data directories.
#[derive(PartialEq, Debug, Clone)]
pub struct LoadedData {
    pub dataset: Dataset,
    /// The names of the files that were loaded, in loading order.
    pub files: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

fn convert_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::Empty => Cell::Empty,
        _ => Cell::Empty,
    }
}

fn cell_text(cell: &DataType) -> Option<String> {
    convert_cell(cell).answer()
}

/// Reads the first worksheet of a file: the header row, then one record per row.
///
/// Short rows are padded with empty cells. Rows without any value are dropped.
pub fn read_retrospective(path: &Path) -> RetroResult<(Vec<String>, Vec<RowRecord>)> {
    let path_s = path.display().to_string();
    debug!("read_retrospective: path: {:?}", path_s);
    let mut workbook: Xlsx<_> =
        open_workbook(path).context(OpeningExcelSnafu { path: path_s.clone() })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path: path_s.clone() })?
        .context(OpeningExcelSnafu { path: path_s.clone() })?;

    let mut iter = wrange.rows();
    let header_row = iter.next().context(EmptyExcelSnafu { path: path_s.clone() })?;
    let header = unique_headers(
        header_row
            .iter()
            .enumerate()
            .map(|(idx, c)| header_name(cell_text(c), idx))
            .collect(),
    );
    debug!("read_retrospective: header: {:?}", header);

    let mut records: Vec<RowRecord> = Vec::new();
    for (lineno, row) in iter.enumerate() {
        let mut values: HashMap<String, Cell> = HashMap::new();
        let mut has_value = false;
        for (idx, col) in header.iter().enumerate() {
            let cell = row.get(idx).map(convert_cell).unwrap_or(Cell::Empty);
            if cell.answer().is_some() {
                has_value = true;
            }
            values.insert(col.clone(), cell);
        }
        if !has_value {
            debug!("read_retrospective: skipping blank row {}", lineno + 2);
            continue;
        }
        records.push(RowRecord::new(values));
    }
    Ok((header, records))
}

/// The source files of one directory, sorted by name. A missing directory has no files.
fn source_files(dir: &Path, settings: &Settings) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!("source_files: skipping {:?}: {}", dir, e);
            return Vec::new();
        }
    };
    let mut res: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            is_source_file(
                &simplify_file_name(p),
                &settings.file_marker,
                &settings.lock_marker,
            )
        })
        .collect();
    res.sort();
    res
}

/// Scans the data directory and its subdirectory, and groups the records by period.
///
/// Files that cannot be read are logged and reported in the failures. It is an
/// error if no file qualifies, or if none of them could be read.
pub fn load_dataset(settings: &Settings) -> RetroResult<LoadedData> {
    let dirs = settings.scan_directories();
    let paths: Vec<PathBuf> = dirs.iter().flat_map(|d| source_files(d, settings)).collect();
    if paths.is_empty() {
        let directories = dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<String>>()
            .join(", ");
        return NoSourceFilesSnafu { directories }.fail();
    }

    let mut dataset = Dataset::new();
    let mut files: Vec<String> = Vec::new();
    let mut failures: Vec<LoadFailure> = Vec::new();
    for p in paths.iter() {
        let name = simplify_file_name(p);
        match read_retrospective(p) {
            Ok((columns, records)) => {
                let label = period_label(&name);
                info!(
                    "load_dataset: {:?}: period {:?}, {} responses",
                    name,
                    label,
                    records.len()
                );
                dataset.add_file(&label, columns, records);
                files.push(name);
            }
            Err(e) => {
                warn!("load_dataset: skipping {:?}: {}", name, e);
                failures.push(LoadFailure {
                    file: name,
                    error: e.to_string(),
                });
            }
        }
    }
    if dataset.is_empty() {
        return NoUsableFilesSnafu {
            count: failures.len(),
        }
        .fail();
    }
    Ok(LoadedData {
        dataset,
        files,
        failures,
    })
}

// Spreadsheet fixtures for the tests.

use rust_xlsxwriter::Workbook;
use std::path::Path;

use crate::retro::config_reader::{DashboardConfig, Settings};

/// Writes a one-sheet workbook. Empty strings leave the cell blank.
pub fn write_sheet(path: &Path, header: &[&str], rows: &[&[&str]]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, h) in header.iter().enumerate() {
        if !h.is_empty() {
            sheet.write_string(0, col as u16, *h).unwrap();
        }
    }
    for (idx, row) in rows.iter().enumerate() {
        for (col, v) in row.iter().enumerate() {
            if !v.is_empty() {
                sheet.write_string((idx + 1) as u32, col as u16, *v).unwrap();
            }
        }
    }
    workbook.save(path).unwrap();
}

pub const FIXTURE_HEADER: [&str; 4] = ["Timestamp", "Team", "Director Org", "Comments"];

/// August: teams A, A, B. September: teams A, B.
pub fn write_team_fixtures(dir: &Path) {
    write_sheet(
        &dir.join("August Retrospective.xlsx"),
        &FIXTURE_HEADER,
        &[
            &["2024-08-01", "A", "Ann", "Good sprint"],
            &["2024-08-01", "A", "Ann", ""],
            &["2024-08-02", "B", "Bob", "Too many meetings"],
        ],
    );
    write_sheet(
        &dir.join("September Retrospective.xlsx"),
        &FIXTURE_HEADER,
        &[
            &["2024-09-01", "A", "Ann", ""],
            &["2024-09-02", "B", "Bob", "Better"],
        ],
    );
}

pub fn settings_for(dir: &Path) -> Settings {
    Settings::from_config(
        DashboardConfig {
            data_directory: Some(dir.display().to_string()),
            ..DashboardConfig::default()
        },
        dir,
    )
}

use log::info;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::retro::*;

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The period of a file: the first whitespace-delimited token of its name.
pub fn period_label(file_name: &str) -> String {
    file_name
        .split_whitespace()
        .next()
        .unwrap_or(file_name)
        .to_string()
}

/// True for the spreadsheets to load: `.xlsx` files that carry the marker and are not office lock files.
pub fn is_source_file(file_name: &str, marker: &str, lock_marker: &str) -> bool {
    file_name.to_lowercase().ends_with(".xlsx")
        && file_name.contains(marker)
        && !file_name.contains(lock_marker)
}

/// The name of a header cell. Blank headers are named after their position, starting at 1.
pub fn header_name(raw: Option<String>, idx: usize) -> String {
    match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => format!("Column {}", idx + 1),
    }
}

/// Renames repeated header names with a ` (2)`, ` (3)`... suffix so that no column shadows another.
pub fn unique_headers(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut res = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{} ({})", name, n);
            n += 1;
        }
        if candidate != name {
            debug!("unique_headers: renaming duplicate {:?} to {:?}", name, candidate);
        }
        seen.insert(candidate.clone());
        res.push(candidate);
    }
    res
}

fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn is_spreadsheet_upload(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".xlsx") || lower.ends_with(".xls")
}

/// Stores an uploaded file under a timestamped name. The file is not picked up by the loader.
pub fn store_upload(dir: &Path, name: &str, data: &[u8]) -> RetroResult<PathBuf> {
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: dir.display().to_string(),
    })?;
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let target = dir.join(format!("{}-{}", secs, sanitize_file_name(name)));
    fs::write(&target, data).context(WritingFileSnafu {
        path: target.display().to_string(),
    })?;
    info!("store_upload: stored {} bytes in {:?}", data.len(), target);
    Ok(target)
}

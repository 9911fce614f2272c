use crate::retro::*;

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The content of the optional JSON configuration file. Every key can be omitted.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardConfig {
    #[serde(rename = "dataDirectory")]
    pub data_directory: Option<String>,
    pub subdirectory: Option<String>,
    #[serde(rename = "fileMarker")]
    pub file_marker: Option<String>,
    #[serde(rename = "lockMarker")]
    pub lock_marker: Option<String>,
    #[serde(rename = "uploadDirectory")]
    pub upload_directory: Option<String>,
    #[serde(rename = "periodOrder")]
    pub period_order: Option<Vec<String>>,
    #[serde(rename = "directorColumn")]
    pub director_column: Option<String>,
    #[serde(rename = "timestampColumn")]
    pub timestamp_column: Option<String>,
    #[serde(rename = "recentPeriods")]
    pub recent_periods: Option<usize>,
    #[serde(rename = "exportSkipColumns")]
    pub export_skip_columns: Option<Vec<String>>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// The resolved settings, after defaults and command line overrides.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub data_directory: PathBuf,
    pub subdirectory: String,
    pub file_marker: String,
    pub lock_marker: String,
    pub upload_directory: PathBuf,
    pub period_order: PeriodOrder,
    pub director_column: String,
    pub timestamp_column: String,
    pub recent_periods: usize,
    pub export_skip_columns: Vec<String>,
    pub host: String,
    pub port: u16,
}

pub const DEFAULT_FILE_MARKER: &str = "Retrospective";
pub const DEFAULT_LOCK_MARKER: &str = "~$";
pub const DEFAULT_SUBDIRECTORY: &str = "data";
pub const DEFAULT_UPLOAD_DIRECTORY: &str = "uploads";
pub const DEFAULT_EMAIL_COLUMN: &str = "Email Address";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;

impl Settings {
    /// Applies the defaults. Relative directories are taken relative to `base`.
    pub fn from_config(config: DashboardConfig, base: &Path) -> Settings {
        let data_directory = resolve_dir(base, config.data_directory.as_deref().unwrap_or("."));
        let upload_directory = resolve_dir(
            &data_directory,
            config
                .upload_directory
                .as_deref()
                .unwrap_or(DEFAULT_UPLOAD_DIRECTORY),
        );
        let timestamp_column = config
            .timestamp_column
            .unwrap_or_else(|| DEFAULT_TIMESTAMP_COLUMN.to_string());
        let director_column = config
            .director_column
            .unwrap_or_else(|| DEFAULT_DIRECTOR_COLUMN.to_string());
        let export_skip_columns = config.export_skip_columns.unwrap_or_else(|| {
            vec![
                timestamp_column.clone(),
                DEFAULT_EMAIL_COLUMN.to_string(),
                director_column.clone(),
            ]
        });
        Settings {
            data_directory,
            subdirectory: config
                .subdirectory
                .unwrap_or_else(|| DEFAULT_SUBDIRECTORY.to_string()),
            file_marker: config
                .file_marker
                .unwrap_or_else(|| DEFAULT_FILE_MARKER.to_string()),
            lock_marker: config
                .lock_marker
                .unwrap_or_else(|| DEFAULT_LOCK_MARKER.to_string()),
            upload_directory,
            period_order: config
                .period_order
                .map(|l| PeriodOrder::new(&l))
                .unwrap_or_default(),
            director_column,
            timestamp_column,
            recent_periods: config.recent_periods.unwrap_or(DEFAULT_RECENT_PERIODS),
            export_skip_columns,
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
        }
    }

    /// The directories scanned for source files: the data directory, then its subdirectory.
    pub fn scan_directories(&self) -> Vec<PathBuf> {
        vec![
            self.data_directory.clone(),
            self.data_directory.join(&self.subdirectory),
        ]
    }

    pub fn trend_resolver(&self) -> ColumnResolver {
        ColumnResolver::for_trends(&self.timestamp_column)
    }
}

fn resolve_dir(base: &Path, dir: &str) -> PathBuf {
    let p = Path::new(dir);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

pub fn read_config(path: &str) -> RetroResult<DashboardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: DashboardConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Reads the configuration file if any, then applies the data directory override.
///
/// Without a configuration file, relative paths are taken from the working directory.
pub fn load_settings(config_path: Option<&str>, data_dir: Option<&str>) -> RetroResult<Settings> {
    let (mut config, base) = match config_path {
        Some(p) => {
            let base = Path::new(p)
                .parent()
                .map(|x| x.to_path_buf())
                .unwrap_or_default();
            (read_config(p)?, base)
        }
        None => (DashboardConfig::default(), PathBuf::new()),
    };
    if let Some(d) = data_dir {
        // The command line value is relative to the working directory.
        let cwd_relative = if Path::new(d).is_absolute() {
            d.to_string()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(d).display().to_string())
                .unwrap_or_else(|_| d.to_string())
        };
        config.data_directory = Some(cwd_relative);
    }
    Ok(Settings::from_config(config, &base))
}

use std::path::PathBuf;

use crate::ingest::{HeaderSniffer, DEFAULT_MAX_HEADER_ROWS};

const DATA_DIR_ENV: &str = "ATTENDANCE_DATA_DIR";
const USERS_FILE_ENV: &str = "ATTENDANCE_USERS_FILE";
const SUMMARY_FILE_ENV: &str = "ATTENDANCE_SUMMARY_FILE";
const DAILY_FILE_ENV: &str = "ATTENDANCE_DAILY_FILE";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_USERS_FILE: &str = "auth/users.csv";
const SUMMARY_FILE_NAME: &str = "attendance.csv";
const DAILY_FILE_NAME: &str = "daily_attendance.csv";

/// Values given on the command line; they win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub users_file: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
    pub daily_file: Option<PathBuf>,
    pub max_header_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub users_file: PathBuf,
    pub summary_file: PathBuf,
    pub daily_file: PathBuf,
    pub max_header_rows: usize,
}

impl AppConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    fn resolve_with<F>(overrides: ConfigOverrides, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = |key: &str| env(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let data_dir = overrides
            .data_dir
            .or_else(|| from_env(DATA_DIR_ENV))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            users_file: overrides
                .users_file
                .or_else(|| from_env(USERS_FILE_ENV))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE)),
            summary_file: overrides
                .summary_file
                .or_else(|| from_env(SUMMARY_FILE_ENV))
                .unwrap_or_else(|| data_dir.join(SUMMARY_FILE_NAME)),
            daily_file: overrides
                .daily_file
                .or_else(|| from_env(DAILY_FILE_ENV))
                .unwrap_or_else(|| data_dir.join(DAILY_FILE_NAME)),
            max_header_rows: overrides.max_header_rows.unwrap_or(DEFAULT_MAX_HEADER_ROWS).max(1),
        }
    }

    pub fn sniffer(&self) -> HeaderSniffer {
        HeaderSniffer::new(self.max_header_rows)
    }
}

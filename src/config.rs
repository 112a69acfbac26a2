use std::time::Duration;

use crate::error::{AppError, Result};

/// Default cron expression: every 10 minutes, on the minute (seconds field first).
pub const JOB_SCHEDULE: &str = "0 */10 * * * *";

/// Default per-request timeout for upstream calls (seconds).
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Sport codes retained by the ingestion job when SPORT_IDS is unset.
pub const DEFAULT_SPORT_IDS: &str = "4";

pub const DATABASE_URL: &str = "sqlite:ingestor.db";

/// Longest market id accepted on the detail route.
pub const MAX_MARKET_ID_LEN: usize = 64;

/// Longest title filter accepted on the list route.
pub const MAX_TITLE_QUERY_LEN: usize = 256;

/// Sentinel record appended every cycle when INCLUDE_SAMPLE_RECORD is on.
pub mod sample_record {
    pub const EVENT_NAME: &str = "sample data";
    pub const EVENT_ID: &str = "20396579";
    pub const MARKET_ID: &str = "20396617";
}

#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_base_url: String,
    pub upstream_token: String,
    pub upstream_timeout: Duration,
    /// Cron expression for the ingestion job (JOB_SCHEDULE).
    pub job_schedule: String,
    /// Run one cycle at boot, before the first scheduled tick (RUN_ON_STARTUP).
    pub run_on_startup: bool,
    pub database_url: String,
    pub api_port: u16,
    pub log_level: String,
    pub ingest: IngestConfig,
}

/// The subset of configuration an ingestion cycle needs.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Upstream `sportId` values to keep (SPORT_IDS, comma-separated).
    pub sport_ids: Vec<String>,
    /// Append the "sample data" sentinel to every candidate set (INCLUDE_SAMPLE_RECORD).
    pub include_sample_record: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sport_ids: parse_list(DEFAULT_SPORT_IDS),
            include_sample_record: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            upstream_base_url: required("UPSTREAM_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            upstream_token: required("UPSTREAM_TOKEN")?,
            upstream_timeout: Duration::from_secs(
                std::env::var("UPSTREAM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| UPSTREAM_TIMEOUT_SECS.to_string())
                    .parse::<u64>()
                    .map_err(|_| {
                        AppError::Config("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds".to_string())
                    })?,
            ),
            job_schedule: std::env::var("JOB_SCHEDULE").unwrap_or_else(|_| JOB_SCHEDULE.to_string()),
            run_on_startup: parse_flag("RUN_ON_STARTUP")?,
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            ingest: IngestConfig {
                sport_ids: parse_list(
                    &std::env::var("SPORT_IDS").unwrap_or_else(|_| DEFAULT_SPORT_IDS.to_string()),
                ),
                include_sample_record: parse_flag("INCLUDE_SAMPLE_RECORD")?,
            },
        })
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Config(format!("{name} must be set"))),
    }
}

fn parse_flag(name: &str) -> Result<bool> {
    match std::env::var(name) {
        Ok(v) => parse_bool(&v).ok_or_else(|| AppError::Config(format!("{name} must be true or false"))),
        Err(_) => Ok(false),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

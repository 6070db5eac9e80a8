use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::portfolio::Grouping;

#[derive(Debug, Clone)]
pub struct Config {
    pub transactions_path: PathBuf,
    pub market_data_path: Option<PathBuf>,
    pub grouping: Grouping,
    pub parallel_groups: bool,
    pub output_format: OutputFormat,
    pub audit_output_path: Option<PathBuf>,
    pub summary_output_path: Option<PathBuf>,
    /// Always written in CSV mode. In JSON mode the notes are already part
    /// of the summary document, so a separate file is written only when set.
    pub notes_output_path: Option<PathBuf>,
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let transactions_path = non_empty(&env_map, "TRANSACTIONS_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("TRANSACTIONS_PATH".to_string()))?;

        let market_data_path = non_empty(&env_map, "MARKET_DATA_PATH").map(PathBuf::from);

        let grouping = match env_map
            .get("GROUP_BY")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("instrument")
        {
            "instrument" => Grouping::Instrument,
            "owner" => Grouping::InstrumentAndOwner,
            other => {
                return Err(ConfigError::InvalidValue(
                    "GROUP_BY".to_string(),
                    format!("must be instrument or owner, got {}", other),
                ))
            }
        };

        let parallel_groups = match env_map
            .get("PARALLEL_GROUPS")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("true")
        {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PARALLEL_GROUPS".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let output_format = match env_map
            .get("OUTPUT_FORMAT")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("json")
        {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            other => {
                return Err(ConfigError::InvalidValue(
                    "OUTPUT_FORMAT".to_string(),
                    format!("must be json or csv, got {}", other),
                ))
            }
        };

        let audit_output_path = non_empty(&env_map, "AUDIT_OUTPUT_PATH").map(PathBuf::from);
        let summary_output_path = non_empty(&env_map, "SUMMARY_OUTPUT_PATH").map(PathBuf::from);
        let notes_output_path = non_empty(&env_map, "NOTES_OUTPUT_PATH").map(PathBuf::from);

        // CSV tables have different headers; two on one stream cannot be parsed back.
        if output_format == OutputFormat::Csv {
            let on_stdout: Vec<&str> = [
                ("AUDIT_OUTPUT_PATH", &audit_output_path),
                ("SUMMARY_OUTPUT_PATH", &summary_output_path),
                ("NOTES_OUTPUT_PATH", &notes_output_path),
            ]
            .into_iter()
            .filter(|(_, path)| path.is_none())
            .map(|(key, _)| key)
            .collect();
            if on_stdout.len() > 1 {
                return Err(ConfigError::InvalidValue(
                    "OUTPUT_FORMAT".to_string(),
                    format!(
                        "csv writes at most one table to stdout; set {}",
                        on_stdout.join(" or ")
                    ),
                ));
            }
        }

        let as_of = match non_empty(&env_map, "AS_OF_DATE") {
            Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue(
                    "AS_OF_DATE".to_string(),
                    "must be a YYYY-MM-DD date".to_string(),
                )
            })?,
            None => Utc::now().date_naive(),
        };

        Ok(Config {
            transactions_path,
            market_data_path,
            grouping,
            parallel_groups,
            output_format,
            audit_output_path,
            summary_output_path,
            notes_output_path,
            as_of,
        })
    }
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

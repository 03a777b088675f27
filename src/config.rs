use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;

use crate::models::{ImportOptions, SubjectCodePolicy, SubjectFailurePolicy};

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub import: ImportOptions,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = var("DATABASE_PATH").unwrap_or_else(|| "school.sqlite3".to_string());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .context("Failed to parse BIND_ADDR")?;

        let max_file_size = match var("MAX_FILE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .context("Failed to parse MAX_FILE_SIZE")?,
            None => default_max_file_size(),
        };

        let subject_failures = match var("IMPORT_SUBJECT_FAILURES") {
            Some(raw) => raw.parse::<SubjectFailurePolicy>().map_err(anyhow::Error::msg)?,
            None => SubjectFailurePolicy::default(),
        };

        let subject_codes = match var("IMPORT_SUBJECT_CODES") {
            Some(raw) => raw.parse::<SubjectCodePolicy>().map_err(anyhow::Error::msg)?,
            None => SubjectCodePolicy::default(),
        };

        Ok(Config {
            database_path,
            bind_addr,
            max_file_size,
            import: ImportOptions {
                subject_failures,
                subject_codes,
            },
        })
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}

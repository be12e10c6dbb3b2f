use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::ArgMatches;
use provider::{ProviderConfig, DEFAULT_BUCKET};

use super::error::CliError;

pub const URL_ENV: &str = "PDFSTORE_URL";
pub const ANON_KEY_ENV: &str = "PDFSTORE_ANON_KEY";
pub const BUCKET_ENV: &str = "PDFSTORE_BUCKET";
pub const SESSION_FILE_ENV: &str = "PDFSTORE_SESSION_FILE";
pub const TIMEOUT_ENV: &str = "PDFSTORE_TIMEOUT_SECS";
pub const PASSWORD_ENV: &str = "PDFSTORE_PASSWORD";

const SESSION_DIR: &str = ".pdfstore";
const SESSION_FILE: &str = "session.json";
const DEFAULT_TIMEOUT_SECS: &str = "30";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
    pub session_file: PathBuf,
    pub timeout: Duration,
}

impl Settings {
    /// Reads the backend settings. Command line arguments win over the
    /// environment.
    pub fn new(matches: &ArgMatches) -> Result<Settings, CliError> {
        let url = matches
            .get_one::<String>("backend")
            .cloned()
            .or_else(|| env::var(URL_ENV).ok())
            .filter(|s| !s.is_empty())
            .ok_or(CliError::MissingSetting(URL_ENV))?;
        let anon_key = env::var(ANON_KEY_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(CliError::MissingSetting(ANON_KEY_ENV))?;
        let bucket = matches
            .get_one::<String>("bucket")
            .cloned()
            .or_else(|| env::var(BUCKET_ENV).ok())
            .unwrap_or_else(|| String::from(DEFAULT_BUCKET));
        let session_file = env::var(SESSION_FILE_ENV).map_or_else(
            |_| {
                let home = env::var("HOME").unwrap_or_else(|_| String::from("."));
                PathBuf::from(home).join(SESSION_DIR).join(SESSION_FILE)
            },
            PathBuf::from,
        );
        let timeout = env::var(TIMEOUT_ENV).unwrap_or_else(|_| String::from(DEFAULT_TIMEOUT_SECS));
        let timeout = parse_timeout(&timeout)?;

        Ok(Settings {
            url,
            anon_key,
            bucket,
            session_file,
            timeout,
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::new(self.url.clone(), self.anon_key.clone());
        config.bucket.clone_from(&self.bucket);
        config.session_file = Some(self.session_file.clone());
        config.timeout = self.timeout;
        config
    }
}

fn parse_timeout(value: &str) -> Result<Duration, CliError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| CliError::InvalidSetting {
            name: TIMEOUT_ENV,
            value: value.to_owned(),
        })
}

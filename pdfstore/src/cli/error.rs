use kernel::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0} is not set")]
    MissingSetting(&'static str),
    #[error("invalid {name}: {value}")]
    InvalidSetting { name: &'static str, value: String },
    #[error("no file named {0}")]
    NotFound(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Client(#[from] client::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

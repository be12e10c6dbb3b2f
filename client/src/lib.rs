#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

pub mod dashboard;
pub mod error;
pub mod registry;
pub mod session;
pub mod state;
pub mod stats;

#[cfg(test)]
mod fake;

pub use dashboard::Dashboard;
pub use error::{Error, Result, ValidationError};
pub use registry::{Confirm, FileRegistry, PdfUpload, RegistryConfig};
pub use session::{CurrentIdentity, SessionManager};
pub use state::{AppState, Ticket};
pub use stats::{format_bytes, StatsAggregator};

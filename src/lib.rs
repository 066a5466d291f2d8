pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod io;
pub mod media;
pub mod state;

pub use config::GridConfig;
pub use dashboard::{CommitOutcome, Dashboard, GridState};
pub use error::{BackendError, GridError, Result};

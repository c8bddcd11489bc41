//! gridgen basic library
//!
//! Provides functions shared by gridgen crates:
//! - logging bootstrap
//! - shutdown signal handling
//! - layered configuration loading

pub mod config_loader;
pub mod logging;
pub mod shutdown;

pub use config_loader::{layered_figment, load_layered};
pub use logging::LogConfig;
pub use shutdown::{cancel_on_shutdown, wait_for_shutdown, ShutdownSignal};

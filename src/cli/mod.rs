//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, logging and signal
//! setup, and the command runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod logging;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{
    run_config, run_formats, run_record, run_screenshot, EXIT_ERROR, EXIT_INTERRUPTED,
    EXIT_SUCCESS, EXIT_USAGE_ERROR,
};
pub use args::{Cli, Commands, ConfigAction};
pub use logging::init_logging;
pub use presenter::Presenter;

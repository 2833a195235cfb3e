//! Presentation layer for roundtable
//!
//! This crate contains the CLI definition, the console formatter and the
//! live renderer that turns discussion events into terminal output.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::Cli;
pub use output::console::ConsoleFormatter;
pub use output::renderer::ConsoleRenderer;
pub use progress::reporter::ThinkingReporter;

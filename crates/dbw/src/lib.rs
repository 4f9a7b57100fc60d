#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::struct_excessive_bools,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown
)]

pub mod cli;
pub mod executor;

// Re-export dbw_core modules for integration tests
pub use dbw_core::app;
pub use dbw_core::diff;
pub use dbw_core::error;
pub use dbw_core::events;
pub use dbw_core::input;
pub use dbw_core::model;
pub use dbw_core::parser;
pub use dbw_core::poller;
pub use dbw_core::traits;
pub use dbw_core::tui;

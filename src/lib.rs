pub use taskdeck_cli::cli;
pub use taskdeck_cli::commands;
pub use taskdeck_cli::config;
pub use taskdeck_cli::logging;
pub use taskdeck_cli::AppConfig;

pub use taskdeck_core as core;
pub use taskdeck_core::model;
pub use taskdeck_core::session;
pub use taskdeck_core::store;

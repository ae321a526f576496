//! Console Realtime - Main Library
//!
//! Application layer for the realtime console: settings, logging, shutdown
//! handling and the tick/ack demo, on top of the workspace libraries.
//!
//! ## Architecture
//!
//! - **livesocket**: resilient WebSocket messaging client (re-exported from workspace)
//! - **relayhub**: WebSocket relay server (re-exported from workspace)
//! - **bin_common**: Common utilities for binary executables (CLI, banners)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use console_realtime::bin_common::{launch_options, Role};
//! use console_realtime::config::ClientSettings;
//!
//! let launch = launch_options()?;
//! let settings = ClientSettings::load(launch.settings_path(Role::Client))?;
//! ```

// Re-export workspace libraries for convenience
pub use livesocket;
pub use relayhub;

pub mod config;
pub mod demo;
pub mod logging;
pub mod shutdown;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{
        launch_options, parse_launch_args, resolve_settings_path, CliError, LaunchOptions, Role,
    };
    pub use runner::{print_banner, print_shutdown};
}

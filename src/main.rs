//! tilemux - A minimal tiling terminal multiplexer
//!
//! Splits the real terminal into fixed rectangles and runs one shell per
//! rectangle on its own pseudo-terminal. Each pane's output is remapped
//! into its rectangle as it streams through; there is no virtual screen.
//!
//! # Keybindings (Ctrl+B prefix)
//!
//! | Key | Action |
//! |-----|--------|
//! | o | Focus next pane |
//! | ; | Focus previous pane |
//! | 1-9 | Focus pane by number |
//! | Ctrl+B | Send a literal Ctrl+B |
//!
//! The program exits once every shell has exited.

mod config;
mod core;
mod ui;
mod wm;

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::pty::NativePtySystem;
use crate::ui::{CrosstermTerminal, OutputGate};
use crate::wm::Multiplexer;

/// Log to `~/.tilemux/tilemux.log`. `TILEMUX_LOG` overrides the config level.
fn init_logging(config: &Config) {
    let log_path = Config::dir()
        .map(|dir| dir.join("tilemux.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("tilemux.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("TILEMUX_LOG")
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_thread_names(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_logging(&config);

    info!("tilemux {} starting...", env!("CARGO_PKG_VERSION"));

    let terminal = Arc::new(CrosstermTerminal::new(cfg!(feature = "alternate-screen")));
    let output = OutputGate::spawn(io::stdout());
    let mut mux = Multiplexer::new(config, terminal, Arc::new(NativePtySystem), output);

    mux.start()?;
    mux.input_dispatcher()
        .spawn(io::stdin())
        .context("Failed to start stdin thread")?;
    mux.run()?;

    info!("tilemux exiting");
    // The stdin thread is still blocked in read
    std::process::exit(0);
}

//! CLI argument definitions for RTA.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rta_kernel::Source;

/// RTA -- real-time analytics over live data sources.
#[derive(Parser)]
#[command(
    name = "rta",
    version,
    about = "RTA -- ask questions about live data sources and set up alerts",
    long_about = "Answers natural-language questions about the Healthcare, IoT and Stock \
                  sources by generating and running SQL, and watches their live streams \
                  for conditions described in plain language."
)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config/rta.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Answer one question and exit.
    Ask {
        /// The question, in plain language.
        question: String,

        /// Data source: healthcare, iot or stock.
        #[arg(long, short, default_value = "healthcare")]
        source: Source,

        /// Also print the generated query and its rows.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Watch a live stream in the foreground until it ends or Ctrl-C.
    Monitor {
        /// What to watch for, e.g. "alert me when the fire alarm goes off".
        instruction: String,

        /// Data source: healthcare, iot or stock.
        #[arg(long, short, default_value = "iot")]
        source: Source,
    },

    /// Show which services are configured.
    Status,
}

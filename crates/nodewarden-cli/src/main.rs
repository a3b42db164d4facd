//! nodewarden unified CLI.
//!
//! # Quick Start
//!
//! ```bash
//! # Show the effective configuration (layered from defaults, project
//! # file, local override, and environment).
//! nodewarden config
//!
//! # Run a small in-process cluster of 3 named coordinators against a
//! # shared in-memory database and watch the election/failover unfold.
//! nodewarden demo --nodes 3 --duration-secs 60
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// nodewarden - high-availability coordination for a multi-node service.
#[derive(Parser)]
#[command(name = "nodewarden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration.
    Config {
        /// Output format: text, json, or toml.
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run an in-process demo cluster and print status transitions.
    Demo {
        /// Number of coordinators to run.
        #[arg(long, default_value_t = 3)]
        nodes: usize,

        /// How long to run the demo before printing the final listing.
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,

        /// Failover delay (seconds) shared by every demo node.
        #[arg(long, default_value_t = 15)]
        failover_delay_secs: i64,

        /// 1-based index of a node to kill partway through the demo, to
        /// observe failover. 0 disables the kill.
        #[arg(long, default_value_t = 0)]
        kill_node: usize,

        /// Seconds into the demo at which to kill `--kill-node`.
        #[arg(long, default_value_t = 10)]
        kill_after_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { format } => commands::config::show(&format),
        Commands::Demo {
            nodes,
            duration_secs,
            failover_delay_secs,
            kill_node,
            kill_after_secs,
        } => {
            commands::demo::run(commands::demo::DemoArgs {
                nodes,
                duration_secs,
                failover_delay_secs,
                kill_node,
                kill_after_secs,
            })
            .await
        }
    }
}

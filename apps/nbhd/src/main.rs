//! # nbhd - records and templates for neighborhood sites
//!
//! The main binary for nbhd.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │             apps/nbhd (THE BINARY)            │
//! │                                               │
//! │   ┌─────────────┐        ┌────────────────┐   │
//! │   │    CLI      │        │  TOML config   │   │
//! │   │   (clap)    │        │    (toml)      │   │
//! │   └──────┬──────┘        └───────┬────────┘   │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │   nbhd-core   │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! nbhd init
//! nbhd cid -f record.json
//! nbhd rkey -n 5
//! nbhd analyze ./my-site
//! nbhd publish --owner did:plc:abc123 -f post.json --url https://example.com/posts/hello/
//! ```

use clap::Parser;
use nbhd::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // NBHD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NBHD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose { "nbhd=debug" } else { "nbhd=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so command output stays pipeable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let is_status = matches!(cli.command, None | Some(cli::Commands::Status));
    if is_status && !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the nbhd startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ██╗██████╗ ██╗  ██╗██████╗
  ████╗  ██║██╔══██╗██║  ██║██╔══██╗
  ██╔██╗ ██║██████╔╝███████║██║  ██║
  ██║╚██╗██║██╔══██╗██╔══██║██║  ██║
  ██║ ╚████║██████╔╝██║  ██║██████╔╝
  ╚═╝  ╚═══╝╚═════╝ ╚═╝  ╚═╝╚═════╝

  Records & templates v{}

  Content-addressed • Time-ordered • Inferred
"#,
        env!("CARGO_PKG_VERSION")
    );
}

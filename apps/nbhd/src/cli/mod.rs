//! # nbhd CLI Module
//!
//! This module implements the CLI interface for nbhd.
//!
//! ## Available Commands
//!
//! - `status` - Show database status
//! - `cid` - Compute the CID of a JSON record
//! - `verify-cid` - Check the structure of a CID
//! - `rkey` - Generate record keys
//! - `decode-rkey` - Decode a record key
//! - `infer` - Infer a schema from frontmatter samples
//! - `analyze` - Analyze an 11ty template project
//! - `create` / `get` / `list` / `delete` - Record CRUD
//! - `publish` - Publish a blog post, optionally cross-posting
//! - `init` - Initialize a new database

mod commands;

use crate::config::{Backend, NbhdConfig, Settings};
use clap::{Parser, Subcommand};
use nbhd_core::NbhdError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// nbhd - records and templates for neighborhood sites
///
/// Content-addressed AT-Protocol records, time-ordered record keys, and
/// frontmatter schemas inferred from 11ty templates.
#[derive(Parser, Debug)]
#[command(name = "nbhd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the record database [default: nbhd.db]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend [default: redb]
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Path to a TOML config file (else $NBHD_CONFIG)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show database status
    Status,

    /// Compute the CID of a JSON record value
    Cid {
        /// Path to the JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check that a string is a well-formed CID
    VerifyCid {
        /// The CID to check
        cid: String,
    },

    /// Generate record keys
    Rkey {
        /// How many keys to generate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Decode a record key into its timestamp and random bits
    DecodeRkey {
        /// The record key
        rkey: String,
    },

    /// Infer a schema from a JSON array of frontmatter samples
    Infer {
        /// Path to the JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate an 11ty project and infer schemas per content type
    Analyze {
        /// Project directory
        path: PathBuf,
    },

    /// Create a record
    Create {
        /// Owner DID (else default_owner from config)
        #[arg(short, long)]
        owner: Option<String>,

        /// Collection NSID, e.g. app.nbhd.blog.post
        #[arg(short = 'C', long)]
        collection: String,

        /// Path to the JSON record value
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Fetch a record by AT URI
    Get {
        /// at://{owner}/{collection}/{rkey}
        uri: String,
    },

    /// List records of a collection, oldest first
    List {
        /// Owner DID (else default_owner from config)
        #[arg(short, long)]
        owner: Option<String>,

        /// Collection NSID
        #[arg(short = 'C', long)]
        collection: String,
    },

    /// Delete a record by AT URI
    Delete {
        /// at://{owner}/{collection}/{rkey}
        uri: String,
    },

    /// Publish a blog post from a JSON file
    Publish {
        /// Owner DID (else default_owner from config)
        #[arg(short, long)]
        owner: Option<String>,

        /// Path to the JSON blog post ({title, content, frontmatter, site_id})
        #[arg(short, long)]
        file: PathBuf,

        /// Public URL of the post (else derived from site_base_url)
        #[arg(short, long)]
        url: Option<String>,

        /// Do not create the linked feed post
        #[arg(long)]
        no_cross_post: bool,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Merge config file and global flags into effective settings.
pub fn settings(cli: &Cli) -> Result<Settings, NbhdError> {
    let config = NbhdConfig::load(cli.config.as_deref())?;
    Ok(Settings::resolve(
        config,
        cli.database.clone(),
        cli.backend,
        cli.json_mode,
    ))
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), NbhdError> {
    let settings = settings(&cli)?;
    tracing::debug!(
        database = %settings.database.display(),
        backend = %settings.backend,
        "resolved settings"
    );

    match cli.command {
        Some(Commands::Status) | None => cmd_status(&settings).map(drop),
        Some(Commands::Cid { file }) => cmd_cid(&settings, &file).map(drop),
        Some(Commands::VerifyCid { cid }) => cmd_verify_cid(&settings, &cid).map(drop),
        Some(Commands::Rkey { count }) => cmd_rkey(&settings, count).map(drop),
        Some(Commands::DecodeRkey { rkey }) => cmd_decode_rkey(&settings, &rkey).map(drop),
        Some(Commands::Infer { file }) => cmd_infer(&settings, &file).map(drop),
        Some(Commands::Analyze { path }) => cmd_analyze(&settings, &path).map(drop),
        Some(Commands::Create {
            owner,
            collection,
            file,
        }) => {
            let owner = settings.owner(owner)?;
            cmd_create(&settings, &owner, &collection, &file).map(drop)
        }
        Some(Commands::Get { uri }) => cmd_get(&settings, &uri).map(drop),
        Some(Commands::List { owner, collection }) => {
            let owner = settings.owner(owner)?;
            cmd_list(&settings, &owner, &collection).map(drop)
        }
        Some(Commands::Delete { uri }) => cmd_delete(&settings, &uri).map(drop),
        Some(Commands::Publish {
            owner,
            file,
            url,
            no_cross_post,
        }) => {
            let owner = settings.owner(owner)?;
            cmd_publish(&settings, &owner, &file, url.as_deref(), !no_cross_post).map(drop)
        }
        Some(Commands::Init { force }) => cmd_init(&settings, force),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lightbox_client::{QueueConfig, UploadMode};

#[derive(Debug, Parser)]
#[command(name = "lightbox", about = "Upload and browse images and a PDF")]
pub struct CliConfig {
    /// Collaborator URL
    #[arg(long, env = "LIGHTBOX_SERVER_URL", default_value = "http://127.0.0.1:3720")]
    pub server_url: String,

    /// API key sent as a bearer token
    #[arg(long, env = "LIGHTBOX_API_KEY")]
    pub api_key: Option<String>,

    /// Shared admin secret that mutating commands are checked against
    #[arg(long, env = "LIGHTBOX_ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    pub admin_password: String,

    /// Password presented for mutating commands
    #[arg(long, short = 'p', env = "LIGHTBOX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Multi-file image upload mode: per-item or atomic
    #[arg(long, env = "LIGHTBOX_UPLOAD_MODE", default_value = "per-item")]
    pub upload_mode: String,

    /// How long finished uploads stay listed (milliseconds)
    #[arg(long, env = "LIGHTBOX_PRUNE_DELAY_MS", default_value = "1500")]
    pub prune_delay_ms: u64,

    /// Upload body chunk size in bytes
    #[arg(long, env = "LIGHTBOX_CHUNK_SIZE", default_value = "65536")]
    pub chunk_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload images
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Replace the whole collection in one all-or-nothing call
        #[arg(long)]
        atomic: bool,
    },
    /// Upload the PDF, replacing the current one
    UploadDoc { file: PathBuf },
    /// List stored images and the PDF
    List,
    /// Remove the image at a position (as shown by `list`)
    Remove { index: u64 },
    /// Remove all images, or the PDF with --document
    Clear {
        #[arg(long)]
        document: bool,
    },
    /// Browse the images (or the PDF) full screen
    View {
        #[arg(long)]
        document: bool,
    },
}

impl Command {
    /// Whether the command changes collaborator state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Command::List | Command::View { .. })
    }
}

impl CliConfig {
    pub fn queue_config(&self) -> Result<QueueConfig> {
        let Some(mut mode) = UploadMode::from_str(&self.upload_mode) else {
            bail!(
                "unknown upload mode {:?} (expected per-item or atomic)",
                self.upload_mode
            );
        };
        if let Command::Upload { atomic: true, .. } = self.command {
            mode = UploadMode::Atomic;
        }
        Ok(QueueConfig {
            prune_delay: Duration::from_millis(self.prune_delay_ms),
            chunk_size: self.chunk_size.max(1),
            mode,
        })
    }
}

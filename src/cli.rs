use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::catalog::client::class;

/// Manage a directory of Minecraft mods against the CurseForge catalog.
#[derive(Debug, Parser)]
#[command(name = "mcpack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ContentType {
    Mod,
    Shader,
}

impl ContentType {
    pub fn class_id(self) -> u64 {
        match self {
            ContentType::Mod => class::MOD,
            ContentType::Shader => class::SHADER,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a mod to the bundle.
    Add {
        #[arg(short = 't', long = "type", value_enum, default_value = "mod")]
        content_type: ContentType,
        /// Search terms.
        #[arg(required = true)]
        name: Vec<String>,
    },
    /// Remove a mod from the bundle.
    Remove { name: String },
    /// List mods in the bundle.
    List,
    /// Download/update all mods in the bundle along with their dependencies.
    Update {
        /// Client only.
        #[arg(long, conflicts_with = "server")]
        client: bool,
        /// Server only.
        #[arg(long)]
        server: bool,
        /// Comma-separated mod slugs to skip the Minecraft version check for.
        #[arg(long = "skip-version")]
        skip_version: Option<String>,
    },
    /// Compute the common list of Minecraft versions supported by all mods
    /// in the pack.
    Commonver {
        /// Comma-separated mod slugs to leave out of the computation.
        #[arg(long = "skip-version")]
        skip_version: Option<String>,
    },
    /// Get/set the Minecraft version for this directory.
    Version { value: Option<String> },
    /// Get/set the mod loaders for this directory.
    Loaders { names: Vec<String> },
    /// Import a modlist from an exported file.
    Import { file: PathBuf },
    /// Export the modlist to a file.
    Export { file: PathBuf },
}

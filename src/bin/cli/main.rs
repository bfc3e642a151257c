//! CLI tool for reading 7z archives.

mod commands;
mod exit_codes;
mod progress;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pure Rust 7z archive reader
#[derive(Parser)]
#[command(name = "sevenz")]
#[command(author, version, about = "Pure Rust 7z archive reader", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Number of threads (0 = auto). Only single-threaded decoding is supported.
    #[arg(long, short = 't', default_value = "1", global = true, env = "SEVENZ_THREADS")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Entry names to extract (all when omitted)
        entries: Vec<String>,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Apply stored Unix permissions to extracted files
        #[arg(long)]
        preserve_permissions: bool,
    },

    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show technical details
        #[arg(long)]
        technical: bool,
    },

    /// Test archive integrity (alias: t)
    #[command(alias = "t")]
    Test {
        /// Archive file to test
        archive: PathBuf,

        /// Entry names to test (all when omitted)
        entries: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Extract {
            archive,
            entries,
            output,
            preserve_permissions,
        } => commands::extract(&commands::ExtractConfig {
            archive_path: &archive,
            output_dir: &output,
            names: &entries,
            preserve_permissions,
            quiet: cli.quiet,
            thread_count: cli.threads,
        }),

        Commands::List { archive, technical } => commands::list(&archive, technical),

        Commands::Test { archive, entries } => {
            commands::test(&archive, &entries, cli.quiet, cli.threads)
        }
    };

    std::process::exit(exit_code.code());
}

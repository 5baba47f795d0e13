// src/main.rs
//! CVS export tool - CLI entry point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "cvs-export")]
#[command(version)]
#[command(about = "Export merged CVS histories as a git fast-import stream", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy)]
enum ModeArg {
    /// Canonical order for small repositories, fast otherwise
    Adaptive,
    /// Per-branch order, blobs front-loaded
    Fast,
    /// Timestamp-sorted order, blobs interleaved
    Canonical,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a history description as a fast-import stream on stdout
    Export {
        /// Path to the history description file
        dagfile: PathBuf,

        /// Commit ordering mode
        #[arg(long, value_enum, default_value_t = ModeArg::Adaptive)]
        mode: ModeArg,

        /// Branch reference prefix
        #[arg(long, default_value = "refs/heads/")]
        branch_prefix: String,

        /// Replace commit dates with a synthetic monotonic clock
        #[arg(long)]
        force_dates: bool,

        /// Append CVS-ID revision pairs to each log message
        #[arg(long)]
        embed_ids: bool,

        /// Emit property cvs-revision records for reposurgeon
        #[arg(long)]
        reposurgeon: bool,

        /// Write a "path revision :mark" map to FILE
        #[arg(long, value_name = "FILE")]
        revision_map: Option<PathBuf>,

        /// Suppress commits at or before this Unix time
        #[arg(long, value_name = "SECONDS")]
        from_time: Option<i64>,

        /// Leading bytes to strip from every master path
        #[arg(long, default_value_t = 0)]
        strip: usize,

        /// Compress spilled blob files
        #[arg(long)]
        compress: bool,

        /// Author map file ("key = Full Name <email> ZONE" lines)
        #[arg(short = 'A', long, value_name = "FILE")]
        authormap: Option<PathBuf>,
    },

    /// List the unique author keys of a history in commit order
    Authors {
        /// Path to the history description file
        dagfile: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Export {
            dagfile,
            mode,
            branch_prefix,
            force_dates,
            embed_ids,
            reposurgeon,
            revision_map,
            from_time,
            strip,
            compress,
            authormap,
        }) => {
            let opts = cvs_export::ExportOptions {
                report_mode: match mode {
                    ModeArg::Adaptive => cvs_export::ReportMode::Adaptive,
                    ModeArg::Fast => cvs_export::ReportMode::Fast,
                    ModeArg::Canonical => cvs_export::ReportMode::Canonical,
                },
                branch_prefix,
                force_dates,
                embed_ids,
                reposurgeon,
                fromtime: from_time,
                strip,
                compress_blobs: compress,
                ..Default::default()
            };
            commands::cmd_export(&dagfile, opts, revision_map.as_deref(), authormap.as_deref())
        }

        Some(Commands::Authors { dagfile }) => commands::cmd_authors(&dagfile),

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cvs-export", &mut io::stdout());
            Ok(())
        }

        None => {
            println!("cvs-export v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'cvs-export --help' for usage information");
            Ok(())
        }
    }
}

// build.rs

use anyhow::{Context, Result};
use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: history description file
fn dagfile_arg() -> Arg {
    Arg::new("dagfile")
        .required(true)
        .value_name("FILE")
        .help("History description file")
}

fn build_cli() -> Command {
    Command::new("cvs-export")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Export merged CVS histories as a git fast-import stream")
        .subcommand_required(false)
        .subcommand(
            Command::new("export")
                .about("Export a history description as a fast-import stream on stdout")
                .arg(dagfile_arg())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(["adaptive", "fast", "canonical"])
                        .default_value("adaptive")
                        .help("Commit ordering mode"),
                )
                .arg(
                    Arg::new("branch_prefix")
                        .long("branch-prefix")
                        .default_value("refs/heads/")
                        .help("Branch reference prefix"),
                )
                .arg(
                    Arg::new("force_dates")
                        .long("force-dates")
                        .action(clap::ArgAction::SetTrue)
                        .help("Replace commit dates with a synthetic monotonic clock"),
                )
                .arg(
                    Arg::new("embed_ids")
                        .long("embed-ids")
                        .action(clap::ArgAction::SetTrue)
                        .help("Append CVS-ID revision pairs to each log message"),
                )
                .arg(
                    Arg::new("reposurgeon")
                        .long("reposurgeon")
                        .action(clap::ArgAction::SetTrue)
                        .help("Emit property cvs-revision records for reposurgeon"),
                )
                .arg(
                    Arg::new("revision_map")
                        .long("revision-map")
                        .value_name("FILE")
                        .help("Write a \"path revision :mark\" map to FILE"),
                )
                .arg(
                    Arg::new("from_time")
                        .long("from-time")
                        .value_name("SECONDS")
                        .help("Suppress commits at or before this Unix time"),
                )
                .arg(
                    Arg::new("strip")
                        .long("strip")
                        .default_value("0")
                        .help("Leading bytes to strip from every master path"),
                )
                .arg(
                    Arg::new("compress")
                        .long("compress")
                        .action(clap::ArgAction::SetTrue)
                        .help("Compress spilled blob files"),
                )
                .arg(
                    Arg::new("authormap")
                        .short('A')
                        .long("authormap")
                        .value_name("FILE")
                        .help("Author map file"),
                ),
        )
        .subcommand(
            Command::new("authors")
                .about("List the unique author keys of a history in commit order")
                .arg(dagfile_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let man_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").context("CARGO_MANIFEST_DIR not set")?)
        .join("man");
    fs::create_dir_all(&man_dir)
        .with_context(|| format!("cannot create man directory {}", man_dir.display()))?;

    let mut page = Vec::new();
    Man::new(build_cli())
        .render(&mut page)
        .context("cannot render man page")?;
    fs::write(man_dir.join("cvs-export.1"), page)
        .with_context(|| format!("cannot write man page under {}", man_dir.display()))?;
    Ok(())
}

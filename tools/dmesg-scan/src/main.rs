//! Scan a kernel log for lines matching any pattern from a patterns file.
//!
//! Input comes from a log file or, by default, from running `dmesg`. Each
//! input line is printed at most once, as soon as one pattern matches.

#![forbid(unsafe_code)]

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use clap::Parser;
use regex::{Regex, RegexBuilder};

#[derive(Parser, Debug)]
#[command(
    name = "dmesg-scan",
    about = "Print kernel log lines matching any pattern from a patterns file."
)]
struct Args {
    /// File with one regular expression per line, matched case-insensitively
    #[arg(short, long, default_value = "patterns.txt")]
    patterns: PathBuf,

    /// Scan this file instead of running `dmesg`
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Extra arguments passed straight to `dmesg` (ignored with --log-file)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    dmesg_args: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let patterns = load_patterns(&args.patterns)?;
    let content = match &args.log_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read log file {}", path.display()))?,
        None => run_dmesg(&args.dmesg_args)?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in content.lines() {
        if patterns.iter().any(|pattern| pattern.is_match(line)) {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn load_patterns(path: &Path) -> anyhow::Result<Vec<Regex>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read patterns file {}", path.display()))?;
    let mut patterns = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        match RegexBuilder::new(line).case_insensitive(true).build() {
            Ok(pattern) => patterns.push(pattern),
            // A bad pattern is reported and skipped; the rest still scan.
            Err(err) => eprintln!("skipping invalid pattern {line:?}: {err}"),
        }
    }
    Ok(patterns)
}

/// Invokes `dmesg` with an explicit argument vector. Never goes through a
/// shell, so caller-supplied arguments cannot smuggle in extra commands.
fn run_dmesg(extra_args: &[String]) -> anyhow::Result<String> {
    let output = Command::new("dmesg")
        .args(extra_args)
        .output()
        .context("failed to run dmesg")?;
    if !output.status.success() {
        bail!("dmesg exited with {}", output.status);
    }
    String::from_utf8(output.stdout).context("dmesg output was not valid UTF-8")
}

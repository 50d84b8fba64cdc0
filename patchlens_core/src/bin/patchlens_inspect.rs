use std::io::Write;

use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use patchlens_core::{
    report::render_snapshot, EngineConfig, Reconstructor, Snapshot, SnapshotHistory,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: patchlens-inspect <before> <after> [source] [method]";
const DEFAULT_METHOD: &str = "Unknown::Method";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PATCHLENS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let report = inspect(&args)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(report.as_bytes())
        .context("failed to write report")?;
    Ok(())
}

fn inspect(args: &[String]) -> Result<String> {
    let (before, after, source, method) = match args {
        [before, after] => (before, after, None, DEFAULT_METHOD),
        [before, after, source] => (before, after, Some(source), DEFAULT_METHOD),
        [before, after, source, method] => (before, after, Some(source), method.as_str()),
        _ => bail!(USAGE),
    };

    let before = read_instructions(&Utf8PathBuf::from(before))?;
    let after = read_instructions(&Utf8PathBuf::from(after))?;
    let source = source
        .map(|path| read_text(&Utf8PathBuf::from(path)))
        .transpose()?;

    let config = EngineConfig::default().with_env_overrides();
    config.validate().context("invalid engine configuration")?;
    let reconstructor = Reconstructor::new(&config).context("failed to build rewrite rules")?;

    let mut history = SnapshotHistory::new(config.internal_owners.clone());
    let snapshot = history.record(Snapshot::new("cli", method, 0, before, after));
    let reconstruction = reconstructor.reconstruct_snapshot(&snapshot, source.as_deref());
    Ok(render_snapshot(&snapshot, Some(&reconstruction)))
}

fn read_text(path: &Utf8PathBuf) -> Result<String> {
    std::fs::read_to_string(path.as_std_path()).with_context(|| format!("failed to read {path}"))
}

fn read_instructions(path: &Utf8PathBuf) -> Result<Vec<String>> {
    Ok(read_text(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

//! Filter command: run the configured policies against one request.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::info;
use veil_filter::StaticContext;
use veil_types::Attribute;

pub fn run(
    project: Option<&Path>,
    policies: &[PathBuf],
    attributes: &Path,
    context: &Path,
    report: bool,
) -> Result<()> {
    let config = super::load_config(project, policies)?;
    let engine = config.build_engine()?;

    let attributes: Vec<Attribute> = read_json(attributes)?;
    let request: StaticContext = read_json(context)?;

    let outcome = engine.filter_with_report(&attributes, &request);
    info!(
        requester = request.requester_id.as_deref().unwrap_or("<unknown>"),
        candidates = attributes.len(),
        released = outcome.attributes.len(),
        "Filtered attributes"
    );

    let output = if report {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome.attributes)?
    };
    println!("{output}");

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

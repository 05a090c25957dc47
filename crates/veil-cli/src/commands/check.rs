//! Policy validation command.

use std::path::{Path, PathBuf};

use anyhow::Result;

pub fn run(project: Option<&Path>, files: &[PathBuf], lenient: bool) -> Result<()> {
    let mut config = super::load_config(project, files)?;
    if lenient {
        config.validation.strict = false;
    }

    let set = config.load_policies()?;

    for warning in set.warnings() {
        println!("warning: {warning}");
    }
    println!(
        "OK: {} policies from {} file(s)",
        set.len(),
        config.policies.files.len()
    );

    Ok(())
}

//! Reset command handler

use anyhow::{Context, Result};

use codedock_core::{CodeStore, Config, FileCodeStore};

use crate::output::Output;
use crate::prompt::confirm;

/// Clear the persisted code
pub fn reset(config: &Config, yes: bool, output: &Output) -> Result<()> {
    let mut store = FileCodeStore::from_config(config);

    if !store.info().exists {
        output.message("Nothing saved; editor is already empty.");
        return Ok(());
    }

    if !yes && output.should_prompt() {
        println!("Clear saved code in {}", store.path().display());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.clear().context("Failed to clear saved code")?;
    output.warning("Code editor reset!");

    Ok(())
}

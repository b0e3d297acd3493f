//! Clear command - delete the saved session.

use anyhow::{Context, Result};
use clap::Args;
use forge_store::open_store;

use super::GlobalArgs;

#[derive(Args)]
pub struct ClearArgs {}

pub async fn execute(_args: ClearArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.config()?;
    let store = open_store(&config).context("Failed to open state store")?;
    let had_session = store.load()?.is_some();
    store.clear().context("Failed to clear session")?;

    if had_session {
        println!("Session cleared");
    } else {
        println!("No saved session");
    }
    Ok(())
}

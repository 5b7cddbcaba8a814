//! CLI command implementations.
//!
//! These commands build application state without binding a listener.

use anyhow::{Result, bail};

use crate::state::AppState;

/// List every manifest engine and whether it can be loaded.
pub fn cmd_engines(state: &AppState) -> Result<()> {
    let registry = state.registry();
    let outcomes = registry.check_all()?;

    if outcomes.is_empty() {
        println!("No engines declared in the manifest.");
        return Ok(());
    }

    println!(
        "{:<20} {:<20} {:<32} {:<10}",
        "ENGINE", "ENTRY POINT", "FILE", "STATUS"
    );
    println!("{}", "-".repeat(84));

    let mut broken = 0;
    for (entry, outcome) in &outcomes {
        let status = match outcome {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                broken += 1;
                format!("error: {e}")
            }
        };
        println!(
            "{:<20} {:<20} {:<32} {}",
            entry.identifier,
            entry.entry_point,
            entry.load_location.display(),
            status
        );
    }

    let registered = registry.catalog().names();
    println!();
    println!("Registered entry points: {}", registered.join(", "));

    if broken > 0 {
        bail!("{broken} of {} engine(s) cannot be loaded", outcomes.len());
    }
    Ok(())
}

// src/cli/status.rs

use std::path::Path;

use crate::adapters::Adapter;
use crate::workspace::{Workspace, WorkspaceOptions};

pub async fn run(base: &Path) -> i32 {
    let workspace = match Workspace::open(WorkspaceOptions::new(base)).await {
        Ok(w) => w,
        Err(e) => {
            eprintln!("cortex: failed to open workspace at {}: {e}", base.display());
            return 1;
        }
    };

    println!("base directory: {}", base.display());

    let stores = workspace.stores.lock().await;
    for tier in stores.fixed_tiers() {
        let active = stores.tier(tier).index().active().count();
        println!("  {:<12} {} active records", tier.as_str(), active);
    }
    drop(stores);

    println!("adapters:");
    for adapter in workspace.registry.get_all().await {
        let config = adapter.config();
        let available = adapter.is_available().await;
        println!(
            "  {:<22} priority={:.2} timeout={}ms available={}",
            config.name, config.priority, config.timeout_ms, available
        );
    }

    println!("degradation level: {:?}", workspace.resilience.level());
    0
}

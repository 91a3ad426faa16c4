// src/cli/consolidate.rs

use std::path::Path;

use crate::workspace::{Workspace, WorkspaceOptions};

pub async fn run(base: &Path, dry_run: bool) -> i32 {
    let workspace = match Workspace::open(WorkspaceOptions::new(base)).await {
        Ok(w) => w,
        Err(e) => {
            eprintln!("cortex: failed to open workspace at {}: {e}", base.display());
            return 1;
        }
    };

    let mut stores = workspace.stores.lock().await;
    match crate::tiers::consolidate(&mut stores, dry_run).await {
        Ok(report) => {
            println!(
                "merged {} duplicate groups, removed {} records{}",
                report.groups_merged,
                report.records_deleted,
                if dry_run { " (dry run)" } else { "" }
            );
            0
        }
        Err(e) => {
            eprintln!("cortex: consolidation failed: {e}");
            1
        }
    }
}

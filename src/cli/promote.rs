// src/cli/promote.rs

use std::path::Path;

use chrono::Utc;

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
    match crate::tiers::promote(&mut stores, Utc::now(), dry_run).await {
        Ok(report) => {
            println!(
                "promoted {} working->short-term, {} short-term->long-term, {} short-term archived{}",
                report.working_to_short_term,
                report.short_term_to_long_term,
                report.short_term_archived,
                if dry_run { " (dry run)" } else { "" }
            );
            0
        }
        Err(e) => {
            eprintln!("cortex: promotion failed: {e}");
            1
        }
    }
}

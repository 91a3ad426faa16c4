// src/cli/bootstrap.rs
// Creates the installation layout and, optionally, seeds records by
// parsing whatever curated markdown files are already registered.

use std::path::Path;

use crate::adapters::Adapter;
use crate::workspace::{Workspace, WorkspaceOptions};

const DIRS: &[&str] = &[
    "data/memories/projects",
    "data/skills",
    "data/patterns",
    "data/configs/history",
    "data/vector",
    "data/cache",
    "annotations",
    "logs",
];

pub async fn run(base: &Path, seed: bool, force: bool) -> i32 {
    if base.exists() && !force && base.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) {
        eprintln!("cortex: {} already exists and is non-empty; pass --force to proceed anyway", base.display());
        return 1;
    }

    for dir in DIRS {
        if let Err(e) = std::fs::create_dir_all(base.join(dir)) {
            eprintln!("cortex: failed to create {}: {e}", base.join(dir).display());
            return 1;
        }
    }

    let workspace = match Workspace::open(WorkspaceOptions::new(base)).await {
        Ok(w) => w,
        Err(e) => {
            eprintln!("cortex: bootstrap could not open workspace: {e}");
            return 1;
        }
    };

    if seed {
        if let Some(adapter) = workspace.registry.get("curated-markdown").await {
            let context = crate::context::ContextBuilder::new("").build();
            let outcome = adapter.query(&context, &Default::default()).await;
            println!("seeded {} records from curated markdown", outcome.records.len());
        }
    }

    println!("bootstrap complete at {}", base.display());
    0
}

// src/cli/search.rs

use std::path::Path;

use crate::context::ContextBuilder;
use crate::orchestrator::format::OutputFormat;
use crate::orchestrator::{QueryFilters, TokenBudget};
use crate::record::RecordType;
use crate::workspace::{Workspace, WorkspaceOptions};

use super::SearchFormat;

fn parse_record_type(s: &str) -> Option<RecordType> {
    match s.to_lowercase().as_str() {
        "learning" => Some(RecordType::Learning),
        "pattern" => Some(RecordType::Pattern),
        "skill" => Some(RecordType::Skill),
        "correction" => Some(RecordType::Correction),
        "preference" => Some(RecordType::Preference),
        _ => None,
    }
}

pub async fn run(
    base: &Path,
    query: &str,
    record_type: Option<String>,
    source: Option<String>,
    limit: usize,
    format: SearchFormat,
) -> i32 {
    let workspace = match Workspace::open(WorkspaceOptions::new(base)).await {
        Ok(w) => w,
        Err(e) => {
            eprintln!("cortex: failed to open workspace at {}: {e}", base.display());
            return 1;
        }
    };

    let record_type = match record_type.as_deref().map(parse_record_type) {
        Some(None) => {
            eprintln!("cortex: unknown --type value");
            return 1;
        }
        Some(Some(rt)) => Some(rt),
        None => None,
    };

    let context = ContextBuilder::new(query).build();
    let filters = QueryFilters { record_type, project_hash: None, min_confidence: None };
    let mut budget = TokenBudget::default();
    budget.per_memory = budget.per_memory.max(1);

    let output_format = match format {
        SearchFormat::Table | SearchFormat::Plain => OutputFormat::Plain,
        SearchFormat::Json => OutputFormat::Plain,
    };

    let result = workspace.orchestrator.query(&context, &filters, &budget, output_format).await;

    let mut records = result.records;
    if let Some(source) = &source {
        records.retain(|r| &r.source == source);
    }
    records.truncate(limit);

    if records.is_empty() {
        eprintln!("cortex: no matches for '{query}'");
        return 1;
    }

    match format {
        SearchFormat::Json => match serde_json::to_string_pretty(&records) {
            Ok(body) => println!("{body}"),
            Err(e) => {
                eprintln!("cortex: failed to serialize results: {e}");
                return 1;
            }
        },
        SearchFormat::Table => {
            println!("{:<10} {:<8} {:<40} SOURCE", "TYPE", "SCORE", "SUMMARY");
            for record in &records {
                println!(
                    "{:<10} {:<8.2} {:<40} {}",
                    record.record_type.as_str(),
                    record.relevance_score,
                    truncate(&record.summary, 40),
                    record.source
                );
            }
        }
        SearchFormat::Plain => {
            for record in &records {
                println!("{}", record.summary);
            }
        }
    }

    0
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}

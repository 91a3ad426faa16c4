// src/adapters/curated_markdown.rs
// Parses user-curated markdown files (e.g. CLAUDE.md) at configured paths.
// Per-file cache keyed by mtime, 1-minute TTL.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use moka::future::Cache;

use crate::adapters::{Adapter, AdapterConfig, AdapterOutcome, QueryOptions};
use crate::context::Context;
use crate::record::{MemoryRecord, RecordType};

pub const DEFAULT_TIMEOUT_MS: u64 = 100;
const CACHE_TTL: Duration = Duration::from_secs(60);

const TECHNOLOGY_KEYWORDS: &[&str] = &["rust", "typescript", "python", "docker", "react", "postgres", "graphql"];
const LEARNING_INDICATORS: &[&str] = &["fixed", "solved", "resolved", "problem", "issue", "workaround"];

pub struct CuratedMarkdownAdapter {
    config: AdapterConfig,
    paths: Vec<PathBuf>,
    cache: Cache<PathBuf, (SystemTime, Vec<MemoryRecord>)>,
}

impl CuratedMarkdownAdapter {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            config: AdapterConfig {
                name: "curated-markdown".to_string(),
                priority: 0.85,
                timeout_ms: DEFAULT_TIMEOUT_MS,
                enabled: true,
            },
            paths,
            cache: Cache::builder().time_to_live(CACHE_TTL).max_capacity(64).build(),
        }
    }

    async fn parse_file(&self, path: &PathBuf) -> Vec<MemoryRecord> {
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);

        if let Some((cached_mtime, records)) = self.cache.get(path).await
            && cached_mtime == mtime
        {
            return records;
        }

        let Ok(content) = std::fs::read_to_string(path) else {
            return Vec::new();
        };

        let records = parse_markdown(&content, &path.display().to_string());
        self.cache.insert(path.clone(), (mtime, records.clone())).await;
        records
    }
}

#[async_trait]
impl Adapter for CuratedMarkdownAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn query(&self, _context: &Context, options: &QueryOptions) -> AdapterOutcome {
        let mut all = Vec::new();
        for path in &self.paths {
            all.extend(self.parse_file(path).await);
        }
        if let Some(limit) = options.limit {
            all.truncate(limit);
        }
        AdapterOutcome::ok(all)
    }
}

/// Parses `##`/`###` sections, within each extracting bullets (>10 chars),
/// fenced code blocks (>20 chars, with up to 3 preceding context lines),
/// pipe-table rows as `key: value`, and standalone learning-like paragraphs.
fn parse_markdown(content: &str, source_path: &str) -> Vec<MemoryRecord> {
    let mut records = Vec::new();
    let mut current_heading = String::new();
    let mut preceding: Vec<String> = Vec::new();
    let mut in_code_block = false;
    let mut code_buf = String::new();
    let mut code_context: Vec<String> = Vec::new();

    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("###").or_else(|| trimmed.strip_prefix("##")) {
            current_heading = rest.trim().to_string();
            i += 1;
            continue;
        }

        if trimmed.starts_with("```") {
            if in_code_block {
                in_code_block = false;
                if code_buf.trim().len() > 20 {
                    let mut content = String::new();
                    for ctx in &code_context {
                        content.push_str(ctx);
                        content.push('\n');
                    }
                    content.push_str(code_buf.trim());
                    records.push(make_record(&current_heading, &content, source_path, RecordType::Pattern));
                }
                code_buf.clear();
            } else {
                in_code_block = true;
                code_context = preceding.iter().rev().take(3).rev().cloned().collect();
            }
            i += 1;
            continue;
        }
        if in_code_block {
            code_buf.push_str(line);
            code_buf.push('\n');
            i += 1;
            continue;
        }

        if (trimmed.starts_with("- ") || trimmed.starts_with("* ")) && trimmed.len() > 10 {
            let text = trimmed.trim_start_matches(['-', '*']).trim();
            records.push(make_record(&current_heading, text, source_path, infer_type(&current_heading, text)));
        } else if trimmed.starts_with('|') && trimmed.contains('|') && !trimmed.chars().all(|c| "|-: ".contains(c)) {
            if let Some((key, value)) = parse_table_row(trimmed) {
                records.push(make_record(&current_heading, &format!("{key}: {value}"), source_path, RecordType::Preference));
            }
        } else if !trimmed.is_empty() && is_learning_like(trimmed) {
            records.push(make_record(&current_heading, trimmed, source_path, RecordType::Learning));
        }

        if !trimmed.is_empty() {
            preceding.push(trimmed.to_string());
            if preceding.len() > 8 {
                preceding.remove(0);
            }
        }
        i += 1;
    }

    records
}

fn parse_table_row(row: &str) -> Option<(String, String)> {
    let cells: Vec<&str> = row.trim_matches('|').split('|').map(str::trim).collect();
    if cells.len() >= 2 && !cells[0].is_empty() {
        Some((cells[0].to_string(), cells[1].to_string()))
    } else {
        None
    }
}

fn is_learning_like(text: &str) -> bool {
    let lower = text.to_lowercase();
    LEARNING_INDICATORS.iter().any(|kw| lower.contains(kw))
}

fn infer_type(heading: &str, text: &str) -> RecordType {
    let lower = format!("{heading} {text}").to_lowercase();
    if lower.contains("skill") || lower.contains("technique") {
        RecordType::Skill
    } else if lower.contains("prefer") || lower.contains("always") || lower.contains("never") {
        RecordType::Preference
    } else if lower.contains("fix") || lower.contains("bug") || lower.contains("correction") {
        RecordType::Correction
    } else if lower.contains("pattern") || lower.contains("approach") || lower.contains("workflow") {
        RecordType::Pattern
    } else {
        RecordType::Learning
    }
}

fn make_record(heading: &str, text: &str, source_path: &str, record_type: RecordType) -> MemoryRecord {
    let mut record = MemoryRecord::new(
        format!("claudemd:{source_path}"),
        record_type,
        text.to_string(),
        "curated-markdown",
    );
    record.source_priority = 0.85;
    for kw in TECHNOLOGY_KEYWORDS {
        if text.to_lowercase().contains(kw) {
            record.tags.insert(kw.to_string());
        }
    }
    for word in heading.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if word.len() > 2 {
            record.tags.insert(word);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bullets_and_code_blocks() {
        let md = "## Git Workflow\n\nUse fast-forward merges.\n\n- Always rebase before pushing\n\n```bash\ngit pull --rebase origin main\n```\n";
        let records = parse_markdown(md, "CLAUDE.md");
        assert!(records.iter().any(|r| r.content.contains("Always rebase")));
        assert!(records.iter().any(|r| r.content.contains("git pull --rebase")));
    }

    #[test]
    fn learning_like_paragraph_is_captured() {
        let md = "## Notes\n\nFixed the race condition by adding a mutex around the cache.\n";
        let records = parse_markdown(md, "CLAUDE.md");
        assert!(records.iter().any(|r| r.record_type == RecordType::Learning));
    }

    #[test]
    fn table_row_becomes_key_value_preference() {
        let md = "## Config\n\n| timeout | 30s |\n";
        let records = parse_markdown(md, "CLAUDE.md");
        assert!(records.iter().any(|r| r.content == "timeout: 30s"));
    }
}

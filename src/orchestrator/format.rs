// src/orchestrator/format.rs
// Renders the selected memories as XML, Markdown, or plain text for
// injection into the assistant's context.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::record::MemoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xml,
    Markdown,
    Plain,
}

pub fn format_memories(records: &[MemoryRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Xml => format_xml(records),
        OutputFormat::Markdown => format_markdown(records),
        OutputFormat::Plain => format_plain(records),
    }
}

fn group_by_type(records: &[MemoryRecord]) -> BTreeMap<&'static str, Vec<&MemoryRecord>> {
    let mut groups: BTreeMap<&'static str, Vec<&MemoryRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.record_type.as_str()).or_default().push(record);
    }
    groups
}

fn format_xml(records: &[MemoryRecord]) -> String {
    let mut out = String::from("<memories>\n");
    for (type_name, group) in group_by_type(records) {
        let _ = writeln!(out, "  <{type_name}>");
        for record in group {
            let _ = write!(out, "    <memory relevance=\"{:.2}\">", record.relevance_score);
            let _ = write!(out, "<summary>{}</summary>", escape_xml(&record.summary));
            if !record.tags.is_empty() {
                let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
                let _ = write!(out, "<tags>{}</tags>", escape_xml(&tags.join(",")));
            }
            out.push_str("</memory>\n");
        }
        let _ = writeln!(out, "  </{type_name}>");
    }
    out.push_str("</memories>\n");
    out
}

fn format_markdown(records: &[MemoryRecord]) -> String {
    let mut out = String::from("## Relevant Memories\n\n");
    for (type_name, group) in group_by_type(records) {
        let _ = writeln!(out, "### {}", capitalize(type_name));
        for record in group {
            let _ = write!(out, "- {}", record.summary);
            if !record.tags.is_empty() {
                let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
                let _ = write!(out, " _(tags: {})_", tags.join(", "));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn format_plain(records: &[MemoryRecord]) -> String {
    records.iter().map(|r| r.summary.clone()).collect::<Vec<_>>().join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    #[test]
    fn markdown_groups_by_type_under_subheads() {
        let mut r = MemoryRecord::new("jsonl:a", RecordType::Learning, "c", "jsonl:working");
        r.summary = "use rebase".to_string();
        let out = format_memories(&[r], OutputFormat::Markdown);
        assert!(out.contains("## Relevant Memories"));
        assert!(out.contains("### Learning"));
        assert!(out.contains("use rebase"));
    }

    #[test]
    fn xml_escapes_special_characters() {
        let mut r = MemoryRecord::new("jsonl:a", RecordType::Learning, "c", "jsonl:working");
        r.summary = "a < b & c".to_string();
        let out = format_memories(&[r], OutputFormat::Xml);
        assert!(out.contains("a &lt; b &amp; c"));
    }
}

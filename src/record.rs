// src/record.rs
// The normalized memory record: universal currency between adapters, stores,
// search, and the orchestrator.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version. Bump when `MemoryRecord`'s shape changes in a way
/// that old JSONL lines can't be read as-is.
pub const SCHEMA_VERSION: u32 = 1;

/// `decayScore = max(0.1, exp(-age / 30 days))`.
const DECAY_HALF_LIFE_SECS: f64 = 30.0 * 86_400.0;
const DECAY_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Learning,
    Pattern,
    Skill,
    Correction,
    Preference,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Learning => "learning",
            RecordType::Pattern => "pattern",
            RecordType::Skill => "skill",
            RecordType::Correction => "correction",
            RecordType::Preference => "preference",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Archived,
    Deleted,
}

/// Intent taxonomy shared between records and `Context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Debugging,
    Implementation,
    Testing,
    Configuration,
    Workflow,
    Solution,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Debugging => "debugging",
            Intent::Implementation => "implementation",
            Intent::Testing => "testing",
            Intent::Configuration => "configuration",
            Intent::Workflow => "workflow",
            Intent::Solution => "solution",
            Intent::General => "general",
        }
    }
}

impl Default for Intent {
    fn default() -> Self {
        Intent::General
    }
}

/// The universal record shape every adapter normalizes into and every store
/// persists. The wire format keeps its underscore-prefixed field names
/// (`_source`, `_sourcePriority`, `_relevanceScore`) via `serde(rename)`;
/// Rust has no bare sigil-prefixed field convention, so the underscore
/// survives only on the wire, not in the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub content: String,
    pub summary: String,
    #[serde(rename = "projectHash", skip_serializing_if = "Option::is_none", default)]
    pub project_hash: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub intent: Intent,
    #[serde(rename = "sourceSessionId")]
    pub source_session_id: String,
    #[serde(rename = "sourceTimestamp")]
    pub source_timestamp: DateTime<Utc>,
    #[serde(rename = "extractionConfidence", default)]
    pub extraction_confidence: f64,
    #[serde(rename = "usageCount", default)]
    pub usage_count: u64,
    #[serde(rename = "usageSuccessRate", default)]
    pub usage_success_rate: f64,
    #[serde(rename = "lastUsed", skip_serializing_if = "Option::is_none", default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(rename = "decayScore", default = "default_decay")]
    pub decay_score: f64,
    #[serde(default = "default_status")]
    pub status: RecordStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_source")]
    pub source: String,
    #[serde(rename = "_sourcePriority", default)]
    pub source_priority: f64,
    /// Per-query relevance score. Never persisted: stripped before writes
    /// and recomputed fresh on every query.
    #[serde(rename = "_relevanceScore", skip_serializing, default)]
    pub relevance_score: f64,
    /// Promotion/consolidation provenance, carried through tier moves.
    #[serde(rename = "promotedFrom", skip_serializing_if = "Option::is_none", default)]
    pub promoted_from: Option<String>,
    #[serde(rename = "promotedAt", skip_serializing_if = "Option::is_none", default)]
    pub promoted_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedFrom", skip_serializing_if = "Vec::is_empty", default)]
    pub merged_from: Vec<String>,
    #[serde(rename = "deletedAt", skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

fn default_decay() -> f64 {
    1.0
}

fn default_status() -> RecordStatus {
    RecordStatus::Active
}

impl MemoryRecord {
    /// Build a record with the required fields and sane defaults for the
    /// rest, mirroring what `append` fills in when an adapter/extractor
    /// omits them.
    pub fn new(
        id: impl Into<String>,
        record_type: RecordType,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let content = content.into();
        let summary = derive_summary(&content);
        Self {
            id: id.into(),
            version: SCHEMA_VERSION,
            record_type,
            content,
            summary,
            project_hash: None,
            tags: BTreeSet::new(),
            intent: Intent::General,
            source_session_id: String::new(),
            source_timestamp: now,
            extraction_confidence: 1.0,
            usage_count: 0,
            usage_success_rate: 0.0,
            last_used: None,
            decay_score: 1.0,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
            source: source.into(),
            source_priority: 0.5,
            relevance_score: 0.0,
            promoted_from: None,
            promoted_at: None,
            merged_from: Vec::new(),
            deleted_at: None,
        }
    }

    pub fn is_global(&self) -> bool {
        // Absent field means global.
        self.project_hash.is_none()
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.source_timestamp)
    }

    /// `decayScore = max(0.1, exp(-age / 30 days))`.
    pub fn recompute_decay(&mut self) {
        self.decay_score = decay_score(self.source_timestamp);
    }

    pub fn soft_delete(&mut self) {
        self.status = RecordStatus::Deleted;
        self.deleted_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn usefulness(&self) -> f64 {
        if self.usage_count > 0 {
            self.usage_success_rate
        } else {
            self.extraction_confidence
        }
    }

    /// Duplicate key used by consolidation:
    /// `type : lowercased(summary[:100])` (or content[:100] if summary absent).
    pub fn duplicate_key(&self) -> String {
        let basis = if self.summary.is_empty() {
            &self.content
        } else {
            &self.summary
        };
        let truncated: String = basis.chars().take(100).collect();
        format!("{}:{}", self.record_type.as_str(), truncated.to_lowercase())
    }
}

pub fn decay_score(source_timestamp: DateTime<Utc>) -> f64 {
    let age_secs = Utc::now()
        .signed_duration_since(source_timestamp)
        .num_seconds()
        .max(0) as f64;
    let raw = (-age_secs / DECAY_HALF_LIFE_SECS).exp();
    raw.max(DECAY_FLOOR)
}

/// `summary` is a prefix of `content` up to 100 chars.
pub fn derive_summary(content: &str) -> String {
    let trimmed = content.trim();
    let truncated: String = trimmed.chars().take(100).collect();
    truncated
}

/// A decision captured by the pattern tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "decisionType")]
    pub decision_type: String,
    pub context: String,
    pub choice: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub confidence: f64,
}

/// The outcome of a decision; may never arrive ("pending" decision).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "decisionId")]
    pub decision_id: String,
    pub useful: Option<bool>,
    #[serde(default)]
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationTargetType {
    Conversation,
    Message,
    Snippet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Tag,
    Note,
    Correction,
    Highlight,
    Link,
}

/// A user annotation layered on a read-only source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "targetType")]
    pub target_type: AnnotationTargetType,
    #[serde(rename = "annotationType")]
    pub annotation_type: AnnotationType,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub status: RecordStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decay_score_is_one_at_zero_age() {
        let score = decay_score(Utc::now());
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decay_score_floors_at_point_one() {
        let ancient = Utc::now() - Duration::days(365 * 5);
        assert_eq!(decay_score(ancient), DECAY_FLOOR);
    }

    #[test]
    fn summary_is_prefix_of_content() {
        let content = "a".repeat(250);
        let summary = derive_summary(&content);
        assert_eq!(summary.len(), 100);
        assert!(content.starts_with(&summary));
    }

    #[test]
    fn duplicate_key_uses_summary_not_content_when_present() {
        let mut r = MemoryRecord::new("jsonl:x", RecordType::Pattern, "full content body", "jsonl:working");
        r.summary = "Use repository pattern".to_string();
        assert_eq!(r.duplicate_key(), "pattern:use repository pattern");
    }

    #[test]
    fn absent_project_hash_is_global() {
        let r = MemoryRecord::new("jsonl:x", RecordType::Learning, "c", "jsonl:working");
        assert!(r.is_global());
    }
}

// src/context/mod.rs
// Builds a structured Context from a prompt, a working directory, and
// optional file/git metadata — pure functions over a fixed pattern library,
// no I/O beyond what the caller already gathered.

pub mod domains;
pub mod intent;
pub mod scoring;
pub mod tags;

use std::collections::BTreeSet;

pub use intent::IntentClassification;
pub use scoring::{rank_memories, score_memory, ScoringWeights};

use crate::record::Intent;
use crate::util::project_hash;

/// A structured summary of the current moment, used to rank memories and to
/// build adapter query strings.
#[derive(Debug, Clone)]
pub struct Context {
    pub prompt: String,
    pub working_dir: Option<String>,
    pub project_hash: Option<String>,
    pub project_name: Option<String>,
    pub git_branch: Option<String>,
    pub paths: Vec<String>,
    pub intent: IntentClassification,
    pub tags: BTreeSet<String>,
    pub domains: BTreeSet<String>,
}

impl Context {
    pub fn intent(&self) -> Intent {
        self.intent.primary
    }
}

pub struct ContextBuilder {
    prompt: String,
    working_dir: Option<String>,
    project_hash: Option<String>,
    project_name: Option<String>,
    git_branch: Option<String>,
    paths: Vec<String>,
}

impl ContextBuilder {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            working_dir: None,
            project_hash: None,
            project_name: None,
            git_branch: None,
            paths: Vec::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        self.project_hash = Some(project_hash(&dir));
        self.project_name = std::path::Path::new(&dir)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        self.working_dir = Some(dir);
        self
    }

    pub fn with_project_hash(mut self, hash: Option<String>) -> Self {
        self.project_hash = hash;
        self
    }

    pub fn with_git_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_branch = Some(branch.into());
        self
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    pub fn build(self) -> Context {
        let classification = intent::classify_intent(&self.prompt);
        let domains = domains::detect_domains(&self.paths);
        let intent_tag = (classification.confidence > 0.0).then(|| classification.primary.as_str());
        let tags = tags::extract_tags(&self.prompt, &self.paths, intent_tag);

        Context {
            prompt: self.prompt,
            working_dir: self.working_dir,
            project_hash: self.project_hash,
            project_name: self.project_name,
            git_branch: self.git_branch,
            paths: self.paths,
            intent: classification,
            tags,
            domains,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_populates_intent_and_tags() {
        let ctx = ContextBuilder::new("fix a rust bug in the parser").with_working_dir("/tmp/project").build();
        assert_eq!(ctx.intent(), Intent::Debugging);
        assert!(ctx.tags.contains("rust"));
        assert!(ctx.project_hash.is_some());
    }
}

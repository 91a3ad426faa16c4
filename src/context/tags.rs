// src/context/tags.rs
// Tag extraction: union of technology keywords found in the prompt,
// filename-derived tags, and the classified intent, all lowercased.

use std::collections::BTreeSet;
use std::path::Path;

const TECH_KEYWORDS: &[&str] = &[
    "rust", "typescript", "javascript", "python", "go", "java", "docker", "kubernetes", "k8s",
    "react", "vue", "postgres", "postgresql", "mysql", "sqlite", "redis", "graphql", "rest",
    "git", "github", "ci", "cd", "webpack", "vite", "tailwind", "aws", "gcp", "azure", "terraform",
    "kafka", "grpc", "websocket", "oauth", "jwt",
];

pub fn extract_tags(prompt: &str, paths: &[String], intent_tag: Option<&str>) -> BTreeSet<String> {
    let lower_prompt = prompt.to_lowercase();
    let mut tags = BTreeSet::new();

    for kw in TECH_KEYWORDS {
        if lower_prompt.contains(kw) {
            tags.insert(kw.to_string());
        }
    }

    for path in paths {
        if let Some(stem) = Path::new(path).file_stem().and_then(|s| s.to_str()) {
            let cleaned: String = stem
                .chars()
                .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
                .collect();
            for word in cleaned.split_whitespace() {
                if word.len() > 2 {
                    tags.insert(word.to_string());
                }
            }
        }
    }

    if let Some(tag) = intent_tag {
        tags.insert(tag.to_lowercase());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_technology_keywords_in_prompt() {
        let tags = extract_tags("fix the rust docker build", &[], None);
        assert!(tags.contains("rust"));
        assert!(tags.contains("docker"));
    }

    #[test]
    fn includes_intent_tag() {
        let tags = extract_tags("hello", &[], Some("Debugging"));
        assert!(tags.contains("debugging"));
    }
}

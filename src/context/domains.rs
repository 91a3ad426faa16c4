// src/context/domains.rs
// File extension -> domain mapping, used to detect which parts of a project
// a prompt/change touches.

use std::collections::BTreeSet;

pub fn detect_domains(paths: &[String]) -> BTreeSet<String> {
    let mut domains = BTreeSet::new();
    for path in paths {
        if let Some(domain) = domain_for_path(path) {
            domains.insert(domain.to_string());
        }
    }
    domains
}

fn domain_for_path(path: &str) -> Option<&'static str> {
    let lower = path.to_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "tsx" | "jsx" | "vue" | "svelte" | "css" | "scss" | "html" => Some("frontend"),
        "rs" | "go" | "java" | "kt" | "py" | "rb" | "cs" => Some("backend"),
        "sql" | "parquet" | "csv" => Some("data"),
        "tf" | "yaml" | "yml" | "toml" if lower.contains("infra") || lower.contains("docker") || lower.contains("k8s") => {
            Some("infra")
        }
        "yaml" | "yml" => Some("infra"),
        "md" | "mdx" | "rst" | "txt" => Some("documentation"),
        "ts" | "js" => {
            if lower.contains("/api/") || lower.contains("/server/") || lower.contains("/backend/") {
                Some("backend")
            } else {
                Some("frontend")
            }
        }
        _ if lower.contains("dockerfile") || lower.contains("terraform") => Some("infra"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_frontend_and_backend() {
        let domains = detect_domains(&["src/App.tsx".to_string(), "src/main.rs".to_string()]);
        assert!(domains.contains("frontend"));
        assert!(domains.contains("backend"));
    }

    #[test]
    fn unknown_extension_is_ignored() {
        let domains = detect_domains(&["data.bin".to_string()]);
        assert!(domains.is_empty());
    }
}

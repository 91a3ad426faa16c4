// src/context/intent.rs
// Intent classification: score a prompt against a fixed family of regex
// patterns per intent, normalize the winner's score into a confidence.

use lazy_static::lazy_static;
use regex::RegexSet;

use crate::record::Intent;

struct IntentPatterns {
    intent: Intent,
    set: RegexSet,
}

lazy_static! {
    static ref PATTERNS: Vec<IntentPatterns> = vec![
        IntentPatterns {
            intent: Intent::Debugging,
            set: RegexSet::new([
                r"(?i)\bbug\b", r"(?i)\bfix(ing)?\b", r"(?i)\berror\b", r"(?i)\bcrash(es|ed|ing)?\b",
                r"(?i)\bfail(s|ed|ing)?\b", r"(?i)\btraceback\b", r"(?i)\bexception\b", r"(?i)\bdebug(ging)?\b",
                r"(?i)\bbroken\b", r"(?i)\bnot working\b",
            ]).unwrap(),
        },
        IntentPatterns {
            intent: Intent::Testing,
            set: RegexSet::new([
                r"(?i)\btest(s|ing)?\b", r"(?i)\bunit test\b", r"(?i)\bassert\b", r"(?i)\bcoverage\b",
                r"(?i)\bmock(ing|s)?\b", r"(?i)\bspec(s)?\b", r"(?i)\bci\b",
            ]).unwrap(),
        },
        IntentPatterns {
            intent: Intent::Configuration,
            set: RegexSet::new([
                r"(?i)\bconfig(ure|uration)?\b", r"(?i)\bsetting(s)?\b", r"(?i)\benv(ironment)? var",
                r"(?i)\bsetup\b", r"(?i)\binstall(ation)?\b", r"(?i)\bdependenc(y|ies)\b",
            ]).unwrap(),
        },
        IntentPatterns {
            intent: Intent::Workflow,
            set: RegexSet::new([
                r"(?i)\bworkflow\b", r"(?i)\bgit (rebase|merge|branch|commit)\b", r"(?i)\bpipeline\b",
                r"(?i)\bprocess\b", r"(?i)\brelease\b", r"(?i)\bdeploy(ment)?\b",
            ]).unwrap(),
        },
        IntentPatterns {
            intent: Intent::Solution,
            set: RegexSet::new([
                r"(?i)\bsolve(d)?\b", r"(?i)\bsolution\b", r"(?i)\bresolved?\b", r"(?i)\bworkaround\b",
                r"(?i)\bfigured out\b",
            ]).unwrap(),
        },
        IntentPatterns {
            intent: Intent::Implementation,
            set: RegexSet::new([
                r"(?i)\bimplement(ing|ation)?\b", r"(?i)\badd\b", r"(?i)\bbuild\b", r"(?i)\bcreate\b",
                r"(?i)\bfeature\b", r"(?i)\brefactor(ing)?\b",
            ]).unwrap(),
        },
    ];
}

#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub primary: Intent,
    pub confidence: f64,
    pub alternatives: Vec<(Intent, f64)>,
}

pub fn classify_intent(prompt: &str) -> IntentClassification {
    let mut scored: Vec<(Intent, f64)> = PATTERNS
        .iter()
        .map(|p| (p.intent, p.set.matches(prompt).iter().count() as f64))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    if scored.is_empty() {
        return IntentClassification { primary: Intent::General, confidence: 0.0, alternatives: vec![] };
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let total: f64 = scored.iter().map(|(_, s)| s).sum();
    let (primary, top_score) = scored[0];
    let confidence = if total > 0.0 { top_score / total } else { 0.0 };

    IntentClassification {
        primary,
        confidence,
        alternatives: scored.into_iter().skip(1).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debugging_prompt_classifies_as_debugging() {
        let c = classify_intent("I have a bug causing a crash in the login flow");
        assert_eq!(c.primary, Intent::Debugging);
        assert!(c.confidence > 0.0);
    }

    #[test]
    fn empty_prompt_is_general_zero_confidence() {
        let c = classify_intent("hello there");
        assert_eq!(c.primary, Intent::General);
        assert_eq!(c.confidence, 0.0);
    }
}

// src/search/bm25.rs
// Standard BM25 term-frequency / inverse-document-frequency scoring over
// tokenized content + summary + tags.

use std::collections::HashMap;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone)]
struct Document {
    id: String,
    term_counts: HashMap<String, u32>,
    length: usize,
}

#[derive(Default)]
pub struct Bm25Index {
    documents: Vec<Document>,
    position: HashMap<String, usize>,
    doc_freq: HashMap<String, u32>,
    total_length: usize,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_document(&mut self, id: &str, content: &str, summary: &str, tags: &[String]) {
        self.remove(id);

        let mut text = content.to_string();
        text.push(' ');
        text.push_str(summary);
        for tag in tags {
            text.push(' ');
            text.push_str(tag);
        }
        let tokens = tokenize(&text);

        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }

        let length = tokens.len();
        self.total_length += length;
        let pos = self.documents.len();
        self.documents.push(Document { id: id.to_string(), term_counts, length });
        self.position.insert(id.to_string(), pos);
    }

    pub fn remove(&mut self, id: &str) {
        let Some(&pos) = self.position.get(id) else { return };
        let doc = &self.documents[pos];
        for term in doc.term_counts.keys() {
            if let Some(count) = self.doc_freq.get_mut(term) {
                *count = count.saturating_sub(1);
            }
        }
        self.total_length -= doc.length;
        self.documents.remove(pos);
        self.position.remove(id);
        for (_, p) in self.position.iter_mut() {
            if *p > pos {
                *p -= 1;
            }
        }
    }

    fn avg_doc_length(&self) -> f32 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.documents.len() as f32
        }
    }

    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let n = self.documents.len() as f32;
        let avg_len = self.avg_doc_length();

        let mut scores: Vec<(String, f32)> = self
            .documents
            .iter()
            .map(|doc| {
                let mut score = 0.0f32;
                for term in &terms {
                    let Some(&tf) = doc.term_counts.get(term) else { continue };
                    let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
                    if df <= 0.0 {
                        continue;
                    }
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let tf = tf as f32;
                    let norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * doc.length as f32 / avg_len.max(1.0)));
                    score += idf * norm;
                }
                (doc.id.clone(), score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(k);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_keyword_match_ranks_above_unrelated_doc() {
        let mut idx = Bm25Index::new();
        idx.index_document("a", "use git rebase to clean up history", "", &[]);
        idx.index_document("b", "configure the database connection pool", "", &[]);

        let hits = idx.search("git rebase", 10);
        assert_eq!(hits[0].0, "a");
    }

    #[test]
    fn removed_document_does_not_resurface() {
        let mut idx = Bm25Index::new();
        idx.index_document("a", "rust async runtime", "", &[]);
        idx.remove("a");
        let hits = idx.search("rust", 10);
        assert!(hits.is_empty());
    }
}

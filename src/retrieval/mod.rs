//! Document index over the markdown policy corpus.
//!
//! Files are chunked on `## ` section headers and scored with TF-IDF cosine
//! similarity. The index is built once at startup and read-only afterwards.
//! A missing or empty corpus degrades to an empty index; retrieval never
//! fails a run.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

/// A retrievable fragment of a source document
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Chunk id, `{filename}::chunk{i}`
    pub id: String,
    /// Section text
    pub content: String,
    /// Source filename
    pub source: String,
    /// Cosine similarity against the query, in [0, 1]
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Chunk {
    id: String,
    content: String,
    source: String,
}

/// TF-IDF index over section chunks of a markdown corpus
pub struct DocumentIndex {
    chunks: Vec<Chunk>,
    /// term -> (term id, document frequency)
    vocabulary: BTreeMap<String, (usize, usize)>,
    /// per-chunk l2-normalized tf-idf vectors, keyed by term id
    vectors: Vec<HashMap<usize, f64>>,
}

impl DocumentIndex {
    /// Load and index every `.md` file under `dir`.
    ///
    /// An unreadable directory yields an empty index rather than an error.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let chunks = match load_chunks(dir) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Document corpus unavailable at {}: {}", dir.display(), e);
                Vec::new()
            }
        };

        debug!("Indexed {} chunks from {}", chunks.len(), dir.display());
        Self::from_chunks(chunks)
    }

    fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let mut term_counts: Vec<HashMap<String, usize>> = Vec::with_capacity(chunks.len());
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();

        for chunk in &chunks {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for token in tokenize(&chunk.content) {
                *counts.entry(token).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            term_counts.push(counts);
        }

        // Term ids follow sorted term order, so scoring is reproducible
        // across processes
        let vocabulary: BTreeMap<String, (usize, usize)> = document_frequency
            .into_iter()
            .enumerate()
            .map(|(id, (term, df))| (term, (id, df)))
            .collect();

        let n_docs = chunks.len();
        let vectors = term_counts
            .iter()
            .map(|counts| {
                let mut vector: HashMap<usize, f64> = HashMap::new();
                for (term, count) in counts {
                    let (id, df) = vocabulary[term];
                    vector.insert(id, *count as f64 * smooth_idf(n_docs, df));
                }
                l2_normalize(&mut vector);
                vector
            })
            .collect();

        Self {
            chunks,
            vocabulary,
            vectors,
        }
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return the `top_k` most relevant chunks, ordered by descending score.
    ///
    /// Returns fewer than `top_k` only when fewer chunks exist. Deterministic
    /// given a fixed corpus: ties break on chunk order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        if self.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut query_vector: HashMap<usize, f64> = HashMap::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for token in tokenize(query) {
            *counts.entry(token).or_insert(0) += 1;
        }
        for (term, count) in &counts {
            if let Some(&(id, df)) = self.vocabulary.get(term) {
                query_vector.insert(id, *count as f64 * smooth_idf(self.chunks.len(), df));
            }
        }
        l2_normalize(&mut query_vector);

        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, dot(&query_vector, vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(idx, score)| {
                let chunk = &self.chunks[idx];
                RetrievedChunk {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    source: chunk.source.clone(),
                    score,
                }
            })
            .collect()
    }
}

fn load_chunks(dir: &Path) -> std::io::Result<Vec<Chunk>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();

    let mut chunks = Vec::new();
    for path in files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path)?;

        for (i, section) in content.split("\n## ").enumerate() {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }
            chunks.push(Chunk {
                id: format!("{filename}::chunk{i}"),
                content: section.to_string(),
                source: filename.clone(),
            });
        }
    }

    Ok(chunks)
}

/// Lowercase alphanumeric word tokens
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

/// Smoothed inverse document frequency, always > 0
fn smooth_idf(n_docs: usize, df: usize) -> f64 {
    ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0
}

fn l2_normalize(vector: &mut HashMap<usize, f64>) {
    let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in vector.values_mut() {
            *value /= norm;
        }
    }
}

fn dot(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    // Iterate the smaller side; accumulate in sorted id order for determinism
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut ids: Vec<_> = small.keys().copied().collect();
    ids.sort_unstable();
    ids.iter()
        .filter_map(|id| Some(small[id] * large.get(id)?))
        .sum()
}

//! Whitespace tokenizer, vocabulary and pre-trained word vectors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{DaoError, Result};

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";

/// Index every out-of-vocabulary token maps to.
pub const UNK_INDEX: usize = 0;
pub const PAD_INDEX: usize = 1;

/// Split on whitespace, lower-case every token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

// ── PretrainedVectors ────────────────────────────────────────────────────

/// Word vectors in the GloVe/word2vec text layout: `token f1 .. fD` per
/// line, optionally preceded by a `count dim` header.
#[derive(Debug, Clone)]
pub struct PretrainedVectors {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl PretrainedVectors {
    pub fn from_entries(dim: usize, entries: impl IntoIterator<Item = (String, Vec<f32>)>) -> Self {
        let vectors = entries
            .into_iter()
            .filter(|(_, v)| v.len() == dim)
            .collect();
        Self { dim, vectors }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| DaoError::io(path, e))?;
        let mut dim = word2vec_header(&text);
        let mut skip_header = dim.is_some();
        let mut vectors = HashMap::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let mut parts = line.split_whitespace();
            let Some(token) = parts.next() else {
                continue;
            };
            if skip_header {
                skip_header = false;
                continue;
            }
            let rest: Vec<&str> = parts.collect();

            let values = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|_| DaoError::format(path, line_no, format!("bad vector for {token:?}")))?;

            let expected = *dim.get_or_insert(values.len());
            if values.len() != expected || expected == 0 {
                return Err(DaoError::format(
                    path,
                    line_no,
                    format!("vector for {token:?} has {} dims, expected {expected}", values.len()),
                ));
            }
            vectors.entry(token.to_string()).or_insert(values);
        }

        let dim = dim.unwrap_or(0);
        tracing::info!("loaded {} vectors of dim {dim} from {}", vectors.len(), path.display());
        Ok(Self { dim, vectors })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }
}

/// Dimension declared by a word2vec `count dim` first line. Two integers
/// alone are also a valid 1-dim GloVe entry, so the line only counts as a
/// header when the next entry carries exactly `dim` values.
fn word2vec_header(text: &str) -> Option<usize> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let first: Vec<&str> = lines.next()?.split_whitespace().collect();
    let [count, dim] = first.as_slice() else {
        return None;
    };
    count.parse::<usize>().ok()?;
    let dim = dim.parse::<usize>().ok()?;
    match lines.next() {
        Some(entry) if entry.split_whitespace().count() != dim + 1 => None,
        _ => Some(dim),
    }
}

// ── Vocab ────────────────────────────────────────────────────────────────

/// Token ↔ index mapping built once from the training split and shared
/// read-only across splits afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabRepr", into = "VocabRepr")]
pub struct Vocab {
    itos: Vec<String>,
    stoi: HashMap<String, usize>,
    vectors: Option<Array2<f32>>,
}

#[derive(Serialize, Deserialize)]
struct VocabRepr {
    itos: Vec<String>,
}

impl From<VocabRepr> for Vocab {
    fn from(repr: VocabRepr) -> Self {
        Self::from_itos(repr.itos)
    }
}

impl From<Vocab> for VocabRepr {
    fn from(vocab: Vocab) -> Self {
        Self { itos: vocab.itos }
    }
}

impl Vocab {
    /// Specials first (`<unk>`, `<pad>`), then every distinct token by
    /// descending frequency, ties broken by token string.
    pub fn build<I, S>(tokens: I, vectors: Option<&PretrainedVectors>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            let token = token.as_ref();
            if token == UNK_TOKEN || token == PAD_TOKEN {
                continue;
            }
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }

        let mut by_freq: Vec<(String, usize)> = counts.into_iter().collect();
        by_freq.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let itos = [UNK_TOKEN.to_string(), PAD_TOKEN.to_string()]
            .into_iter()
            .chain(by_freq.into_iter().map(|(token, _)| token))
            .collect();

        let mut vocab = Self::from_itos(itos);
        if let Some(vectors) = vectors {
            vocab.attach_vectors(vectors);
        }
        vocab
    }

    fn from_itos(itos: Vec<String>) -> Self {
        let stoi = itos
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i))
            .collect();
        Self {
            itos,
            stoi,
            vectors: None,
        }
    }

    /// One embedding row per index; tokens without a pre-trained vector
    /// get zeros.
    fn attach_vectors(&mut self, pretrained: &PretrainedVectors) {
        let mut matrix = Array2::<f32>::zeros((self.itos.len(), pretrained.dim()));
        let mut hits = 0usize;
        for (i, token) in self.itos.iter().enumerate() {
            if let Some(v) = pretrained.get(token) {
                matrix.row_mut(i).iter_mut().zip(v).for_each(|(dst, src)| *dst = *src);
                hits += 1;
            }
        }
        tracing::debug!("{hits} of {} vocabulary tokens have pre-trained vectors", self.itos.len());
        self.vectors = Some(matrix);
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn index(&self, token: &str) -> usize {
        self.stoi.get(token).copied().unwrap_or(UNK_INDEX)
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.itos.get(index).map(String::as_str)
    }

    pub fn itos(&self) -> &[String] {
        &self.itos
    }

    pub fn encode(&self, tokens: &[String]) -> Vec<usize> {
        tokens.iter().map(|t| self.index(t)).collect()
    }

    pub fn vectors(&self) -> Option<&Array2<f32>> {
        self.vectors.as_ref()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DaoError::io(path, std::io::Error::other(e)))?;
        fs::write(path, json).map_err(|e| DaoError::io(path, e))
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DaoError::io(path, e))?;
        serde_json::from_str(&json).map_err(|e| DaoError::format(path, e.line(), e.to_string()))
    }
}

//! Sparse lexical vectors over hashed tokens.
//!
//! Tokens are lowercased alphanumeric runs. Each token maps to a 32-bit index
//! taken from the first four bytes of its SHA-256 digest; its weight is
//! `1 + ln(tf)`. The same encoding feeds the in-memory index and the sparse
//! side of the Qdrant collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sparse vector in Qdrant's `{indices, values}` layout, indices ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Encode `text` into a log-scaled term-frequency vector.
    pub fn encode(text: &str) -> Self {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token_index(&token)).or_insert(0) += 1;
        }

        let mut indices = Vec::with_capacity(counts.len());
        let mut values = Vec::with_capacity(counts.len());
        for (index, tf) in counts {
            indices.push(index);
            values.push(1.0 + (tf as f32).ln());
        }
        Self { indices, values }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product of two vectors with ascending indices.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f64;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] as f64 * other.values[j] as f64;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn token_index(token: &str) -> u32 {
    let digest = Sha256::digest(token.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

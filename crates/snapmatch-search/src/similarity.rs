use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

/// How a raw cosine value in [-1, 1] is turned into a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// Use the cosine value unchanged.
    #[default]
    Raw,
    /// Map [-1, 1] onto [0, 1] with `(cos + 1) / 2`.
    Unit,
}

impl ScoreScale {
    #[must_use]
    pub fn apply(self, cosine: f32) -> f32 {
        match self {
            Self::Raw => cosine,
            Self::Unit => (cosine + 1.0) / 2.0,
        }
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// A zero-norm vector has no direction and scores `0.0` against anything.
/// The result is clamped to [-1, 1] to absorb float rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> SearchResult<f32> {
    if a.is_empty() || b.is_empty() {
        return Err(SearchError::EmptyVector);
    }
    if a.len() != b.len() {
        return Err(SearchError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    // Summed in f64 so a vector compared with itself lands on exactly 1.0.
    let mut dot = 0.0_f64;
    let mut sq_a = 0.0_f64;
    let mut sq_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        sq_a += x * x;
        sq_b += y * y;
    }

    if sq_a > 0.0 && sq_b > 0.0 {
        Ok(narrow((dot / (sq_a.sqrt() * sq_b.sqrt())).clamp(-1.0, 1.0)))
    } else {
        Ok(0.0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(cosine: f64) -> f32 {
    cosine as f32
}

//! Row-major tabular dataset.
//!
//! A row is a feature vector of length `input_dim` followed by a target vector
//! of length `target_dim`. Both live in contiguous buffers so the training
//! loop works on slices; row order is preserved for reproducible round-trips.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<f64>,
    targets: Vec<f64>,
    input_dim: usize,
    target_dim: usize,
}

impl Dataset {
    /// An empty dataset with fixed row shape.
    pub fn new(input_dim: usize, target_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }
        Ok(Self {
            features: Vec::new(),
            targets: Vec::new(),
            input_dim,
            target_dim,
        })
    }

    /// An empty dataset with the same row shape as `self`.
    pub fn empty_like(&self) -> Self {
        Self {
            features: Vec::new(),
            targets: Vec::new(),
            input_dim: self.input_dim,
            target_dim: self.target_dim,
        }
    }

    /// Build a dataset from per-row vectors.
    pub fn from_rows(features: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "features/targets length mismatch: {} vs {}",
                features.len(),
                targets.len()
            )));
        }
        let input_dim = features.first().map(Vec::len).unwrap_or(0);
        let target_dim = targets.first().map(Vec::len).unwrap_or(0);

        let mut data = Self::new(input_dim, target_dim)?;
        for (x, y) in features.iter().zip(targets) {
            data.push(x, y)?;
        }
        Ok(data)
    }

    /// Append one row.
    pub fn push(&mut self, features: &[f64], targets: &[f64]) -> Result<()> {
        if features.len() != self.input_dim {
            return Err(Error::InvalidShape(format!(
                "row {} has {} features, expected {}",
                self.len(),
                features.len(),
                self.input_dim
            )));
        }
        if targets.len() != self.target_dim {
            return Err(Error::InvalidShape(format!(
                "row {} has {} targets, expected {}",
                self.len(),
                targets.len(),
                self.target_dim
            )));
        }
        self.features.extend_from_slice(features);
        self.targets.extend_from_slice(targets);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len() / self.input_dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    /// Panics if `idx >= len`.
    #[inline]
    pub fn features(&self, idx: usize) -> &[f64] {
        let start = idx * self.input_dim;
        &self.features[start..start + self.input_dim]
    }

    /// Panics if `idx >= len`.
    #[inline]
    pub fn targets(&self, idx: usize) -> &[f64] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    #[inline]
    pub fn row(&self, idx: usize) -> (&[f64], &[f64]) {
        (self.features(idx), self.targets(idx))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&[f64], &[f64])> + '_ {
        self.features
            .chunks_exact(self.input_dim)
            .zip(self.targets.chunks_exact(self.target_dim))
    }

    pub fn rows_mut(&mut self) -> impl ExactSizeIterator<Item = (&mut [f64], &mut [f64])> + '_ {
        self.features
            .chunks_exact_mut(self.input_dim)
            .zip(self.targets.chunks_exact_mut(self.target_dim))
    }

    /// Copy the rows at `indices` (in that order) into a new dataset.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut out = self.empty_like();
        out.features.reserve(indices.len() * self.input_dim);
        out.targets.reserve(indices.len() * self.target_dim);
        for &idx in indices {
            out.features.extend_from_slice(self.features(idx));
            out.targets.extend_from_slice(self.targets(idx));
        }
        out
    }

    /// Check that `column` is a valid feature index.
    pub fn check_feature_column(&self, column: usize) -> Result<()> {
        if column >= self.input_dim {
            return Err(Error::InvalidConfig(format!(
                "feature column {column} out of bounds for {} input columns",
                self.input_dim
            )));
        }
        Ok(())
    }
}

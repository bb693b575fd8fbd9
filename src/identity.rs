//! Enrolled identities and nearest-neighbour matching.
//!
//! The database maps each enrolled name to its reference embedding. It is
//! read either from a JSON object (`{"name": [f32, ...]}`) or from a NumPy
//! `.npz` archive holding one array per name, as written by
//! `np.savez(path, **{name: embedding})`. A 2-D array holds several samples
//! of one identity and is averaged. Vectors are normalized on load so a dot
//! product gives cosine similarity.

use crate::embedding::l2_normalize;
use crate::{Error, Result};
use ndarray::{ArrayD, Axis};
use ndarray_npy::NpzReader;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Best identity for an embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    pub name: String,
    /// Cosine distance, 0.0 for identical direction
    pub distance: f32,
}

/// Reference embeddings keyed by identity name
#[derive(Debug, Clone, Default)]
pub struct IdentityDatabase {
    entries: BTreeMap<String, Vec<f32>>,
}

impl IdentityDatabase {
    /// Build from raw (not necessarily normalized) embeddings
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is empty or dimensions disagree.
    pub fn from_entries(entries: BTreeMap<String, Vec<f32>>) -> Result<Self> {
        let mut dimension = None;
        let mut normalized = BTreeMap::new();
        for (name, mut embedding) in entries {
            if embedding.is_empty() {
                return Err(Error::IdentityDatabase(format!("Identity '{name}' has an empty embedding")));
            }
            match dimension {
                None => dimension = Some(embedding.len()),
                Some(d) if d != embedding.len() => {
                    return Err(Error::IdentityDatabase(format!(
                        "Identity '{name}' has dimension {}, expected {d}",
                        embedding.len()
                    )));
                }
                Some(_) => {}
            }
            l2_normalize(&mut embedding);
            normalized.insert(name, embedding);
        }
        Ok(Self { entries: normalized })
    }

    /// Parse a JSON database
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the entries are inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, Vec<f32>> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Read a NumPy archive with one embedding array per identity
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read, an array is not
    /// `float32` of rank 1 or 2, or the entries are inconsistent.
    pub fn from_npz(file: File) -> Result<Self> {
        let npz_error = |e: ndarray_npy::ReadNpzError| Error::IdentityDatabase(format!("Invalid npz archive: {e}"));

        let mut reader = NpzReader::new(file).map_err(npz_error)?;
        let mut entries = BTreeMap::new();
        for array_name in reader.names().map_err(npz_error)? {
            let array: ArrayD<f32> = reader.by_name(&array_name).map_err(npz_error)?;
            let embedding = match array.ndim() {
                1 => array.iter().copied().collect(),
                2 => array
                    .mean_axis(Axis(0))
                    .ok_or_else(|| Error::IdentityDatabase(format!("Identity '{array_name}' has no samples")))?
                    .iter()
                    .copied()
                    .collect(),
                n => {
                    return Err(Error::IdentityDatabase(format!(
                        "Identity '{array_name}' has rank {n}, expected 1 or 2"
                    )))
                }
            };
            let name = array_name.strip_suffix(".npy").unwrap_or(array_name.as_str()).to_string();
            entries.insert(name, embedding);
        }
        Self::from_entries(entries)
    }

    /// Load a database file; `.npz` archives are read as NumPy, anything
    /// else as JSON
    ///
    /// # Errors
    ///
    /// Returns an `IdentityDatabase` error if the file does not exist, or a
    /// parse error if its content is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::IdentityDatabase(format!(
                "Face database not found at {}. Enroll identities first",
                path.display()
            )));
        }
        let database = if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("npz")) {
            Self::from_npz(File::open(path)?)?
        } else {
            Self::from_json(&std::fs::read_to_string(path)?)?
        };
        log::info!("Loaded {} identities from {}", database.len(), path.display());
        Ok(database)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Enrolled names in sorted order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Nearest identity to a unit-length embedding, if within `threshold`
    #[must_use]
    pub fn best_match(&self, embedding: &[f32], threshold: f32) -> Option<IdentityMatch> {
        self.entries
            .iter()
            .filter(|(_, reference)| reference.len() == embedding.len())
            .map(|(name, reference)| {
                let similarity: f32 = reference.iter().zip(embedding).map(|(a, b)| a * b).sum();
                (name, 1.0 - similarity)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|(_, distance)| *distance <= threshold)
            .map(|(name, distance)| IdentityMatch {
                name: name.clone(),
                distance,
            })
    }
}

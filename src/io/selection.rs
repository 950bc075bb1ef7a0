//! Selection-list files.
//!
//! A selection file is UTF-8 text with one integer per line: vertex indices
//! for locked sets, ignore masks and region definitions, or mapping entries
//! (where −1 means "no counterpart"). Lines that fail to parse as an
//! integer are silently skipped; a missing file is a recoverable, logged
//! failure.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{error, warn};

use crate::error::{LaminaError, Result};

/// Read a selection file into a list of integer entries.
///
/// Unparseable lines are skipped. Returns an error only if the file cannot
/// be opened or read.
pub fn read_selection(path: &Path) -> Result<Vec<i64>> {
    let file = File::open(path).map_err(|source| {
        error!("cannot read {} for reading vertex selection", path.display());
        LaminaError::SelectionRead {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| LaminaError::SelectionRead {
            path: path.to_path_buf(),
            source,
        })?;
        if let Ok(value) = line.trim().parse::<i64>() {
            entries.push(value);
        }
    }
    Ok(entries)
}

/// Convert selection entries into a per-vertex boolean mask of length `len`.
///
/// Negative or out-of-range entries are dropped with a warning.
pub fn selection_to_mask(entries: &[i64], len: usize) -> Vec<bool> {
    let mut mask = vec![false; len];
    for &idx in entries {
        if idx >= 0 && (idx as usize) < len {
            mask[idx as usize] = true;
        } else {
            warn!("selection index {} outside vertex range 0..{}", idx, len);
        }
    }
    mask
}

/// Read a selection file directly into a per-vertex mask.
pub fn read_selection_mask(path: &Path, len: usize) -> Result<Vec<bool>> {
    Ok(selection_to_mask(&read_selection(path)?, len))
}

/// A fixed mapping from vertex ids in a full-resolution mesh to vertex ids
/// in a reduced (cut-off) mesh. Entries without a counterpart are `None`.
#[derive(Debug, Clone)]
pub struct IndexMap {
    entries: Vec<Option<u32>>,
}

impl IndexMap {
    /// Build a map from raw entries, where −1 marks a missing counterpart.
    pub fn from_entries(raw: &[i64]) -> Self {
        let entries = raw
            .iter()
            .map(|&v| (v >= 0).then(|| v as u32))
            .collect();
        Self { entries }
    }

    /// Read a map from a selection file with one entry per full-mesh vertex.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::from_entries(&read_selection(path)?))
    }

    /// Number of full-mesh entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reduced-mesh vertex id for full-mesh vertex `full`, if any.
    #[inline]
    pub fn get(&self, full: usize) -> Option<usize> {
        self.entries.get(full).copied().flatten().map(|v| v as usize)
    }
}

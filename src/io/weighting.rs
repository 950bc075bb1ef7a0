//! Per-vertex scalar weighting files.
//!
//! UTF-8 text with exactly one float per vertex, in mesh vertex order,
//! separated by whitespace or newlines. A file with fewer values than the
//! mesh has vertices is a load failure: the caller proceeds without the
//! weighting rather than with a partial one.

use std::fs;
use std::path::Path;

use log::error;

use crate::error::{LaminaError, Result};

/// Read a weighting file with one value per vertex.
///
/// `num_vertices` is the vertex count of the mesh the weighting belongs to.
/// Extra trailing values are ignored.
pub fn read_vertex_weights(path: &Path, num_vertices: usize) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|source| {
        error!("cannot open {} for vertex weighting", path.display());
        LaminaError::WeightingRead {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut weights = Vec::with_capacity(num_vertices);
    for token in text.split_whitespace() {
        if weights.len() == num_vertices {
            break;
        }
        match token.parse::<f64>() {
            Ok(w) => weights.push(w),
            Err(_) => {
                error!(
                    "vertex weighting {}: unparseable value {:?}",
                    path.display(),
                    token
                );
                return Err(LaminaError::ShortWeightingFile {
                    path: path.to_path_buf(),
                    found: weights.len(),
                    expected: num_vertices,
                });
            }
        }
    }

    if weights.len() < num_vertices {
        error!(
            "vertex weighting {}: not enough values ({} of {})",
            path.display(),
            weights.len(),
            num_vertices
        );
        return Err(LaminaError::ShortWeightingFile {
            path: path.to_path_buf(),
            found: weights.len(),
            expected: num_vertices,
        });
    }

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_weights() {
        let path = write_temp("lamina_weights_ok.vw", "0.0 0.5\n1.25\n");
        let w = read_vertex_weights(&path, 3).unwrap();
        assert_eq!(w, vec![0.0, 0.5, 1.25]);
    }

    #[test]
    fn test_short_file_fails() {
        let path = write_temp("lamina_weights_short.vw", "0.0 0.5\n");
        assert!(matches!(
            read_vertex_weights(&path, 3),
            Err(LaminaError::ShortWeightingFile { found: 2, .. })
        ));
    }

    #[test]
    fn test_extra_values_ignored() {
        let path = write_temp("lamina_weights_long.vw", "1 2 3 4 5\n");
        let w = read_vertex_weights(&path, 2).unwrap();
        assert_eq!(w, vec![1.0, 2.0]);
    }
}

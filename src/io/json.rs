use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CcnnError, Result};

/// Serializes `value` to a pretty-printed JSON file.
///
/// Any failure is reported as `Persist` with the target path: a run whose
/// artifact cannot be written has failed.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let persist = |source: std::io::Error| CcnnError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(persist)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| persist(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    writer.flush().map_err(persist)
}

/// Deserializes a JSON file previously written by `save_json`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| CcnnError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_path_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        match save_json(&vec![1.0, 2.0], &path) {
            Err(CcnnError::Persist { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Persist error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let res: Result<Vec<f64>> = load_json(&path);
        assert!(matches!(res, Err(CcnnError::Format { .. })));
    }
}

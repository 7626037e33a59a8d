//! Reader and writer for connectivity tensor files.
//!
//! # Layout
//! ```text
//! bytes  0-3:   b"CCNT"      (magic)
//! bytes  4-7:   N            (number of instances, big-endian u32)
//! bytes  8-11:  rows         (matrix height, big-endian u32)
//! bytes 12-15:  cols         (matrix width, big-endian u32, must equal rows)
//! bytes 16-19:  channels     (big-endian u32, must be 1)
//! bytes 20..:   N * rows * cols big-endian f32, row-major
//! ```
//!
//! NaN entries are legal in the file; they are scrubbed after loading.

use std::fs;
use std::path::Path;

use crate::data::tensor::ConnTensor;
use crate::error::{CcnnError, Result};

pub const MAGIC: &[u8; 4] = b"CCNT";
const HEADER_LEN: usize = 20;

pub fn read_tensor(path: &Path) -> Result<ConnTensor> {
    let bytes = fs::read(path)?;
    parse_tensor(&bytes).map_err(|reason| CcnnError::Format { path: path.to_path_buf(), reason })
}

pub fn write_tensor(tensor: &ConnTensor, path: &Path) -> Result<()> {
    let bytes = encode_tensor(tensor).map_err(|reason| CcnnError::Format { path: path.to_path_buf(), reason })?;
    fs::write(path, bytes).map_err(|source| CcnnError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

/// Fails instead of truncating when a dimension does not fit the `u32`
/// header fields.
pub fn encode_tensor(tensor: &ConnTensor) -> std::result::Result<Vec<u8>, String> {
    let n_items = header_dim(tensor.len(), "instance count")?;
    let side = header_dim(tensor.side(), "matrix side")?;
    let mut out = Vec::with_capacity(HEADER_LEN + tensor.values().len() * 4);
    out.extend_from_slice(MAGIC);
    for dim in [n_items, side, side, 1] {
        out.extend_from_slice(&dim.to_be_bytes());
    }
    for &v in tensor.values() {
        out.extend_from_slice(&(v as f32).to_be_bytes());
    }
    Ok(out)
}

fn header_dim(value: usize, what: &str) -> std::result::Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{what} {value} does not fit a u32 header field"))
}

pub fn parse_tensor(bytes: &[u8]) -> std::result::Result<ConnTensor, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!(
            "file too short: expected at least {HEADER_LEN} header bytes, got {}",
            bytes.len()
        ));
    }
    if &bytes[0..4] != MAGIC {
        return Err(format!("bad magic {:02X?}, expected {:02X?}", &bytes[0..4], MAGIC));
    }

    let header_u32 = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize;
    let n_items = header_u32(4);
    let rows = header_u32(8);
    let cols = header_u32(12);
    let channels = header_u32(16);

    if rows != cols {
        return Err(format!("matrices must be square, got {rows}x{cols}"));
    }
    if channels != 1 {
        return Err(format!("expected a single channel, got {channels}"));
    }

    let n_values = n_items
        .checked_mul(rows)
        .and_then(|v| v.checked_mul(cols))
        .ok_or_else(|| format!("tensor size overflows usize ({n_items} x {rows} x {cols})"))?;
    let expected_len = n_values
        .checked_mul(4)
        .and_then(|v| v.checked_add(HEADER_LEN))
        .ok_or_else(|| "tensor size overflows usize".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "expected {expected_len} bytes for {n_items} matrices of {rows}x{cols}, got {}",
            bytes.len()
        ));
    }

    let data = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64)
        .collect();
    ConnTensor::new(n_items, rows, data).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_keeps_nan() {
        let t = ConnTensor::new(2, 2, vec![0.5, -1.0, f64::NAN, 2.0, 0.0, 0.25, 3.0, -0.75]).unwrap();
        let parsed = parse_tensor(&encode_tensor(&t).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.side(), 2);
        assert!(parsed.values()[2].is_nan());
        assert_eq!(parsed.values()[7], -0.75);
    }

    #[test]
    fn rejects_malformed_headers() {
        let good = encode_tensor(&ConnTensor::new(1, 2, vec![1.0; 4]).unwrap()).unwrap();

        assert!(parse_tensor(&good[..10]).unwrap_err().contains("too short"));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(parse_tensor(&bad_magic).unwrap_err().contains("magic"));

        let mut truncated = good.clone();
        truncated.pop();
        assert!(parse_tensor(&truncated).unwrap_err().contains("expected"));

        let mut not_square = good.clone();
        not_square[15] = 3;
        assert!(parse_tensor(&not_square).unwrap_err().contains("square"));
    }

    #[test]
    fn file_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, b"CCNT").unwrap();
        match read_tensor(&path) {
            Err(CcnnError::Format { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_dimensions_are_refused() {
        assert_eq!(header_dim(7, "matrix side"), Ok(7));
        assert_eq!(header_dim(u32::MAX as usize, "matrix side"), Ok(u32::MAX));
        // only representable on 64-bit targets
        if let Ok(big) = usize::try_from(u64::from(u32::MAX) + 1) {
            let err = header_dim(big, "instance count").unwrap_err();
            assert!(err.contains("instance count"), "{err}");
        }
    }
}

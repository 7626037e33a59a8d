pub mod json;
pub mod labels;
pub mod tensor_file;

use std::path::Path;

use crate::data::{normalize::{normalize, replace_nan}, tensor::Dataset};
use crate::error::{CcnnError, Result};

pub use labels::{read_labels, LabelColumns, LabelTable};
pub use tensor_file::{read_tensor, write_tensor};

/// Loads a tensor file and its label file into a ready-to-split dataset.
///
/// The matrices are cropped to `num_roi`, NaNs are replaced with zero and
/// the whole tensor is normalized once; each fold normalizes its splits
/// again on their own statistics.
pub fn load_dataset(tensor_path: &Path, labels_path: &Path, columns: &LabelColumns, num_roi: usize) -> Result<Dataset> {
    let mut tensor = read_tensor(tensor_path)?.crop(num_roi)?;
    let table = read_labels(labels_path, columns)?;

    let replaced = replace_nan(tensor.values_mut());
    if replaced > 0 {
        log::warn!("Replaced {} NaN values with 0 in '{}'", replaced, tensor_path.display());
    }
    if normalize(tensor.values_mut()).scale.is_none() {
        log::warn!("'{}' holds a constant tensor; centered without scaling", tensor_path.display());
    }

    log::info!(
        "Loaded {} matrices of {}x{} from '{}'",
        tensor.len(),
        tensor.side(),
        tensor.side(),
        tensor_path.display()
    );

    if tensor.len() != table.labels.len() {
        return Err(CcnnError::ShapeMismatch {
            what: "label file",
            expected: format!("{} rows (one per matrix)", tensor.len()),
            found: table.labels.len().to_string(),
        });
    }

    match table.subjects {
        Some(subjects) => Dataset::new(tensor, table.labels, subjects),
        None => Dataset::without_subjects(tensor, table.labels),
    }
}

pub mod tensor;
pub mod normalize;
pub mod shuffle;
pub mod folds;
pub mod split;

pub use tensor::{ConnTensor, Dataset, Samples, SubjectId};
pub use normalize::{normalize, replace_nan, NormStats};
pub use shuffle::shuffle_samples;
pub use folds::FoldTable;
pub use split::{assemble_fold, FoldSplit};

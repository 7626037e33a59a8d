pub mod param;
pub mod dense;
pub mod conv;
pub mod dropout;

pub use param::Param;
pub use dense::{Dense, LayerGradients};
pub use conv::{RowConv, ColumnConv};
pub use dropout::DropoutMask;

pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod io;
pub mod metrics;
pub mod train;
pub mod cv;
pub mod transfer;
pub mod config;

// Convenience re-exports
pub use error::{CcnnError, Result};
pub use math::matrix::Matrix;
pub use data::{Dataset, FoldTable, SubjectId};
pub use network::{Architecture, ConnectomeNet, ExportScope, Initialization, ParamBundle};
pub use train::{train_loop, ConnectomeTrainer, ModelTrainer, TrainConfig};
pub use metrics::r_squared;
pub use cv::{run_cross_validation, CvResults};
pub use transfer::train_full;
pub use config::RunConfig;

pub mod architecture;
pub mod network;
pub mod params;

pub use architecture::{Architecture, PARAM_NAMES};
pub use network::{ConnectomeNet, ExportScope, ForwardPass, Initialization, NetGradients};
pub use params::{NamedTensor, ParamBundle};

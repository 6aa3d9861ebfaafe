// Engine seam: the external tunnel engine consumed as a black box.

pub mod process;
pub mod traits;

pub use process::ProcessEngineFactory;
pub use traits::{EngineFactory, EngineHandle};

pub mod api;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;

pub use controller::SessionController;
pub use engine::{EngineFactory, EngineHandle, ProcessEngineFactory};
pub use error::{Error, Result};

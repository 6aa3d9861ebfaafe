use anyhow::Result;

/// Constructs engine instances from raw config bytes.
pub trait EngineFactory: Send + Sync {
    fn validate(&self, config: &[u8]) -> Result<()>;
    fn start(&self, config: &[u8]) -> Result<Box<dyn EngineHandle>>;
}

/// A single running engine instance.
pub trait EngineHandle: Send {
    fn close(&mut self) -> Result<()>;
}

//! Crate-level error type
//!
//! Subsystems return their own error enums; embedders that mix them can
//! propagate everything as [`EngineError`] with `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::render::device::DeviceError;
use crate::render::mesh::ResourceError;

/// Any recoverable failure raised by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend failure, such as a render target allocation
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Resource data rejected by validation
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn allocate() -> EngineResult<()> {
        Err::<(), _>(DeviceError::OutOfMemory)?;
        Ok(())
    }

    #[test]
    fn test_subsystem_errors_convert_with_question_mark() {
        let error = allocate().unwrap_err();
        assert!(matches!(error, EngineError::Device(DeviceError::OutOfMemory)));
        assert_eq!(error.to_string(), "Device error: Out of device memory");
    }
}

//! GPU error taxonomy
//!
//! Every variant is fatal to the caller. The split only exists so the final
//! diagnostic says what kind of failure ended the run.

use crate::handles::FenceId;
use std::panic::Location;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuError {
    /// A native API call reported failure
    #[error("device error at {location}: {message}")]
    Device {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("timed out after {timeout:?} waiting for fence {fence:?}")]
    FenceTimeout {
        fence: FenceId,
        timeout: Option<Duration>,
    },

    #[error("timed out acquiring a surface image")]
    AcquireTimeout,

    /// The surface is gone or no longer matches the swapchain (for example after a resize)
    #[error("surface lost: {0}")]
    SurfaceLost(String),

    #[error("device out of memory")]
    OutOfMemory,

    #[error("precondition violated at {location}: {message}")]
    Precondition {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("unknown {kind} handle #{index}")]
    UnknownHandle { kind: &'static str, index: u32 },
}

impl GpuError {
    #[track_caller]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            location: Location::caller(),
        }
    }
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Fail with a precondition error unless `condition` holds
#[track_caller]
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> GpuResult<()> {
    if condition {
        Ok(())
    } else {
        Err(GpuError::precondition(message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_carry_caller_location() {
        let line = line!() + 1;
        let err = GpuError::device("vkQueueSubmit failed");
        match err {
            GpuError::Device { location, .. } => {
                assert_eq!(location.file(), file!());
                assert_eq!(location.line(), line);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ensure_passes_and_fails() {
        assert!(ensure(true, || unreachable!()).is_ok());
        let err = ensure(false, || "sizes differ".to_string()).unwrap_err();
        assert!(err.to_string().contains("sizes differ"));
    }
}

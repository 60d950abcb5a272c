//! Registry error types.

use std::fmt;

use crate::handle::ResourceKind;

/// Errors that can occur in the resource registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The configured budget for a resource kind is exhausted.
    ///
    /// Recoverable: destroying and collecting resources of this kind
    /// frees capacity.
    OutOfCapacity {
        /// The resource kind whose pool is full.
        kind: ResourceKind,
        /// The configured maximum live count for that kind.
        capacity: u32,
    },
    /// A stale, zombied, or never-allocated handle was passed in.
    ///
    /// Also returned to the loser of a concurrent double-destroy race.
    InvalidHandle(ResourceKind),
    /// Failed to create a driver object.
    ResourceCreationFailed(String),
    /// A driver query or signal failed.
    DriverError(String),
    /// The GPU device was lost.
    DeviceLost,
    /// Resources were still live when the registry was shut down.
    ///
    /// Each entry names one leaked resource.
    LeakedResources(Vec<String>),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfCapacity { kind, capacity } => {
                write!(f, "out of {} capacity (limit {capacity})", kind.name())
            }
            Self::InvalidHandle(kind) => write!(f, "invalid {} handle", kind.name()),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::DriverError(msg) => write!(f, "driver error: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::LeakedResources(names) => {
                write!(f, "{} resources leaked at registry teardown: ", names.len())?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RegistryError {}

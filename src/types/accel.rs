//! Acceleration structure types and descriptors.

/// Top-level or bottom-level acceleration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureKind {
    /// Instance-level structure referencing bottom-level ones.
    TopLevel,
    /// Geometry-level structure.
    BottomLevel,
}

/// Descriptor for creating an acceleration structure.
///
/// The registry allocates the backing buffer itself; `size` is the backing
/// size the driver reported for the structure's build inputs (queried by
/// the external build path, which is out of scope here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AccelerationStructureDescriptor {
    /// Debug label for the structure.
    pub label: Option<String>,
    /// Required backing buffer size in bytes.
    pub size: u64,
}

impl AccelerationStructureDescriptor {
    /// Create a descriptor for a structure of the given backing size.
    pub fn new(size: u64) -> Self {
        Self { label: None, size }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

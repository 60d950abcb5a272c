//! Live-resource diagnostics.

use crate::handle::ResourceKind;

/// One live resource in a [`MemoryReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReportEntry {
    /// The resource's kind.
    pub kind: ResourceKind,
    /// Slot index within its pool.
    pub index: u32,
    /// Current generation.
    pub generation: u64,
    /// Debug label, if one was set at creation.
    pub label: Option<String>,
    /// Backing size in bytes (approximate for textures).
    pub size: u64,
}

/// Snapshot of every live resource, zombies excluded.
#[derive(Debug, Default, Clone)]
pub struct MemoryReport {
    /// All live resources, grouped by kind in pool order.
    pub entries: Vec<ResourceReportEntry>,
}

impl MemoryReport {
    /// Number of live resources of `kind`.
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Total backing bytes across all live resources.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

//! Store configuration, validation, and error types.
//!
//! [`StoreConfig`] is the input to [`Store::with_config`](crate::Store::with_config).
//! [`validate()`](StoreConfig::validate) is called by the constructor, so
//! an invalid configuration never produces a store.

use thiserror::Error;

/// Upper bound on [`StoreConfig::edge_capacity`].
pub const MAX_EDGE_CAPACITY: usize = 1 << 20;

/// Upper bound on [`StoreConfig::max_list_len`].
pub const MAX_LIST_LEN: usize = 1 << 24;

// ── CyclePolicy ────────────────────────────────────────────────────

/// What the store does when a write closes a reference cycle.
///
/// The edge is recorded either way; the parent graph stays well-formed.
/// Settlement of a cycle terminates, but the freeze order of the objects
/// on the cycle is unspecified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Walk the graph on every edge insertion and emit a `tracing` warning
    /// when the new edge closes a cycle.
    #[default]
    Warn,
    /// Skip the check.
    Ignore,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`StoreConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The store label is empty.
    #[error("store label must not be empty")]
    EmptyLabel,
    /// `edge_capacity` exceeds [`MAX_EDGE_CAPACITY`].
    #[error("edge_capacity {configured} exceeds maximum of {max}")]
    EdgeCapacityTooLarge {
        /// The configured capacity.
        configured: usize,
        /// The allowed maximum.
        max: usize,
    },
    /// `max_list_len` is zero or exceeds [`MAX_LIST_LEN`].
    #[error("max_list_len {configured} must be in 1..={max}")]
    ListLimitOutOfRange {
        /// The configured limit.
        configured: usize,
        /// The allowed maximum.
        max: usize,
    },
}

// ── StoreConfig ────────────────────────────────────────────────────

/// Construction parameters for a [`Store`](crate::Store).
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Name recorded on the store's tracing spans. Default: `"weft"`.
    pub label: String,
    /// Reference-cycle handling. Default: [`CyclePolicy::Warn`].
    pub cycle_policy: CyclePolicy,
    /// Number of children the parent graph reserves room for. Default: 64.
    pub edge_capacity: usize,
    /// Longest sequence a list slot may hold. Writes at or past this index
    /// are rejected instead of padding the list. Default: 65536.
    pub max_list_len: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "weft".to_owned(),
            cycle_policy: CyclePolicy::Warn,
            edge_capacity: 64,
            max_list_len: 1 << 16,
        }
    }
}

impl StoreConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        if self.edge_capacity > MAX_EDGE_CAPACITY {
            return Err(ConfigError::EdgeCapacityTooLarge {
                configured: self.edge_capacity,
                max: MAX_EDGE_CAPACITY,
            });
        }
        if self.max_list_len == 0 || self.max_list_len > MAX_LIST_LEN {
            return Err(ConfigError::ListLimitOutOfRange {
                configured: self.max_list_len,
                max: MAX_LIST_LEN,
            });
        }
        Ok(())
    }

    /// Set the store label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the cycle policy.
    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Set the initial parent-graph capacity.
    pub fn with_edge_capacity(mut self, capacity: usize) -> Self {
        self.edge_capacity = capacity;
        self
    }

    /// Set the list length limit.
    pub fn with_max_list_len(mut self, len: usize) -> Self {
        self.max_list_len = len;
        self
    }
}

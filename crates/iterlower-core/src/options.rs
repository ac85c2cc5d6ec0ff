//! Knobs that change how aggressively the lowering hoists and reuses.

use serde::{Deserialize, Serialize};

use crate::VisibilityPolicy;

/// Which locals become fields of the state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HoistPolicy {
    /// Hoist locals whose declaring scope contains a suspension point.
    #[default]
    SuspendingScopes,
    /// Hoist every local regardless of where it is declared.
    All,
}

/// Options for a single lowering run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    pub hoist_policy: HoistPolicy,
    /// Let a never-enumerated enumerable hand itself out as its first enumerator.
    pub reuse_template_instance: bool,
    pub visibility: VisibilityPolicy,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            hoist_policy: HoistPolicy::default(),
            reuse_template_instance: true,
            visibility: VisibilityPolicy::default(),
        }
    }
}

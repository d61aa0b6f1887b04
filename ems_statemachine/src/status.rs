//! Per-family status-to-state tables.
//!
//! Device families read a live status word and branch on it. The same status
//! may lead to different states in different families (`FAULT` is "stopped"
//! for one inverter and "re-arbitrate" for another), so each family supplies
//! its mapping as a `const` [`StatusMap`] instead of sharing a rule.

/// What GO_STOPPED does for a given live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStep {
    /// Device still runs: (re)issue the stop command.
    IssueStop,
    /// Device is on its way down: keep waiting.
    Wait,
    /// Device reached a stopped indication.
    Stopped,
    /// Status is ambiguous: go back to UNDEFINED.
    Rearbitrate,
}

/// Lookup table from a status value to an action or state.
#[derive(Debug, Clone, Copy)]
pub struct StatusMap<K: 'static, V: 'static> {
    entries: &'static [(K, V)],
    fallback: V,
}

impl<K, V> StatusMap<K, V> {
    /// Entries are searched in order; `fallback` applies to unlisted keys.
    pub const fn new(entries: &'static [(K, V)], fallback: V) -> Self {
        Self { entries, fallback }
    }
}

impl<K: Copy + PartialEq, V: Copy> StatusMap<K, V> {
    pub fn lookup(&self, key: K) -> V {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(self.fallback, |&(_, v)| v)
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }
}

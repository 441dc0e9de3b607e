//! Demo action set exposed by the service.

use webhooks_core::{DomainResult, action_names, parse_action_names};

bitflags::bitflags! {
    /// Lifecycle actions of a generic resource.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ResourceActions: u32 {
        const CREATED = 1 << 0;
        const UPDATED = 1 << 1;
        const DELETED = 1 << 2;
        const ALL = Self::CREATED.bits() | Self::UPDATED.bits() | Self::DELETED.bits();
    }
}

/// Lowercase names of the single actions in `actions`.
pub fn to_names(actions: ResourceActions) -> Vec<String> {
    action_names(actions)
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Combine action names (case-insensitive; `all` is accepted).
pub fn from_names<N: AsRef<str>>(names: &[N]) -> DomainResult<ResourceActions> {
    parse_action_names(names)
}

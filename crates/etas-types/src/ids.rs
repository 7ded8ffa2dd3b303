//! Type-safe identifier wrappers around catalog-local integers.
//!
//! Event identifiers are only unique within one realization: every
//! simulated catalog numbers its events from 1 upwards in insertion order.
//! The value 0 is reserved for "no event" (the parent of a background
//! event). Realization identifiers number the independent catalogs of one
//! simulation run from 0.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an unsigned integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Create an identifier from its raw value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Return the inner raw value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Catalog-local identifier of an event (0 means "none").
    EventId(u64)
}

define_id! {
    /// Identifier of one independent realization within a simulation run.
    RealizationId(u32)
}

impl EventId {
    /// Sentinel used as the parent of generation-0 events.
    pub const NONE: Self = Self(0);

    /// Whether this id refers to an actual event.
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// The id following this one, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero() {
        assert_eq!(EventId::NONE.into_inner(), 0);
        assert!(!EventId::NONE.is_some());
        assert!(EventId::new(3).is_some());
    }

    #[test]
    fn next_increments() {
        assert_eq!(EventId::new(41).next(), EventId::new(42));
        assert_eq!(EventId::new(u64::MAX).next(), EventId::new(u64::MAX));
    }

    #[test]
    fn id_serializes_transparently() {
        let json = serde_json::to_string(&EventId::new(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));
        let restored: Result<RealizationId, _> = serde_json::from_str("12");
        assert_eq!(restored.ok(), Some(RealizationId::new(12)));
    }

    #[test]
    fn id_display_matches_inner() {
        assert_eq!(RealizationId::new(5).to_string(), "5");
    }
}

//! State of an entity as shown to users.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity state. Switches only ever report `On` or `Off`; the other two
/// cover entities whose device has not spoken yet or has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    On,
    Off,
    #[default]
    Unknown,
    Unavailable,
}

impl EntityState {
    #[must_use]
    pub fn is_available(self) -> bool {
        self != Self::Unavailable
    }

    /// `On` for `true`, `Off` for `false`.
    #[must_use]
    pub fn from_on(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_only_be_unavailable_when_marked_so() {
        let available = [EntityState::On, EntityState::Off, EntityState::Unknown];
        assert!(available.into_iter().all(EntityState::is_available));
        assert!(!EntityState::Unavailable.is_available());
    }

    #[test]
    fn should_map_switch_output_to_state() {
        assert_eq!(EntityState::from_on(true), EntityState::On);
        assert_eq!(EntityState::from_on(false), EntityState::Off);
        assert_eq!(EntityState::default(), EntityState::Unknown);
    }

    #[test]
    fn should_use_same_text_for_display_and_serde() {
        for state in [
            EntityState::On,
            EntityState::Off,
            EntityState::Unknown,
            EntityState::Unavailable,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}

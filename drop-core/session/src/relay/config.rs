use std::{str::FromStr, time::Duration};
use tracing::warn;

/// Limits of the in-process relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Length of generated room codes.
    pub code_length: usize,
    /// Rooms older than this are gone.
    pub room_ttl: Duration,
    pub max_rooms: usize,
    /// Refuse to create rooms without a PIN.
    pub pin_required: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            room_ttl: Duration::from_secs(1200),
            max_rooms: 10,
            pin_required: false,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by `ROOM_CODE_LENGTH`, `ROOM_TTL_SECONDS`,
    /// `MAX_ROOMS` and `PIN_REQUIRED`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            code_length: parse_or(
                &lookup,
                "ROOM_CODE_LENGTH",
                defaults.code_length,
            )
            .max(1),
            room_ttl: Duration::from_secs(parse_or(
                &lookup,
                "ROOM_TTL_SECONDS",
                defaults.room_ttl.as_secs(),
            )),
            max_rooms: parse_or(&lookup, "MAX_ROOMS", defaults.max_rooms),
            pin_required: lookup("PIN_REQUIRED")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.pin_required),
        }
    }
}

fn parse_or<T: FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("ROOM_CODE_LENGTH", "4"),
            ("ROOM_TTL_SECONDS", "60"),
            ("MAX_ROOMS", "2"),
            ("PIN_REQUIRED", "TRUE"),
        ]));

        assert_eq!(
            config,
            RelayConfig {
                code_length: 4,
                room_ttl: Duration::from_secs(60),
                max_rooms: 2,
                pin_required: true,
            }
        );
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("ROOM_CODE_LENGTH", "six"),
            ("MAX_ROOMS", "-1"),
            ("PIN_REQUIRED", "yes"),
        ]));

        assert_eq!(config, RelayConfig::default());
    }
}

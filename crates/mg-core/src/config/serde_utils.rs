//! Serde helpers shared by the configuration types

/// `Duration` stored as whole seconds, e.g. `start_timeout = 10`
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "duration_secs")]
        start_timeout: Duration,
    }

    #[test]
    fn test_duration_secs_toml() {
        let parsed: Timeouts = toml::from_str("start_timeout = 15").unwrap();
        assert_eq!(parsed.start_timeout, Duration::from_secs(15));

        let text = toml::to_string(&parsed).unwrap();
        assert_eq!(text.trim(), "start_timeout = 15");
    }

    #[test]
    fn test_duration_secs_truncates_subsecond() {
        let value = Timeouts {
            start_timeout: Duration::from_millis(2500),
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"start_timeout":2}"#);
    }
}

//! Trigger events and the schedule slot they select.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named schedule slot selecting which scripts run and where results land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 3] = [Frequency::Daily, Frequency::Weekly, Frequency::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching is exact: `Daily` or ` daily` are not schedule slots.
impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(other.to_string()),
        }
    }
}

/// Invocation payload. Only `frequency` is read; everything else the
/// scheduler sends is kept for debug dumps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InvocationEvent {
    pub fn for_frequency(frequency: Frequency) -> Self {
        Self {
            frequency: Some(serde_json::Value::String(frequency.as_str().to_string())),
            extra: serde_json::Map::new(),
        }
    }

    /// Build from an arbitrary JSON payload. Non-object payloads carry no
    /// frequency.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Raw frequency as sent, for error reporting.
    pub fn raw_frequency(&self) -> Option<String> {
        match self.frequency.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Resolve the schedule slot; `Err` carries the raw value (None when absent).
    pub fn frequency(&self) -> Result<Frequency, Option<String>> {
        match self.frequency.as_ref() {
            Some(serde_json::Value::String(s)) => s.parse().map_err(Some),
            _ => Err(self.raw_frequency()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognized_frequencies_parse() {
        for frequency in Frequency::ALL {
            let event = InvocationEvent::for_frequency(frequency);
            assert_eq!(event.frequency(), Ok(frequency));
        }
    }

    #[test]
    fn scheduler_payload_keeps_extra_fields() {
        let event = InvocationEvent::from_value(json!({
            "frequency": "weekly",
            "source": "aws.events",
            "time": "2024-01-02T03:04:00Z"
        }));
        assert_eq!(event.frequency(), Ok(Frequency::Weekly));
        assert_eq!(event.extra["source"], json!("aws.events"));
    }

    #[test]
    fn unknown_or_missing_frequency_is_an_error() {
        let hourly = InvocationEvent::from_value(json!({ "frequency": "hourly" }));
        assert_eq!(hourly.frequency(), Err(Some("hourly".to_string())));

        let upper = InvocationEvent::from_value(json!({ "frequency": "Daily" }));
        assert_eq!(upper.frequency(), Err(Some("Daily".to_string())));

        let numeric = InvocationEvent::from_value(json!({ "frequency": 7 }));
        assert_eq!(numeric.frequency(), Err(Some("7".to_string())));

        let missing = InvocationEvent::from_value(json!({ "detail": {} }));
        assert_eq!(missing.frequency(), Err(None));

        let not_an_object = InvocationEvent::from_value(json!(["daily"]));
        assert_eq!(not_an_object.frequency(), Err(None));
    }
}

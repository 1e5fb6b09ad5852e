use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token counts reported by the provider, when it reports them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Reply captured from a single completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Text content of the reply, as returned by the provider
    pub text: String,
    /// Model that actually served the request
    pub model: String,
    pub usage: TokenUsage,
    /// Wall-clock duration of the request
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl AgentOutput {
    pub fn new(text: String, model: String, usage: TokenUsage, duration: Duration) -> Self {
        Self {
            text,
            model,
            usage,
            duration,
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_serializes_as_seconds() {
        let output = AgentOutput::new(
            "PASS".into(),
            "glm-4.5-air".into(),
            TokenUsage::default(),
            Duration::from_millis(1500),
        );
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["duration"], serde_json::json!(1.5));

        let back: AgentOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }
}

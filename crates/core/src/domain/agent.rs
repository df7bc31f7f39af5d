use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Prefix shared by the workload name, the exposure name and the `app` label value.
pub const RESOURCE_NAME_PREFIX: &str = "agent-";

/// Longest resource name the control plane accepts for a Service (DNS-1035 label).
const MAX_RESOURCE_NAME_LEN: usize = 63;

pub const MAX_AGENT_ID_LEN: usize = MAX_RESOURCE_NAME_LEN - RESOURCE_NAME_PREFIX.len();

/// Identity of one agent. Interpolated into resource names, label values and a storage
/// subpath, so only lowercase alphanumerics and inner hyphens are accepted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AgentId(String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentIdError {
    #[error("agent_id must not be empty")]
    Empty,
    #[error("agent_id `{value}` is longer than {max} characters", max = MAX_AGENT_ID_LEN)]
    TooLong { value: String },
    #[error("agent_id `{value}` contains `{found}`; only a-z, 0-9 and `-` are allowed")]
    InvalidCharacter { value: String, found: char },
    #[error("agent_id `{value}` must start and end with a letter or digit")]
    InvalidBoundary { value: String },
}

impl AgentId {
    pub fn parse(value: &str) -> Result<Self, AgentIdError> {
        if value.is_empty() {
            return Err(AgentIdError::Empty);
        }
        if value.len() > MAX_AGENT_ID_LEN {
            return Err(AgentIdError::TooLong { value: value.to_owned() });
        }
        if let Some(found) =
            value.chars().find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-'))
        {
            return Err(AgentIdError::InvalidCharacter { value: value.to_owned(), found });
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(AgentIdError::InvalidBoundary { value: value.to_owned() });
        }

        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `agent-{agent_id}`: the identity key for both resources of the pair.
    pub fn resource_name(&self) -> String {
        format!("{RESOURCE_NAME_PREFIX}{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AgentId {
    type Err = AgentIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub agent_id: AgentId,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not valid UTF-8: {0}")]
    NotUtf8(#[source] std::str::Utf8Error),
    #[error("message body is not a deployment request: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("message body must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error(transparent)]
    InvalidAgentId(#[from] AgentIdError),
}

#[derive(Deserialize)]
struct WireRequest {
    agent_id: String,
}

impl DeploymentRequest {
    /// Decodes `{"agent_id": "<string>"}`. Surrounding whitespace is ignored, extra fields
    /// are tolerated, anything else is rejected.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(body).map_err(DecodeError::NotUtf8)?;
        let value: Value = serde_json::from_str(text.trim()).map_err(DecodeError::Malformed)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject(json_kind(&value)));
        }
        let wire: WireRequest = serde_json::from_value(value).map_err(DecodeError::Malformed)?;
        let agent_id = AgentId::parse(&wire.agent_id)?;
        Ok(Self { agent_id })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentId, AgentIdError, DecodeError, DeploymentRequest, MAX_AGENT_ID_LEN};

    #[test]
    fn decodes_plain_request() {
        let request = DeploymentRequest::decode(br#"{"agent_id":"abc123"}"#)
            .expect("request should decode");
        assert_eq!(request.agent_id.as_str(), "abc123");
        assert_eq!(request.agent_id.resource_name(), "agent-abc123");
    }

    #[test]
    fn decode_trims_whitespace_and_ignores_extra_fields() {
        let request =
            DeploymentRequest::decode(b"  {\"agent_id\":\"a-1\",\"origin\":\"ui\"}\n")
                .expect("request should decode");
        assert_eq!(request.agent_id.as_str(), "a-1");
    }

    #[test]
    fn decode_rejects_non_json_and_missing_field() {
        assert!(matches!(
            DeploymentRequest::decode(b"deploy abc123"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            DeploymentRequest::decode(br#"{"agent":"abc123"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            DeploymentRequest::decode(br#"{"agent_id":42}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(DeploymentRequest::decode(&[0xff, 0xfe]), Err(DecodeError::NotUtf8(_))));
    }

    #[test]
    fn decode_rejects_bodies_that_are_not_objects() {
        for body in [&br#"["abc123"]"#[..], br#""abc123""#, b"42", b"null"] {
            let result = DeploymentRequest::decode(body);
            assert!(
                matches!(result, Err(DecodeError::NotAnObject(_))),
                "body {:?} should be rejected, got {result:?}",
                String::from_utf8_lossy(body)
            );
        }

        let message = DeploymentRequest::decode(br#"["abc123"]"#)
            .expect_err("array body")
            .to_string();
        assert!(message.contains("an array"), "unexpected message: {message}");
    }

    #[test]
    fn agent_id_policy_rejects_path_and_name_unsafe_values() {
        assert_eq!(AgentId::parse(""), Err(AgentIdError::Empty));
        assert!(matches!(
            AgentId::parse("../etc"),
            Err(AgentIdError::InvalidCharacter { found: '.', .. })
        ));
        assert!(matches!(
            AgentId::parse("a/b"),
            Err(AgentIdError::InvalidCharacter { found: '/', .. })
        ));
        assert!(matches!(
            AgentId::parse("Agent"),
            Err(AgentIdError::InvalidCharacter { found: 'A', .. })
        ));
        assert!(matches!(AgentId::parse("-abc"), Err(AgentIdError::InvalidBoundary { .. })));
        assert!(matches!(
            AgentId::parse(&"a".repeat(MAX_AGENT_ID_LEN + 1)),
            Err(AgentIdError::TooLong { .. })
        ));

        let longest = AgentId::parse(&"a".repeat(MAX_AGENT_ID_LEN)).expect("max length is valid");
        assert_eq!(longest.resource_name().len(), 63);
    }

    #[test]
    fn empty_agent_id_in_body_is_a_decode_failure() {
        assert!(matches!(
            DeploymentRequest::decode(br#"{"agent_id":""}"#),
            Err(DecodeError::InvalidAgentId(AgentIdError::Empty))
        ));
    }
}

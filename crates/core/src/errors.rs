use thiserror::Error;

use crate::domain::agent::{AgentId, DecodeError};
use crate::prompt::PromptError;
use crate::reconcile::{HalfState, PairApplyError};

/// Classified failure of one message's pipeline. Never escapes the handler boundary.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    ConfigurationNotFound(#[from] PromptError),
    #[error("deployment of agent `{agent_id}` failed: {source}")]
    Apply {
        agent_id: AgentId,
        #[source]
        source: PairApplyError,
    },
}

impl DeploymentError {
    /// Stable snake_case class used in log events and operator output.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Decode(DecodeError::InvalidAgentId(_)) => "invalid_agent_id",
            Self::Decode(_) => "decode",
            Self::ConfigurationNotFound(_) => "configuration_not_found",
            Self::Apply { .. } => "apply_failed",
        }
    }

    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Self::Decode(_) => None,
            Self::ConfigurationNotFound(PromptError::ConfigurationNotFound { agent_id, .. })
            | Self::Apply { agent_id, .. } => Some(agent_id),
        }
    }

    /// True when the control plane may hold one half of the pair without the other.
    pub fn is_partial_apply(&self) -> bool {
        matches!(
            self,
            Self::Apply { source: PairApplyError { workload: HalfState::Applied(_), .. }, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::DeploymentError;
    use crate::domain::agent::{AgentId, DeploymentRequest};
    use crate::domain::resources::ResourceKind;
    use crate::prompt::PromptError;
    use crate::reconcile::{
        ApplyOutcome, ApplyStage, ControlPlaneError, FatalApplyError, HalfState, PairApplyError,
    };

    fn apply_error(workload: HalfState, exposure: HalfState) -> DeploymentError {
        DeploymentError::Apply {
            agent_id: AgentId::parse("a").expect("valid"),
            source: PairApplyError {
                workload,
                exposure,
                source: FatalApplyError {
                    kind: ResourceKind::Exposure,
                    name: "agent-a".to_owned(),
                    stage: ApplyStage::Create,
                    source: ControlPlaneError::Transport("timeout".to_owned()),
                },
            },
        }
    }

    #[test]
    fn decode_failures_are_classified_by_cause() {
        let malformed = DeploymentRequest::decode(b"not json").expect_err("malformed");
        assert_eq!(DeploymentError::from(malformed).class(), "decode");

        let invalid = DeploymentRequest::decode(br#"{"agent_id":"A/B"}"#).expect_err("invalid");
        assert_eq!(DeploymentError::from(invalid).class(), "invalid_agent_id");
    }

    #[test]
    fn missing_prompt_maps_to_configuration_not_found() {
        let error = DeploymentError::from(PromptError::ConfigurationNotFound {
            agent_id: AgentId::parse("a").expect("valid"),
            path: PathBuf::from("/app/prompts/a/prompt.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(error.class(), "configuration_not_found");
        assert_eq!(error.agent_id().map(AgentId::as_str), Some("a"));
        assert!(error.to_string().contains("/app/prompts/a/prompt.txt"));
    }

    #[test]
    fn partial_apply_is_detected_only_when_workload_landed() {
        let partial =
            apply_error(HalfState::Applied(ApplyOutcome::Replaced), HalfState::Failed);
        assert_eq!(partial.class(), "apply_failed");
        assert!(partial.is_partial_apply());
        assert_eq!(partial.agent_id().map(AgentId::as_str), Some("a"));

        let clean = apply_error(HalfState::Failed, HalfState::NotAttempted);
        assert!(!clean.is_partial_apply());
    }
}

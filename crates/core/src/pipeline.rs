use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::FailurePolicy;
use crate::domain::agent::{AgentId, DeploymentRequest};
use crate::errors::DeploymentError;
use crate::locks::AgentLocks;
use crate::prompt::PromptSource;
use crate::reconcile::{ControlPlane, PairOutcome, Reconciler};
use crate::synthesis::{synthesize, SynthesisEnvironment};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    pub agent_id: AgentId,
    pub resource_name: String,
    pub namespace: String,
    pub outcome: PairOutcome,
}

/// How the queue should settle a delivery once its pipeline finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Acknowledge,
    /// Drop without requeue; the broker may dead-letter it.
    Reject,
}

impl FailurePolicy {
    pub fn disposition(&self, result: &Result<DeploymentReport, DeploymentError>) -> Disposition {
        match (self, result) {
            (_, Ok(_)) | (Self::Acknowledge, Err(_)) => Disposition::Acknowledge,
            (Self::DeadLetter, Err(_)) => Disposition::Reject,
        }
    }
}

/// Decode → load prompt → synthesize → apply pair, for one message at a time.
pub struct DeploymentPipeline {
    prompts: Arc<dyn PromptSource>,
    reconciler: Reconciler,
    environment: SynthesisEnvironment,
    locks: Option<AgentLocks>,
}

impl DeploymentPipeline {
    pub fn new(
        prompts: Arc<dyn PromptSource>,
        control_plane: Arc<dyn ControlPlane>,
        environment: SynthesisEnvironment,
    ) -> Self {
        Self { prompts, reconciler: Reconciler::new(control_plane), environment, locks: None }
    }

    /// Runs deliveries for the same agent one after the other.
    pub fn serialize_per_agent(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(AgentLocks::new);
        self
    }

    pub fn environment(&self) -> &SynthesisEnvironment {
        &self.environment
    }

    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentReport, DeploymentError> {
        let agent_id = &request.agent_id;
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(agent_id).await),
            None => None,
        };

        let prompt = self.prompts.load(agent_id).await?;
        let pair = synthesize(agent_id, &prompt, &self.environment);
        let outcome = self
            .reconciler
            .apply_pair(&pair)
            .await
            .map_err(|source| DeploymentError::Apply { agent_id: agent_id.clone(), source })?;

        Ok(DeploymentReport {
            agent_id: agent_id.clone(),
            resource_name: pair.workload.name,
            namespace: pair.workload.namespace,
            outcome,
        })
    }

    /// Handler boundary: every failure is classified, logged and returned, never raised.
    pub async fn handle(
        &self,
        body: &[u8],
        correlation_id: &str,
    ) -> Result<DeploymentReport, DeploymentError> {
        let result = match DeploymentRequest::decode(body) {
            Ok(request) => self.deploy(&request).await,
            Err(error) => Err(error.into()),
        };
        log_outcome(&result, correlation_id);
        result
    }
}

fn log_outcome(result: &Result<DeploymentReport, DeploymentError>, correlation_id: &str) {
    match result {
        Ok(report) => info!(
            event_name = "deploy.pipeline.succeeded",
            correlation_id,
            agent_id = %report.agent_id,
            resource_name = %report.resource_name,
            namespace = %report.namespace,
            workload = report.outcome.workload.as_str(),
            exposure = report.outcome.exposure.as_str(),
            "agent deployed as workload and exposure {}",
            report.resource_name
        ),
        Err(failure) => {
            let agent_id = failure.agent_id().map(AgentId::as_str).unwrap_or("unknown");
            if failure.is_partial_apply() {
                error!(
                    event_name = "deploy.pipeline.failed",
                    correlation_id,
                    agent_id,
                    error_class = failure.class(),
                    partial_apply = true,
                    error = %failure,
                    "workload applied but exposure failed; pair left inconsistent"
                );
            } else {
                warn!(
                    event_name = "deploy.pipeline.failed",
                    correlation_id,
                    agent_id,
                    error_class = failure.class(),
                    error = %failure,
                    "agent deployment failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::FailurePolicy;
    use crate::domain::agent::{AgentIdError, DecodeError};
    use crate::errors::DeploymentError;

    use super::{DeploymentReport, Disposition};

    #[test]
    fn acknowledge_policy_settles_every_outcome_as_handled() {
        let failed: Result<DeploymentReport, DeploymentError> =
            Err(DeploymentError::Decode(DecodeError::InvalidAgentId(AgentIdError::Empty)));
        assert_eq!(FailurePolicy::Acknowledge.disposition(&failed), Disposition::Acknowledge);
        assert_eq!(FailurePolicy::DeadLetter.disposition(&failed), Disposition::Reject);
    }
}

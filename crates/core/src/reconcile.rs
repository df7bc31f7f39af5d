use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::domain::resources::{Resource, ResourceKind, ResourcePair};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    #[error("{kind} `{name}` already exists")]
    AlreadyExists { kind: ResourceKind, name: String },
    #[error("control plane rejected {kind} `{name}` ({status} {reason}): {message}")]
    Rejected { kind: ResourceKind, name: String, status: u16, reason: String, message: String },
    #[error("control plane transport failure: {0}")]
    Transport(String),
}

/// Declarative cluster API: create by spec, replace by name.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create(&self, namespace: &str, resource: &Resource) -> Result<(), ControlPlaneError>;

    async fn replace(
        &self,
        namespace: &str,
        name: &str,
        resource: &Resource,
    ) -> Result<(), ControlPlaneError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Created,
    /// The create hit the already-exists branch and the resource was overwritten by name.
    Replaced,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Replaced => "replaced",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStage {
    Create,
    Replace,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{stage:?} of {kind} `{name}` failed: {source}")]
pub struct FatalApplyError {
    pub kind: ResourceKind,
    pub name: String,
    pub stage: ApplyStage,
    #[source]
    pub source: ControlPlaneError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfState {
    Applied(ApplyOutcome),
    Failed,
    NotAttempted,
}

/// Result of a pair application that stopped part way. `workload` and `exposure` tell the
/// caller which halves reached the control plane.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("partial apply (workload: {workload:?}, exposure: {exposure:?}): {source}")]
pub struct PairApplyError {
    pub workload: HalfState,
    pub exposure: HalfState,
    #[source]
    pub source: FatalApplyError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    pub workload: ApplyOutcome,
    pub exposure: ApplyOutcome,
}

#[derive(Clone)]
pub struct Reconciler {
    control_plane: Arc<dyn ControlPlane>,
}

impl Reconciler {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Upsert-by-conflict: create, and on already-exists replace by name. Every other
    /// failure, including any failure of the replace, is returned unretried.
    pub async fn apply(&self, resource: &Resource) -> Result<ApplyOutcome, FatalApplyError> {
        let namespace = resource.namespace();
        let name = resource.name();
        let fatal = |stage, source| FatalApplyError {
            kind: resource.kind(),
            name: name.to_owned(),
            stage,
            source,
        };

        match self.control_plane.create(namespace, resource).await {
            Ok(()) => {
                info!(
                    event_name = "deploy.reconcile.created",
                    kind = %resource.kind(),
                    resource_name = name,
                    namespace,
                    "resource created"
                );
                Ok(ApplyOutcome::Created)
            }
            Err(ControlPlaneError::AlreadyExists { .. }) => {
                self.control_plane
                    .replace(namespace, name, resource)
                    .await
                    .map_err(|source| fatal(ApplyStage::Replace, source))?;
                info!(
                    event_name = "deploy.reconcile.replaced",
                    kind = %resource.kind(),
                    resource_name = name,
                    namespace,
                    "resource already existed and was replaced"
                );
                Ok(ApplyOutcome::Replaced)
            }
            Err(source) => Err(fatal(ApplyStage::Create, source)),
        }
    }

    /// Applies the workload, then the exposure. A failed workload leaves the exposure
    /// untouched; nothing already applied is rolled back.
    pub async fn apply_pair(&self, pair: &ResourcePair) -> Result<PairOutcome, PairApplyError> {
        let workload = Resource::Workload(pair.workload.clone());
        let workload_outcome = self.apply(&workload).await.map_err(|source| PairApplyError {
            workload: HalfState::Failed,
            exposure: HalfState::NotAttempted,
            source,
        })?;

        let exposure = Resource::Exposure(pair.exposure.clone());
        let exposure_outcome = self.apply(&exposure).await.map_err(|source| PairApplyError {
            workload: HalfState::Applied(workload_outcome),
            exposure: HalfState::Failed,
            source,
        })?;

        Ok(PairOutcome { workload: workload_outcome, exposure: exposure_outcome })
    }
}

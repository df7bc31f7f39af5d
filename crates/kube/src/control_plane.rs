use async_trait::async_trait;
use deplo_core::domain::resources::{Resource, ResourceKind};
use deplo_core::reconcile::{ControlPlane, ControlPlaneError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use crate::manifest;

const CONFLICT: u16 = 409;

/// `ControlPlane` backed by the Kubernetes API: workloads are `Deployment`s, exposures are
/// `Service`s.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// In-cluster service account first, then the local kubeconfig.
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn create(&self, namespace: &str, resource: &Resource) -> Result<(), ControlPlaneError> {
        let params = PostParams::default();
        let result = match resource {
            Resource::Workload(spec) => self
                .deployments(namespace)
                .create(&params, &manifest::deployment(spec))
                .await
                .map(drop),
            Resource::Exposure(spec) => {
                self.services(namespace).create(&params, &manifest::service(spec)).await.map(drop)
            }
        };
        debug!(
            event_name = "deploy.control_plane.create",
            namespace,
            kind = resource.kind().as_str(),
            name = resource.name(),
            ok = result.is_ok(),
            "create request finished"
        );
        result.map_err(|error| classify(resource.kind(), resource.name(), error))
    }

    async fn replace(
        &self,
        namespace: &str,
        name: &str,
        resource: &Resource,
    ) -> Result<(), ControlPlaneError> {
        let params = PostParams::default();
        let result = match resource {
            Resource::Workload(spec) => self
                .deployments(namespace)
                .replace(name, &params, &manifest::deployment(spec))
                .await
                .map(drop),
            Resource::Exposure(spec) => self
                .services(namespace)
                .replace(name, &params, &manifest::service(spec))
                .await
                .map(drop),
        };
        debug!(
            event_name = "deploy.control_plane.replace",
            namespace,
            kind = resource.kind().as_str(),
            name,
            ok = result.is_ok(),
            "replace request finished"
        );
        result.map_err(|error| classify(resource.kind(), name, error))
    }
}

/// Only a 409 from the API server counts as "already exists"; every other failure is fatal.
fn classify(kind: ResourceKind, name: &str, error: kube::Error) -> ControlPlaneError {
    match error {
        kube::Error::Api(response) if response.code == CONFLICT => {
            ControlPlaneError::AlreadyExists { kind, name: name.to_owned() }
        }
        kube::Error::Api(response) => ControlPlaneError::Rejected {
            kind,
            name: name.to_owned(),
            status: response.code,
            reason: response.reason,
            message: response.message,
        },
        other => ControlPlaneError::Transport(other.to_string()),
    }
}

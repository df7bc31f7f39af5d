use secrecy::{ExposeSecret, SecretString};

use crate::config::WorkloadConfig;
use crate::domain::agent::AgentId;
use crate::domain::resources::{
    ContainerSpec, EnvVar, ExposureSpec, Labels, ResourcePair, VolumeMountSpec, VolumeSpec,
    WorkloadSpec,
};

pub const APP_LABEL: &str = "app";
pub const AGENT_ID_ENV: &str = "AGENT_ID";
pub const PROMPT_ENV: &str = "PROMPT";
pub const BASE_PATH_ENV: &str = "BASE_PATH";

/// One instance per agent; scaling is out of scope.
const REPLICAS: i32 = 1;

/// Process-wide inputs to synthesis, fixed after startup.
#[derive(Clone, Debug)]
pub struct SynthesisEnvironment {
    pub namespace: String,
    pub image: String,
    pub container_name: String,
    pub port: u16,
    pub claim_name: String,
    pub volume_name: String,
    pub mount_path: String,
    pub base_path: String,
    pub secret_env_name: String,
    pub api_key: SecretString,
}

impl From<&WorkloadConfig> for SynthesisEnvironment {
    fn from(config: &WorkloadConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            image: config.image.clone(),
            container_name: config.container_name.clone(),
            port: config.port,
            claim_name: config.claim_name.clone(),
            volume_name: config.volume_name.clone(),
            mount_path: config.mount_path.clone(),
            base_path: config.base_path.clone(),
            secret_env_name: config.secret_env_name.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Builds the workload/exposure pair for one agent. Pure and deterministic: the same
/// inputs always produce equal specs.
pub fn synthesize(agent_id: &AgentId, prompt: &str, env: &SynthesisEnvironment) -> ResourcePair {
    let name = agent_id.resource_name();
    let labels = Labels::from([(APP_LABEL.to_owned(), name.clone())]);

    let container = ContainerSpec {
        name: env.container_name.clone(),
        image: env.image.clone(),
        env: vec![
            EnvVar::plain(AGENT_ID_ENV, agent_id.as_str()),
            EnvVar::sensitive(&env.secret_env_name, env.api_key.expose_secret()),
            EnvVar::plain(PROMPT_ENV, prompt),
            EnvVar::plain(BASE_PATH_ENV, &env.base_path),
        ],
        port: env.port,
        mount: VolumeMountSpec {
            volume_name: env.volume_name.clone(),
            mount_path: env.mount_path.clone(),
            sub_path: agent_id.as_str().to_owned(),
        },
    };

    let workload = WorkloadSpec {
        name: name.clone(),
        namespace: env.namespace.clone(),
        labels: labels.clone(),
        replicas: REPLICAS,
        container,
        volume: VolumeSpec { name: env.volume_name.clone(), claim_name: env.claim_name.clone() },
    };

    let exposure = ExposureSpec {
        name,
        namespace: env.namespace.clone(),
        selector: labels,
        port: env.port,
        target_port: env.port,
    };

    ResourcePair { workload, exposure }
}

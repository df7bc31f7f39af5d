use std::sync::Arc;

use deplo_core::config::{AppConfig, ConfigError, LoadOptions};
use deplo_core::{ControlPlane, DeploymentPipeline, FsPromptLoader, SynthesisEnvironment};
use deplo_kube::KubeControlPlane;
use deplo_queue::{AmqpSettings, AmqpTransport, QueueListener, ReconnectPolicy};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub pipeline: Arc<DeploymentPipeline>,
    pub listener: QueueListener,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("kubernetes client initialization failed: {0}")]
    ControlPlane(#[source] kube::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let control_plane =
        KubeControlPlane::try_default().await.map_err(BootstrapError::ControlPlane)?;
    info!(
        event_name = "system.bootstrap.control_plane_ready",
        correlation_id = "bootstrap",
        namespace = %config.workload.namespace,
        "kubernetes client initialized"
    );

    Ok(assemble(config, Arc::new(control_plane)))
}

/// Wires the pipeline and the queue listener around an already-built control plane.
pub fn assemble(config: AppConfig, control_plane: Arc<dyn ControlPlane>) -> Application {
    if !config.workload.has_api_key() {
        warn!(
            event_name = "system.bootstrap.api_key_unset",
            correlation_id = "bootstrap",
            env_name = %config.workload.secret_env_name,
            "workload api key is unset; agents will receive an empty value"
        );
    }

    let pipeline = DeploymentPipeline::new(
        Arc::new(FsPromptLoader::new(&config.prompts.root)),
        control_plane,
        SynthesisEnvironment::from(&config.workload),
    )
    .serialize_per_agent(config.queue.serialize_per_agent);
    let pipeline = Arc::new(pipeline);

    let transport = AmqpTransport::new(AmqpSettings {
        url: config.queue.url.clone(),
        queue: config.queue.name.clone(),
        consumer_tag: config.queue.consumer_tag.clone(),
        prefetch: config.queue.max_in_flight,
    });
    let listener =
        QueueListener::new(Arc::new(transport), pipeline.clone(), ReconnectPolicy::default())
            .max_in_flight(config.queue.max_in_flight)
            .on_failure(config.queue.on_failure);

    info!(
        event_name = "system.bootstrap.pipeline_ready",
        correlation_id = "bootstrap",
        queue = %config.queue.name,
        prompts_root = %config.prompts.root.display(),
        max_in_flight = config.queue.max_in_flight,
        serialize_per_agent = config.queue.serialize_per_agent,
        "deployment pipeline assembled"
    );

    Application { config, pipeline, listener }
}

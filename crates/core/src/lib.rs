pub mod config;
pub mod domain;
pub mod errors;
pub mod locks;
pub mod pipeline;
pub mod prompt;
pub mod reconcile;
pub mod synthesis;

pub use domain::agent::{AgentId, AgentIdError, DecodeError, DeploymentRequest};
pub use domain::resources::{
    ExposureSpec, Resource, ResourceKind, ResourcePair, WorkloadSpec,
};
pub use errors::DeploymentError;
pub use pipeline::{DeploymentPipeline, DeploymentReport, Disposition};
pub use prompt::{FsPromptLoader, PromptError, PromptSource};
pub use reconcile::{
    ApplyOutcome, ControlPlane, ControlPlaneError, FatalApplyError, HalfState, PairApplyError,
    PairOutcome, Reconciler,
};
pub use synthesis::{synthesize, SynthesisEnvironment};

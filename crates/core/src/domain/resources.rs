use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub type Labels = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Workload,
    Exposure,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workload => "workload",
            Self::Exposure => "exposure",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    #[serde(skip)]
    pub sensitive: bool,
}

impl EnvVar {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), sensitive: false }
    }

    pub fn sensitive(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), sensitive: true }
    }
}

impl fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.sensitive { "<redacted>" } else { self.value.as_str() };
        f.debug_struct("EnvVar").field("name", &self.name).field("value", &value).finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeMountSpec {
    pub volume_name: String,
    pub mount_path: String,
    pub sub_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<EnvVar>,
    pub port: u16,
    pub mount: VolumeMountSpec,
}

impl ContainerSpec {
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env.iter().find(|var| var.name == name).map(|var| var.value.as_str())
    }
}

impl WorkloadSpec {
    /// Copy with sensitive env values masked, for rendering to operators.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for var in copy.container.env.iter_mut().filter(|var| var.sensitive) {
            var.value = "<redacted>".to_owned();
        }
        copy
    }
}

/// A volume backed by a pre-existing claim shared by every agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeSpec {
    pub name: String,
    pub claim_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub replicas: i32,
    pub container: ContainerSpec,
    pub volume: VolumeSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExposureSpec {
    pub name: String,
    pub namespace: String,
    pub selector: Labels,
    pub port: u16,
    pub target_port: u16,
}

/// One named resource handed to the control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum Resource {
    Workload(WorkloadSpec),
    Exposure(ExposureSpec),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Workload(_) => ResourceKind::Workload,
            Self::Exposure(_) => ResourceKind::Exposure,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Workload(spec) => &spec.name,
            Self::Exposure(spec) => &spec.name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Workload(spec) => &spec.namespace,
            Self::Exposure(spec) => &spec.namespace,
        }
    }
}

impl From<WorkloadSpec> for Resource {
    fn from(spec: WorkloadSpec) -> Self {
        Self::Workload(spec)
    }
}

impl From<ExposureSpec> for Resource {
    fn from(spec: ExposureSpec) -> Self {
        Self::Exposure(spec)
    }
}

/// The linked pair declared for one agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourcePair {
    pub workload: WorkloadSpec,
    pub exposure: ExposureSpec,
}

//! Translation of synthesized specs into `apps/v1 Deployment` and `v1 Service` objects.

use deplo_core::domain::resources::{EnvVar as SpecEnvVar, ExposureSpec, WorkloadSpec};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub fn deployment(spec: &WorkloadSpec) -> Deployment {
    let container = &spec.container;

    let pod = PodSpec {
        containers: vec![Container {
            name: container.name.clone(),
            image: Some(container.image.clone()),
            env: Some(container.env.iter().map(env_var).collect()),
            ports: Some(vec![ContainerPort {
                container_port: i32::from(container.port),
                ..Default::default()
            }]),
            volume_mounts: Some(vec![VolumeMount {
                name: container.mount.volume_name.clone(),
                mount_path: container.mount.mount_path.clone(),
                sub_path: Some(container.mount.sub_path.clone()),
                ..Default::default()
            }]),
            ..Default::default()
        }],
        volumes: Some(vec![Volume {
            name: spec.volume.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: spec.volume.claim_name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(spec.labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(spec.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(pod),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(spec: &ExposureSpec) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(spec.selector.clone()),
            ports: Some(vec![ServicePort {
                port: i32::from(spec.port),
                target_port: Some(IntOrString::Int(i32::from(spec.target_port))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(var: &SpecEnvVar) -> EnvVar {
    EnvVar { name: var.name.clone(), value: Some(var.value.clone()), ..Default::default() }
}

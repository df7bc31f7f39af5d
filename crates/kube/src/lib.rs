pub mod control_plane;
pub mod manifest;

pub use control_plane::KubeControlPlane;

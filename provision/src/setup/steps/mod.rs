pub mod control_plane;
pub mod join;
pub mod kube_vip;

pub use control_plane::ControlPlaneInit;
pub use join::{ClusterJoin, PublishJoinParameters};
pub use kube_vip::KubeVip;

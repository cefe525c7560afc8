//! Join-parameter exchange for highly-available kubeadm clusters.
//!
//! The first control plane publishes `{address, token, cert_hash, cert_key}`
//! to a blob store under `{cluster_id}/parameters`; joining nodes fetch it,
//! flatten it into `{PREFIX}_*` variables and run `kubeadm join`.

pub mod backup;
pub mod config;
pub mod environment;
pub mod error;
pub mod join;
pub mod logging;
pub mod params;
pub mod producer;
pub mod setup;
pub mod store;

pub use error::ProvisionError;
pub use params::JoinParameters;

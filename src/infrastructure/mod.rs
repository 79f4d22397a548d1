//! Infrastructure adapters

pub mod kubernetes;

pub use kubernetes::{connector_from_config, KubeClusterSession, KubeConnector};

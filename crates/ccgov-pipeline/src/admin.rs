//! Boundary to the blockchain platform's admin operations.
//!
//! The pipeline never talks to peers itself. Install, approve, commit, and
//! the lifecycle queries go through an [`AdminClient`] supplied by the
//! caller; timeouts and retries are that client's business.

use async_trait::async_trait;
use ccgov_state::ChaincodeVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the admin interface. Surfaced to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rejected by peer: {0}")]
    Rejected(String),

    #[error("admin service unavailable: {0}")]
    Unavailable(String),
}

/// Chaincode definition as sent to approve/commit and read back from queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeDefinition {
    pub channel: String,
    pub name: String,
    pub version: String,
    pub sequence: u64,
    pub package_id: Option<String>,
    pub init_required: bool,
    pub endorsement_plugin: Option<String>,
    pub validation_plugin: Option<String>,
    pub collections: Vec<String>,
}

impl ChaincodeDefinition {
    pub fn from_version(version: &ChaincodeVersion) -> Self {
        Self {
            channel: version.channel.clone(),
            name: version.name.clone(),
            version: version.version.clone(),
            sequence: version.sequence,
            package_id: version.package_id.clone(),
            init_required: version.init_required,
            endorsement_plugin: version.endorsement_plugin.clone(),
            validation_plugin: version.validation_plugin.clone(),
            collections: version.collections.clone(),
        }
    }
}

/// A package installed on a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledChaincode {
    pub package_id: String,
    pub label: String,
}

/// A definition committed on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedChaincode {
    pub name: String,
    pub version: String,
    pub sequence: u64,
    pub init_required: bool,
}

#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Install a package and return the package id assigned by the peer.
    async fn install_chaincode(&self, package_path: &str, label: &str)
    -> Result<String, AdminError>;

    async fn approve_chaincode(&self, definition: &ChaincodeDefinition) -> Result<(), AdminError>;

    async fn commit_chaincode(&self, definition: &ChaincodeDefinition) -> Result<(), AdminError>;

    async fn list_installed(&self, peer: &str) -> Result<Vec<InstalledChaincode>, AdminError>;

    async fn list_committed(&self, channel: &str) -> Result<Vec<CommittedChaincode>, AdminError>;

    async fn get_committed_info(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<ChaincodeDefinition, AdminError>;
}

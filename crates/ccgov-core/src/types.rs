//! Shared types used across ccgov crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three chaincode lifecycle stages. Also names the operation an
/// approval policy or request gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Install,
    Approve,
    Commit,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 3] = [
        LifecycleStage::Install,
        LifecycleStage::Approve,
        LifecycleStage::Commit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Install => "install",
            LifecycleStage::Approve => "approve",
            LifecycleStage::Commit => "commit",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown lifecycle stage: {0}")]
pub struct UnknownStage(String);

impl FromStr for LifecycleStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(LifecycleStage::Install),
            "approve" => Ok(LifecycleStage::Approve),
            "commit" => Ok(LifecycleStage::Commit),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_roundtrip_through_str() {
        for stage in LifecycleStage::ALL {
            assert_eq!(stage.as_str().parse::<LifecycleStage>().unwrap(), stage);
        }
        assert!("deploy".parse::<LifecycleStage>().is_err());
    }
}

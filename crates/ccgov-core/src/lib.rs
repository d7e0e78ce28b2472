pub mod clock;
pub mod config;
pub mod types;
pub mod version;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::GovernanceConfig;
pub use types::LifecycleStage;
pub use version::{ComparisonKind, SemVer};

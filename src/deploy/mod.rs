// ABOUTME: Remote rollout with ordered verification gates.
// ABOUTME: Exports the driver, its stage/state record, the report, the probe and the lock.

mod driver;
mod error;
mod lock;
mod probe;
mod report;
mod state;
mod transitions;

pub use driver::{DeploymentDriver, deploy_plan};
pub use error::{DeployError, LockHolderInfo};
pub use lock::{DeployLock, LockInfo};
pub use probe::{HttpProbe, HyperProbe, ProbeError};
pub use report::{CHECK_HTTP, CHECK_PROCESS, CHECK_REVISION, Check, VerificationReport};
pub use state::{DeployStage, DeploymentState};

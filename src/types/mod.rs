// ABOUTME: Validated domain types shared across the release pipeline.
// ABOUTME: Versions, revision identifiers, and application names.

mod app_name;
mod commit_id;
mod version;

pub use app_name::{AppName, AppNameError};
pub use commit_id::{CommitId, CommitIdError};
pub use version::{Version, VersionError};

// ABOUTME: Named stages of a release run, used to attribute failures.
// ABOUTME: Stages execute strictly in declaration order.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Stamp,
    Build,
    Package,
    Verify,
    Deploy,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Stamp => "stamp",
            Stage::Build => "build",
            Stage::Package => "package",
            Stage::Verify => "verify",
            Stage::Deploy => "deploy",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

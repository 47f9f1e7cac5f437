// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What happens to the dependents of a job whose action failed.
///
/// - `Proceed`: dependents are released and run anyway (best-effort
///   continuation, default). Their inputs may be incomplete.
/// - `Block`: dependents are released so the run can drain, but their
///   actions are skipped, transitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Proceed,
    Block,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Proceed
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proceed" => Ok(FailurePolicy::Proceed),
            "block" => Ok(FailurePolicy::Block),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"proceed\" or \"block\")"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Proceed => f.write_str("proceed"),
            FailurePolicy::Block => f.write_str("block"),
        }
    }
}

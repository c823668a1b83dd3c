use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FixError, FixResult};
use crate::record::Record;

/// What happens when a command fails against a record's data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strictness {
    /// Abort the whole run.
    #[default]
    Process,
    /// Reject the current record; it will not be emitted.
    Record,
    /// Skip the failing expression and carry on.
    Expression,
}

impl Strictness {
    /// Apply the policy to an execution error.
    pub fn handle(self, error: FixError, record: &mut Record) -> FixResult<()> {
        match self {
            Strictness::Process => Err(error),
            Strictness::Record => {
                log::error!("Rejecting record after error: {}", error);
                record.set_reject(true);
                Ok(())
            }
            Strictness::Expression => {
                log::warn!("Skipping expression after error: {}", error);
                Ok(())
            }
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strictness::Process => write!(f, "PROCESS"),
            Strictness::Record => write!(f, "RECORD"),
            Strictness::Expression => write!(f, "EXPRESSION"),
        }
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Strictness::Process),
            "record" => Ok(Strictness::Record),
            "expression" => Ok(Strictness::Expression),
            other => Err(format!(
                "Unknown strictness '{}' (expected process, record or expression)",
                other
            )),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of a shutdown request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    /// Long grace window for in-flight work
    SoftStop,
    /// Short grace window; used on repeated signals or fatal errors
    HardStop,
}

impl fmt::Display for StopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoftStop => write!(f, "soft stop"),
            Self::HardStop => write!(f, "hard stop"),
        }
    }
}

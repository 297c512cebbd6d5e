//! Host operating system, as far as plugins care

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system a plugin is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    /// Map a `std::env::consts::OS` value to a platform
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "macos" => Some(Self::MacOS),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Platform of the running host. Other unix flavours run the Linux plugin set.
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        Self::from_os(os).unwrap_or_else(|| {
            tracing::warn!("No plugin set for OS '{os}'; using the {} set", Self::Linux);
            Self::Linux
        })
    }

    /// Shell program and the flag that makes it run one script argument.
    pub fn shell(&self) -> (&'static str, &'static str) {
        match self {
            Self::Windows => ("powershell", "-Command"),
            Self::MacOS | Self::Linux => ("sh", "-c"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MacOS => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        };
        f.write_str(name)
    }
}

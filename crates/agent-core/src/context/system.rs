//! System context

use super::Platform;
use std::path::PathBuf;

/// System context resolved at startup
#[derive(Debug, Clone)]
pub struct SystemContext {
    /// System hostname
    pub hostname: String,
    /// Operating system platform
    pub platform: Platform,
    /// Directory holding persisted agent state
    pub data_dir: PathBuf,
    /// Agent version string
    pub agent_version: String,
}

impl SystemContext {
    /// Create a new SystemContext
    pub fn new(
        hostname: String,
        platform: Platform,
        data_dir: PathBuf,
        agent_version: String,
    ) -> Self {
        Self {
            hostname,
            platform,
            data_dir,
            agent_version,
        }
    }

    /// Detect hostname and platform from the running host
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname cannot be read.
    pub fn detect(data_dir: PathBuf, agent_version: String) -> anyhow::Result<Self> {
        let hostname = hostname::get()
            .map_err(|e| anyhow::anyhow!("Failed to get hostname: {e}"))?
            .to_string_lossy()
            .to_string();
        Ok(Self::new(hostname, Platform::detect(), data_dir, agent_version))
    }

    /// Directory where the long-running plugin manager keeps its state
    pub fn longrunning_dir(&self) -> PathBuf {
        self.data_dir.join("longrunningplugins")
    }
}

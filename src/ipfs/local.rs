use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{UploadMetadata, Uploader};

/// Adds files through the local `ipfs` command line, which talks to the
/// running daemon.
pub struct LocalDaemon {
    program: String,
}

impl LocalDaemon {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Uploader for LocalDaemon {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, path: &Path, _metadata: &UploadMetadata) -> Result<String> {
        debug!(program = %self.program, file = %path.display(), "Running ipfs add");

        let output = Command::new(&self.program)
            .arg("add")
            .arg("-Q")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ipfs add failed ({}): {}", output.status, stderr.trim());
        }

        let cid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if cid.is_empty() {
            anyhow::bail!("ipfs add printed no CID");
        }

        Ok(cid)
    }
}

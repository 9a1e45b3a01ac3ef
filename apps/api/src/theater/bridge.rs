//! Subprocess bridge to the external `defuscrypt` encryptor.
//!
//! Payloads are written to a private temp directory, encrypted by the binary
//! (password on stdin), read back, and the plaintext is shredded or removed.
//! The temp directory lives exactly as long as the bridge.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use crate::theater::TheaterError;

#[derive(Debug, Clone)]
pub struct ProtectJob {
    /// File stem hint; a random suffix keeps concurrent jobs apart.
    pub label: String,
    pub payload: String,
    pub password: String,
    pub encrypt_passes: Option<u32>,
    pub shred_passes: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Protected {
    pub ciphertext: Vec<u8>,
}

/// Produces the encrypted artefact shown to the user after a protection purchase.
#[async_trait]
pub trait DataProtector: Send + Sync {
    async fn protect(&self, job: ProtectJob) -> Result<Protected, TheaterError>;
}

/// Used when no encryptor binary is configured.
pub struct DisabledProtector;

#[async_trait]
impl DataProtector for DisabledProtector {
    async fn protect(&self, _job: ProtectJob) -> Result<Protected, TheaterError> {
        Err(TheaterError::Unavailable)
    }
}

pub fn encrypt_args(input: &Path, output: &Path, passes: Option<u32>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "encrypt".into(),
        input.into(),
        "-o".into(),
        output.into(),
        "--force".into(),
    ];
    if let Some(passes) = passes {
        args.push("--passes".into());
        args.push(passes.to_string().into());
    }
    args
}

pub fn shred_args(input: &Path, passes: u32) -> Vec<OsString> {
    vec![
        "shred".into(),
        input.into(),
        format!("--passes={passes}").into(),
    ]
}

pub struct DefuscryptBridge {
    binary: PathBuf,
    workdir: TempDir,
}

impl DefuscryptBridge {
    pub fn new(binary: impl Into<PathBuf>) -> Result<Self, TheaterError> {
        let binary = binary.into();
        if !binary.is_file() {
            return Err(TheaterError::MissingBinary(binary));
        }
        let workdir = tempfile::Builder::new().prefix("gongle_").tempdir()?;
        info!(
            "Encryptor bridge ready: {} (workdir {})",
            binary.display(),
            workdir.path().display()
        );
        Ok(Self { binary, workdir })
    }

    async fn encrypt(&self, input: &Path, output: &Path, job: &ProtectJob) -> Result<Vec<u8>, TheaterError> {
        let mut child = Command::new(&self.binary)
            .args(encrypt_args(input, output, job.encrypt_passes))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(job.password.as_bytes()).await?;
        }

        let out = child.wait_with_output().await?;
        if !out.status.success() {
            return Err(TheaterError::Failed {
                status: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(tokio::fs::read(output).await?)
    }

    /// Shreds the plaintext when passes are requested, otherwise deletes it.
    async fn dispose(&self, input: &Path, passes: Option<u32>) {
        if let Some(passes) = passes {
            let shredded = Command::new(&self.binary)
                .args(shred_args(input, passes))
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await;
            match shredded {
                Ok(out) if out.status.success() => {}
                Ok(out) => warn!(
                    "Shred of {} failed: {}",
                    input.display(),
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                Err(e) => warn!("Could not run shred on {}: {e}", input.display()),
            }
        }
        remove_if_present(input).await;
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {e}", path.display());
        }
    }
}

#[async_trait]
impl DataProtector for DefuscryptBridge {
    async fn protect(&self, job: ProtectJob) -> Result<Protected, TheaterError> {
        let stem = format!("{}_{}", job.label, Uuid::new_v4().simple());
        let input = self.workdir.path().join(format!("{stem}.txt"));
        let output = self.workdir.path().join(format!("{stem}.enc"));

        tokio::fs::write(&input, job.payload.as_bytes()).await?;
        let result = self.encrypt(&input, &output, &job).await;
        self.dispose(&input, job.shred_passes).await;
        remove_if_present(&output).await;

        result.map(|ciphertext| Protected { ciphertext })
    }
}

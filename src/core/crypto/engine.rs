/*!
System engine invocation.

Levels 2 and 3 delegate the asymmetric primitives to the `openssl` binary.
Every invocation is synchronous, bounded by a timeout and never retried.
Inputs and outputs travel through files in the caller's secure scope;
stdout/stderr are drained on helper threads so a chatty child cannot block on
a full pipe while we wait for it.
*/

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::core::config::EnvelopeConfig;
use crate::core::constants::defaults::MAX_STDERR_BYTES;
use crate::core::error::{BackendError, Result};

/// Upper bound on captured stdout (version strings)
const MAX_STDOUT_BYTES: u64 = 64 * 1024;

/// Handle on the external `openssl` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    program: PathBuf,
    timeout: Duration,
}

impl Engine {
    /// Create an engine handle with an explicit timeout
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Engine for key-exchange operations
    pub fn for_operations(config: &EnvelopeConfig) -> Self {
        Self::new(&config.engine, config.operation_timeout)
    }

    /// Engine for capability probes
    pub fn for_probes(config: &EnvelopeConfig) -> Self {
        Self::new(&config.engine, config.probe_timeout)
    }

    /// Binary this handle invokes
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Timeout applied to each invocation
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the engine and return its stdout.
    ///
    /// A spawn failure, a nonzero exit or a timeout is a `BackendError`.
    pub fn run<I, S>(&self, operation: &'static str, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout_reader = drain(child.stdout.take(), MAX_STDOUT_BYTES);
        let stderr_reader = drain(child.stderr.take(), MAX_STDERR_BYTES as u64);

        let waited = child.wait_timeout(self.timeout);
        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Readers are detached: a grandchild may still hold the pipes
                reap(&mut child);
                drop((stdout_reader, stderr_reader));
                debug!(operation, timeout_ms = self.timeout.as_millis() as u64, "engine timed out");
                return Err(BackendError::Timeout {
                    operation,
                    timeout: self.timeout,
                }
                .into());
            }
            Err(source) => {
                reap(&mut child);
                drop((stdout_reader, stderr_reader));
                return Err(BackendError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                }
                .into());
            }
        };

        let stdout = join(stdout_reader);
        let stderr = join(stderr_reader);

        if !status.success() {
            debug!(operation, code = ?status.code(), "engine invocation failed");
            return Err(BackendError::Status {
                operation,
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }
            .into());
        }

        debug!(operation, "engine invocation succeeded");
        Ok(stdout)
    }

    /// Run the engine only to learn whether the invocation succeeds
    pub fn succeeds<I, S>(&self, operation: &'static str, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run(operation, args).is_ok()
    }

    /// `openssl version` output, if the engine can be run at all
    pub fn version(&self) -> Option<String> {
        self.run("version", ["version"])
            .ok()
            .map(|out| String::from_utf8_lossy(&out).trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn drain<R>(pipe: Option<R>, limit: u64) -> Option<thread::JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let mut limited = pipe.take(limit);
            let _ = limited.read_to_end(&mut buf);
            // Keep consuming past the limit so the child never blocks
            let _ = std::io::copy(&mut limited.into_inner(), &mut std::io::sink());
            buf
        })
    })
}

fn join(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Write a scripted stand-in for `openssl` into `dir`.
///
/// It accepts `genpkey` and `pkey` (writing placeholder PEM to `-out`) and,
/// when `kem` is set, `pkeyutl -encap` / `-decap` with a fixed secret.
/// Everything else exits nonzero.
#[cfg(all(test, unix))]
pub(crate) fn scripted_engine(dir: &Path, kem: bool) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let pkeyutl = if kem {
        r#"    case "$mode" in
      -encap) printf 'kem-ciphertext' > "$out"; printf 'kem-shared-secret' > "$secret" ;;
      -decap) printf 'kem-shared-secret' > "$secret" ;;
      *) echo "pkeyutl: Unknown option" >&2; exit 1 ;;
    esac"#
    } else {
        r#"    echo "pkeyutl: operation not supported" >&2; exit 1"#
    };

    let script = format!(
        r#"#!/bin/sh
cmd="$1"; mode=""; out=""; secret=""; prev=""
for arg in "$@"; do
  case "$prev" in
    -out) out="$arg" ;;
    -secret) secret="$arg" ;;
  esac
  case "$arg" in
    -encap|-decap) mode="$arg" ;;
  esac
  prev="$arg"
done
case "$cmd" in
  genpkey) printf 'placeholder private key' > "$out" ;;
  pkey) printf '%s\n' '-----BEGIN PUBLIC KEY-----' 'AAAA' '-----END PUBLIC KEY-----' > "$out" ;;
  pkeyutl)
{}
    ;;
  *) exit 1 ;;
esac
"#,
        pkeyutl
    );

    let path = dir.join("openssl");
    std::fs::write(&path, script)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

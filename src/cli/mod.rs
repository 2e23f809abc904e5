//! Command implementations for the `pqc-envelope` binary.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use pqc_envelope::{EnvelopeConfig, PublicKey};
use zeroize::Zeroizing;

pub mod info;
pub mod keygen;
pub mod open;
pub mod seal;
pub mod selftest;

/// Environment configuration with command-line overrides applied
pub fn load_config(engine: Option<PathBuf>, scratch_dir: Option<PathBuf>) -> anyhow::Result<EnvelopeConfig> {
    let mut config = EnvelopeConfig::from_env().context("invalid environment configuration")?;
    if let Some(engine) = engine {
        config = config.with_engine(engine);
    }
    if let Some(dir) = scratch_dir {
        config = config.with_scratch_dir(dir);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Read all of stdin, dropping one trailing line ending
pub fn read_stdin(prompt: &str) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("{}", prompt);
    }

    let mut buf = Zeroizing::new(Vec::new());
    stdin.lock().read_to_end(&mut buf).context("failed to read stdin")?;
    strip_line_ending(&mut buf);
    Ok(buf)
}

/// Parse a public key given as PEM text or as a path to a PEM file
pub fn read_public_key(arg: &str) -> anyhow::Result<PublicKey> {
    let text = if arg.trim_start().starts_with("-----BEGIN") {
        arg.to_string()
    } else {
        std::fs::read_to_string(Path::new(arg))
            .with_context(|| format!("public key is neither PEM text nor a readable file: {}", arg))?
    };
    PublicKey::from_pem(&text).context("invalid public key")
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

// Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pqc_envelope::{Capability, CapabilityLevel, Envelope, EnvelopeConfig, detect_with};
use tempfile::TempDir;

/// Config whose scopes land under `root`
pub fn config_in(root: &TempDir) -> EnvelopeConfig {
    EnvelopeConfig::default().with_scratch_dir(root.path())
}

/// Every level usable on this host, strongest first.
///
/// Level 1 is always present; engine levels only when the host OpenSSL
/// supports them.
pub fn available_capabilities() -> Vec<Capability> {
    let detected = detect_with(&EnvelopeConfig::default());
    let mut capabilities = Vec::new();
    if detected.level == CapabilityLevel::PostQuantum {
        capabilities.push(detected.clone());
    }
    if detected.level >= CapabilityLevel::EngineClassical {
        capabilities.push(Capability::engine_classical());
    }
    capabilities.push(Capability::native_classical());
    capabilities
}

/// Strongest level usable on this host
pub fn highest_capability() -> Capability {
    available_capabilities().remove(0)
}

/// A fresh envelope at `capability` with scopes under `root`
pub fn envelope(capability: &Capability, root: &TempDir) -> Envelope {
    Envelope::with_capability(capability.clone(), config_in(root)).expect("envelope")
}

/// Every regular file below `dir`
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}

/// Whether `haystack` contains `needle`
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

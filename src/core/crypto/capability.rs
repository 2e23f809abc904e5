/*!
Capability detection.

Probes the host for the strongest key-exchange primitive, in a fixed order
of preference:

1. ML-KEM-1024 through the system engine (level 3), claimed only after a
   full keygen, encapsulate and decapsulate round trip
2. X25519 through the system engine (level 2)
3. In-process X25519 (level 1)

The first probe that succeeds wins. Each engine probe is bounded by the
configured probe timeout. The process-wide result is computed lazily once
and never re-detected.
*/

use std::convert::TryFrom;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::EnvelopeConfig;
use crate::core::constants::algorithms;
use crate::core::crypto::engine::Engine;
use crate::core::crypto::kex::{Encapsulation, KeyExchange, MlKem1024, x25519_native};
use crate::core::error::{Error, Result};
use crate::core::memory::SecureScope;

/// Process-wide capability, detected on first use
static CURRENT: OnceCell<Capability> = OnceCell::new();

/// Ordinal rank of the strongest primitive available on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CapabilityLevel {
    /// Nothing usable
    None = 0,
    /// X25519 computed in-process
    NativeClassical = 1,
    /// X25519 through the system engine
    EngineClassical = 2,
    /// ML-KEM-1024 through the system engine
    PostQuantum = 3,
}

impl CapabilityLevel {
    /// Convert to the wire representation
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this level establishes secrets with a KEM
    pub fn uses_kem(self) -> bool {
        self == CapabilityLevel::PostQuantum
    }

    /// Whether this level resists quantum adversaries
    pub fn is_post_quantum(self) -> bool {
        self == CapabilityLevel::PostQuantum
    }

    /// Reported algorithm name for this level
    pub fn algorithm_name(self) -> &'static str {
        match self {
            CapabilityLevel::None => algorithms::NONE,
            CapabilityLevel::NativeClassical => algorithms::X25519_NATIVE,
            CapabilityLevel::EngineClassical => algorithms::X25519_ENGINE,
            CapabilityLevel::PostQuantum => algorithms::ML_KEM_1024,
        }
    }
}

impl TryFrom<u8> for CapabilityLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CapabilityLevel::None),
            1 => Ok(CapabilityLevel::NativeClassical),
            2 => Ok(CapabilityLevel::EngineClassical),
            3 => Ok(CapabilityLevel::PostQuantum),
            other => crate::envelope_err!("unknown capability level {}", other),
        }
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.algorithm_name())
    }
}

/// Result of capability detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Detected level
    pub level: CapabilityLevel,
    /// Human readable algorithm name
    pub algorithm: &'static str,
    /// Engine spelling of the algorithm, when the engine is used
    pub engine_algorithm: Option<&'static str>,
}

impl Capability {
    /// No usable primitive
    pub fn none() -> Self {
        Self::at(CapabilityLevel::None, None)
    }

    /// ML-KEM-1024 through the engine, with the spelling the engine accepted
    pub fn post_quantum(engine_algorithm: &'static str) -> Self {
        Self::at(CapabilityLevel::PostQuantum, Some(engine_algorithm))
    }

    /// X25519 through the engine
    pub fn engine_classical() -> Self {
        Self::at(
            CapabilityLevel::EngineClassical,
            Some(algorithms::X25519_ENGINE_NAME),
        )
    }

    /// In-process X25519
    pub fn native_classical() -> Self {
        Self::at(CapabilityLevel::NativeClassical, None)
    }

    fn at(level: CapabilityLevel, engine_algorithm: Option<&'static str>) -> Self {
        Self {
            level,
            algorithm: level.algorithm_name(),
            engine_algorithm,
        }
    }

    /// Whether any exchange can be built
    pub fn is_available(&self) -> bool {
        self.level != CapabilityLevel::None
    }
}

/// Operator-facing capability report
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityInfo {
    pub level: u8,
    pub name: String,
    pub post_quantum: bool,
    pub engine: String,
}

impl CapabilityInfo {
    /// Build the report for a capability
    pub fn new(capability: &Capability, config: &EnvelopeConfig) -> Self {
        Self {
            level: capability.level.as_u8(),
            name: capability.algorithm.to_string(),
            post_quantum: capability.level.is_post_quantum(),
            engine: engine_version(config),
        }
    }
}

/// The process-wide capability, detected on first call.
///
/// Configuration comes from `EnvelopeConfig::from_env`; an invalid
/// environment falls back to the defaults.
pub fn current() -> &'static Capability {
    CURRENT.get_or_init(|| {
        let config = EnvelopeConfig::from_env().unwrap_or_else(|e| {
            warn!(error = %e, "ignoring invalid environment configuration");
            EnvelopeConfig::default()
        });
        let capability = detect_with(&config);
        info!(level = capability.level.as_u8(), algorithm = capability.algorithm, "crypto level detected");
        capability
    })
}

/// Level and algorithm name of the process-wide capability
pub fn detect() -> (CapabilityLevel, &'static str) {
    let capability = current();
    (capability.level, capability.algorithm)
}

/// Run the probes against a configuration without caching.
pub fn detect_with(config: &EnvelopeConfig) -> Capability {
    let engine = Engine::for_probes(config);

    if let Some(name) = probe_ml_kem(&engine, config) {
        return Capability::post_quantum(name);
    }

    if probe_x25519_engine(&engine) {
        return Capability::engine_classical();
    }

    if config.native_fallback && x25519_native::self_check() {
        debug!("in-process X25519 available");
        return Capability::native_classical();
    }

    debug!("no key-exchange primitive available");
    Capability::none()
}

/// Version string of the configured engine, or `"not found"`
pub fn engine_version(config: &EnvelopeConfig) -> String {
    Engine::for_probes(config)
        .version()
        .unwrap_or_else(|| "not found".to_string())
}

fn probe_ml_kem(engine: &Engine, config: &EnvelopeConfig) -> Option<&'static str> {
    algorithms::ML_KEM_ENGINE_NAMES.into_iter().find(|name| {
        let ok = match kem_round_trip(engine, config, *name) {
            Ok(ok) => ok,
            Err(e) => {
                debug!(algorithm = *name, error = %e, "engine ML-KEM round trip failed");
                false
            }
        };
        debug!(algorithm = *name, ok, "engine ML-KEM probe");
        ok
    })
}

/// Keygen, encapsulate and decapsulate once in a throwaway scope
fn kem_round_trip(engine: &Engine, config: &EnvelopeConfig, name: &'static str) -> Result<bool> {
    let mut kem = MlKem1024::with_scope(engine.clone(), name, SecureScope::create(config)?);
    let public = kem.generate_keypair()?;
    let (ciphertext, sent) = kem.encapsulate(&public)?;
    let received = kem.decapsulate(&ciphertext)?;
    kem.cleanup()?;
    Ok(sent.ct_eq(&received))
}

fn probe_x25519_engine(engine: &Engine) -> bool {
    let ok = engine.succeeds(
        "probe X25519",
        [
            "genpkey",
            "-algorithm",
            algorithms::X25519_ENGINE_NAME,
            "-out",
            "/dev/null",
        ],
    );
    debug!(ok, "engine X25519 probe");
    ok
}

// tests/key_exchange_test.rs
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pqc_envelope::{Capability, CapabilityLevel, EnvelopeConfig, Error, Result, detect_with};
use tempfile::TempDir;

mod common;

/// Re-encode an envelope with its `level` field replaced
fn relabel(sealed: &str, level: u8) -> String {
    let json = STANDARD.decode(sealed).expect("base64");
    let mut value: serde_json::Value = serde_json::from_slice(&json).expect("json");
    value["level"] = level.into();
    STANDARD.encode(serde_json::to_vec(&value).expect("json"))
}

#[test]
fn test_level_mismatch_between_available_levels() -> Result<()> {
    let capabilities = common::available_capabilities();

    for sealed_at in &capabilities {
        for opened_at in &capabilities {
            if sealed_at.level == opened_at.level {
                continue;
            }
            let root = TempDir::new()?;
            let mut sender = common::envelope(sealed_at, &root);
            let mut receiver = common::envelope(opened_at, &root);
            let mut sealing_peer = common::envelope(sealed_at, &root);

            let public_key = sealing_peer.generate_keypair()?;
            let sealed = sender.seal(b"wrong level", &public_key)?;

            receiver.generate_keypair()?;
            assert!(
                matches!(receiver.open(&sealed), Err(Error::MalformedEnvelope(_))),
                "level {} envelope accepted at level {}",
                sealed_at.level,
                opened_at.level
            );
        }
    }
    Ok(())
}

#[test]
fn test_relabeled_level_rejected() -> Result<()> {
    let root = TempDir::new()?;
    let native = Capability::native_classical();
    let mut receiver = common::envelope(&native, &root);
    let mut sender = common::envelope(&native, &root);

    let public_key = receiver.generate_keypair()?;
    let sealed = sender.seal(b"relabeled", &public_key)?;

    // Claims the engine level but carries a sender key: a level mismatch
    assert!(matches!(
        receiver.open(&relabel(&sealed, 2)),
        Err(Error::MalformedEnvelope(_))
    ));

    // Claims the KEM level without a KEM ciphertext
    let mut other = common::envelope(&native, &root);
    other.generate_keypair()?;
    assert!(matches!(
        other.open(&relabel(&sealed, 3)),
        Err(Error::MalformedEnvelope(_))
    ));
    Ok(())
}

#[test]
fn test_wrong_receiver_cannot_open() -> Result<()> {
    for capability in common::available_capabilities() {
        let root = TempDir::new()?;
        let mut intended = common::envelope(&capability, &root);
        let mut other = common::envelope(&capability, &root);
        let mut sender = common::envelope(&capability, &root);

        let public_key = intended.generate_keypair()?;
        other.generate_keypair()?;
        let sealed = sender.seal(b"not for you", &public_key)?;

        let err = other.open(&sealed).expect_err("opened by the wrong receiver");
        assert!(
            matches!(err, Error::Integrity | Error::BackendInvocation(_)),
            "unexpected error at {}: {:?}",
            capability.level,
            err
        );
    }
    Ok(())
}

#[test]
fn test_detection_prefers_strongest() {
    let detected = detect_with(&EnvelopeConfig::default());
    let strongest = common::highest_capability();
    assert_eq!(detected.level, strongest.level);
    assert!(detected.is_available());

    if detected.level == CapabilityLevel::PostQuantum {
        assert!(detected.level.is_post_quantum());
        assert!(detected.engine_algorithm.is_some());
    }
}

#[test]
fn test_missing_engine_degrades_to_native() -> Result<()> {
    let root = TempDir::new()?;
    let config = common::config_in(&root).with_engine("/nonexistent/openssl");

    let mut receiver = pqc_envelope::Envelope::with_config(config.clone())?;
    let mut sender = pqc_envelope::Envelope::with_config(config)?;
    assert_eq!(receiver.level(), CapabilityLevel::NativeClassical);

    let public_key = receiver.generate_keypair()?;
    let sealed = sender.seal(b"fallback", &public_key)?;
    assert_eq!(receiver.open(&sealed)?, b"fallback");
    Ok(())
}

#[test]
fn test_nothing_available() -> Result<()> {
    let root = TempDir::new()?;
    let config = common::config_in(&root)
        .with_engine("/nonexistent/openssl")
        .with_native_fallback(false);

    assert!(matches!(
        pqc_envelope::Envelope::with_config(config),
        Err(Error::CapabilityUnavailable)
    ));
    assert!(common::files_under(root.path()).is_empty());
    Ok(())
}

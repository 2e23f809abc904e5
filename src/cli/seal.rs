// Sender side

use pqc_envelope::{Envelope, EnvelopeConfig};
use zeroize::Zeroizing;

/// Seal a payload for `pubkey` and print the envelope to stdout
pub fn seal(config: EnvelopeConfig, pubkey: &str, payload: Option<String>) -> anyhow::Result<()> {
    let peer = super::read_public_key(pubkey)?;
    let payload = match payload {
        Some(text) => Zeroizing::new(text.into_bytes()),
        None => super::read_stdin("Enter the secret to seal, then EOF (Ctrl-D):")?,
    };
    if payload.is_empty() {
        anyhow::bail!("empty payload");
    }

    let mut envelope = Envelope::with_config(config)?;
    let sealed = envelope.seal(&payload, &peer);
    let destroyed = envelope.destroy();

    println!("{}", sealed?);
    destroyed?;
    Ok(())
}

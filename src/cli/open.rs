// Receiver side

use std::io::Write;

use anyhow::Context;
use pqc_envelope::{Envelope, EnvelopeConfig};
use zeroize::Zeroizing;

/// Generate a keypair, print the public key to stderr, then read the
/// envelope from stdin and write the payload to stdout only.
///
/// The private key exists only for this run, so the envelope has to be
/// sealed for the printed key after it appears.
pub fn open(config: EnvelopeConfig, sender_key: Option<&str>) -> anyhow::Result<()> {
    let sender = sender_key.map(super::read_public_key).transpose()?;

    let mut envelope = Envelope::with_config(config)?;
    let public = envelope.generate_keypair()?;
    eprintln!("# Seal your secret for this public key:");
    eprintln!("{}", public);

    let result = (|| {
        let text = super::read_stdin("Paste the envelope, then EOF (Ctrl-D):")?;
        let text = std::str::from_utf8(&text).context("envelope is not text")?;
        let payload = match &sender {
            Some(sender) => envelope.open_with_sender_key(text, sender),
            None => envelope.open(text),
        };
        Ok::<_, anyhow::Error>(Zeroizing::new(payload.context("failed to open envelope")?))
    })();
    let destroyed = envelope.destroy();

    let payload = result?;
    destroyed?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&payload)?;
    stdout.flush()?;
    Ok(())
}

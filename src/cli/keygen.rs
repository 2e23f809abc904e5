// Public key display

use pqc_envelope::{Envelope, EnvelopeConfig};

/// Generate a keypair and print its public key.
///
/// The private key is destroyed on exit, so the printed key is for display
/// only; `open` generates the key it actually decrypts with.
pub fn generate(config: EnvelopeConfig) -> anyhow::Result<()> {
    let mut envelope = Envelope::with_config(config)?;
    let public = envelope.generate_keypair()?;
    let info = envelope.info();

    println!("# PQC Envelope: {}", info.name);
    println!(
        "# Level {} | Post-quantum: {}",
        info.level,
        if info.post_quantum { "YES" } else { "NO" }
    );
    println!();
    println!("{}", public);

    envelope.destroy()?;
    Ok(())
}

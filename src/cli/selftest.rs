// Self-test round trip

use pqc_envelope::{Envelope, EnvelopeConfig, detect_with};

/// Round-trip the test token at the level detected for `config`
pub fn run(config: EnvelopeConfig) -> anyhow::Result<()> {
    let capability = detect_with(&config);
    println!(
        "Testing crypto level {}: {}",
        capability.level.as_u8(),
        capability.algorithm
    );

    if !Envelope::self_test_with(&capability, &config)? {
        anyhow::bail!("round trip returned a different payload");
    }

    println!("Round-trip: OK");
    println!("Key material destroyed: YES");
    println!();
    println!("Self-test passed.");
    Ok(())
}

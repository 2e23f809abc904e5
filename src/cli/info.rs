// Crypto level display

use pqc_envelope::{CapabilityInfo, EnvelopeConfig, detect_with};

/// Print the level this host would run at under `config`
pub fn show_info(config: &EnvelopeConfig, json: bool) -> anyhow::Result<()> {
    let capability = detect_with(config);
    let info = CapabilityInfo::new(&capability, config);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Crypto level:  {}", info.level);
    println!("Algorithm:     {}", info.name);
    println!(
        "Post-quantum:  {}",
        if info.post_quantum {
            "YES"
        } else {
            "NO (upgrade to OpenSSL 3.5+ for ML-KEM)"
        }
    );
    println!("Engine:        {}", info.engine);

    if !capability.is_available() {
        anyhow::bail!("no usable key exchange on this host");
    }
    Ok(())
}

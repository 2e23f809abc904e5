// Operator CLI for one-shot secret transfer

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "pqc-envelope", version)]
#[command(about = "Post-quantum secure envelope for one-shot secret transfer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (tracing EnvFilter syntax); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// OpenSSL binary to use as the system engine
    #[arg(long, global = true, value_name = "PATH")]
    engine: Option<PathBuf>,

    /// Preferred root for scratch scopes
    #[arg(long, global = true, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected crypto level
    Info {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a keypair and print the public key (display only)
    Keygen,

    /// Seal a payload for a public key and print the envelope
    Seal {
        /// Recipient public key: PEM text or a path to a PEM file
        pubkey: String,

        /// Payload to seal; read from stdin when absent
        #[arg(long)]
        payload: Option<String>,
    },

    /// Generate a keypair, print its public key, then read from stdin the
    /// envelope sealed for that key
    Open {
        /// Derive against this sender key instead of the one in the envelope
        #[arg(long, value_name = "PUBKEY")]
        sender_key: Option<String>,
    },

    /// Run a sealed round trip with a fixed test token
    Test,
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("invalid log level {:?}: {}", level, e))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing(&cli.log_level)?;
    let config = cli::load_config(cli.engine, cli.scratch_dir)?;

    match cli.command {
        Commands::Info { json } => cli::info::show_info(&config, json),
        Commands::Keygen => cli::keygen::generate(config),
        Commands::Seal { pubkey, payload } => cli::seal::seal(config, &pubkey, payload),
        Commands::Open { sender_key } => cli::open::open(config, sender_key.as_deref()),
        Commands::Test => cli::selftest::run(config),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_reads_envelope_from_stdin_only() {
        // The envelope must be sealed for the key this run prints
        assert!(Cli::try_parse_from(["pqc-envelope", "open", "--envelope", "AAAA"]).is_err());

        let cli = Cli::try_parse_from(["pqc-envelope", "open", "--sender-key", "key.pem"])
            .expect("open with sender key");
        assert!(matches!(
            cli.command,
            Commands::Open { sender_key: Some(ref key) } if key == "key.pem"
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["pqc-envelope", "test", "--engine", "/opt/openssl"])
            .expect("global flag after subcommand");
        assert_eq!(cli.engine, Some(PathBuf::from("/opt/openssl")));
        assert_eq!(cli.log_level, "warn");
    }
}

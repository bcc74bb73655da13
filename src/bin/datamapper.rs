//! datamapper CLI - run a data mapper mediation over a SOAP envelope file
//!
//! Loads a mediator configuration, applies it to an envelope read from a file
//! or stdin, and prints the mediated envelope.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use datamapper_mediator::{DataMapperMediator, DataType, MediatorConfig, MessageContext, SoapEnvelope};

#[derive(Parser)]
#[command(name = "datamapper")]
#[command(version, about = "Schema-driven data mapping for SOAP envelopes", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform an envelope and print the result
    Transform {
        /// Path to mediator configuration (.yaml, .yml or .json)
        #[arg(short, long)]
        config: PathBuf,

        /// Envelope file, or '-' for stdin
        #[arg(short, long, default_value = "-")]
        envelope: String,

        /// Raw JSON payload delivered alongside the envelope
        #[arg(short, long)]
        json_payload: Option<PathBuf>,

        /// Message property as key=value, may be repeated
        #[arg(short, long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// Load a configuration and resolve its resources once
    Validate {
        /// Path to mediator configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print an example configuration
    ExampleConfig,
}

const EXAMPLE_CONFIG: &str = r#"# Data mapper mediator configuration
version: 1

mediator:
  # Registry locations. conf: and gov: select the registry root; a value
  # such as "{$ctx:mapping}" is read from a message property instead.
  config_key: conf:datamapper/order.dmc
  input_schema_key: conf:datamapper/order_in.json
  output_schema_key: conf:datamapper/status_out.json

  # XML, JSON or CSV
  input_type: XML
  output_type: JSON

registry:
  # Relative roots are resolved against this file's directory
  config_root: registry/config
  governance_root: registry/governance
"#;

fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Transform {
            config,
            envelope,
            json_payload,
            properties,
        } => transform(&config, &envelope, json_payload.as_deref(), properties),
        Commands::Validate { config } => validate(&config),
        Commands::ExampleConfig => {
            print!("{}", EXAMPLE_CONFIG);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn read_envelope(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read envelope from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(source).with_context(|| format!("Failed to read envelope {}", source))
    }
}

/// Run one mediation and print the resulting envelope
fn transform(
    config_path: &Path,
    envelope_source: &str,
    json_payload: Option<&Path>,
    properties: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let config = MediatorConfig::load_from_file(config_path)?;
    let mediator = DataMapperMediator::from_config(&config);

    let envelope = SoapEnvelope::parse(&read_envelope(envelope_source)?)
        .context("Input is not a SOAP envelope")?;
    let mut ctx = MessageContext::new(envelope);
    if let Some(path) = json_payload {
        let payload = fs::read(path)
            .with_context(|| format!("Failed to read JSON payload {}", path.display()))?;
        ctx = ctx.with_json_payload(payload);
    }
    for (key, value) in properties {
        ctx.set_property(key, value);
    }

    mediator.mediate(&mut ctx)?;
    println!("{}", ctx.envelope());
    Ok(())
}

/// Load a configuration and resolve its static resources
fn validate(config_path: &Path) -> anyhow::Result<()> {
    let config = MediatorConfig::load_from_file(config_path)?;
    let mediator = DataMapperMediator::from_config(&config);

    for token in [mediator.input_type(), mediator.output_type()] {
        if DataType::from_token(token).is_none() {
            bail!("Unknown data type '{}', expected XML, JSON or CSV", token);
        }
    }

    match mediator.preload_resources()? {
        Some(bundle) => {
            println!("✓ Configuration valid: {}", config_path.display());
            println!(
                "  {} mapping(s), {} -> {}",
                bundle.config.mappings.len(),
                bundle.input_schema.name,
                bundle.output_schema.name
            );
        }
        None => {
            println!("✓ Configuration valid: {}", config_path.display());
            println!("  Dynamic registry keys, resources resolve per message");
        }
    }

    Ok(())
}

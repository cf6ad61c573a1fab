//! SafeScrub - PII detection, masking, and leakage prevention engine
//!
//! Command-line front end: scan payloads for sensitive entities, mask
//! them under rule files, gate exports against prevention policies, and
//! classify datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use safescrub::{
    config::ScrubConfig,
    engine::{default_rules, ScrubEngine},
    leakage::PreventionPolicy,
    mask::MaskingRule,
};
use serde::Deserialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "safescrub")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "PII detection, masking, and leakage prevention")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SAFESCRUB_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a payload and print findings as JSON
    Scan {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Treat the input as a JSON document and scan its string leaves
        #[arg(long)]
        json: bool,
    },

    /// Mask a payload and print the rewritten text
    Mask {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// TOML rule file; builtin defaults when omitted
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Treat the input as a JSON document
        #[arg(long)]
        json: bool,
    },

    /// Gate a payload for export under a prevention policy
    Gate {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// TOML policy file; configured defaults when omitted
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Release a blocked export, attributed to this operator
        #[arg(long)]
        override_by: Option<String>,
    },

    /// Classify a dataset given as JSON: {"field": ["sample", ...]}
    Classify {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Dataset identifier used in the report
        #[arg(long, default_value = "dataset")]
        id: String,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(Deserialize)]
struct RuleFile {
    rules: Vec<MaskingRule>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("safescrub={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ScrubConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScrubConfig::default(),
    };

    match cli.command {
        Commands::Scan { input, json } => {
            let engine = ScrubEngine::new(config)?;
            let payload = read_input(input.as_deref())?;
            if json {
                let doc: serde_json::Value =
                    serde_json::from_str(&payload).context("input is not valid JSON")?;
                let findings = engine.scan_json(&doc).await;
                println!("{}", serde_json::to_string_pretty(&findings)?);
            } else {
                let spans = engine.scan(&payload).await;
                println!("{}", serde_json::to_string_pretty(&spans)?);
            }
        }
        Commands::Mask { input, rules, json } => {
            let engine = ScrubEngine::new(config)?;
            let payload = read_input(input.as_deref())?;
            let rules = load_rules(rules.as_deref())?;
            if json {
                let doc: serde_json::Value =
                    serde_json::from_str(&payload).context("input is not valid JSON")?;
                let masked = engine.mask_json(&doc, &rules).await?;
                println!("{}", serde_json::to_string_pretty(&masked)?);
            } else {
                let result = engine.mask(&payload, &rules).await?;
                println!("{}", result.anonymized_text);
                eprintln!(
                    "masked {} of {} findings",
                    result.entities_masked,
                    result.entities_masked + result.entities_skipped
                );
            }
        }
        Commands::Gate {
            input,
            policy,
            override_by,
        } => {
            let engine = ScrubEngine::new(config)?;
            let payload = read_input(input.as_deref())?;
            let policy = match policy.as_deref() {
                Some(path) => load_policy(path)?,
                None => engine.default_policy(),
            };
            let decision = match override_by.as_deref() {
                Some(operator) => {
                    engine
                        .prevent_export_with_override(&payload, &policy, &[], operator)
                        .await?
                }
                None => engine.prevent_export(&payload, &policy, &[]).await?,
            };
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if decision.blocked {
                std::process::exit(2);
            }
        }
        Commands::Classify { input, id } => {
            let engine = ScrubEngine::new(config)?;
            let payload = read_input(input.as_deref())?;
            let doc: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&payload).context("input is not a JSON object")?;
            let mut fields = Vec::with_capacity(doc.len());
            for (name, samples) in doc {
                let samples: Vec<String> =
                    serde_json::from_value(samples).with_context(|| {
                        format!("field '{}' must map to an array of strings", name)
                    })?;
                fields.push((name, samples));
            }
            let report = engine.classify_dataset(&id, &fields).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config { default } => {
            let shown = if default { ScrubConfig::default() } else { config };
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn read_input(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("reading stdin"),
    }
}

fn load_rules(path: Option<&std::path::Path>) -> Result<Vec<MaskingRule>> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let file: RuleFile = toml::from_str(&content)
                .with_context(|| format!("parsing rules from {}", path.display()))?;
            Ok(file.rules)
        }
        None => Ok(default_rules()),
    }
}

fn load_policy(path: &std::path::Path) -> Result<PreventionPolicy> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing policy from {}", path.display()))
}

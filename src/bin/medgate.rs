//! medgate — command-line front end for the answer pipeline
//!
//! Runs single questions through the full pipeline using the config file.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use medgate::providers::ProviderStatus;
use medgate::{ChatOutcome, ChatRequest, Config, MedgateBuilder, Mode, PatientContext, Secrets};

/// Medgate CLI
#[derive(Parser)]
#[command(name = "medgate")]
#[command(version = medgate::PKG_VERSION)]
#[command(about = "Fault-tolerant medical answer gateway")]
struct Args {
    /// Config file (default: ~/.medgate/config.toml, then /etc/medgate/config.toml)
    #[arg(short, long, env = "MEDGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question and print the JSON response
    Ask {
        /// Question (or omit to read from stdin)
        message: Option<String>,
        /// Caller identity used for rate limiting
        #[arg(long, default_value = "cli")]
        caller: String,
        /// JSON file with the patient context
        #[arg(long)]
        patient_file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ModeArg::Public)]
        mode: ModeArg,
    },

    /// Print configured providers in the order they are tried
    Providers,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Public,
    Private,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Public => Mode::Public,
            ModeArg::Private => Mode::Private,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    match args.command {
        Command::Ask {
            message,
            caller,
            patient_file,
            mode,
        } => {
            let message = resolve_text(message, "ask")?;
            let mut request = ChatRequest::new(caller, message).mode(mode.into());
            if let Some(path) = patient_file {
                let patient: PatientContext =
                    serde_json::from_str(&std::fs::read_to_string(&path)?)?;
                request = request.patient(patient);
            }

            let orchestrator = build_orchestrator(&config, &secrets).await?;
            match orchestrator.handle(&request).await {
                ChatOutcome::Answered(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                ChatOutcome::RateLimited { retry_after } => {
                    return Err(format!("rate limited, retry in {retry_after:?}").into());
                }
            }
        }

        Command::Providers => {
            let orchestrator = build_orchestrator(&config, &secrets).await?;
            let states = orchestrator.tracker().snapshot();
            for provider in orchestrator.registry().iter() {
                let d = &provider.descriptor;
                let status = states
                    .iter()
                    .find(|(name, _)| *name == d.name)
                    .map(|(_, s)| s.status)
                    .unwrap_or(ProviderStatus::Available);
                println!(
                    "{:>3}  {:<16} timeout={:?} max_tokens={} {:?}",
                    d.priority, d.name, d.timeout, d.max_tokens, status
                );
            }
        }
    }

    Ok(())
}

async fn build_orchestrator(
    config: &Config,
    secrets: &Secrets,
) -> Result<medgate::Orchestrator, Box<dyn std::error::Error>> {
    #[allow(unused_mut)]
    let mut builder = MedgateBuilder::from_config(config, secrets)?;
    if let Some(url) = config.cache.redis_url.as_deref()
        && config.cache.enabled
    {
        #[cfg(feature = "redis")]
        {
            builder = builder.redis_cache(url).await?;
        }
        #[cfg(not(feature = "redis"))]
        tracing::warn!(url, "redis_url set but built without the redis feature");
    }
    Ok(builder.build()?)
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}

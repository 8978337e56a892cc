mod config;
mod error;
mod rule;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use gate::{Gate, Response};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{Actor, Config};
use error::Result;

const CONFIG_FILE: &str = "gatekeeper.toml";
const LOG_ENV: &str = "GATEKEEPER_LOG";

/// Exit status of `authorize` when the ability is denied.
const DENIED: u8 = 2;

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Check abilities against a declarative authorization config", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log gate decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every ability is allowed
    Check {
        #[arg(required = true)]
        abilities: Vec<String>,
        #[command(flatten)]
        target: Target,
        /// Pass when any ability is allowed
        #[arg(long)]
        any: bool,
    },
    /// Print the response for an ability as JSON
    Inspect {
        ability: String,
        #[command(flatten)]
        target: Target,
    },
    /// Like inspect, but exit with status 2 when denied
    Authorize {
        ability: String,
        #[command(flatten)]
        target: Target,
    },
    /// List defined abilities, or report whether the given ones are defined
    Abilities { names: Vec<String> },
}

/// Who is asking and about what.
#[derive(Args)]
struct Target {
    /// Actor name; checks run as a guest when omitted
    #[arg(long = "as", value_name = "NAME")]
    actor: Option<String>,

    /// Subject type passed as the first argument
    #[arg(long, value_name = "TYPE")]
    subject: Option<String>,

    /// Pass the subject type itself instead of a record of it
    #[arg(long, requires = "subject")]
    class: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    ability: &'a str,
    actor: Option<&'a Actor>,
    #[serde(flatten)]
    response: &'a Response,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check {
            abilities,
            target,
            any,
        } => cmd_check(&config, abilities, &target, any),
        Commands::Inspect { ability, target } => cmd_inspect(&config, &ability, &target),
        Commands::Authorize { ability, target } => cmd_authorize(&config, &ability, &target),
        Commands::Abilities { names } => cmd_abilities(&config, names),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else if path == Path::new(CONFIG_FILE) {
        // No config in the working directory: nothing is defined.
        Ok(Config::default())
    } else {
        Err(error::Error::Config(format!(
            "config file not found at {}",
            path.display()
        )))
    }
}

fn gate_for(config: &Config, target: &Target) -> Result<Gate<Actor>> {
    let actor = target
        .actor
        .as_deref()
        .map(|name| config.actor(name))
        .transpose()?;
    config.gate(actor)
}

fn cmd_check(config: &Config, abilities: Vec<String>, target: &Target, any: bool) -> Result<ExitCode> {
    let gate = gate_for(config, target)?;
    let arguments = config.arguments(target.subject.as_deref(), target.class)?;

    let allowed = if any {
        gate.any(abilities, arguments)
    } else {
        gate.check(abilities, arguments)
    };
    println!("{}", if allowed { "allowed" } else { "denied" });
    Ok(ExitCode::SUCCESS)
}

fn cmd_inspect(config: &Config, ability: &str, target: &Target) -> Result<ExitCode> {
    let gate = gate_for(config, target)?;
    let arguments = config.arguments(target.subject.as_deref(), target.class)?;

    let response = gate.inspect(ability, arguments);
    print_report(&gate, ability, &response)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_authorize(config: &Config, ability: &str, target: &Target) -> Result<ExitCode> {
    let gate = gate_for(config, target)?;
    let arguments = config.arguments(target.subject.as_deref(), target.class)?;

    match gate.authorize(ability, arguments) {
        Ok(response) => {
            print_report(&gate, ability, &response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("denied: {failure} (code {})", failure.code());
            Ok(ExitCode::from(DENIED))
        }
    }
}

fn cmd_abilities(config: &Config, names: Vec<String>) -> Result<ExitCode> {
    let gate = config.gate(None)?;

    if names.is_empty() {
        for name in gate.abilities() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    for name in &names {
        let state = if gate.has(name.as_str()) { "defined" } else { "missing" };
        println!("{name}: {state}");
    }
    println!("has: {}", gate.has(names));
    Ok(ExitCode::SUCCESS)
}

fn print_report(gate: &Gate<Actor>, ability: &str, response: &Response) -> Result<()> {
    let report = Report {
        ability,
        actor: gate.actor(),
        response,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use universe_core::ProcessEnvironment;
use universe_core::config::{ConfigReader, JsonConfig, normalize};
use universe_core::provider::Provider;
use universe_core::resource::{Resource, State, Value, attributes_from_json};
use universe_core::schema::ProviderSchema;
use universe_provider::UniverseProvider;

#[derive(Parser)]
#[command(name = "terraform-provider-universe")]
#[command(about = "Run any program as the lifecycle of a resource type", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider and resource schemas as JSON
    Schema,
    /// List the resource types this provider exposes
    Types,
    /// Normalize a provider configuration and print the result
    Configure {
        /// Path to the provider configuration (JSON object)
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Create a resource
    Create(OperationArgs),
    /// Read a resource
    Read(IdentifiedArgs),
    /// Update a resource in place
    Update(IdentifiedArgs),
    /// Delete a resource
    Delete(IdentifiedArgs),
}

#[derive(Args)]
struct OperationArgs {
    /// Path to the provider configuration (JSON object)
    #[arg(long, short)]
    config: PathBuf,

    /// Resource type (e.g. universe_file)
    #[arg(long = "type", short = 't')]
    resource_type: String,

    /// Resource name
    #[arg(long, short, default_value = "example")]
    name: String,

    /// Path to the resource attributes (JSON object with "config" and optional overrides)
    #[arg(long, short)]
    resource: Option<PathBuf>,
}

#[derive(Args)]
struct IdentifiedArgs {
    #[command(flatten)]
    operation: OperationArgs,

    /// Identifier assigned at create
    #[arg(long)]
    id: String,

    /// Path to the executor's previous output (JSON)
    #[arg(long)]
    result: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let process_name = std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut provider = UniverseProvider::from_environment(&process_name, &ProcessEnvironment);

    let result = match cli.command {
        Commands::Schema => run_schema(&provider),
        Commands::Types => run_types(&provider),
        Commands::Configure { config } => run_configure(&config),
        Commands::Create(args) => run_create(&mut provider, &args).await,
        Commands::Read(args) => run_read(&mut provider, &args).await,
        Commands::Update(args) => run_update(&mut provider, &args).await,
        Commands::Delete(args) => run_delete(&mut provider, &args).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries command output only
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run_schema(provider: &UniverseProvider) -> Result<(), String> {
    let schema = ProviderSchema::new(provider.types());
    let output = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("Failed to serialize schema: {}", e))?;
    println!("{}", output);
    Ok(())
}

fn run_types(provider: &UniverseProvider) -> Result<(), String> {
    println!(
        "{} {}",
        "Provider:".cyan().bold(),
        provider.identity().as_str().bold()
    );
    for name in provider.types().iter() {
        println!("  • {}", name);
    }
    Ok(())
}

fn run_configure(path: &Path) -> Result<(), String> {
    let config = load_config(path)?;
    let snapshot = normalize(&config).map_err(|e| e.to_string())?;

    let output = serde_json::to_string_pretty(&snapshot.to_json())
        .map_err(|e| format!("Failed to serialize configuration: {}", e))?;
    println!("{}", output);
    eprintln!("{}", "Configuration is valid.".green());
    Ok(())
}

async fn run_create(provider: &mut UniverseProvider, args: &OperationArgs) -> Result<(), String> {
    let resource = prepare(provider, args)?;
    let state = provider
        .create(&resource)
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state)
}

async fn run_read(provider: &mut UniverseProvider, args: &IdentifiedArgs) -> Result<(), String> {
    let resource = prepare(provider, &args.operation)?;
    let prior = prior_state(&resource, args)?;
    let state = provider
        .read(&resource, Some(&args.id), prior.as_ref())
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state)
}

async fn run_update(provider: &mut UniverseProvider, args: &IdentifiedArgs) -> Result<(), String> {
    let resource = prepare(provider, &args.operation)?;
    let prior = prior_state(&resource, args)?
        .unwrap_or_else(|| State::existing(resource.id.clone(), Default::default()));
    let state = provider
        .update(&args.id, &prior, &resource)
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state)
}

async fn run_delete(provider: &mut UniverseProvider, args: &IdentifiedArgs) -> Result<(), String> {
    let resource = prepare(provider, &args.operation)?;
    let prior = prior_state(&resource, args)?;
    provider
        .delete(&resource, &args.id, prior.as_ref())
        .await
        .map_err(|e| e.to_string())?;
    eprintln!(
        "  {} {}.{} ({})",
        "✓".green(),
        resource.id.resource_type,
        resource.id.name,
        args.id
    );
    Ok(())
}

/// Configure the provider and load the resource the operation acts on
fn prepare(provider: &mut UniverseProvider, args: &OperationArgs) -> Result<Resource, String> {
    let config = load_config(&args.config)?;
    provider
        .configure(&config as &dyn ConfigReader)
        .map_err(|e| e.to_string())?;

    let attributes = match &args.resource {
        Some(path) => attributes_from_json(&read_json(path)?),
        None => Default::default(),
    };
    Ok(Resource::new(&args.resource_type, &args.name).with_attributes(attributes))
}

fn prior_state(resource: &Resource, args: &IdentifiedArgs) -> Result<Option<State>, String> {
    let Some(path) = &args.result else {
        return Ok(None);
    };
    let mut attributes = resource.attributes.clone();
    if let Some(result) = Value::from_json(&read_json(path)?) {
        attributes.insert("result".to_string(), result);
    }
    Ok(Some(
        State::existing(resource.id.clone(), attributes).with_identifier(&args.id),
    ))
}

fn load_config(path: &Path) -> Result<JsonConfig, String> {
    JsonConfig::from_value(read_json(path)?)
        .map_err(|e| format!("{}: {}", path.display(), e))
}

fn read_json(path: &Path) -> Result<serde_json::Value, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn state_to_json(state: &State) -> serde_json::Value {
    let mut names: Vec<&String> = state.attributes.keys().collect();
    names.sort();
    let attributes: serde_json::Map<String, serde_json::Value> = names
        .into_iter()
        .map(|k| (k.clone(), state.attributes[k].to_json()))
        .collect();

    json!({
        "type": state.id.resource_type,
        "name": state.id.name,
        "id": state.identifier,
        "exists": state.exists,
        "attributes": attributes,
    })
}

fn print_state(state: &State) -> Result<(), String> {
    let output = serde_json::to_string_pretty(&state_to_json(state))
        .map_err(|e| format!("Failed to serialize state: {}", e))?;
    println!("{}", output);
    Ok(())
}

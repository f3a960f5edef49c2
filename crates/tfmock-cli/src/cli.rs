//! tfmock CLI - Command-line interface for mock provider data
//!
//! Usage:
//!   tfmock check mocks.tfmock.hcl
//!   tfmock plan --mocks mocks.tfmock.hcl --schema schema.json --address aws_instance.web --values web.json
//!   tfmock apply --mocks mocks.tfmock.hcl --schema schema.json --address aws_instance.web --values web.json --seed 42

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tfmock_core::mocks::decode_overrides;
use tfmock_core::syntax;
use tfmock_core::{AbsResourceInstance, Diagnostics, MockData, MockProvider, ProviderSchema, Value};
use tracing_subscriber::filter::LevelFilter;

/// tfmock - Mock provider data for configuration tests
#[derive(Parser)]
#[command(name = "tfmock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode mock data files and report any problems
    Check {
        /// Mock data file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Mark the computed attributes of a resource as unknown
    Plan(FillArgs),

    /// Plan a resource, then fill its computed attributes from the mock data
    Apply(FillArgs),

    /// Fill the computed attributes of a data source from the mock data
    Read(FillArgs),
}

#[derive(Args)]
struct FillArgs {
    /// Mock data file
    #[arg(short, long)]
    mocks: PathBuf,

    /// Provider schema file (JSON or YAML)
    #[arg(short, long)]
    schema: PathBuf,

    /// Resource instance address (e.g., aws_instance.web[0])
    #[arg(short, long)]
    address: String,

    /// JSON file holding the resource's configuration values
    #[arg(long)]
    values: PathBuf,

    /// File of top-level override blocks that win over the mock data
    #[arg(short, long)]
    overrides: Option<PathBuf>,

    /// Seed for generated strings
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy)]
enum Operation {
    Plan,
    Apply,
    Read,
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { files } => cmd_check(&files),
        Commands::Plan(args) => cmd_fill(&args, Operation::Plan),
        Commands::Apply(args) => cmd_fill(&args, Operation::Apply),
        Commands::Read(args) => cmd_fill(&args, Operation::Read),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report(diags: &Diagnostics) {
    for diag in diags {
        let marker = if diag.is_error() {
            "✗".red()
        } else {
            "!".yellow()
        };
        eprintln!("{} {}\n", marker, diag);
    }
}

fn cmd_check(files: &[PathBuf]) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        match MockData::from_file(file) {
            Ok((data, diags)) => {
                report(&diags);
                if diags.has_errors() {
                    eprintln!("{} {}: invalid mock data", "✗".red(), file.display());
                    all_valid = false;
                } else {
                    println!(
                        "{} {}: {} resource(s), {} data source(s)",
                        "✓".green(),
                        file.display(),
                        data.resources.len(),
                        data.data_sources.len()
                    );
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_fill(args: &FillArgs, operation: Operation) -> ExitCode {
    let mut diags = Diagnostics::new();

    let (provider, addr, values) = match load_inputs(args, &mut diags) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    if diags.has_errors() {
        report(&diags);
        return ExitCode::from(1);
    }

    let source = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let result = match operation {
        Operation::Plan => provider.plan_resource(&addr, &values),
        Operation::Apply => provider
            .plan_resource(&addr, &values)
            .and_then(|(planned, mut plan_diags)| {
                let (applied, apply_diags) = provider.apply_resource(&addr, &planned, source)?;
                plan_diags.append(apply_diags);
                Ok((applied, plan_diags))
            }),
        Operation::Read => provider.read_data_source(&addr, &values, source),
    };

    match result {
        Ok((value, fill_diags)) => {
            diags.append(fill_diags);
            report(&diags);
            if diags.has_errors() {
                return ExitCode::from(1);
            }
            match serde_json::to_string_pretty(&value.to_json()) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    ExitCode::from(2)
                }
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(2)
        }
    }
}

/// Load everything a fill needs. Problems with the user's input are added
/// to `diags`; files that cannot be loaded at all are an `Err`.
fn load_inputs(
    args: &FillArgs,
    diags: &mut Diagnostics,
) -> Result<(MockProvider, AbsResourceInstance, Value), String> {
    let schema = ProviderSchema::from_file(&args.schema)
        .map_err(|e| format!("Failed to load schema {}: {}", args.schema.display(), e))?;

    let (data, data_diags) = MockData::from_file(&args.mocks)
        .map_err(|e| format!("Failed to load mocks {}: {}", args.mocks.display(), e))?;
    diags.append(data_diags);

    let addr: AbsResourceInstance = match args.address.parse() {
        Ok(addr) => addr,
        Err(addr_diags) => {
            return Err(format!("Invalid address {:?}\n{}", args.address, addr_diags));
        }
    };

    let mut provider = MockProvider::new(schema, data);
    if let Some(path) = &args.overrides {
        provider = provider.with_overrides(load_overrides(path, diags)?);
    }

    let values = load_values(&args.values, provider.schema(), &addr)?;
    Ok((provider, addr, values))
}

fn load_overrides(path: &Path, diags: &mut Diagnostics) -> Result<tfmock_core::Overrides, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let (body, parse_diags) = syntax::parse(&source, &path.display().to_string());
    diags.append(parse_diags);

    let Some(body) = body else {
        return Ok(tfmock_core::Overrides::new());
    };

    let (overrides, override_diags) =
        decode_overrides(&body, true).map_err(|e| format!("{}: {}", path.display(), e))?;
    diags.append(override_diags);
    Ok(overrides)
}

fn load_values(
    path: &Path,
    schema: &ProviderSchema,
    addr: &AbsResourceInstance,
) -> Result<Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?;

    let resource_schema = schema
        .schema_for(addr.mode(), addr.type_name())
        .ok_or_else(|| {
            format!(
                "The schema has no {} type {:?}",
                addr.mode().noun(),
                addr.type_name()
            )
        })?;

    Value::from_json(&json, &resource_schema.implied_type())
        .map_err(|e| format!("Invalid values in {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{
  "resource_schemas": {
    "aws_instance": {
      "block": {
        "attributes": {
          "ami": { "type": "string", "required": true },
          "id": { "type": "string", "computed": true }
        }
      }
    }
  },
  "data_source_schemas": {}
}"#;

    const MOCKS: &str = r#"
resource "aws_instance" {
  defaults = { id = "i-mocked" }
}
"#;

    fn fill_args(dir: &TempDir, address: &str) -> FillArgs {
        let schema = dir.path().join("schema.json");
        let mocks = dir.path().join("mocks.tfmock.hcl");
        let values = dir.path().join("values.json");
        fs::write(&schema, SCHEMA).unwrap();
        fs::write(&mocks, MOCKS).unwrap();
        fs::write(&values, r#"{ "ami": "ami-1" }"#).unwrap();

        FillArgs {
            mocks,
            schema,
            address: address.to_string(),
            values,
            overrides: None,
            seed: Some(1),
        }
    }

    #[test]
    fn test_check_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mocks.tfmock.hcl");
        fs::write(&path, MOCKS).unwrap();

        assert_eq!(cmd_check(&[path]), ExitCode::SUCCESS);
    }

    #[test]
    fn test_check_reports_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mocks.tfmock.hcl");
        fs::write(&path, "resource {\n}\n").unwrap();

        assert_eq!(cmd_check(&[path]), ExitCode::from(1));
    }

    #[test]
    fn test_check_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cmd_check(&[dir.path().join("missing.hcl")]), ExitCode::from(1));
    }

    #[test]
    fn test_load_inputs() {
        let dir = TempDir::new().unwrap();
        let args = fill_args(&dir, "aws_instance.web");
        let mut diags = Diagnostics::new();

        let (provider, addr, values) = load_inputs(&args, &mut diags).unwrap();
        assert!(diags.is_empty());
        assert_eq!(addr.to_string(), "aws_instance.web");
        assert_eq!(values.get_attr("ami"), Some(&Value::from("ami-1")));
        assert!(values.get_attr("id").unwrap().is_null());

        let (applied, _) = provider
            .plan_resource(&addr, &values)
            .and_then(|(planned, _)| {
                provider.apply_resource(&addr, &planned, StdRng::seed_from_u64(1))
            })
            .unwrap();
        assert_eq!(applied.get_attr("id"), Some(&Value::from("i-mocked")));
    }

    #[test]
    fn test_load_inputs_with_overrides() {
        let dir = TempDir::new().unwrap();
        let mut args = fill_args(&dir, "aws_instance.web");
        let overrides = dir.path().join("overrides.hcl");
        fs::write(
            &overrides,
            "override {\n  addr = aws_instance.web\n  values = { id = \"i-override\" }\n}\n",
        )
        .unwrap();
        args.overrides = Some(overrides);
        let mut diags = Diagnostics::new();

        let (provider, addr, _) = load_inputs(&args, &mut diags).unwrap();
        assert!(diags.is_empty());
        assert_eq!(
            provider.target_for(&addr).and_then(|v| v.get_attr("id")),
            Some(&Value::from("i-override"))
        );
    }

    #[test]
    fn test_fill_unknown_type_is_load_failure() {
        let dir = TempDir::new().unwrap();
        let args = fill_args(&dir, "aws_vpc.main");
        assert_eq!(cmd_fill(&args, Operation::Plan), ExitCode::from(2));
    }

    #[test]
    fn test_fill_apply_succeeds() {
        let dir = TempDir::new().unwrap();
        let args = fill_args(&dir, "aws_instance.web");
        assert_eq!(cmd_fill(&args, Operation::Apply), ExitCode::SUCCESS);
    }
}

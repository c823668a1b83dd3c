//! Metafix CLI - run fixes over JSON and CSV records
//!
//! # Main Commands
//!
//! ```bash
//! metafix run input.json --fix cleanup.json          # Transform records with a fix
//! metafix run input.csv --fix cleanup.json -o out.json
//! metafix events input.json --fix cleanup.json       # Show the emitted event stream
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! metafix parse input.csv         # Just parse CSV to JSON
//! metafix commands                # List registered methods, conditionals and binds
//! metafix example-fix             # Show an example fix
//! ```

use clap::{Parser, Subcommand};
use metafix::{
    collect_events, parse_csv_file_auto, transform_csv, transform_json, Fix, FixRegistry, FixScript,
    Strictness, TransformOptions,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "metafix")]
#[command(about = "Transform metadata records with Fix scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the commands that run a fix
#[derive(clap::Args)]
struct FixArgs {
    /// Fix file (JSON)
    #[arg(short, long)]
    fix: PathBuf,

    /// Transformation options file (JSON)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Error handling: process, record or expression
    #[arg(short, long)]
    strictness: Option<Strictness>,

    /// Fix variable, as name=value (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Input field to use as record id
    #[arg(long)]
    id_field: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full transformation: JSON or CSV records -> fix -> JSON records
    Run {
        /// Input file (.csv, or JSON object / array of objects)
        input: PathBuf,

        #[command(flatten)]
        fix: FixArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the event stream emitted for each record
    Events {
        /// Input file (.csv, or JSON object / array of objects)
        input: PathBuf,

        #[command(flatten)]
        fix: FixArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered methods, conditionals and binds
    Commands,

    /// Show an example fix
    ExampleFix,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { input, fix, output } => cmd_run(&input, &fix, output.as_deref()),

        Commands::Events { input, fix, output } => cmd_events(&input, &fix, output.as_deref()),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Commands => cmd_commands(),

        Commands::ExampleFix => cmd_example_fix(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Options file, then environment, then command line flags.
fn build_options(args: &FixArgs) -> Result<TransformOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.options {
        Some(path) => TransformOptions::from_json_file(path)?,
        None => TransformOptions::default(),
    }
    .with_env_overrides()?;

    if let Some(strictness) = args.strictness {
        options = options.with_strictness(strictness);
    }
    for var in &args.vars {
        let (name, value) = var
            .split_once('=')
            .ok_or_else(|| format!("Invalid variable '{}', expected NAME=VALUE", var))?;
        options = options.with_var(name, value);
    }
    if let Some(field) = &args.id_field {
        options.id_field = Some(field.clone());
    }
    Ok(options)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn cmd_run(input: &Path, args: &FixArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let script = FixScript::load(&args.fix)?;
    let options = build_options(args)?;
    eprintln!("   Fix: {} ({} expressions)", args.fix.display(), script.fix.len());
    eprintln!("   Strictness: {}", options.strictness);

    let result = if is_csv(input) {
        transform_csv(input, &script, &options)?
    } else {
        transform_json(&read_json(input)?, &script, &options)?
    };

    if let Some(ref info) = result.csv_info {
        eprintln!("   Encoding: {}", info.encoding);
        eprintln!("   Delimiter: '{}'", format_delimiter(info.delimiter));
        eprintln!("   Columns: {}", info.headers.join(", "));
    }

    eprintln!("\n⚙️  Transformed: {} records", result.input_count);
    eprintln!("   ✅ Emitted: {}", result.emitted_count);
    if result.rejected_count > 0 {
        eprintln!("   ⚠️  Rejected: {}", result.rejected_count);
    }

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_events(input: &Path, args: &FixArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Streaming: {}", input.display());

    let script = FixScript::load(&args.fix)?;
    let options = build_options(args)?;

    let records = if is_csv(input) {
        Value::Array(parse_csv_file_auto(input)?.records)
    } else {
        read_json(input)?
    };

    let events = collect_events(&records, &script, &options)?;
    eprintln!("✅ Collected {} events", events.len());

    let json = serde_json::to_string_pretty(&events)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_commands() -> Result<(), Box<dyn std::error::Error>> {
    let registry = FixRegistry::new();

    println!("Methods:\n  {}", registry.method_names().join(", "));
    println!("\nConditionals:\n  {}", registry.conditional_names().join(", "));
    println!("\nBinds:\n  {}", registry.bind_names().join(", "));
    Ok(())
}

fn cmd_example_fix() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", Fix::example().to_json()?);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

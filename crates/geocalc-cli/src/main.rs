//! GeoCalc CLI: evaluate calculator expressions against a YAML workspace.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use geocalc_analysis::StatisticsCreator;
use geocalc_engine::{Geometry, GridEngine};
use geocalc_expr::EngineResolver;

mod workspace;

#[derive(Parser)]
#[command(name = "geocalc")]
#[command(about = "GeoCalc: expression calculator over grid workspaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and print the derived GeoSource
    Calc {
        /// Path to the workspace YAML file
        #[arg(short, long)]
        workspace: PathBuf,

        /// Expression to compile, e.g. "slope(elevation) > 1.5"
        #[arg(short, long)]
        expression: String,

        /// Requested output kind (bool, byte, int, double)
        #[arg(long, default_value = "")]
        output_type: String,
    },

    /// Print field statistics for a workspace source
    Stats {
        /// Path to the workspace YAML file
        #[arg(short, long)]
        workspace: PathBuf,

        /// Name of the source to summarize
        #[arg(short, long)]
        source: String,

        /// Field to summarize
        #[arg(short, long)]
        field: String,

        /// Requested bin count (clamped to 10..=200)
        #[arg(long, default_value = "10")]
        bins: usize,

        /// Region to summarize, as x0,y0,x1,y1
        #[arg(short, long)]
        geometry: String,
    },

    /// Check an expression for syntax errors without a workspace
    Validate {
        /// Expression to parse
        #[arg(short, long)]
        expression: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Calc {
            workspace,
            expression,
            output_type,
        } => {
            if let Err(e) = calc(&workspace, &expression, &output_type) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Stats {
            workspace,
            source,
            field,
            bins,
            geometry,
        } => {
            if let Err(e) = stats(&workspace, &source, &field, bins, &geometry) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { expression } => {
            if let Err(e) = geocalc_expr::parse(&expression) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Expression is valid");
        }
    }
}

fn calc(
    workspace_path: &PathBuf,
    expression: &str,
    output_type: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_workspace(workspace_path)?;
    let resolver = EngineResolver(&engine);
    let source = geocalc_analysis::calculate(&engine, &resolver, expression, output_type)?;

    println!("✓ Compiled '{}'", expression);
    println!("  GeoSource: {} (version {})", source.id, source.version);
    println!(
        "  Specification: {}",
        serde_json::to_string_pretty(&source.specification)?
    );
    Ok(())
}

fn stats(
    workspace_path: &PathBuf,
    source_name: &str,
    field: &str,
    bins: usize,
    geometry: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_workspace(workspace_path)?;
    let source = engine
        .resolve(source_name)
        .ok_or_else(|| format!("unknown source '{}'", source_name))?;
    let region = parse_rect(geometry)?;

    let creator = StatisticsCreator::new(&engine, source);
    match creator.get_field_statistics(Some(&region), field, bins) {
        Some(statistics) => {
            println!("{}", serde_json::to_string_pretty(&statistics)?);
            Ok(())
        }
        None => Err(format!("no statistics for field '{}'", field).into()),
    }
}

fn load_workspace(path: &PathBuf) -> Result<geocalc_engine::MemoryEngine, Box<dyn std::error::Error>> {
    let yaml = fs::read_to_string(path)?;
    Ok(workspace::load(&yaml)?)
}

fn parse_rect(text: &str) -> Result<Geometry, Box<dyn std::error::Error>> {
    let parts: Vec<i64> = text
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("malformed geometry '{}', expected x0,y0,x1,y1", text))?;
    match parts[..] {
        [x0, y0, x1, y1] => Ok(Geometry::rect(x0, y0, x1, y1)),
        _ => Err(format!("malformed geometry '{}', expected x0,y0,x1,y1", text).into()),
    }
}

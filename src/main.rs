//! Nodezator launcher
//!
//! Usage:
//!   nodezator run graph.ndz [--json]           → execute and print results
//!   nodezator export graph.ndz [-o out.py]     → write the equivalent Python script
//!   nodezator check graph.ndz                  → load and validate only

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use nodezator::constants;
use nodezator::{AppConfig, AppContext, ExportOptions};

#[derive(Parser)]
#[command(
    name = "nodezator",
    about = "Run and export Nodezator callable graphs",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra node-pack search directory; may be repeated
    #[arg(long = "node-pack-dir", global = true)]
    node_pack_dirs: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a document and print the node results
    Run {
        file: PathBuf,
        /// Print the execution report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Export a document as a Python script
    Export {
        file: PathBuf,
        /// Output file (defaults to the document path with a .py extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Wrap the statements in `def main():`
        #[arg(long = "main", default_value_t = false)]
        wrap_in_main: bool,
        /// Add an `if __name__ == "__main__":` guard
        #[arg(long = "guard", default_value_t = false)]
        add_main_guard: bool,
    },
    /// Load a document and report whether it is valid
    Check { file: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.node_pack_dirs.extend(cli.node_pack_dirs.iter().cloned());

    let mut context = AppContext::new(config);
    match cli.command {
        Commands::Run { file, json } => {
            open(&mut context, &file)?;
            let report = context.run(None);
            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                for (node_id, outputs) in &report.results {
                    for (name, value) in outputs {
                        println!("{}.{} = {}", node_id, name, value.repr());
                    }
                }
                for error in &report.errors {
                    eprintln!("error: {}", error);
                }
            }
            if !report.is_success() {
                bail!("execution of {} failed", file.display());
            }
        }
        Commands::Export {
            file,
            output,
            wrap_in_main,
            add_main_guard,
        } => {
            open(&mut context, &file)?;
            let defaults = context.config.export_options();
            let options = ExportOptions {
                wrap_in_main: wrap_in_main || defaults.wrap_in_main,
                add_main_guard: add_main_guard || defaults.add_main_guard,
            };
            let source = context
                .export_with(options)
                .with_context(|| format!("cannot export {}", file.display()))?;
            let output = output.unwrap_or_else(|| file.with_extension(constants::file::EXPORT_EXTENSION));
            fs::write(&output, source).with_context(|| format!("cannot write {}", output.display()))?;
            info!("Exported {} to {}", file.display(), output.display());
        }
        Commands::Check { file } => {
            open(&mut context, &file)?;
            let graph = &context.document.graph;
            println!(
                "{}: {} nodes, {} connections, {} text blocks",
                file.display(),
                graph.node_count(),
                graph.connection_count(),
                graph.text_blocks.len()
            );
        }
    }
    Ok(())
}

fn open(context: &mut AppContext, file: &Path) -> Result<()> {
    if file.extension().and_then(|ext| ext.to_str()) != Some(constants::file::DOCUMENT_EXTENSION) {
        warn!("{} does not have the .{} extension", file.display(), constants::file::DOCUMENT_EXTENSION);
    }
    context
        .open(file)
        .with_context(|| format!("cannot load {}", file.display()))
}

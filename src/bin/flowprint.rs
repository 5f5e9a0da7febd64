// src/bin/flowprint.rs
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use walkdir::WalkDir;

use flowprint_core::{analyze_file, AnalyzeOptions, CfgGraph};

#[derive(Parser)]
#[command(
    name = "flowprint",
    version,
    about = "Control-flow-graph extraction for Java-style source"
)]
struct Cli {
    /// A source file, or a directory to scan for .java files.
    path: PathBuf,

    /// Method to analyze (defaults to the first method found).
    #[arg(long)]
    method: Option<String>,

    /// Class the method belongs to.
    #[arg(long)]
    class: Option<String>,

    /// Expand in-file callees into the graph with call/return edges.
    #[arg(long)]
    inline_calls: bool,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Suppress per-file banners and recovery warnings.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "error:".red().bold());
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let options = AnalyzeOptions {
        method: cli.method.clone(),
        class: cli.class.clone(),
        inline_calls: cli.inline_calls,
    };
    if cli.path.is_dir() {
        return run_batch(&cli, &options);
    }
    let graph = analyze_file(&cli.path, &options)?;
    print_graph(&graph, cli.format)?;
    report_recoveries(&graph, &cli.path, cli.quiet);
    Ok(())
}

fn run_batch(cli: &Cli, options: &AnalyzeOptions) -> Result<()> {
    let files: Vec<PathBuf> = WalkDir::new(&cli.path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == "java"))
        .collect();

    let mut results: Vec<(PathBuf, flowprint_core::Result<CfgGraph>)> = files
        .into_par_iter()
        .map(|path| {
            let graph = analyze_file(&path, options);
            (path, graph)
        })
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut failures = 0usize;
    for (path, result) in results {
        match result {
            Ok(graph) => {
                if !cli.quiet {
                    println!("{}", format!("== {} ==", path.display()).bold());
                }
                print_graph(&graph, cli.format)?;
                report_recoveries(&graph, &path, cli.quiet);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {e}", "error:".red().bold(), path.display());
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} file(s) failed to analyze");
    }
    Ok(())
}

fn print_graph(graph: &CfgGraph, format: Format) -> Result<()> {
    match format {
        Format::Text => print!("{}", graph.render()),
        Format::Json => println!("{}", serde_json::to_string_pretty(graph)?),
    }
    Ok(())
}

fn report_recoveries(graph: &CfgGraph, path: &Path, quiet: bool) {
    if quiet {
        return;
    }
    if graph.partial {
        eprintln!(
            "{} {}: unbalanced braces, graph truncated at the last balanced point",
            "warning:".yellow().bold(),
            path.display()
        );
    }
    for d in &graph.diagnostics {
        eprintln!(
            "{} {}:{}: {}",
            "warning:".yellow().bold(),
            path.display(),
            d.line,
            d.message
        );
    }
}

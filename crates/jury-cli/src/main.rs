// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Jury CLI tool

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use jury::{
    classify_with_template, run_relevance_eval, Builtin, Dataset, EvalConfig, Executor,
    Printer, RelevanceOptions, ResultTable, Sink, NOT_PARSABLE,
};
use jury_client::LM;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "jury")]
#[command(about = "Classify datasets with an LLM judge", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print per-row diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every row of a dataset
    Classify {
        /// JSON lines dataset
        #[arg(short, long)]
        data: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Judge each retrieved reference against its query
    Relevance {
        /// JSON lines dataset
        #[arg(short, long)]
        data: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List built-in templates
    Templates,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Classify { data, output } => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            let (executor, model, dataset) = prepare(&config, &data)?;
            let template = config.evaluator.classification_template()?;

            let table = classify_with_template(
                &executor,
                &dataset,
                model,
                &template,
                &config.evaluator.classify_options(),
            )?;

            with_output(output.as_deref(), |out| {
                table.write_json_lines(out)?;
                Ok(())
            })?;
            summarize(&table);
        }
        Commands::Relevance { data, output } => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            let (executor, model, dataset) = prepare(&config, &data)?;
            let options = RelevanceOptions::new()
                .template(config.evaluator.classification_template()?)
                .use_function_calling_if_available(
                    config.evaluator.use_function_calling_if_available,
                );

            let labels = run_relevance_eval(&executor, &dataset, model, &options)?;

            with_output(output.as_deref(), |out| {
                for (index, row) in dataset.index().iter().zip(&labels) {
                    let line = serde_json::json!({ "index": index, "labels": row });
                    writeln!(out, "{}", line)?;
                }
                Ok(())
            })?;
            let judged: usize = labels.iter().map(Vec::len).sum();
            eprintln!(
                "{} {} references across {} rows",
                style("Judged").green().bold(),
                judged,
                labels.len()
            );
        }
        Commands::Templates => {
            for builtin in Builtin::ALL {
                let template = builtin.template()?;
                println!(
                    "{:<16} {}",
                    style(builtin.name()).cyan().bold(),
                    style(template.rails().labels().join(", ")).dim()
                );
            }
        }
    }

    Ok(())
}

/// Printer lines already reach stderr, so their `tracing` copies are off.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,jury=debug,jury::report=off"
    } else {
        "warn,jury::report=off"
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter(verbose))),
        )
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> anyhow::Result<EvalConfig> {
    let mut config = match path {
        Some(path) => EvalConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EvalConfig::default(),
    };
    config.executor.verbose |= verbose;
    Ok(config)
}

fn prepare(config: &EvalConfig, data: &Path) -> anyhow::Result<(Executor, Arc<dyn LM>, Dataset)> {
    let printer = Printer::with_sink(
        config.executor.verbose,
        config.executor.show_progress,
        Sink::Stderr,
    );
    let executor = Executor::new(config.executor.clone())?.with_printer(Arc::new(printer));
    let model: Arc<dyn LM> = Arc::new(
        config
            .model
            .client()
            .context("failed to create model client")?,
    );
    let dataset = Dataset::from_path(data)
        .with_context(|| format!("failed to read dataset from {}", data.display()))?;
    Ok((executor, model, dataset))
}

fn with_output<F>(path: Option<&Path>, write: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut dyn Write) -> anyhow::Result<()>,
{
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            write(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn summarize(table: &ResultTable) {
    let failed = table.labels().iter().filter(|l| **l == NOT_PARSABLE).count();
    let status = if failed == 0 {
        style("Classified").green().bold()
    } else {
        style("Classified").yellow().bold()
    };
    eprintln!(
        "{} {} rows ({} {})",
        status,
        table.len(),
        failed,
        NOT_PARSABLE
    );
}

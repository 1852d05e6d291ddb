//! Sprig CLI - run a scripted request against a component tree described in TOML.
//!
//! Usage:
//!   sprig run <scenario.toml> [--render]
//!   sprig check <scenario.toml>

mod scenario;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sprig::{Lifecycle, MapModel, OutlineRenderer, PhaseId, RequestContext, Value};

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Drive component trees through the request lifecycle", long_about = None)]
struct Cli {
    /// Log lifecycle decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the scenario's request and print a JSON report
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Include the rendered outline in the report
        #[arg(long)]
        render: bool,
    },

    /// Build the scenario's tree without running it
    Check {
        /// Scenario file
        scenario: PathBuf,
    },
}

#[derive(Serialize)]
struct Report {
    phases: Vec<PhaseId>,
    outcome: Option<String>,
    validation_failed: bool,
    messages: Vec<MessageReport>,
    model: Vec<(String, Option<Value>)>,
    deferred_errors: Vec<DeferredReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

#[derive(Serialize)]
struct MessageReport {
    client_id: Option<String>,
    severity: String,
    summary: String,
    detail: String,
}

#[derive(Serialize)]
struct DeferredReport {
    client_id: String,
    phase: PhaseId,
    error: String,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run { scenario, render } => run(&scenario, render),
        Commands::Check { scenario } => check(&scenario),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(path: &Path, render: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let application = scenario.application()?;
    let mut tree = scenario.tree(&application)?;
    let mut model = scenario.model();
    log::info!("Loaded {} nodes from {}", tree.len(), path.display());

    let params = scenario
        .request
        .params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()));
    let mut ctx = RequestContext::new(&application, &mut model)
        .with_params(params)
        .with_postback(scenario.is_postback());

    let lifecycle = Lifecycle::new();
    let mut outline = OutlineRenderer::new();
    let executed = lifecycle.execute(&mut tree, &mut ctx);
    let rendered = if render {
        lifecycle.render(&mut tree, &mut ctx, &mut outline)
    } else {
        Ok(())
    };
    let error = executed.and(rendered).err().map(|e| e.to_string());
    if let Some(error) = &error {
        log::warn!("Request failed: {}", error);
    }

    let mut report = Report {
        phases: ctx.phases_run().to_vec(),
        outcome: ctx.outcome().map(str::to_string),
        validation_failed: ctx.is_validation_failed(),
        messages: ctx
            .messages()
            .iter()
            .map(|(client_id, message)| MessageReport {
                client_id: client_id.map(str::to_string),
                severity: message.severity.to_string(),
                summary: message.summary.clone(),
                detail: message.detail.clone(),
            })
            .collect(),
        model: Vec::new(),
        deferred_errors: ctx
            .deferred_errors()
            .iter()
            .map(|deferred| DeferredReport {
                client_id: deferred.client_id.clone(),
                phase: deferred.phase,
                error: deferred.error.to_string(),
            })
            .collect(),
        error,
        output: render.then(|| outline.into_output()),
    };
    let released = ctx.release();
    log::debug!("Released {} request-scoped instances", released);
    drop(ctx);

    report.model = committed(&model);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn committed(model: &MapModel) -> Vec<(String, Option<Value>)> {
    model
        .values()
        .map(|(path, value)| (path.to_string(), value.cloned()))
        .collect()
}

fn check(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let application = scenario.application()?;
    let tree = scenario.tree(&application)?;
    println!(
        "{}: {} nodes, {} request parameters{}",
        path.display(),
        tree.len(),
        scenario.request.params.len(),
        if scenario.is_postback() { " (postback)" } else { "" }
    );
    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, node) in tree.nodes() {
        *kinds.entry(node.kind.name()).or_default() += 1;
    }
    for (kind, count) in &kinds {
        println!("  {}: {}", kind, count);
    }
    for param in scenario.request.params.keys() {
        if tree.find(param).is_none() {
            println!("  warning: parameter `{}` matches no node", param);
        }
    }
    Ok(())
}

mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use browseflow_client::{ExecutionService, HttpExecutionClient};
use browseflow_core::config::AppConfig;
use browseflow_core::types::{ExecutionState, StatusReport};
use browseflow_graph::file::{self, DEFAULT_FILE_NAME};
use browseflow_graph::{
    encode, validate, Graph, NodeDataPatch, NodeKind, Position, Severity, WorkflowMeta,
};
use browseflow_tracker::{ExecutionTracker, SubmitOutcome, TrackerSnapshot};

#[derive(Parser)]
#[command(
    name = "browseflow",
    version,
    about = "Build browser automation workflows and run them on an execution service"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "browseflow.toml")]
    config: PathBuf,

    /// Workflow file to edit and run
    #[arg(short, long, default_value = DEFAULT_FILE_NAME, env = "BROWSEFLOW_FILE")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new workflow file from the starter template
    New {
        /// Start from an empty graph instead
        #[arg(long)]
        empty: bool,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Add a node of the given type
    Add {
        /// Node type (visit_page, click_element, extract_data, ...)
        node_type: String,
        #[arg(long, default_value = "0")]
        x: f64,
        #[arg(long, default_value = "0")]
        y: f64,
    },
    /// Add a comment annotation
    Comment {
        /// Comment text
        text: Option<String>,
        #[arg(long, default_value = "0")]
        x: f64,
        #[arg(long, default_value = "0")]
        y: f64,
    },
    /// Connect two nodes
    Connect {
        source: String,
        target: String,
        #[arg(long)]
        source_handle: Option<String>,
        #[arg(long)]
        target_handle: Option<String>,
    },
    /// Remove a node and its edges
    RemoveNode { id: String },
    /// Remove an edge
    RemoveEdge { id: String },
    /// Set a node parameter to a JSON value (bare text is taken as a string)
    Set {
        node_id: String,
        key: String,
        value: String,
    },
    /// Replace an extract_data node's selectors with a JSON object
    Selectors { node_id: String, json: String },
    /// Change a node's label and description
    Label {
        node_id: String,
        label: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a node's type, keeping its params
    Retype { node_id: String, node_type: String },
    /// Move a node on the canvas
    Move { node_id: String, x: f64, y: f64 },
    /// Print the workflow's nodes and edges
    Show,
    /// Check the workflow for problems
    Validate,
    /// Print or write the definition document sent to the service
    ExportDefinition {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the workflow file with another DSL document
    Import { source: PathBuf },
    /// Submit the workflow and follow it until it finishes
    Run {
        /// Print the execution id and return immediately
        #[arg(long)]
        no_wait: bool,
    },
    /// Show the status of an execution
    Status { execution_id: String },
    /// Ask the service to stop an execution
    Stop { execution_id: String },
    /// List node types known locally and by the service
    Nodes {
        /// Only list the local catalog
        #[arg(long)]
        local: bool,
    },
    /// Run connectivity and configuration checks
    Doctor,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("browseflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "browseflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let path = cli.file.as_path();

    match cli.command {
        Commands::New { empty, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let graph = if empty { Graph::new() } else { Graph::seed() };
            file::export_file(&graph, path)?;
            println!("Created {} ({} nodes)", path.display(), graph.nodes.len());
        }
        Commands::Add { node_type, x, y } => {
            let kind = NodeKind::lookup(&node_type)
                .with_context(|| format!("unknown node type '{}'", node_type))?;
            edit(path, |graph| {
                let node = graph.add_node(kind, Position::new(x, y));
                println!("{}", node.id);
                Ok(())
            })?;
        }
        Commands::Comment { text, x, y } => {
            edit(path, |graph| {
                let node = graph.add_comment(Position::new(x, y));
                if let Some(text) = text {
                    graph.update_node_data(&node.id, NodeDataPatch::default().label(text));
                }
                println!("{}", node.id);
                Ok(())
            })?;
        }
        Commands::Connect {
            source,
            target,
            source_handle,
            target_handle,
        } => {
            edit(path, |graph| {
                for end in [&source, &target] {
                    if !graph.contains_node(end) {
                        warn!(node_id = %end, "Connecting to a node that does not exist");
                    }
                }
                let edge = graph.connect(&source, &target, source_handle, target_handle);
                println!("{}", edge.id);
                Ok(())
            })?;
        }
        Commands::RemoveNode { id } => {
            edit(path, |graph| match graph.remove_node(&id) {
                Some(_) => Ok(()),
                None => bail!("no node '{}'", id),
            })?;
        }
        Commands::RemoveEdge { id } => {
            edit(path, |graph| match graph.remove_edge(&id) {
                Some(_) => Ok(()),
                None => bail!("no edge '{}'", id),
            })?;
        }
        Commands::Set {
            node_id,
            key,
            value,
        } => {
            let value: serde_json::Value = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value));
            edit(path, |graph| Ok(graph.set_param(&node_id, &key, value)?))?;
        }
        Commands::Selectors { node_id, json } => {
            edit(path, |graph| Ok(graph.set_selectors_json(&node_id, &json)?))?;
        }
        Commands::Label {
            node_id,
            label,
            description,
        } => {
            edit(path, |graph| {
                if !graph.contains_node(&node_id) {
                    bail!("no node '{}'", node_id);
                }
                let mut patch = NodeDataPatch::default().label(label);
                if description.is_some() {
                    patch = patch.description(description);
                }
                graph.update_node_data(&node_id, patch);
                Ok(())
            })?;
        }
        Commands::Retype { node_id, node_type } => {
            let kind = NodeKind::lookup(&node_type)
                .with_context(|| format!("unknown node type '{}'", node_type))?;
            edit(path, |graph| Ok(graph.set_node_kind(&node_id, kind)?))?;
        }
        Commands::Move { node_id, x, y } => {
            edit(path, |graph| {
                if !graph.contains_node(&node_id) {
                    bail!("no node '{}'", node_id);
                }
                graph.move_node(&node_id, Position::new(x, y));
                Ok(())
            })?;
        }
        Commands::Show => {
            let graph = file::read_file(path)?;
            print_graph(&graph);
        }
        Commands::Validate => {
            let graph = file::read_file(path)?;
            let report = validate(&graph);
            for issue in &report.issues {
                let tag = match issue.severity() {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                println!("  {}: {}", tag, issue);
            }
            report.into_result()?;
            println!("Workflow is valid");
        }
        Commands::ExportDefinition { out } => {
            let graph = file::read_file(path)?;
            let document = encode(&graph, &workflow_meta(&config));
            let text = serde_json::to_string_pretty(&document)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, text)?;
                    info!(path = %out.display(), "Definition written");
                }
                None => println!("{}", text),
            }
        }
        Commands::Import { source } => {
            let mut graph = Graph::new();
            if !file::import_file(&mut graph, &source) {
                bail!("{} is not a valid workflow document", source.display());
            }
            file::export_file(&graph, path)?;
        }
        Commands::Run { no_wait } => {
            let graph = file::read_file(path)?;
            run_workflow(&config, &graph, no_wait).await?;
        }
        Commands::Status { execution_id } => {
            let client = HttpExecutionClient::new(&config.service)?;
            let report = client.fetch_status(&execution_id).await?;
            print_report(&report);
        }
        Commands::Stop { execution_id } => {
            let client = HttpExecutionClient::new(&config.service)?;
            if client.request_stop(&execution_id).await? {
                println!("Stop requested for {}", execution_id);
            } else {
                bail!("service refused to stop {}", execution_id);
            }
        }
        Commands::Nodes { local } => {
            print_local_catalog();
            if !local {
                let client = HttpExecutionClient::new(&config.service)?;
                let remote = match client.list_node_types().await {
                    Ok(remote) => remote,
                    Err(e) if e.is_remote() => {
                        warn!(error = %e, "Service catalog unavailable");
                        eprintln!("Service at {} unavailable: {}", client.base_url(), e);
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                println!();
                println!("Service ({}):", client.base_url());
                for (name, node) in &remote {
                    println!(
                        "  {:<14} {}  required: [{}]",
                        name,
                        node.name,
                        node.required_params.join(", ")
                    );
                }
            }
        }
        Commands::Doctor => {
            println!("Browseflow Doctor");
            println!("=================");
            doctor::run_doctor(&config, path).await;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load the workflow file, apply `f`, and save it back. Nothing is written
/// when `f` fails.
fn edit(path: &Path, f: impl FnOnce(&mut Graph) -> anyhow::Result<()>) -> anyhow::Result<()> {
    let mut graph = file::read_file(path)
        .with_context(|| format!("reading {} (create it with `browseflow new`)", path.display()))?;
    f(&mut graph)?;
    file::export_file(&graph, path)?;
    Ok(())
}

fn workflow_meta(config: &AppConfig) -> WorkflowMeta {
    WorkflowMeta::new(
        config.workflow.name.clone(),
        config.workflow.description.clone(),
    )
}

async fn run_workflow(config: &AppConfig, graph: &Graph, no_wait: bool) -> anyhow::Result<()> {
    let client = Arc::new(HttpExecutionClient::new(&config.service)?);
    let tracker = ExecutionTracker::new(client, config.tracker.clone())
        .with_validation(config.workflow.validate_before_submit);
    let mut rx = tracker.subscribe();

    let handle = match tracker.submit(encode(graph, &workflow_meta(config))).await {
        SubmitOutcome::Started(handle) => handle,
        SubmitOutcome::Failed(message) => bail!("{}", message),
        SubmitOutcome::Busy => bail!("an execution is already in progress"),
    };
    println!("Execution {} started", handle);
    if no_wait {
        return Ok(());
    }

    let mut last_text = String::new();
    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.status_text != last_text {
            println!("  [{}] {}", snapshot.attempts, snapshot.status_text);
            last_text = snapshot.status_text.clone();
        }
        if !snapshot.state.is_busy() {
            return finish(&snapshot);
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return finish(&tracker.snapshot());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(execution_id = %handle, "Interrupted, requesting stop");
                match tracker.stop().await {
                    Ok(true) => {}
                    Ok(false) => eprintln!("Service did not accept the stop request"),
                    Err(e) => eprintln!("Stop request failed: {}", e),
                }
            }
        }
    }
}

fn finish(snapshot: &TrackerSnapshot) -> anyhow::Result<()> {
    if let Some(report) = &snapshot.last_report {
        print_report(report);
    }
    match snapshot.state {
        ExecutionState::Completed => Ok(()),
        state => bail!(
            "execution {}: {}",
            state,
            snapshot.error.as_deref().unwrap_or("no details")
        ),
    }
}

fn print_graph(graph: &Graph) {
    println!("Nodes ({}):", graph.nodes.len());
    for node in &graph.nodes {
        println!(
            "  {:<24} {:<14} {:<28} ({}, {})",
            node.id,
            node.kind().as_str(),
            node.data.label,
            node.position.x,
            node.position.y
        );
        if !node.data.params.is_empty() {
            println!(
                "  {:<24} {}",
                "",
                serde_json::Value::Object(node.data.params.clone())
            );
        }
    }
    println!("Edges ({}):", graph.edges.len());
    for edge in &graph.edges {
        println!("  {:<24} {} -> {}", edge.id, edge.source, edge.target);
    }
}

fn print_report(report: &StatusReport) {
    println!("Status: {}", report.status_text());
    if let Some(error) = &report.error {
        println!("Error: {}", error);
    }
    if let Some(duration) = report.total_duration {
        println!("Duration: {:.1}s", duration);
    }
    for step in &report.steps {
        let marker = if step.error.is_some() { "!!" } else { "ok" };
        println!("  [{}] {} {}", marker, step.node_id, step.status);
    }
    for step in report.failed_steps() {
        println!(
            "  {} failed: {}",
            step.node_id,
            step.error.as_deref().unwrap_or("no details")
        );
        if let Some(path) = &step.screenshot_path {
            println!("    screenshot: {}", path);
        }
    }
}

fn print_local_catalog() {
    println!("Local:");
    for kind in NodeKind::ALL {
        if !kind.is_executable() {
            continue;
        }
        println!(
            "  {:<14} {:<16} required: [{}]",
            kind.as_str(),
            kind.label(),
            kind.required_params().join(", ")
        );
    }
}

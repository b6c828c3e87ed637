use std::path::Path;

use browseflow_client::HttpExecutionClient;
use browseflow_core::config::AppConfig;
use browseflow_graph::{file, validate, NodeKind};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub async fn run_doctor(config: &AppConfig, workflow: &Path) {
    let mut checks = Vec::new();

    // 1. Tracker settings usable
    checks.push(check_tracker(config));

    // 2. Workflow file readable and valid
    checks.push(check_workflow(workflow));

    // 3-4. Service reachable and its catalog matches ours
    match HttpExecutionClient::new(&config.service) {
        Ok(client) => {
            checks.push(check_service(&client).await);
            checks.push(check_catalog(&client).await);
        }
        Err(e) => checks.push(CheckResult {
            label: "Service".into(),
            ok: false,
            detail: e.to_string(),
        }),
    }

    // Print results
    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_tracker(config: &AppConfig) -> CheckResult {
    let t = &config.tracker;
    if t.poll_interval_secs == 0 || t.max_poll_attempts == 0 {
        return CheckResult {
            label: "Tracker".into(),
            ok: false,
            detail: "poll_interval_secs and max_poll_attempts must be positive".into(),
        };
    }
    CheckResult {
        label: "Tracker".into(),
        ok: true,
        detail: format!(
            "every {}s, up to {} polls (~{}s)",
            t.poll_interval_secs,
            t.max_poll_attempts,
            t.poll_interval_secs * u64::from(t.max_poll_attempts)
        ),
    }
}

fn check_workflow(path: &Path) -> CheckResult {
    if !path.exists() {
        return CheckResult {
            label: "Workflow".into(),
            ok: true,
            detail: format!("{} (not created yet)", path.display()),
        };
    }
    match file::read_file(path) {
        Ok(graph) => {
            let report = validate(&graph);
            let errors = report.errors().count();
            let warnings = report.warnings().count();
            CheckResult {
                label: "Workflow".into(),
                ok: errors == 0,
                detail: format!(
                    "{}: {} nodes, {} edges, {} errors, {} warnings",
                    path.display(),
                    graph.nodes.len(),
                    graph.edges.len(),
                    errors,
                    warnings
                ),
            }
        }
        Err(e) => CheckResult {
            label: "Workflow".into(),
            ok: false,
            detail: format!("{}: {}", path.display(), e),
        },
    }
}

async fn check_service(client: &HttpExecutionClient) -> CheckResult {
    match client.health().await {
        Ok(banner) => CheckResult {
            label: "Service".into(),
            ok: true,
            detail: format!(
                "{} ({})",
                client.base_url(),
                banner
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("reachable")
            ),
        },
        Err(e) => CheckResult {
            label: "Service".into(),
            ok: false,
            detail: format!("{}: {}", client.base_url(), e),
        },
    }
}

async fn check_catalog(client: &HttpExecutionClient) -> CheckResult {
    let remote = match client.list_node_types().await {
        Ok(remote) => remote,
        Err(e) => {
            return CheckResult {
                label: "Node types".into(),
                ok: false,
                detail: e.to_string(),
            }
        }
    };

    let missing: Vec<&str> = NodeKind::ALL
        .iter()
        .filter(|k| k.is_executable() && !k.is_structural())
        .map(|k| k.as_str())
        .filter(|name| !remote.contains_key(*name))
        .collect();

    if missing.is_empty() {
        CheckResult {
            label: "Node types".into(),
            ok: true,
            detail: format!("{} offered by service", remote.len()),
        }
    } else {
        CheckResult {
            label: "Node types".into(),
            ok: false,
            detail: format!("Not offered by service: {}", missing.join(", ")),
        }
    }
}

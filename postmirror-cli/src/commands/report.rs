//! Terminal and JSON rendering of plans, summaries and failures.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use postmirror_engine::{AggregateError, ReconciliationJob, RunSummary};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: &'static str,
    #[tabled(rename = "target")]
    target: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "task")]
    task: String,
    #[tabled(rename = "error")]
    message: String,
}

#[derive(Serialize)]
struct PlanJson<'a> {
    scope: String,
    delete: Vec<&'a str>,
    create: Vec<PlannedDocumentJson<'a>>,
}

#[derive(Serialize)]
struct PlannedDocumentJson<'a> {
    title: &'a str,
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
}

pub fn print_plan(job: &ReconciliationJob, json: bool) -> Result<()> {
    if json {
        let payload = PlanJson {
            scope: job.scope.to_string(),
            delete: job.stale.iter().map(|id| id.as_str()).collect(),
            create: job
                .documents
                .iter()
                .map(|doc| PlannedDocumentJson {
                    title: &doc.title,
                    path: doc.path.display().to_string(),
                    tags: doc
                        .metadata
                        .iter()
                        .flat_map(|m| m.tags.iter().map(String::as_str))
                        .collect(),
                })
                .collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
        );
        return Ok(());
    }

    println!(
        "[dry-run] {}: {} to delete, {} to create",
        job.scope,
        job.stale.len(),
        job.documents.len()
    );
    if job.stale.is_empty() && job.documents.is_empty() {
        return Ok(());
    }

    let rows = job
        .stale
        .iter()
        .map(|id| PlanRow {
            action: "delete",
            target: id.to_string(),
        })
        .chain(job.documents.iter().map(|doc| PlanRow {
            action: "create",
            target: doc.title.clone(),
        }));
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

pub fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("failed to serialize summary JSON")?
        );
        return Ok(());
    }

    println!(
        "{} '{}' mirrored ({} deleted, {} created) in {} ms",
        "✓".green().bold(),
        summary.scope,
        summary.deleted,
        summary.created.len(),
        summary.duration_ms
    );
    Ok(())
}

pub fn print_failure(err: &AggregateError, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(err).context("failed to serialize failure JSON")?
        );
        return Ok(());
    }

    eprintln!(
        "{} {} failed: {} of {} tasks",
        "✗".red().bold(),
        err.phase,
        err.failures.len(),
        err.failures.len() + err.succeeded
    );
    if err.succeeded > 0 {
        eprintln!(
            "  {} completed operations were kept; nothing was rolled back",
            err.succeeded
        );
    }
    let rows = err.failures.iter().map(|f| FailureRow {
        task: f.task.clone(),
        message: f.message.clone(),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    eprintln!("{table}");
    Ok(())
}

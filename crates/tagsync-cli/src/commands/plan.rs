//! Plan command - Show how a resource's records are split into queries

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tagsync_catalog::{PartitionConfig, PlanEntry, ProgressivePartitioner, QueryPlan};

use super::{connect, load_config, require_resource, resource_name, session};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Plan as printed by `--json`
#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    resource: &'a str,
    origin: &'a str,
    query_limit: u64,
    total_expected: u64,
    residuals: usize,
    uncovered: u64,
    entries: &'a [PlanEntry],
}

/// Execute the plan command
pub async fn execute(args: PlanArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let name = resource_name(&config)?.to_string();
    let quiet = global.quiet || args.json;

    let backend = connect(&config, quiet).await?;
    let mut session = session(&backend, &config);

    let pb = spinner("Enumerating catalog resources...", quiet);
    session
        .load_resources()
        .await
        .context("Failed to enumerate resources")?;
    let resource = require_resource(&session, &name)?;
    let origin = session.graph().get(resource).origin.clone();
    finish_spinner(pb, &format!("Found resource {} ({})", name, origin));

    let partition = PartitionConfig::from(&config.search);
    let query_limit = partition.cap;
    let pb = spinner("Probing record counts...", quiet);
    let plan = ProgressivePartitioner::new(&backend, partition)
        .plan_all(&origin)
        .await
        .context("Failed to build query plan")?;
    let residuals = plan.residuals().count();
    if residuals > 0 {
        finish_spinner_warn(
            pb,
            &format!("{} queries still exceed the limit and will be truncated", residuals),
        );
    } else {
        finish_spinner(pb, &format!("Planned {} queries", plan.len()));
    }

    if args.json {
        let report = PlanReport {
            resource: &name,
            origin: &origin,
            query_limit,
            total_expected: plan.total_expected(),
            residuals,
            uncovered: plan.uncovered,
            entries: &plan.entries,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_plan(&name, &plan, query_limit);
    }

    Ok(())
}

fn print_plan(resource: &str, plan: &QueryPlan, query_limit: u64) {
    println!("Query plan for {}", resource);
    println!("{}", "=".repeat(60));
    for entry in plan.iter() {
        let marker = if entry.residual { "  (truncated)" } else { "" };
        println!(
            "  {:<40} {:>8}{}",
            entry.description, entry.expected_count, marker
        );
    }
    println!();
    println!(
        "{} queries, {} records expected, limit {} per query",
        plan.len(),
        plan.total_expected(),
        query_limit
    );
    if plan.uncovered > 0 {
        println!(
            "{} records match no sub-query and will not be fetched",
            plan.uncovered
        );
    }
}

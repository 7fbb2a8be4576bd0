//! Sync command - Write catalog metadata to warehouse tags and comments
//!
//! Loads governance metadata and the selected resource, builds the DDL
//! statements and runs them. `--dry-run` prints the statements instead.

use anyhow::{Context, Result};
use clap::Args;
use tagsync_catalog::CatalogSession;
use tagsync_config::TagSyncConfig;
use tagsync_writer::{
    DryRunExecutor, StatementBuilder, StatementExecutor, StatementPlan, TagWriter,
    WarehouseExecutor, WriteReport,
};

use super::{connect, load_config, print_info, resource_name, session};
use crate::progress::{finish_progress, finish_spinner, progress_bar, spinner};
use crate::GlobalOptions;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Print the statements without connecting to the warehouse
    #[arg(long, conflicts_with = "confirm")]
    dry_run: bool,

    /// Confirm that statements should be executed against the warehouse
    #[arg(long)]
    confirm: bool,

    /// Output the write report as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let name = resource_name(&config)?.to_string();
    if !args.dry_run {
        if !args.confirm {
            anyhow::bail!("Refusing to write to the warehouse without --confirm (or use --dry-run)");
        }
        config
            .validate_warehouse()
            .context("Warehouse is not configured")?;
    }
    let quiet = global.quiet || args.json;

    let backend = connect(&config, quiet).await?;
    let mut session = session(&backend, &config);

    let pb = spinner("Loading governance metadata...", quiet);
    session.load().await.context("Failed to load catalog")?;
    finish_spinner(
        pb,
        &format!(
            "Loaded {} policies, {} classifications, {} business terms",
            session.policies().len(),
            session.classifications().len(),
            session.business_terms().len()
        ),
    );

    let pb = spinner(&format!("Loading resource {}...", name), quiet);
    let load = session
        .load_resource(&name)
        .await
        .with_context(|| format!("Failed to load resource '{}'", name))?;
    finish_spinner(
        pb,
        &format!(
            "Loaded {} objects and {} relationships ({} records skipped)",
            load.objects.len(),
            load.relationships,
            load.skipped
        ),
    );

    let plan = StatementBuilder::new(config.writeback.clone(), config.catalog.asset_url())
        .build(session.graph(), &load.objects);
    print_info(
        &format!(
            "Built {} unset and {} set statements ({} objects skipped)",
            plan.unset.len(),
            plan.set.len(),
            plan.skipped
        ),
        quiet,
    );

    if args.dry_run {
        let executor = DryRunExecutor::new();
        let report = run(&executor, &plan, &config, true).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            for statement in executor.statements() {
                println!("{};", statement);
            }
        }
        print_summary(&session, &report, quiet);
        return Ok(());
    }

    let executor = WarehouseExecutor::from_config(&config.warehouse, &config.secrets)
        .context("Failed to connect to warehouse")?;
    print_info(
        &format!("Writing to warehouse {}", executor.warehouse_id()),
        quiet,
    );
    let report = run(&executor, &plan, &config, quiet).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    print_summary(&session, &report, quiet);

    if !report.is_success() {
        anyhow::bail!("{} statements failed", report.failed.len());
    }
    Ok(())
}

async fn run(
    executor: &dyn StatementExecutor,
    plan: &StatementPlan,
    config: &TagSyncConfig,
    quiet: bool,
) -> Result<WriteReport> {
    let pb = progress_bar(plan.set.len() as u64, "Writing tags", quiet);
    let mut writer = TagWriter::new(executor)
        .with_pre_statements(config.warehouse.pre_statements.clone())
        .with_apply(config.writeback.apply);
    if let Some(bar) = pb.clone() {
        writer = writer.with_progress(Box::new(move |done, _total| bar.set_position(done as u64)));
    }

    let report = writer.apply(plan).await.context("Pre-statement failed")?;
    finish_progress(pb);
    Ok(report)
}

fn print_summary(session: &CatalogSession<'_>, report: &WriteReport, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!();
    eprintln!("Sync summary");
    eprintln!("{}", "=".repeat(40));
    eprintln!("  Pre-statements:    {}", report.pre_statements);
    eprintln!(
        "  Unset statements:  {} ({} failed)",
        report.unset_executed + report.unset_failed,
        report.unset_failed
    );
    eprintln!("  Statements run:    {}", report.executed);
    if report.not_applied > 0 {
        eprintln!("  Not applied:       {}", report.not_applied);
    }
    eprintln!("  Records skipped:   {}", session.skipped());
    if !report.failed.is_empty() {
        eprintln!("  Failed:            {}", report.failed.len());
        for failure in &report.failed {
            eprintln!("    {}", failure.statement);
            eprintln!("      {}", failure.error);
        }
    }
}

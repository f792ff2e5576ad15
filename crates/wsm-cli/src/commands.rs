use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use wsm_migrate::{verify_store, MigrationConfig, MigrationReport, Migrator, RuleSet};
use wsm_store::{Credentials, JsonFileStore};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Migrate(args) => cmd_migrate(args, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(args: &RunArgs) -> anyhow::Result<MigrationConfig> {
    let mut config = match &args.config {
        Some(path) => MigrationConfig::load(path)?,
        None => MigrationConfig::default(),
    };
    if args.commit {
        config.dry_run = false;
    }
    if let Some(name) = &args.rules {
        config.rules = RuleSet::preset(name)
            .with_context(|| format!("unknown rule preset {name:?} (expected baseline or full)"))?;
    }
    if args.show_no_workspace_changes {
        config.suppress_no_workspace_id_change_output = false;
    }
    Ok(config)
}

fn cmd_migrate(args: MigrateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = build_config(&args.run)?;
    let store = JsonFileStore::open(&args.store)
        .with_context(|| format!("cannot open store {}", args.store.display()))?;
    let mut migrator = Migrator::new(config);
    if let (Some(user), Some(password)) = (args.user, args.password) {
        migrator = migrator.with_credentials(Credentials::new(user, password));
    }

    let dry_run = migrator.config().dry_run;
    if dry_run && format == OutputFormat::Text {
        println!(
            "{}",
            "***In DRY RUN mode - no changes will be made to the store".yellow().bold()
        );
    }

    let report = match migrator.run(&store) {
        Ok(report) => report,
        Err(abort) => {
            if format == OutputFormat::Text {
                for line in abort.log.lines() {
                    println!("{line}");
                }
            }
            // The dump is only written for completed runs.
            return Err(abort).context(format!(
                "{} left unchanged",
                args.store.display()
            ));
        }
    };

    if !dry_run {
        store
            .flush()
            .with_context(|| format!("cannot write store {}", args.store.display()))?;
    }

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    for line in report.log.lines() {
        println!("{line}");
    }
    println!();
    for stage in &report.stages {
        println!(
            "  {} scanned {:>6}  modified {:>6}  deleted {:>6}",
            format!("{:<12}", stage.name).bold(),
            stage.stats.scanned,
            stage.stats.modified,
            stage.stats.deleted,
        );
    }
    let verb = if report.dry_run { "Simulated" } else { "Committed" };
    println!(
        "{} {} {} changes ({} type renames, {} object renames)",
        "✓".green().bold(),
        verb,
        report.log.len().to_string().bold(),
        report.type_renames,
        report.ledger_entries,
    );
    println!("  Digest: {}", report.digest_hex().cyan());
    if report.dry_run {
        println!(
            "{}",
            "***In DRY RUN mode - no changes were made to the store".yellow().bold()
        );
    }
}

fn report_json(report: &MigrationReport) -> serde_json::Value {
    let stages: Vec<_> = report
        .stages
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "scanned": s.stats.scanned,
                "modified": s.stats.modified,
                "deleted": s.stats.deleted,
            })
        })
        .collect();
    json!({
        "dry_run": report.dry_run,
        "phase": report.phase.to_string(),
        "changes": report.log.lines(),
        "digest": report.digest_hex(),
        "type_renames": report.type_renames,
        "ledger_entries": report.ledger_entries,
        "stages": stages,
    })
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = JsonFileStore::open(&args.store)
        .with_context(|| format!("cannot open store {}", args.store.display()))?;
    let report = verify_store(&store)?;

    match format {
        OutputFormat::Text => {
            for v in &report.violations {
                println!("{} {v}", "✗".red());
            }
            if report.is_valid() {
                println!(
                    "{} {} documents satisfy the current schema",
                    "✓".green().bold(),
                    report.documents_checked
                );
            }
        }
        OutputFormat::Json => {
            let violations: Vec<_> = report
                .violations
                .iter()
                .map(|v| {
                    json!({
                        "collection": v.collection.name(),
                        "kind": format!("{:?}", v.kind),
                        "description": v.description,
                    })
                })
                .collect();
            let body = json!({
                "documents_checked": report.documents_checked,
                "violations": violations,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    if !report.is_valid() {
        bail!("{} violations found", report.violations.len());
    }
    Ok(())
}

fn cmd_config(args: RunArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

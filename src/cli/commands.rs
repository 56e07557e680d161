//! Command dispatch

use std::io;

use clap::CommandFactory;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::{CloneErrorKind, CloneReport, TreeCloner};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{Forest, GlobalKey, GroupKey, LinkRecord};
use crate::infrastructure::di::ServiceContainer;

/// Parse-level entry point: loads settings, builds the container, runs the command.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `linkclone --help`".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => config_command(&load_settings(cli)?, command),
        other => {
            let container = ServiceContainer::new(load_settings(cli)?);
            run(&container, other)
        }
    }
}

/// Settings from config layers, with `--store` applied last.
pub fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config_file.as_deref())?;
    if let Some(store) = &cli.store {
        settings.store_path = store.clone();
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

/// Run a store-backed command against `container`.
pub fn run(container: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Clone {
            source,
            target,
            label,
            dry_run,
        } => {
            let label = label.clone().unwrap_or_else(|| target.to_string());
            if *dry_run {
                plan_clone(container, source, target)
            } else {
                clone_links(container, source, target, &label)
            }
        }
        Commands::Check { group } => check(container, group),
        Commands::List { group } => list(container, group),
        Commands::Tree { group } => tree(container, group),
        Commands::Add {
            group,
            title,
            uri,
            parent,
            weight,
            expanded,
        } => add(container, group, title, uri, parent.as_ref(), *weight, *expanded),
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::Usage(
            "command does not use the link store".into(),
        )),
    }
}

#[instrument(skip(container))]
fn clone_links(
    container: &ServiceContainer,
    source: &GroupKey,
    target: &GroupKey,
    label: &str,
) -> CliResult<()> {
    let cloner = container.tree_cloner();
    if !cloner.check_availability(source) {
        output::warning(&format!("Menu links are not available in {source} menu."));
        return Err(CliError::CloneFailed {
            kind: CloneErrorKind::SourceGroupEmpty,
            message: format!("no links in {source}"),
        });
    }

    let report = cloner.clone_group(source, target);
    print_report_details(&report);

    if report.success {
        output::success(&format!("Links are cloned successfully for {label} menu."));
        output::detail(&format!(
            "{} link(s) created in {}",
            report.cloned_count, report.target
        ));
        if report.is_partial() {
            output::warning(&format!(
                "{} link(s) could not be created",
                report.failures.len()
            ));
        }
        verify_shape(&cloner, &report);
        return Ok(());
    }

    output::warning(&format!(
        "Unable to clone links for {label}, please try again or contact the site administrator."
    ));
    let kind = report.error.unwrap_or(CloneErrorKind::PersistenceFailure);
    let message = report.detail.clone().unwrap_or_else(|| {
        format!(
            "{} of {} link(s) created",
            report.cloned_count,
            report.cloned_count + report.failures.len()
        )
    });
    Err(CliError::CloneFailed { kind, message })
}

fn print_report_details(report: &CloneReport) {
    for failure in &report.failures {
        output::failure(&format!(
            "{} (copy of {}): {}",
            failure.global_key, failure.source_key, failure.message
        ));
    }
    for dangling in &report.dangling {
        output::failure(dangling);
    }
}

/// Compare the target tree with the source shape recorded in the report.
fn verify_shape(cloner: &TreeCloner, report: &CloneReport) {
    let target = match cloner.fetch_group(&report.target) {
        Ok(fetch) => fetch.records,
        Err(e) => {
            output::warning(&format!("cannot re-read {}: {}", report.target, e));
            return;
        }
    };
    match Forest::from_records(&target) {
        Ok(forest) if forest.shape_digest() == report.shape_digest => {
            output::success_detail(&format!("{} matches source tree shape", report.target));
        }
        Ok(_) => output::warning(&format!(
            "{} does not match the source tree shape (group was not empty?)",
            report.target
        )),
        Err(e) => output::warning(&format!("{} is not a valid tree: {}", report.target, e)),
    }
}

fn plan_clone(container: &ServiceContainer, source: &GroupKey, target: &GroupKey) -> CliResult<()> {
    let plan = container.tree_cloner().plan(source, target)?;
    output::header(&format!(
        "Would create {} link(s) in {} (copy of {})",
        plan.links.len(),
        plan.target,
        plan.source
    ));
    for link in &plan.links {
        let parent = link
            .record
            .parent_ref
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        output::detail(&format!(
            "{} <- {}  parent {}  {}",
            link.record.global_key,
            link.source_key,
            parent,
            link.record.title().unwrap_or("")
        ));
    }
    output::detail(&format!("shape {}", plan.shape_digest));
    Ok(())
}

fn check(container: &ServiceContainer, group: &GroupKey) -> CliResult<()> {
    if container.tree_cloner().check_availability(group) {
        output::success(&format!("{group}: links available"));
        Ok(())
    } else {
        Err(CliError::Unavailable(group.to_string()))
    }
}

fn list(container: &ServiceContainer, group: &GroupKey) -> CliResult<()> {
    let fetch = container.tree_cloner().fetch_group(group)?;
    if !fetch.found {
        output::info(&format!("no links in {group}"));
        return Ok(());
    }
    for record in fetch.records.iter().sorted_by_key(|r| r.id) {
        let id = record.id.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
        let parent = record
            .parent_ref
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        output::info(&format!(
            "{id}\t{}\t{parent}\t{}",
            record.global_key,
            record.title().unwrap_or("")
        ));
    }
    Ok(())
}

fn tree(container: &ServiceContainer, group: &GroupKey) -> CliResult<()> {
    let fetch = container.tree_cloner().fetch_group(group)?;
    let forest = Forest::from_records(&fetch.records).map_err(ApplicationError::from)?;
    output::header(&format!("{group} ({} link(s))", forest.len()));
    for tree in forest.display_trees() {
        output::info(&tree);
    }
    Ok(())
}

fn add(
    container: &ServiceContainer,
    group: &GroupKey,
    title: &str,
    uri: &str,
    parent: Option<&GlobalKey>,
    weight: i64,
    expanded: bool,
) -> CliResult<()> {
    if let Some(parent) = parent {
        let fetch = container.tree_cloner().fetch_group(group)?;
        if !fetch.records.iter().any(|r| &r.global_key == parent) {
            return Err(CliError::InvalidArgs(format!(
                "parent {parent} is not a link in {group}"
            )));
        }
    }

    let mut record = LinkRecord::new(container.keys.generate(), group.clone())
        .with_attribute("title", title)
        .with_attribute("link", serde_json::json!({ "uri": uri }))
        .with_attribute("weight", weight)
        .with_attribute("expanded", expanded)
        .with_attribute("enabled", true);
    record.parent_ref = parent.copied();
    let key = record.global_key;

    let id = container
        .repository
        .create(record)
        .map_err(ApplicationError::from)?;
    output::action("Added", &format!("{title} [{key}] id {id} in {group}"));
    Ok(())
}

fn config_command(settings: &Settings, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(unavailable)".into());
            output::info(&format!("global config: {global}"));
            output::info(&format!("link store:    {}", settings.store_path.display()));
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

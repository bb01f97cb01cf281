//! Fleet commands: `forest leaves`, `toggle`, `migrate`, `targets`,
//! `branches`, `species`, `defaults`, `status`, `create`.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use forest::config::ForestConfig;
use forest::fleet::{CreateLeaf, Fleet, MutationOutcome, RefreshOutcome, ToggleOutcome};
use forest::ui::{self, icons};

use super::dispatcher;

async fn loaded_fleet(config: &ForestConfig) -> Result<Fleet> {
    let fleet = Fleet::new(dispatcher(config));
    fleet.refresh().await.context("Failed to load leaves")?;
    Ok(fleet)
}

fn print_leaves(fleet: &Fleet) -> Result<()> {
    let leaves = fleet.leaves()?;
    if leaves.is_empty() {
        println!("No leaves.");
        return Ok(());
    }
    for leaf in &leaves {
        println!("{}", ui::leaf_line(leaf));
    }
    Ok(())
}

fn print_rejection(action: &str, result: &str, payload: &serde_json::Map<String, Value>) {
    println!(
        "{}{} {}",
        icons::CROSS,
        style(format!("{action} rejected:")).red().bold(),
        result
    );
    if !payload.is_empty() {
        println!("  {}", style(Value::Object(payload.clone())).dim());
    }
}

pub async fn cmd_leaves(config: &ForestConfig) -> Result<()> {
    let fleet = loaded_fleet(config).await?;
    print_leaves(&fleet)
}

pub async fn cmd_toggle(config: &ForestConfig, name: &str) -> Result<()> {
    let fleet = loaded_fleet(config).await?;
    match fleet.toggle(name).await? {
        ToggleOutcome::Toggled(Some(leaf)) => println!("{}{}", icons::CHECK, ui::leaf_line(&leaf)),
        ToggleOutcome::Toggled(None) => {
            if let Some(leaf) = fleet.leaf(name)? {
                println!("{}{}", icons::CHECK, ui::leaf_line(&leaf));
            }
        }
        ToggleOutcome::AlreadyBusy => {
            println!("{}Toggle for '{}' already in flight", icons::WARN, name)
        }
        ToggleOutcome::Rejected(response) => {
            print_rejection("Toggle", &response.result, &response.payload);
            anyhow::bail!("Toggle of '{}' was rejected", name);
        }
    }
    Ok(())
}

fn report_mutation(action: &str, outcome: MutationOutcome) -> Result<()> {
    match outcome {
        MutationOutcome::Done(RefreshOutcome::Applied { count, .. }) => {
            println!("{}{} done ({} leaves)", icons::CHECK, action, count);
            Ok(())
        }
        MutationOutcome::Done(RefreshOutcome::Stale { .. }) => {
            println!("{}{} done", icons::CHECK, action);
            Ok(())
        }
        MutationOutcome::Rejected(response) => {
            print_rejection(action, &response.result, &response.payload);
            anyhow::bail!("{} was rejected", action)
        }
    }
}

pub async fn cmd_migrate(config: &ForestConfig, name: &str, destination: &str) -> Result<()> {
    let fleet = loaded_fleet(config).await?;
    fleet.load_branches().await.context("Failed to load branches")?;

    let targets = fleet.migration_targets(name)?;
    if !targets.iter().any(|b| b.name == destination) {
        // Advisory only: the backend has the final say.
        println!(
            "{}'{}' is not a listed target for '{}'",
            icons::WARN,
            destination,
            name
        );
    }

    let outcome = fleet.migrate(name, destination).await?;
    report_mutation("Migration", outcome)?;
    print_leaves(&fleet)
}

pub async fn cmd_targets(config: &ForestConfig, name: &str) -> Result<()> {
    let fleet = loaded_fleet(config).await?;
    fleet.load_branches().await.context("Failed to load branches")?;
    let targets = fleet.migration_targets(name)?;
    if targets.is_empty() {
        println!("No branches accept '{}'.", name);
    }
    for branch in &targets {
        println!("{}", ui::branch_line(branch));
    }
    Ok(())
}

pub async fn cmd_branches(config: &ForestConfig) -> Result<()> {
    let fleet = Fleet::new(dispatcher(config));
    let branches = fleet.load_branches().await.context("Failed to load branches")?;
    if branches.is_empty() {
        println!("No branches.");
    }
    for branch in &branches {
        println!("{}", ui::branch_line(branch));
    }
    Ok(())
}

pub async fn cmd_species(config: &ForestConfig) -> Result<()> {
    let fleet = Fleet::new(dispatcher(config));
    let species = fleet.species().await.context("Failed to load species")?;
    for s in &species {
        println!("{}", ui::species_line(s));
    }
    Ok(())
}

/// Settings template a new leaf of `species_id` starts from.
pub async fn cmd_defaults(config: &ForestConfig, species_id: &str) -> Result<()> {
    let fleet = Fleet::new(dispatcher(config));
    let settings = fleet
        .default_settings(species_id)
        .await
        .context("Failed to load default settings")?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

pub async fn cmd_status(config: &ForestConfig) -> Result<()> {
    let fleet = Fleet::new(dispatcher(config));
    let servers = fleet.status().await.context("Failed to load status")?;
    if servers.is_empty() {
        println!("No servers reported.");
    }
    for server in &servers {
        println!("{}", ui::server_line(server));
    }
    Ok(())
}

pub struct CreateArgs<'a> {
    pub name: &'a str,
    pub species: &'a str,
    pub address: &'a [String],
    pub branch: &'a [String],
    pub desc: Option<&'a str>,
    pub settings: Option<&'a str>,
}

pub async fn cmd_create(config: &ForestConfig, args: CreateArgs<'_>) -> Result<()> {
    let mut leaf = CreateLeaf::new(args.name, args.species);
    leaf.address = args.address.to_vec();
    leaf.branch = args.branch.to_vec();
    if let Some(desc) = args.desc {
        leaf.desc = desc.to_string();
    }
    if let Some(settings) = args.settings {
        leaf.settings = serde_json::from_str(settings).context("--settings must be JSON")?;
    }

    let fleet = Fleet::new(dispatcher(config));
    let outcome = fleet.create(leaf).await?;
    report_mutation("Create", outcome)?;
    print_leaves(&fleet)
}

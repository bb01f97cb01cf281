//! Log and settings commands: `forest logs`, `branch-logs`, `settings`.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use forest::config::ForestConfig;
use forest::fleet::{Fleet, MutationOutcome};
use forest::logs::{LogFeed, LogSource, format_line};
use forest::ui::icons;

use super::{dispatcher, resources};

fn print_feed(feed: &LogFeed) {
    if feed.is_empty() {
        println!("No log records.");
        return;
    }
    for event in feed.events() {
        println!("{}", format_line(event));
    }
}

/// Leaf logs, newest page plus `older` earlier pages.
pub async fn cmd_logs(
    config: &ForestConfig,
    leaf_id: &str,
    older: usize,
    rest: bool,
) -> Result<()> {
    let feed = if rest {
        let client = resources(config);
        let mut feed = LogFeed::from_newest_first(
            client.leaf_logs(leaf_id, None).await.context("Failed to load logs")?,
        );
        for _ in 0..older {
            let Some(cursor) = feed.oldest_id().map(str::to_string) else {
                break;
            };
            let page = client.leaf_logs(leaf_id, Some(&cursor)).await?;
            if feed.prepend_older(page) == 0 {
                break;
            }
        }
        feed
    } else {
        let dispatcher = dispatcher(config);
        let source = LogSource::Leaf(leaf_id.to_string());
        let mut feed = source.load(&dispatcher).await.context("Failed to load logs")?;
        for _ in 0..older {
            if feed.is_empty() || source.load_older(&dispatcher, &mut feed).await? == 0 {
                break;
            }
        }
        feed
    };
    print_feed(&feed);
    Ok(())
}

pub async fn cmd_branch_logs(config: &ForestConfig, name: &str) -> Result<()> {
    let feed = LogSource::Branch(name.to_string())
        .load(&dispatcher(config))
        .await
        .context("Failed to load branch logs")?;
    print_feed(&feed);
    Ok(())
}

/// Show a leaf's settings, or replace them with `set`.
/// Show a leaf's settings, or replace them with `set`.
///
/// Goes over the command channel unless `rest` picks the `/api` endpoints.
pub async fn cmd_settings(
    config: &ForestConfig,
    leaf_id: &str,
    set: Option<&str>,
    rest: bool,
) -> Result<()> {
    let update = set
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--set must be JSON")?;

    if rest {
        let client = resources(config);
        let settings = match update {
            Some(value) => {
                let saved = client.save_leaf_settings(leaf_id, &value).await?;
                println!("{}{}", icons::CHECK, style("Settings saved").green());
                saved
            }
            None => client
                .leaf_settings(leaf_id)
                .await
                .context("Failed to load settings")?,
        };
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let fleet = Fleet::new(dispatcher(config));
    match update {
        Some(value) => match fleet.save_leaf_settings(leaf_id, value).await? {
            MutationOutcome::Done(_) => {
                println!("{}{}", icons::CHECK, style("Settings saved").green());
            }
            MutationOutcome::Rejected(response) => {
                println!("{}{}", icons::CROSS, style("Settings rejected").red().bold());
                anyhow::bail!("set_leaf_settings failed with result '{}'", response.result)
            }
        },
        None => {
            let settings = fleet
                .leaf_settings(leaf_id)
                .await
                .context("Failed to load settings")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

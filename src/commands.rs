use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Subcommand;
use fever_client::{
    client::{BulkFetch, ClientConfig, FetchDirection, FeverApi, ItemMark, ItemQuery},
    Feed, FeedId, Group, GroupId, Item, ItemId,
};
use serde::Serialize;
use tracing::info;

use crate::{
    config::{save_config, AppConfig},
    result::{AppError, Result},
};

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Store host and credentials in the configuration file
    Init {
        #[arg(long)]
        host: String,
        #[arg(long)]
        username: String,
        /// API password as configured on the server
        #[arg(long)]
        password: String,
    },
    /// Verify the credentials against the server
    Check,
    /// List feeds with their group
    Feeds,
    /// List groups and the feeds they contain
    Groups,
    /// Fetch one page of items
    Items {
        /// Items with a greater id
        #[arg(long, conflicts_with_all = ["max_id", "with_ids", "since"])]
        since_id: Option<ItemId>,
        /// Items with a smaller id
        #[arg(long, conflicts_with_all = ["with_ids", "since"])]
        max_id: Option<ItemId>,
        /// Comma separated item ids
        #[arg(long, value_delimiter = ',')]
        with_ids: Vec<ItemId>,
        /// Items stored after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        since: Option<DateTime<Utc>>,
    },
    /// Fetch all unread items
    Unread,
    /// Fetch all saved items
    Saved,
    /// Page through every item
    All {
        /// Stop after this many items
        #[arg(long)]
        max: Option<usize>,
        /// Time budget in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Walk from the newest item down
        #[arg(long)]
        backward: bool,
    },
    /// Mark an item read, unread, saved or unsaved
    Mark { id: ItemId, state: ItemMark },
    /// Mark a feed read
    MarkFeed {
        id: FeedId,
        /// Only items stored before this date, defaults to now
        #[arg(long, value_parser = parse_date)]
        before: Option<DateTime<Utc>>,
    },
    /// Mark a group read
    MarkGroup {
        id: GroupId,
        #[arg(long, value_parser = parse_date)]
        before: Option<DateTime<Utc>>,
    },
}

/// How records are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub async fn run(
    command: Command,
    config_path: &PathBuf,
    app_config: AppConfig,
    client_config: impl FnOnce(AppConfig) -> Result<ClientConfig>,
    format: OutputFormat,
) -> Result<()> {
    if let Command::Init { host, username, password } = command {
        let config = AppConfig { host, username, password, ..app_config };
        config.validate().map_err(AppError::ConfigError)?;
        save_config(config_path, &config)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    let api = FeverApi::new(client_config(app_config)?)?;

    match command {
        Command::Init { .. } => Ok(()),
        Command::Check => {
            api.check_auth().await?;
            println!("Authenticated against {}", api.config().endpoint_url());
            Ok(())
        },
        Command::Feeds => print_records(&api.get_feeds().await?, format, format_feed),
        Command::Groups => print_records(&api.get_groups().await?, format, format_group),
        Command::Items { since_id, max_id, with_ids, since } => {
            let items = match since {
                Some(date) => api.get_items_since(date).await?,
                None => {
                    let query = ItemQuery::new()
                        .with_since_id(since_id)
                        .with_max_id(max_id)
                        .with_ids(with_ids);
                    api.get_items(&query).await?
                },
            };
            print_records(&items, format, format_item)
        },
        Command::Unread => print_records(&api.get_unread_items().await?, format, format_item),
        Command::Saved => print_records(&api.get_saved_items().await?, format, format_item),
        Command::All { max, timeout, backward } => {
            let direction = if backward { FetchDirection::Backward } else { FetchDirection::Forward };
            let report = BulkFetch::builder(&api)
                .direction(direction)
                .max_items(max)
                .timeout(Duration::from_secs(timeout))
                .build()
                .run()
                .await?;

            print_records(&report.items, format, format_item)?;
            eprintln!(
                "{} items in {} pages, {:.2}s{}",
                report.items.len(),
                report.pages,
                report.elapsed.as_secs_f64(),
                if report.timed_out { " (time budget reached)" } else { "" }
            );
            if let Some(span) = report.span_secs() {
                eprintln!("Items span {:.1} days", span as f64 / 86_400.0);
            }
            Ok(())
        },
        Command::Mark { id, state } => {
            api.mark_item(id, state).await?;
            info!(id = %id, state = state.as_str(), "Item marked");
            println!("Marked item {id} as {}", state.as_str());
            Ok(())
        },
        Command::MarkFeed { id, before } => {
            api.mark_feed_read(id, before.unwrap_or_else(Utc::now)).await?;
            println!("Marked feed {id} as read");
            Ok(())
        },
        Command::MarkGroup { id, before } => {
            api.mark_group_read(id, before.unwrap_or_else(Utc::now)).await?;
            println!("Marked group {id} as read");
            Ok(())
        },
    }
}

fn print_records<T: Serialize>(
    records: &[T],
    format: OutputFormat,
    line: fn(&T) -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Text => records.iter().for_each(|record| println!("{}", line(record))),
    }
    Ok(())
}

/// Accept RFC 3339 timestamps or plain dates, which mean midnight UTC
pub fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date {raw:?}, expected YYYY-MM-DD or RFC 3339"))
}

fn format_item(item: &Item) -> String {
    let created = item
        .created_at()
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".repeat(16));
    let flags = format!(
        "{}{}",
        if item.is_read { ' ' } else { 'U' },
        if item.is_saved { '*' } else { ' ' }
    );

    format!("{:>16}  {created}  {flags}  {}\n{:>18}{}", item.id, item.title, "", item.url)
}

fn format_feed(feed: &Feed) -> String {
    let group = feed
        .group_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".into());
    format!("{:>5}  group {:>4}  {}  <{}>", feed.id, group, feed.title, feed.url)
}

fn format_group(group: &Group) -> String {
    format!("{:>5}  {} ({} feeds)", group.id, group.title, group.feed_ids.len())
}

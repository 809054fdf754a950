// Fever API reference: https://web.archive.org/web/20230616124016/https://feedafever.com/api
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::id::{parse_id_list, FeedId, GroupId, ItemId};

/// Items created before 2000-01-01 carry a bogus date on most servers.
pub const MINIMUM_VALID_TIMESTAMP: i64 = 946_684_800;

/// Snapshot of a single entry as the server saw it at fetch time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub feed_id: FeedId,
    pub title: CompactString,
    pub author: CompactString,
    pub html: String,
    pub url: CompactString,
    pub is_saved: bool,
    pub is_read: bool,
    pub created_on_time: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Feed {
    pub id: FeedId,
    pub favicon_id: Option<u32>,
    pub title: CompactString,
    pub url: CompactString,
    pub site_url: CompactString,
    pub is_spark: bool,
    pub last_updated_on_time: i64,
    /// Group the feed is filed under, if any
    pub group_id: Option<GroupId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub title: CompactString,
    pub feed_ids: Vec<FeedId>,
}

impl Item {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_on_time, 0)
    }

    /// Storage time encoded in the item id.
    pub fn id_datetime(&self) -> Option<DateTime<Utc>> {
        self.id.to_datetime()
    }

    /// Plain text rendition of the html body.
    pub fn readable(&self) -> String {
        html_to_text(&self.html)
    }
}

// Wire formats

/// Fields common to every Fever response, with the call specific payload
/// flattened alongside.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub api_version: u32,
    #[serde(default, deserialize_with = "flag")]
    pub auth: bool,
    #[serde(default, deserialize_with = "optional_int")]
    pub last_refreshed_on_time: Option<i64>,
    #[serde(flatten)]
    pub payload: T,
}

/// Payload of calls whose answer is just the envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoPayload {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemsPayload {
    #[serde(default)]
    pub items: Vec<ItemDto>,
    #[serde(default, deserialize_with = "optional_int")]
    pub total_items: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsPayload {
    #[serde(default)]
    pub feeds: Vec<FeedDto>,
    #[serde(default)]
    pub feeds_groups: Vec<FeedsGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupsPayload {
    #[serde(default)]
    pub groups: Vec<GroupDto>,
    #[serde(default)]
    pub feeds_groups: Vec<FeedsGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnreadItemIdsPayload {
    #[serde(default)]
    pub unread_item_ids: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedItemIdsPayload {
    #[serde(default)]
    pub saved_item_ids: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDto {
    pub id: ItemId,
    pub feed_id: FeedId,
    #[serde(default, deserialize_with = "nullable")]
    pub title: CompactString,
    #[serde(default, deserialize_with = "nullable")]
    pub author: CompactString,
    #[serde(default, deserialize_with = "nullable")]
    pub html: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: CompactString,
    #[serde(default, deserialize_with = "flag")]
    pub is_saved: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "int")]
    pub created_on_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedDto {
    pub id: FeedId,
    #[serde(default, deserialize_with = "optional_int")]
    pub favicon_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub title: CompactString,
    #[serde(default, deserialize_with = "nullable")]
    pub url: CompactString,
    #[serde(default, deserialize_with = "nullable")]
    pub site_url: CompactString,
    #[serde(default, deserialize_with = "flag")]
    pub is_spark: bool,
    #[serde(default, deserialize_with = "int")]
    pub last_updated_on_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupDto {
    pub id: GroupId,
    #[serde(default, deserialize_with = "nullable")]
    pub title: CompactString,
}

/// One row of the group to feeds relation, `feed_ids` is comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsGroup {
    pub group_id: GroupId,
    #[serde(default, deserialize_with = "nullable")]
    pub feed_ids: String,
}

impl From<ItemDto> for Item {
    fn from(dto: ItemDto) -> Self {
        Self {
            id: dto.id,
            feed_id: dto.feed_id,
            title: dto.title,
            author: dto.author,
            html: dto.html,
            url: dto.url,
            is_saved: dto.is_saved,
            is_read: dto.is_read,
            created_on_time: dto.created_on_time,
        }
    }
}

impl FeedsGroup {
    pub fn feed_ids(&self) -> Vec<FeedId> {
        // a malformed relation row should not sink the whole listing
        parse_id_list(&self.feed_ids).unwrap_or_default()
    }
}

impl FeedsPayload {
    /// Resolve each feed's group through the `feeds_groups` relation.
    pub fn into_feeds(self) -> Vec<Feed> {
        let group_of: HashMap<FeedId, GroupId> = self
            .feeds_groups
            .iter()
            .flat_map(|fg| fg.feed_ids().into_iter().map(move |feed| (feed, fg.group_id)))
            .collect();

        self.feeds
            .into_iter()
            .map(|dto| Feed {
                group_id: group_of.get(&dto.id).copied(),
                id: dto.id,
                favicon_id: dto.favicon_id.and_then(|id| u32::try_from(id).ok()),
                title: dto.title,
                url: dto.url,
                site_url: dto.site_url,
                is_spark: dto.is_spark,
                last_updated_on_time: dto.last_updated_on_time,
            })
            .collect()
    }
}

impl GroupsPayload {
    pub fn into_groups(self) -> Vec<Group> {
        let mut feeds_of: HashMap<GroupId, Vec<FeedId>> = HashMap::new();
        for fg in &self.feeds_groups {
            feeds_of.entry(fg.group_id).or_default().extend(fg.feed_ids());
        }

        self.groups
            .into_iter()
            .map(|dto| Group {
                feed_ids: feeds_of.remove(&dto.id).unwrap_or_default(),
                id: dto.id,
                title: dto.title,
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawScalar {
    fn into_i64<E: de::Error>(self) -> Result<i64, E> {
        match self {
            RawScalar::Bool(b) => Ok(i64::from(b)),
            RawScalar::Int(n) => Ok(n),
            RawScalar::Float(f) => Ok(f as i64),
            RawScalar::Text(s) if s.trim().is_empty() => Ok(0),
            RawScalar::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected an integer, got {s:?}"))),
        }
    }
}

/// 0/1, true/false or "0"/"1"
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(int(deserializer)? != 0)
}

fn int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawScalar>::deserialize(deserializer)? {
        Some(raw) => raw.into_i64::<D::Error>(),
        None => Ok(0),
    }
}

fn optional_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawScalar>::deserialize(deserializer)?
        .map(|raw| raw.into_i64::<D::Error>())
        .transpose()
}

/// Servers send `null` for missing text fields.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "tr", "table", "blockquote", "pre", "hr", "h1", "h2",
    "h3", "h4", "h5", "h6", "section", "article", "header", "footer", "figure", "figcaption",
];

/// Strip tags and decode entities. Block level tags become line breaks,
/// `script` and `style` bodies are dropped and blank lines are removed.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut skipping: Option<String> = None;
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        if skipping.is_none() {
            push_text(&mut out, &rest[..start]);
        }

        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = &after[..end];
        rest = &after[end + 1..];

        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if let Some(skipped) = &skipping {
            if closing && *skipped == name {
                skipping = None;
            }
            continue;
        }

        if !closing && (name == "script" || name == "style") {
            skipping = Some(name);
        } else if BLOCK_TAGS.contains(&name.as_str()) {
            out.push('\n');
        }
    }

    if skipping.is_none() {
        push_text(&mut out, rest);
    }

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(out: &mut String, raw: &str) {
    let decoded = html_escape::decode_html_entities(raw);
    let mut last_was_space = out.ends_with(' ') || out.ends_with('\n');

    for c in decoded.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
}

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Item identifier. Fever servers such as FreshRSS assign item ids from the
/// microsecond timestamp at which the entry was stored.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct ItemId {
    value: u64,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct FeedId {
    value: u32,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct GroupId {
    value: u32,
}

impl ItemId {
    pub fn new(id: u64) -> Self { Self { value: id } }

    pub fn value(self) -> u64 { self.value }

    /// The smallest item id stored at or after `datetime`.
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        let micros = datetime.timestamp_micros().max(0) as u64;
        Self::new(micros)
    }

    /// Timestamp encoded in the id, `None` when it is out of chrono's range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let micros = i64::try_from(self.value).ok()?;
        Utc.timestamp_micros(micros).single()
    }
}

impl FeedId {
    pub fn new(id: u32) -> Self { Self { value: id } }

    pub fn value(self) -> u32 { self.value }
}

impl GroupId {
    pub fn new(id: u32) -> Self { Self { value: id } }

    pub fn value(self) -> u32 { self.value }
}

/// Fever implementations disagree on whether ids are JSON numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_u64<E: de::Error>(self) -> Result<u64, E> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid numeric id: {s:?}"))),
        }
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<ItemId, D::Error>
        where D: Deserializer<'de>,
    {
        let id = RawId::deserialize(deserializer)?.into_u64::<D::Error>()?;
        Ok(ItemId::new(id))
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D>(deserializer: D) -> Result<FeedId, D::Error>
        where D: Deserializer<'de>,
    {
        let id = RawId::deserialize(deserializer)?.into_u64::<D::Error>()?;
        let id = u32::try_from(id).map_err(|_| <D::Error as de::Error>::custom("feed id out of range"))?;
        Ok(FeedId::new(id))
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D>(deserializer: D) -> Result<GroupId, D::Error>
        where D: Deserializer<'de>,
    {
        let id = RawId::deserialize(deserializer)?.into_u64::<D::Error>()?;
        let id = u32::try_from(id).map_err(|_| <D::Error as de::Error>::custom("group id out of range"))?;
        Ok(GroupId::new(id))
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value)
    }
}

impl Serialize for FeedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.value)
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.value)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemId::new)
    }
}

impl FromStr for FeedId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(FeedId::new)
    }
}

impl FromStr for GroupId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(GroupId::new)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

/// Parse a Fever comma-separated id list such as `"1,2,3"`.
///
/// Empty entries are skipped, so an empty string yields an empty list.
pub fn parse_id_list<T: FromStr>(raw: &str) -> Result<Vec<T>, T::Err> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

//! src/model.rs
use chrono::{Datelike, Days, NaiveDate};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub type SongId = u64;
pub type UserId = u64;

/// A well-formed play event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub song_id: SongId,
    pub user_id: UserId,
    pub country_code: String,
}

impl Event {
    pub fn new(song_id: SongId, user_id: UserId, country_code: &str) -> Self {
        Event {
            song_id,
            user_id,
            country_code: country_code.to_string(),
        }
    }
}

/// One `song_id|count` line of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardEntry {
    pub song_id: SongId,
    pub count: u64,
}

impl ShardEntry {
    pub fn new(song_id: SongId, count: u64) -> Self {
        ShardEntry { song_id, count }
    }
}

/// The dimension events are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Country,
    User,
}

impl KeyType {
    pub fn key_of<'a>(&self, event: &'a Event) -> Cow<'a, str> {
        match self {
            KeyType::Country => Cow::Borrowed(&event.country_code),
            KeyType::User => Cow::Owned(event.user_id.to_string()),
        }
    }

    /// Sub-directory of a day directory holding this key type's key directories.
    pub fn dir_name(&self) -> &'static str {
        match self {
            KeyType::Country => "countries",
            KeyType::User => "users",
        }
    }

    /// Tag embedded in shard file names.
    pub fn shard_tag(&self) -> &'static str {
        match self {
            KeyType::Country => "country",
            KeyType::User => "user_id",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Country => "country",
            KeyType::User => "user",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown key type '{0}', expected 'country' or 'user'")]
pub struct KeyTypeParseError(String);

impl FromStr for KeyType {
    type Err = KeyTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country" => Ok(KeyType::Country),
            "user" | "user_id" => Ok(KeyType::User),
            other => Err(KeyTypeParseError(other.to_string())),
        }
    }
}

/// A calendar day, rendered as `YYYYMMDD` everywhere on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Day(NaiveDate);

#[derive(Debug, thiserror::Error)]
#[error("Invalid day '{0}', expected YYYYMMDD or YYYY-MM-DD")]
pub struct DayParseError(String);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }

    pub fn parse(s: &str) -> Result<Self, DayParseError> {
        let invalid = || DayParseError(s.to_string());
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            let year = s[0..4].parse().map_err(|_| invalid())?;
            let month = s[4..6].parse().map_err(|_| invalid())?;
            let day = s[6..8].parse().map_err(|_| invalid())?;
            return Day::from_ymd(year, month, day).ok_or_else(invalid);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Day)
            .map_err(|_| invalid())
    }

    /// `YYYYMMDD`
    pub fn stamp(&self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }

    pub fn minus_days(self, n: u32) -> Option<Self> {
        self.0.checked_sub_days(Days::new(u64::from(n))).map(Day)
    }

    pub fn plus_days(self, n: u32) -> Option<Self> {
        self.0.checked_add_days(Days::new(u64::from(n))).map(Day)
    }

    /// The `len` days ending at (and including) `self`, oldest first.
    pub fn window(self, len: u32) -> Vec<Day> {
        (0..len)
            .rev()
            .filter_map(|offset| self.minus_days(offset))
            .collect()
    }

    /// Every day from `from` to `to` inclusive; empty when `from > to`.
    pub fn range_inclusive(from: Day, to: Day) -> Vec<Day> {
        let mut days = vec![];
        let mut current = from;
        while current <= to {
            days.push(current);
            match current.plus_days(1) {
                Some(next) => current = next,
                None => break,
            }
        }
        days
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stamp())
    }
}

impl FromStr for Day {
    type Err = DayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::parse(s)
    }
}

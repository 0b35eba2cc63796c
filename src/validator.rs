//! src/validator.rs
use crate::model::Event;

/// A row as read from a listen log, before any format checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub song_id: Option<String>,
    pub user_id: Option<String>,
    pub country_code: Option<String>,
}

impl RawRecord {
    pub fn new(song_id: &str, user_id: &str, country_code: &str) -> Self {
        RawRecord {
            song_id: Some(song_id.to_string()),
            user_id: Some(user_id.to_string()),
            country_code: Some(country_code.to_string()),
        }
    }

    /// Splits a `song_id|user_id|country_code` line. Missing columns stay `None`;
    /// anything past the second separator lands in `country_code`.
    pub fn parse_line(line: &str) -> Self {
        let mut fields = line.splitn(3, '|').map(str::to_string);
        RawRecord {
            song_id: fields.next(),
            user_id: fields.next(),
            country_code: fields.next(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub seen: u64,
    pub kept: u64,
    pub dropped: u64,
}

impl ValidationStats {
    pub fn merge(&mut self, other: &ValidationStats) {
        self.seen += other.seen;
        self.kept += other.kept;
        self.dropped += other.dropped;
    }
}

#[derive(Debug, Default)]
pub struct ValidatedBatch {
    pub events: Vec<Event>,
    pub stats: ValidationStats,
}

fn is_digits(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn is_country_code(field: &str) -> bool {
    field.len() == 2 && field.bytes().all(|b| b.is_ascii_uppercase())
}

fn parse_id(field: Option<&str>) -> Option<u64> {
    field.filter(|f| is_digits(f)).and_then(|f| f.parse().ok())
}

pub fn validate_record(record: &RawRecord) -> Option<Event> {
    let song_id = parse_id(record.song_id.as_deref());
    let user_id = parse_id(record.user_id.as_deref());
    let country_code = record.country_code.as_deref().filter(|c| is_country_code(c));
    match (song_id, user_id, country_code) {
        (Some(song_id), Some(user_id), Some(country_code)) => {
            Some(Event::new(song_id, user_id, country_code))
        }
        _ => None,
    }
}

/// Keeps the records whose three fields are all well formed, in input order.
/// Malformed records are dropped and only show up in the returned stats.
pub fn validate(records: &[RawRecord]) -> ValidatedBatch {
    let events: Vec<Event> = records.iter().filter_map(validate_record).collect();
    let seen = records.len() as u64;
    let kept = events.len() as u64;
    ValidatedBatch {
        events,
        stats: ValidationStats {
            seen,
            kept,
            dropped: seen - kept,
        },
    }
}

//! src/keys.rs
use crate::error::{PipelineError, StoreError};
use crate::model::{Day, KeyType};
use crate::storage::{check_key, ShardStore};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// The keys a reduce run considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyUniverse {
    /// A fixed list, ranked in list order. Keys outside it are ignored.
    Reference(Vec<String>),
    /// Whatever keys the store holds on any day of the window, in [`key_order`].
    Discovered,
}

impl KeyUniverse {
    pub fn load_reference(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(KeyUniverse::Reference(parse_reference(&text)))
    }

    pub fn resolve(
        &self,
        store: &dyn ShardStore,
        key_type: KeyType,
        window: &[Day],
    ) -> Result<Vec<String>, StoreError> {
        match self {
            KeyUniverse::Reference(keys) => Ok(keys.clone()),
            KeyUniverse::Discovered => {
                let mut keys = BTreeSet::new();
                for &day in window {
                    keys.extend(store.list_keys(day, key_type)?);
                }
                let mut keys: Vec<String> = keys.into_iter().collect();
                keys.sort_by(|a, b| key_order(a, b));
                Ok(keys)
            }
        }
    }
}

/// Shorter keys first, then lexicographic. User ids carry no leading zeros,
/// so they come out in numeric order; country codes are all two letters.
pub fn key_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Codes from a `Name,Code` CSV with a header row. Names may be quoted and
/// contain commas, so the code is the last field. `NA` is Namibia.
pub fn parse_reference(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .skip(1)
        .filter_map(|line| line.rsplit(',').next())
        .map(|code| code.trim().trim_matches('"').to_string())
        .filter(|code| check_key(code).is_ok())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

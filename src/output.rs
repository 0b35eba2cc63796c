//! src/output.rs
use crate::error::PipelineError;
use crate::model::{Day, KeyType};
use crate::reducers::RankedEntry;
use crate::storage::write_new_file;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// `key|song:count,song:count,...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub key: String,
    pub entries: Vec<RankedEntry>,
}

impl OutputRow {
    pub fn new(key: &str, entries: Vec<RankedEntry>) -> Self {
        OutputRow {
            key: key.to_string(),
            entries,
        }
    }
}

impl fmt::Display for OutputRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|", self.key)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// `{country|user}_top{K}_{YYYYMMDD}.txt`
pub fn ranking_file_name(key_type: KeyType, top_k: usize, day: Day) -> String {
    format!("{}_top{}_{}.txt", key_type.as_str(), top_k, day.stamp())
}

pub fn render(rows: &[OutputRow]) -> String {
    rows.iter().map(|row| format!("{row}\n")).collect()
}

/// Writes the whole ranking to a temporary file and renames it into place.
#[tracing::instrument(name = "Write ranking", skip(rows), fields(rows = rows.len()))]
pub fn write_ranking(
    output_dir: &Path,
    key_type: KeyType,
    top_k: usize,
    day: Day,
    rows: &[OutputRow],
) -> Result<PathBuf, PipelineError> {
    let output_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PipelineError::Output { path, source }
    };
    fs::create_dir_all(output_dir).map_err(output_error(output_dir))?;

    let path = output_dir.join(ranking_file_name(key_type, top_k, day));
    let tmp = output_dir.join(format!(
        ".{}.{}.partial",
        ranking_file_name(key_type, top_k, day),
        Uuid::new_v4()
    ));
    let written = write_new_file(&tmp, render(rows).as_bytes())
        .map_err(output_error(tmp.as_path()))
        .and_then(|()| fs::rename(&tmp, &path).map_err(output_error(path.as_path())));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written?;
    Ok(path)
}

//! src/file_splitter.rs
use crate::error::PipelineError;
use crate::model::Day;
use crate::validator::RawRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub fn listen_file_name(day: Day) -> String {
    format!("listen-{}.log", day.stamp())
}

pub fn listen_file_path(input_dir: &Path, day: Day) -> PathBuf {
    input_dir.join(listen_file_name(day))
}

/// A bounded slice of a listen log.
#[derive(Debug)]
pub struct Chunk {
    pub index: u32,
    pub records: Vec<RawRecord>,
}

pub struct FileSplitter {
    path: PathBuf,
    chunk_size: usize,
}

impl FileSplitter {
    pub fn new(path: PathBuf, chunk_size: usize) -> Self {
        FileSplitter {
            path,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn split(&self) -> Result<Chunks, PipelineError> {
        if !self.path.exists() {
            return Err(PipelineError::MissingInput {
                path: self.path.clone(),
            });
        }
        let file = File::open(&self.path).map_err(|source| PipelineError::Input {
            path: self.path.clone(),
            source,
        })?;
        Ok(Chunks {
            path: self.path.clone(),
            reader: BufReader::new(file),
            chunk_size: self.chunk_size,
            next_index: 0,
            done: false,
        })
    }
}

/// Yields chunks of at most `chunk_size` rows, indexed from 0.
#[derive(Debug)]
pub struct Chunks {
    path: PathBuf,
    reader: BufReader<File>,
    chunk_size: usize,
    next_index: u32,
    done: bool,
}

impl Chunks {
    fn read_chunk(&mut self) -> Result<Vec<RawRecord>, PipelineError> {
        let mut records = Vec::with_capacity(self.chunk_size.min(64 * 1024));
        let mut line = Vec::new();
        while records.len() < self.chunk_size {
            line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut line)
                .map_err(|source| PipelineError::Input {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                self.done = true;
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // Undecodable bytes become U+FFFD and fail validation downstream.
            records.push(RawRecord::parse_line(&String::from_utf8_lossy(&line)));
        }
        Ok(records)
    }
}

impl Iterator for Chunks {
    type Item = Result<Chunk, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(records) if records.is_empty() => None,
            Ok(records) => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Chunk { index, records }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

//! src/job.rs
use crate::configuration::Settings;
use crate::error::PipelineError;
use crate::file_splitter::{listen_file_path, Chunk, Chunks, FileSplitter};
use crate::keys::KeyUniverse;
use crate::mappers::{ChunkSummary, PartialAggregator};
use crate::model::{Day, KeyType};
use crate::output::{write_ranking, OutputRow};
use crate::reducers::WindowMerger;
use crate::storage::{ShardJournal, ShardStore};
use crate::validator::{validate, ValidationStats};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub chunk: u32,
    pub stats: ValidationStats,
    pub summaries: Vec<ChunkSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub day: Day,
    pub chunks: usize,
    pub stats: ValidationStats,
    pub shards_written: usize,
    /// Validated events per key, summed over the day's chunks.
    pub key_totals: BTreeMap<KeyType, BTreeMap<String, u64>>,
}

impl DayReport {
    fn new(day: Day) -> Self {
        DayReport {
            day,
            chunks: 0,
            stats: ValidationStats::default(),
            shards_written: 0,
            key_totals: BTreeMap::new(),
        }
    }

    fn add(&mut self, chunk: ChunkReport) {
        self.chunks += 1;
        self.stats.merge(&chunk.stats);
        for summary in chunk.summaries {
            self.shards_written += summary.shards_written;
            let totals = self.key_totals.entry(summary.key_type).or_default();
            for (key, count) in summary.key_totals {
                *totals.entry(key).or_insert(0) += count;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceReport {
    pub day: Day,
    pub key_type: KeyType,
    pub path: PathBuf,
    pub keys_considered: usize,
    pub rows: Vec<OutputRow>,
}

#[derive(Debug)]
pub struct RunReport {
    pub map: Vec<DayReport>,
    pub reduce: Vec<ReduceReport>,
}

fn task_error(e: JoinError) -> PipelineError {
    PipelineError::Task(e.to_string())
}

/// Drives the map phase per (day, chunk) and the reduce phase per
/// (target day, key type). The two phases share nothing but the store.
pub struct TopChartsJob {
    run_id: Uuid,
    settings: Settings,
    store: Arc<dyn ShardStore>,
    reference_keys: Option<KeyUniverse>,
}

impl TopChartsJob {
    pub fn new(settings: Settings, store: Arc<dyn ShardStore>) -> Result<Self, PipelineError> {
        let reference_keys = match &settings.storage.reference_keys {
            Some(path) => Some(KeyUniverse::load_reference(path)?),
            None => None,
        };
        Ok(TopChartsJob {
            run_id: Uuid::new_v4(),
            settings,
            store,
            reference_keys,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The reference list applies to countries only; users are discovered.
    pub fn universe(&self, key_type: KeyType) -> KeyUniverse {
        match (key_type, &self.reference_keys) {
            (KeyType::Country, Some(reference)) => reference.clone(),
            _ => KeyUniverse::Discovered,
        }
    }

    fn permits(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.settings.pipeline.parallelism))
    }

    #[tracing::instrument(name = "Map phase", skip_all, fields(run_id = %self.run_id, days = days.len()))]
    pub async fn run_map_phase(&self, days: &[Day]) -> Result<Vec<DayReport>, PipelineError> {
        let mut reports = Vec::with_capacity(days.len());
        for &day in days {
            reports.push(self.map_day(day).await?);
        }
        Ok(reports)
    }

    #[tracing::instrument(name = "Map day", skip(self), fields(run_id = %self.run_id))]
    pub async fn map_day(&self, day: Day) -> Result<DayReport, PipelineError> {
        let path = listen_file_path(&self.settings.storage.input_dir, day);
        let splitter = FileSplitter::new(path, self.settings.pipeline.chunk_size);
        let mut chunks = splitter.split()?;

        let permits = self.permits();
        let mut tasks = JoinSet::new();
        let mut report = DayReport::new(day);
        let spawned = async {
            loop {
                let permit = permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Task(e.to_string()))?;
                let (rest, next) = tokio::task::spawn_blocking(move || next_chunk(chunks))
                    .await
                    .map_err(task_error)?;
                chunks = rest;
                let chunk = match next {
                    Some(chunk) => chunk?,
                    None => break,
                };

                let store = Arc::clone(&self.store);
                let key_types = self.settings.pipeline.key_types.clone();
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    map_chunk(store.as_ref(), day, &key_types, chunk)
                });
                while let Some(done) = tasks.try_join_next() {
                    report.add(done.map_err(task_error)??);
                }
            }
            Ok::<(), PipelineError>(())
        }
        .await;

        // Chunks already handed to a blocking task run to completion.
        let mut failure = spawned.err();
        while let Some(done) = tasks.join_next().await {
            match done.map_err(task_error).and_then(|chunk| chunk) {
                Ok(chunk) => report.add(chunk),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            tracing::error!(error = %e, chunks = report.chunks, "map phase failed");
            return Err(e);
        }

        tracing::info!(
            chunks = report.chunks,
            rows = report.stats.seen,
            dropped = report.stats.dropped,
            shards = report.shards_written,
            "mapped day"
        );
        Ok(report)
    }

    #[tracing::instrument(name = "Reduce phase", skip(self), fields(run_id = %self.run_id))]
    pub async fn run_reduce_phase(
        &self,
        target: Day,
        key_type: KeyType,
    ) -> Result<ReduceReport, PipelineError> {
        let pipeline = &self.settings.pipeline;
        let merger = WindowMerger::new(key_type, pipeline.window_days, pipeline.top_k);
        let universe = self.universe(key_type);

        let store = Arc::clone(&self.store);
        let keys = tokio::task::spawn_blocking(move || {
            merger.candidate_keys(store.as_ref(), target, &universe)
        })
        .await
        .map_err(task_error)??;

        let permits = self.permits();
        let mut tasks = JoinSet::new();
        for (index, key) in keys.iter().cloned().enumerate() {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            let store = Arc::clone(&self.store);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                merger
                    .rank_key(store.as_ref(), target, &key)
                    .map(|row| (index, row))
            });
        }

        // Rows are finalised only once every key has merged.
        let mut ranked: BTreeMap<usize, OutputRow> = BTreeMap::new();
        while let Some(done) = tasks.join_next().await {
            if let (index, Some(row)) = done.map_err(task_error)?? {
                ranked.insert(index, row);
            }
        }
        let rows: Vec<OutputRow> = ranked.into_values().collect();

        let output_dir = self.settings.storage.output_dir.clone();
        let top_k = pipeline.top_k;
        let written = rows.clone();
        let path = tokio::task::spawn_blocking(move || {
            write_ranking(&output_dir, key_type, top_k, target, &written)
        })
        .await
        .map_err(task_error)??;

        tracing::info!(
            keys = keys.len(),
            active = rows.len(),
            path = %path.display(),
            "wrote ranking"
        );
        Ok(ReduceReport {
            day: target,
            key_type,
            path,
            keys_considered: keys.len(),
            rows,
        })
    }

    /// Maps every day of `from..=to`, then reduces each day whose whole
    /// window lies inside the range.
    #[tracing::instrument(name = "Run", skip(self), fields(run_id = %self.run_id))]
    pub async fn run(&self, from: Day, to: Day) -> Result<RunReport, PipelineError> {
        let days = Day::range_inclusive(from, to);
        let map = self.run_map_phase(&days).await?;

        let mut reduce = vec![];
        let window_days = self.settings.pipeline.window_days;
        if let Some(first) = from.plus_days(window_days.saturating_sub(1)) {
            for &day in days.iter().filter(|&&d| d >= first) {
                for &key_type in &self.settings.pipeline.key_types {
                    reduce.push(self.run_reduce_phase(day, key_type).await?);
                }
            }
        }
        if reduce.is_empty() {
            tracing::warn!("no day in the range has a complete window, nothing reduced");
        }
        Ok(RunReport { map, reduce })
    }
}

fn next_chunk(mut chunks: Chunks) -> (Chunks, Option<Result<Chunk, PipelineError>>) {
    let next = chunks.next();
    (chunks, next)
}

fn map_chunk(
    store: &dyn ShardStore,
    day: Day,
    key_types: &[KeyType],
    chunk: Chunk,
) -> Result<ChunkReport, PipelineError> {
    let batch = validate(&chunk.records);
    drop(chunk.records);
    let mut summaries = Vec::with_capacity(key_types.len());
    let mut journal = ShardJournal::new();
    for &key_type in key_types {
        let processed = PartialAggregator::new(key_type).process(
            store,
            day,
            chunk.index,
            &batch.events,
            &mut journal,
        );
        match processed {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                tracing::warn!(chunk = chunk.index, error = %e, "rolling back chunk");
                journal.roll_back(store);
                return Err(e.into());
            }
        }
    }
    tracing::info!(
        chunk = chunk.index,
        rows = batch.stats.seen,
        dropped = batch.stats.dropped,
        "mapped chunk"
    );
    Ok(ChunkReport {
        chunk: chunk.index,
        stats: batch.stats,
        summaries,
    })
}

//! tests/api/helpers.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use topcharts::configuration::{PipelineSettings, Settings, StorageSettings, TelemetrySettings};
use topcharts::job::TopChartsJob;
use topcharts::model::{Day, KeyType};
use topcharts::storage::{FsShardStore, ShardStore};
use topcharts::telemetry::init_tracing;

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let settings = TelemetrySettings {
        log_filter: "warn".to_string(),
        otlp_endpoint: None,
    };
    init_tracing("tests::api", &settings).expect("Failed to setup tracing");
});

pub fn test_data_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("data");
    path
}

pub fn day(stamp: &str) -> Day {
    Day::parse(stamp).expect("Failed to parse day")
}

pub struct TestPipeline {
    pub root: PathBuf,
    pub settings: Settings,
}

impl TestPipeline {
    pub fn new(top_k: usize, chunk_size: usize, key_types: Vec<KeyType>) -> Self {
        LazyLock::force(&TRACING);
        let root = PathBuf::from(format!("/tmp/topcharts/{}", uuid::Uuid::new_v4()));
        let input_dir = root.join("dataset");
        std::fs::create_dir_all(&input_dir).expect("Failed to create test directory");
        let settings = Settings {
            pipeline: PipelineSettings {
                window_days: 7,
                top_k,
                chunk_size,
                parallelism: 3,
                key_types,
            },
            storage: StorageSettings {
                shard_root: input_dir.join("interm"),
                output_dir: root.join("out"),
                input_dir,
                reference_keys: None,
            },
            telemetry: TelemetrySettings::default(),
        };
        TestPipeline { root, settings }
    }

    pub fn with_reference_keys(mut self) -> Self {
        let mut path = test_data_dir();
        path.push("iso_codes.csv");
        self.settings.storage.reference_keys = Some(path);
        self
    }

    pub fn write_day(&self, day: Day, lines: &[String]) {
        let path = self
            .settings
            .storage
            .input_dir
            .join(format!("listen-{}.log", day.stamp()));
        let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
        std::fs::write(path, body).expect("Failed to write listen log");
    }

    pub fn store(&self) -> FsShardStore {
        FsShardStore::new(&self.settings.storage.shard_root)
    }

    pub fn job(&self) -> TopChartsJob {
        let store: Arc<dyn ShardStore> = Arc::new(self.store());
        TopChartsJob::new(self.settings.clone(), store).expect("Failed to build job")
    }

    pub fn teardown(self) {
        std::fs::remove_dir_all(&self.root).expect("Failed to delete dirs");
    }
}

/// Sums every shard of `key` on `day`, per song.
pub fn stored_counts(
    store: &dyn ShardStore,
    day: Day,
    key_type: KeyType,
    key: &str,
) -> HashMap<u64, u64> {
    let mut totals = HashMap::new();
    for shard in store
        .list_shards(day, key_type, key)
        .expect("Failed to list shards")
    {
        for entry in store.read_shard(&shard).expect("Failed to read shard") {
            *totals.entry(entry.song_id).or_insert(0) += entry.count;
        }
    }
    totals
}

/// Deterministic pseudo-random listen logs.
pub struct ListenGenerator {
    state: u64,
    countries: Vec<&'static str>,
}

impl ListenGenerator {
    pub fn new(seed: u64, countries: &[&'static str]) -> Self {
        ListenGenerator {
            state: seed,
            countries: countries.to_vec(),
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    /// `(song_id, user_id, country)` with popular songs skewed towards low ids.
    pub fn event(&mut self) -> (u64, u64, &'static str) {
        let song = self.below(40).min(self.below(40));
        let user = self.below(50);
        let index = self.below(self.countries.len() as u64) as usize;
        let country = self.countries[index];
        (song, user, country)
    }

    /// `rows` lines, every thirteenth one malformed. Returns the lines and the
    /// well-formed events among them.
    pub fn day(&mut self, rows: usize) -> (Vec<String>, Vec<(u64, u64, &'static str)>) {
        let mut lines = Vec::with_capacity(rows);
        let mut events = vec![];
        for i in 0..rows {
            let (song, user, country) = self.event();
            if i % 13 == 12 {
                let broken = match i % 4 {
                    0 => format!("s{song}|{user}|{country}"),
                    1 => format!("{song}|-{user}|{country}"),
                    2 => format!("{song}|{user}|{}", country.to_lowercase()),
                    _ => format!("{song}|{user}"),
                };
                lines.push(broken);
            } else {
                lines.push(format!("{song}|{user}|{country}"));
                events.push((song, user, country));
            }
        }
        (lines, events)
    }
}

/// `key|song:count,...` computed directly from raw events.
pub fn expected_row(key: &str, counts: &HashMap<u64, u64>, top_k: usize) -> String {
    let mut ranked: Vec<(u64, u64)> = counts.iter().map(|(&s, &c)| (s, c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_k);
    let body: Vec<String> = ranked.iter().map(|(s, c)| format!("{s}:{c}")).collect();
    format!("{key}|{}", body.join(","))
}

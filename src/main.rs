//! src/main.rs
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use topcharts::configuration::get_configuration;
use topcharts::job::TopChartsJob;
use topcharts::model::{Day, KeyType};
use topcharts::storage::FsShardStore;
use topcharts::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "topcharts", about = "Per-key top songs over a trailing window of days")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn each day's listen log into per-key shards.
    Map(DayRange),
    /// Rank each day of the range from the shards of its window.
    Reduce {
        #[command(flatten)]
        range: DayRange,
        /// Only this key type instead of every configured one.
        #[arg(long)]
        key_type: Option<KeyType>,
    },
    /// Map the whole range, then reduce every day with a complete window.
    Run(DayRange),
}

#[derive(Args, Debug)]
struct DayRange {
    /// First day, YYYYMMDD or YYYY-MM-DD.
    #[arg(long)]
    from: Day,
    /// Last day, inclusive.
    #[arg(long)]
    to: Day,
}

impl DayRange {
    fn days(&self) -> anyhow::Result<Vec<Day>> {
        if self.from > self.to {
            anyhow::bail!("--from {} is after --to {}", self.from, self.to);
        }
        Ok(Day::range_inclusive(self.from, self.to))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = get_configuration().context("Failed to read configuration")?;
    let tracer_provider = init_tracing("topcharts", &configuration.telemetry)?;

    let store = Arc::new(FsShardStore::new(&configuration.storage.shard_root));
    let job = TopChartsJob::new(configuration, store).context("Failed to set up job")?;

    match cli.command {
        Command::Map(range) => {
            let days = range.days()?;
            job.run_map_phase(&days).await.context("Map phase failed")?;
        }
        Command::Reduce { range, key_type } => {
            let key_types = match key_type {
                Some(key_type) => vec![key_type],
                None => job.settings().pipeline.key_types.clone(),
            };
            for day in range.days()? {
                for &key_type in &key_types {
                    job.run_reduce_phase(day, key_type)
                        .await
                        .with_context(|| format!("Reduce phase failed for {key_type} on {day}"))?;
                }
            }
        }
        Command::Run(range) => {
            range.days()?;
            job.run(range.from, range.to).await.context("Run failed")?;
        }
    }

    if let Some(provider) = tracer_provider {
        provider.shutdown().context("Failed to flush traces")?;
    }
    Ok(())
}

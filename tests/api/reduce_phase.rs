//! tests/api/reduce_phase.rs
use crate::helpers::{day, TestPipeline};
use claims::{assert_matches, assert_ok};
use std::fs;
use topcharts::error::{PipelineError, StoreError};
use topcharts::model::KeyType;

fn repeat(line: &str, times: usize) -> Vec<String> {
    vec![line.to_string(); times]
}

/// FR plays song 1 three times on the 1st, then song 1 twice and song 2 five
/// times on the 4th.
async fn scenario(top_k: usize) -> TestPipeline {
    let pipeline = TestPipeline::new(top_k, 4, vec![KeyType::Country]);
    let first = day("20120901");
    let fourth = day("20120904");
    pipeline.write_day(first, &repeat("1|1|FR", 3));
    let mut lines = repeat("1|2|FR", 2);
    lines.extend(repeat("2|3|FR", 5));
    pipeline.write_day(fourth, &lines);

    let job = pipeline.job();
    job.map_day(first).await.expect("Failed to map day");
    job.map_day(fourth).await.expect("Failed to map day");
    pipeline
}

#[tokio::test]
async fn ties_are_ranked_by_song_id_in_the_written_file() {
    // Arrange
    let pipeline = scenario(2).await;

    // Act
    let report = pipeline
        .job()
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await
        .expect("Failed to reduce");

    // Assert
    assert_eq!(report.path, pipeline.settings.storage.output_dir.join("country_top2_20120907.txt"));
    assert_eq!(report.keys_considered, 1);
    let written = fs::read_to_string(&report.path).expect("Failed to read ranking");
    assert_eq!(written, "FR|1:5,2:5\n");
    pipeline.teardown();
}

#[tokio::test]
async fn top_k_bounds_each_row() {
    let pipeline = scenario(1).await;

    let report = pipeline
        .job()
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await
        .expect("Failed to reduce");

    let written = fs::read_to_string(&report.path).expect("Failed to read ranking");
    assert_eq!(written, "FR|1:5\n");
    pipeline.teardown();
}

#[tokio::test]
async fn rerunning_a_reduce_rewrites_an_identical_file() {
    let pipeline = scenario(50).await;
    let job = pipeline.job();

    let first = job
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await
        .expect("Failed to reduce");
    let before = fs::read(&first.path).expect("Failed to read ranking");
    let second = job
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await
        .expect("Failed to reduce");
    let after = fs::read(&second.path).expect("Failed to read ranking");

    assert_eq!(first.path, second.path);
    assert_eq!(before, after);
    pipeline.teardown();
}

#[tokio::test]
async fn days_outside_the_window_do_not_count() {
    let pipeline = scenario(50).await;

    // The 1st is seven days before the 8th and falls out of its window.
    let report = pipeline
        .job()
        .run_reduce_phase(day("20120908"), KeyType::Country)
        .await
        .expect("Failed to reduce");

    let written = fs::read_to_string(&report.path).expect("Failed to read ranking");
    assert_eq!(written, "FR|2:5,1:2\n");
    pipeline.teardown();
}

#[tokio::test]
async fn a_window_without_activity_writes_an_empty_ranking() {
    let pipeline = scenario(50).await;

    let report = pipeline
        .job()
        .run_reduce_phase(day("20120920"), KeyType::Country)
        .await
        .expect("Failed to reduce");

    assert!(report.rows.is_empty());
    let written = fs::read_to_string(&report.path).expect("Failed to read ranking");
    assert_eq!(written, "");
    pipeline.teardown();
}

#[tokio::test]
async fn reference_keys_without_activity_are_omitted() {
    let pipeline = scenario(50).await.with_reference_keys();

    let report = pipeline
        .job()
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await
        .expect("Failed to reduce");

    assert_eq!(report.keys_considered, 5);
    let keys: Vec<&str> = report.rows.iter().map(|row| row.key.as_str()).collect();
    assert_eq!(keys, vec!["FR"]);
    pipeline.teardown();
}

#[tokio::test]
async fn a_corrupt_shard_fails_the_reduce_without_output() {
    let pipeline = scenario(50).await;
    let key_dir = pipeline
        .settings
        .storage
        .shard_root
        .join("listen-20120905/countries/DE");
    fs::create_dir_all(&key_dir).expect("Failed to create key dir");
    fs::write(key_dir.join("top-20120905-country-0.csv"), "7|1\nnot a shard row\n")
        .expect("Failed to write shard");

    let result = pipeline
        .job()
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await;

    assert_matches!(
        result,
        Err(PipelineError::Store(StoreError::CorruptShard { line: 2, .. }))
    );
    assert!(!pipeline
        .settings
        .storage
        .output_dir
        .join("country_top50_20120907.txt")
        .exists());
    pipeline.teardown();
}

#[tokio::test]
async fn an_unwritable_output_dir_fails_the_reduce() {
    let mut pipeline = scenario(50).await;
    let blocker = pipeline.root.join("not-a-dir");
    fs::write(&blocker, "").expect("Failed to create blocker");
    pipeline.settings.storage.output_dir = blocker.clone();

    let result = pipeline
        .job()
        .run_reduce_phase(day("20120907"), KeyType::Country)
        .await;

    assert_matches!(result, Err(PipelineError::Output { .. }));
    assert!(blocker.is_file());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "");
    pipeline.teardown();
}

#[tokio::test]
async fn user_rows_are_in_numeric_user_order() {
    let pipeline = TestPipeline::new(50, 100, vec![KeyType::User]);
    let d = day("20120903");
    let lines: Vec<String> = ["4|20|FR", "4|3|DE", "5|3|DE", "5|3|US"]
        .iter()
        .map(ToString::to_string)
        .collect();
    pipeline.write_day(d, &lines);
    let job = pipeline.job();
    assert_ok!(job.map_day(d).await);

    let report = job
        .run_reduce_phase(d, KeyType::User)
        .await
        .expect("Failed to reduce");

    assert_eq!(report.path, pipeline.settings.storage.output_dir.join("user_top50_20120903.txt"));
    let written = fs::read_to_string(&report.path).expect("Failed to read ranking");
    assert_eq!(written, "3|5:2,4:1\n20|4:1\n");
    pipeline.teardown();
}

//! tests/api/pipeline.rs
use crate::helpers::{day, expected_row, ListenGenerator, TestPipeline};
use std::collections::HashMap;
use std::fs;
use topcharts::model::{Day, KeyType};
use topcharts::storage::ShardStore;

const COUNTRIES: [&str; 5] = ["US", "FR", "XX", "NA", "DE"];

#[tokio::test]
async fn run_matches_a_brute_force_ranking_of_every_complete_window() {
    // Arrange
    let top_k = 5;
    let pipeline = TestPipeline::new(top_k, 64, vec![KeyType::Country, KeyType::User])
        .with_reference_keys();
    let from = day("20120901");
    let to = day("20120908");
    let mut generator = ListenGenerator::new(2012, &COUNTRIES);
    let mut events_by_day = HashMap::new();
    for d in Day::range_inclusive(from, to) {
        let (lines, events) = generator.day(400);
        pipeline.write_day(d, &lines);
        events_by_day.insert(d, events);
    }

    // Act
    let report = pipeline.job().run(from, to).await.expect("Run failed");

    // Assert
    assert_eq!(report.map.len(), 8);
    let reduced: Vec<(Day, KeyType)> = report.reduce.iter().map(|r| (r.day, r.key_type)).collect();
    assert_eq!(
        reduced,
        vec![
            (day("20120907"), KeyType::Country),
            (day("20120907"), KeyType::User),
            (day("20120908"), KeyType::Country),
            (day("20120908"), KeyType::User),
        ]
    );

    for target in [day("20120907"), day("20120908")] {
        let mut by_country: HashMap<&str, HashMap<u64, u64>> = HashMap::new();
        let mut by_user: HashMap<u64, HashMap<u64, u64>> = HashMap::new();
        for d in target.window(7) {
            for &(song, user, country) in &events_by_day[&d] {
                *by_country.entry(country).or_default().entry(song).or_insert(0) += 1;
                *by_user.entry(user).or_default().entry(song).or_insert(0) += 1;
            }
        }

        // Reference order from tests/data/iso_codes.csv; XX is not listed.
        let expected: String = ["FR", "DE", "NA", "US"]
            .iter()
            .map(|&country| format!("{}\n", expected_row(country, &by_country[country], top_k)))
            .collect();
        let path = pipeline
            .settings
            .storage
            .output_dir
            .join(format!("country_top{top_k}_{}.txt", target.stamp()));
        assert_eq!(fs::read_to_string(path).expect("Failed to read ranking"), expected);

        let mut users: Vec<u64> = by_user.keys().copied().collect();
        users.sort_unstable();
        let expected: String = users
            .iter()
            .map(|user| format!("{}\n", expected_row(&user.to_string(), &by_user[user], top_k)))
            .collect();
        let path = pipeline
            .settings
            .storage
            .output_dir
            .join(format!("user_top{top_k}_{}.txt", target.stamp()));
        assert_eq!(fs::read_to_string(path).expect("Failed to read ranking"), expected);
    }

    // Unlisted keys are still mapped.
    let mapped = pipeline.store().list_keys(from, KeyType::Country).unwrap();
    assert!(mapped.contains(&"XX".to_string()));
    pipeline.teardown();
}

#[tokio::test]
async fn ranges_shorter_than_the_window_map_but_do_not_reduce() {
    let pipeline = TestPipeline::new(50, 100, vec![KeyType::Country]);
    let from = day("20121001");
    let to = day("20121003");
    let mut generator = ListenGenerator::new(3, &["FR"]);
    for d in Day::range_inclusive(from, to) {
        pipeline.write_day(d, &generator.day(20).0);
    }

    let report = pipeline.job().run(from, to).await.expect("Run failed");

    assert_eq!(report.map.len(), 3);
    assert!(report.reduce.is_empty());
    assert!(!pipeline.settings.storage.output_dir.exists());
    pipeline.teardown();
}

use rust_map_reduce::execution::{Job, JobOptions, JobState};
use rust_map_reduce::jobs::item_pairs;
use rust_map_reduce::processing::OutputOrder;
use rust_map_reduce::{execute, execute_with_options, JobError};

fn pairs(source: &str, threshold: usize) -> Vec<String> {
    execute(source, item_pairs::mapper, item_pairs::reducer(threshold)).unwrap()
}

#[test]
fn item_pairs_over_fixture_file() {
    assert_eq!(
        pairs("tests/fixtures/baskets.txt", 2),
        vec!["beer/chips", "bread/eggs", "bread/milk", "eggs/milk"]
    );
}

#[test]
fn raising_the_threshold_keeps_only_frequent_pairs() {
    assert_eq!(pairs("tests/fixtures/baskets.txt", 4), vec!["bread/milk"]);
    assert!(pairs("tests/fixtures/baskets.txt", 5).is_empty());
}

#[test]
fn default_threshold_reports_nothing_for_small_inputs() {
    assert!(pairs("tests/fixtures/baskets.txt", item_pairs::DEFAULT_THRESHOLD).is_empty());
}

#[test]
fn split_input_directory_matches_single_file() {
    assert_eq!(
        pairs("tests/fixtures/baskets.txt", 2),
        pairs("tests/fixtures/baskets_split", 2)
    );
}

#[test]
fn completion_order_yields_the_same_set() {
    let opts = JobOptions {
        output_order: OutputOrder::Completion,
        chunk_size: 1,
        ..JobOptions::with_workers(4)
    };
    let mut pairs = execute_with_options(
        "tests/fixtures/baskets.txt",
        item_pairs::mapper,
        item_pairs::reducer(2),
        opts,
    )
    .unwrap();
    pairs.sort();
    assert_eq!(pairs, vec!["beer/chips", "bread/eggs", "bread/milk", "eggs/milk"]);
}

#[test]
fn malformed_basket_reports_file_and_line() {
    let mut job = Job::new(item_pairs::mapper, item_pairs::reducer(0));
    let err = job.run("tests/fixtures/malformed.txt").unwrap_err();

    match &err {
        JobError::Mapper { record, .. } => {
            assert_eq!(record.line, 2);
            assert_eq!(record.text, "bread milk eggs");
            assert!(record.origin.as_deref().is_some_and(|p| p.ends_with("malformed.txt")));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 4);
    assert_eq!(err.stage(), "map");
    assert_eq!(job.state(), JobState::Failed);
}

#[test]
fn csv_and_json_lines_output() {
    let sink = Job::new(item_pairs::mapper, item_pairs::reducer(3))
        .run("tests/fixtures/baskets.txt")
        .unwrap();

    let mut csv_out = Vec::new();
    sink.write_csv(&mut csv_out).unwrap();
    assert_eq!(String::from_utf8(csv_out).unwrap(), "bread/milk\n");

    let mut json_out = Vec::new();
    sink.write_json_lines(&mut json_out).unwrap();
    assert_eq!(String::from_utf8(json_out).unwrap(), "\"bread/milk\"\n");
}

#![allow(clippy::unwrap_used)]

use super::*;
use crate::import::source::parse_csv;

fn sample_csv(rows: usize) -> String {
    let mut text = String::from("Date,Description,Amount\n");
    for i in 0..rows {
        text.push_str(&format!("2026-01-{:02},Vendor {i},-{i}.25\n", (i % 28) + 1));
    }
    text
}

#[test]
fn test_stream_matches_sync_parse() {
    let text = sample_csv(50);
    let (stream, _abort) = CsvStream::start(text.clone(), StreamOptions { chunk_bytes: 64 }).unwrap();
    let mut progress_calls = 0;
    let outcome = stream.run(|_| progress_calls += 1);

    assert!(!outcome.aborted);
    assert_eq!(outcome.row_count, 50);
    assert_eq!(outcome.parsed, parse_csv(&text).unwrap());
    assert!(progress_calls > 1, "expected several yields, got {progress_calls}");
}

#[test]
fn test_stream_progress_is_monotonic() {
    let (stream, _abort) = CsvStream::start(sample_csv(30), StreamOptions { chunk_bytes: 40 }).unwrap();
    let mut seen: Vec<StreamProgress> = Vec::new();
    stream.run(|p| seen.push(*p));
    for pair in seen.windows(2) {
        assert!(pair[1].rows_parsed >= pair[0].rows_parsed);
        assert!(pair[1].bytes_consumed > pair[0].bytes_consumed);
    }
    assert!(seen.iter().all(|p| p.bytes_consumed <= p.total_bytes));
}

#[test]
fn test_stream_abort_returns_partial_rows() {
    let (stream, abort) = CsvStream::start(sample_csv(100), StreamOptions { chunk_bytes: 32 }).unwrap();
    let outcome = stream.run(|p| {
        if p.rows_parsed >= 10 {
            abort.abort();
        }
    });
    assert!(outcome.aborted);
    assert!(outcome.row_count >= 10);
    assert!(outcome.row_count < 100);
    assert_eq!(outcome.row_count, outcome.parsed.rows.len());
}

#[test]
fn test_stream_abort_before_first_chunk() {
    let (mut stream, abort) = CsvStream::start(sample_csv(5), StreamOptions { chunk_bytes: 1024 }).unwrap();
    abort.abort();
    match stream.poll_chunk() {
        StreamPoll::Ready(outcome) => {
            assert!(outcome.aborted);
            assert_eq!(outcome.row_count, 0);
        }
        StreamPoll::Pending(_) => panic!("expected the stream to stop"),
    }
}

#[test]
fn test_stream_collects_parse_errors() {
    let text = "a,b\n1,2\n3\n4,5\n".to_string();
    let (stream, _abort) = CsvStream::start(text, StreamOptions { chunk_bytes: 2 }).unwrap();
    let outcome = stream.run(|_| {});
    assert_eq!(outcome.row_count, 2);
    assert_eq!(outcome.parsed.errors.len(), 1);
    assert_eq!(outcome.parsed.errors[0].line(), Some(3));
}

#[test]
fn test_stream_empty_source_is_fatal() {
    assert!(CsvStream::start(String::new(), StreamOptions { chunk_bytes: 8 }).is_err());
}

#[test]
fn test_should_stream_thresholds() {
    let settings = Settings {
        stream_auto_line_threshold: 10,
        stream_auto_byte_threshold: 1_000,
        ..Settings::default()
    };
    assert!(!should_stream(&sample_csv(3), &settings));
    assert!(should_stream(&sample_csv(20), &settings));
    assert!(should_stream(&"x".repeat(2_000), &settings));
}

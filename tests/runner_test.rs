use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use csvrunner::{ResultItem, RunnerConfig, RunnerError, RunnerState, TaskRunner, WorkItem};

fn write_input(dir: &Path, rows: &[Vec<String>]) -> std::path::PathBuf {
    let path = dir.join("todo.csv");
    let content: String = rows.iter().map(|r| format!("{}\n", r.join(","))).collect();
    std::fs::write(&path, content).unwrap();
    path
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn numbered_rows(n: usize) -> Vec<Vec<String>> {
    (0..n).map(|i| vec![format!("item{}", i), i.to_string()]).collect()
}

fn exclaim(item: &WorkItem) -> anyhow::Result<ResultItem> {
    Ok(vec![item[0].clone(), format!("{}!", item[1])])
}

#[tokio::test]
async fn test_two_rows_two_workers() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &[
        vec!["a".into(), "1".into()],
        vec!["b".into(), "2".into()],
    ]);
    let output = dir.path().join("done.csv");

    let config = RunnerConfig::default().with_max_workers(2);
    let runner = TaskRunner::new(&input, &output, exclaim, config).unwrap();
    let report = runner.run().await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(runner.state(), RunnerState::Drained);

    let mut lines: Vec<String> = std::fs::read_to_string(&output).unwrap()
        .lines().map(str::to_string).collect();
    lines.sort();
    assert_eq!(lines, vec!["a,1!", "b,2!"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_row_written_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let rows = numbered_rows(200);
    let input = write_input(dir.path(), &rows);
    let output = dir.path().join("done.csv");

    let config = RunnerConfig::default().with_max_workers(8);
    let runner = TaskRunner::new(&input, &output, exclaim, config).unwrap();
    runner.run().await.unwrap();

    let written = read_rows(&output);
    assert_eq!(written.len(), rows.len());

    let expected: HashSet<Vec<String>> = rows.iter().map(|r| exclaim(r).unwrap()).collect();
    let actual: HashSet<Vec<String>> = written.into_iter().collect();
    assert_eq!(actual, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_never_interleave() {
    const FIELDS: usize = 12;
    let dir = tempfile::tempdir().unwrap();
    let rows = numbered_rows(300);
    let input = write_input(dir.path(), &rows);
    let output = dir.path().join("done.csv");

    let wide = |item: &WorkItem| -> anyhow::Result<ResultItem> {
        std::thread::sleep(Duration::from_millis(2));
        // Long fields with commas and quotes force quoting on every one
        Ok((0..FIELDS)
            .map(|k| format!("{}-{}, \"{}\"", item[0], k, "x".repeat(256)))
            .collect())
    };

    let config = RunnerConfig::default().with_max_workers(32);
    let runner = TaskRunner::new(&input, &output, wide, config).unwrap();
    runner.run().await.unwrap();

    let written = read_rows(&output);
    assert_eq!(written.len(), rows.len());
    for row in &written {
        assert_eq!(row.len(), FIELDS);
        let owner = row[0].split('-').next().unwrap();
        for (k, field) in row.iter().enumerate() {
            assert_eq!(field, &format!("{}-{}, \"{}\"", owner, k, "x".repeat(256)));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bounded_by_max_workers() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(40));
    let output = dir.path().join("done.csv");

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (active.clone(), peak.clone());
    let tracked = move |item: &WorkItem| -> anyhow::Result<ResultItem> {
        let now = a.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        a.fetch_sub(1, Ordering::SeqCst);
        Ok(item.clone())
    };

    let config = RunnerConfig::default().with_max_workers(3);
    let runner = TaskRunner::new(&input, &output, tracked, config).unwrap();
    assert_eq!(runner.config().max_workers, 3);
    runner.run().await.unwrap();

    // 40 rows of 50 ms each keep all three workers busy at once
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rerun_duplicates_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(5));
    let output = dir.path().join("done.csv");

    for _ in 0..2 {
        let runner = TaskRunner::with_defaults(&input, &output, exclaim).unwrap();
        runner.run().await.unwrap();
    }

    assert_eq!(read_rows(&output).len(), 10);
}

#[tokio::test]
async fn test_empty_input_leaves_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("todo.csv");
    std::fs::write(&input, "").unwrap();
    let output = dir.path().join("done.csv");

    let runner = TaskRunner::with_defaults(&input, &output, exclaim).unwrap();
    let report = runner.run().await.unwrap();

    assert_eq!(report.total, 0);
    assert!(report.is_success());
    assert!(!output.exists());
    assert_eq!(runner.state(), RunnerState::Drained);
}

#[tokio::test]
async fn test_failing_item_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(6));
    let output = dir.path().join("done.csv");

    let picky = |item: &WorkItem| -> anyhow::Result<ResultItem> {
        if item[0] == "item3" {
            anyhow::bail!("cannot process {}", item[0]);
        }
        exclaim(item)
    };

    let config = RunnerConfig::default().with_max_workers(2);
    let runner = TaskRunner::new(&input, &output, picky, config).unwrap();
    let err = runner.run().await.unwrap_err();

    assert_eq!(runner.state(), RunnerState::Failed);
    match err {
        RunnerError::ItemsFailed { failed, total, report } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 6);
            assert_eq!(report.succeeded, 5);
            assert_eq!(report.failures[0].index, 3);
            assert_eq!(report.failures[0].item, vec!["item3".to_string(), "3".to_string()]);
            assert_eq!(report.failures[0].phase, "process");
            assert!(report.failures[0].error.contains("cannot process item3"));
        },
        other => panic!("unexpected error: {}", other),
    }

    let written = read_rows(&output);
    assert_eq!(written.len(), 5);
    assert!(written.iter().all(|row| row[0] != "item3"));
}

#[tokio::test]
async fn test_panicking_item_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(4));
    let output = dir.path().join("done.csv");

    let fragile = |item: &WorkItem| -> anyhow::Result<ResultItem> {
        if item[0] == "item0" {
            panic!("worker blew up");
        }
        exclaim(item)
    };

    let runner = TaskRunner::with_defaults(&input, &output, fragile).unwrap();
    let err = runner.run().await.unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);
    assert_eq!(read_rows(&output).len(), 3);
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(3));
    // A directory cannot be appended to
    let output = dir.path().join("done");
    std::fs::create_dir(&output).unwrap();

    let runner = TaskRunner::with_defaults(&input, &output, exclaim).unwrap();
    let err = runner.run().await.unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 3);
    assert!(report.failures.iter().all(|f| f.phase == "write"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(4));
    let output = dir.path().join("done.csv");

    let slow = |item: &WorkItem| -> anyhow::Result<ResultItem> {
        std::thread::sleep(Duration::from_millis(300));
        exclaim(item)
    };

    let config = RunnerConfig::default()
        .with_max_workers(1)
        .with_batch_timeout(Some(Duration::from_millis(100)));
    let runner = TaskRunner::new(&input, &output, slow, config).unwrap();
    let err = runner.run().await.unwrap_err();

    assert!(matches!(err, RunnerError::TimeoutError { millis: 100, .. }));
    assert_eq!(err.phase(), "timeout");
    assert_eq!(runner.state(), RunnerState::Failed);

    // The item already running is not interrupted
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(read_rows(&output).len(), 1);
}

#[tokio::test]
async fn test_independent_runners_share_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &numbered_rows(20));
    let first = TaskRunner::with_defaults(&input, dir.path().join("one.csv"), exclaim).unwrap();
    let second = TaskRunner::with_defaults(&input, dir.path().join("two.csv"), exclaim).unwrap();

    let (a, b) = tokio::join!(first.run(), second.run());
    assert_eq!(a.unwrap().succeeded, 20);
    assert_eq!(b.unwrap().succeeded, 20);
    assert_eq!(read_rows(&dir.path().join("one.csv")).len(), 20);
    assert_eq!(read_rows(&dir.path().join("two.csv")).len(), 20);
}

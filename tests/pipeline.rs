//! End-to-end tests of the extraction loop and workbook assembly, driven
//! through the public API with a scripted in-memory backend. No pdfium and
//! no network involved.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdf2xlsx::pipeline::assemble::{assemble, save_workbook};
use pdf2xlsx::{
    run_extraction, EncodedPage, ExtractionClient, ExtractionConfig, ExtractionProgressCallback,
    FailedPagePolicy, PageOutcome, Pdf2XlsxError, TransportError,
};

/// Scripted backend: hands out one canned reply per call, in order.
struct MockClient {
    replies: Mutex<Vec<Result<String, TransportError>>>,
    calls: AtomicUsize,
}

impl MockClient {
    fn new(replies: Vec<Result<String, TransportError>>) -> Self {
        let mut replies = replies;
        replies.reverse(); // pop() returns them in original order
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for MockClient {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    async fn extract_table(&self, _image: &EncodedPage) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string())))
    }
}

fn page(n: usize) -> (usize, EncodedPage) {
    (
        n,
        EncodedPage {
            base64: "aGVsbG8=".to_string(),
            mime_type: "image/png",
        },
    )
}

fn config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .api_key("test-key")
        .page_delay_ms(0)
        .build()
        .unwrap()
}

fn ok_table(rows: &str) -> Result<String, TransportError> {
    Ok(format!(r#"{{"headers": ["A", "B"], "rows": {rows}}}"#))
}

fn transport_failure() -> Result<String, TransportError> {
    Err(TransportError::Status {
        status: 500,
        body: "internal error".to_string(),
    })
}

// ── The sequential loop ──────────────────────────────────────────────────────

#[tokio::test]
async fn all_pages_succeed_in_order() {
    let client = MockClient::new(vec![
        ok_table(r#"[["1", "2"]]"#),
        ok_table(r#"[["3", "4"]]"#),
        ok_table(r#"[["5", "6"]]"#),
    ]);
    let pages = vec![page(1), page(2), page(3)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;

    assert_eq!(run.attempted(), 3);
    assert_eq!(run.succeeded(), 3);
    assert!(!run.aborted());
    let pages_seen: Vec<usize> = run.outcomes().iter().map(|o| o.page()).collect();
    assert_eq!(pages_seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn failure_in_the_middle_does_not_stop_the_run() {
    let client = MockClient::new(vec![
        ok_table("[]"),
        transport_failure(),
        ok_table("[]"),
    ]);
    let pages = vec![page(1), page(2), page(3)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;

    assert_eq!(run.attempted(), 3);
    assert_eq!(run.succeeded(), 2);
    assert_eq!(run.failed(), 1);
    assert!(!run.outcomes()[1].is_success());
}

#[tokio::test]
async fn fail_fast_stops_after_the_first_failure() {
    let client = MockClient::new(vec![ok_table("[]"), transport_failure(), ok_table("[]")]);
    let pages = vec![page(1), page(2), page(3)];

    let mut cfg = config();
    cfg.continue_on_failure = false;
    let (run, _) = run_extraction(&client, &pages, &cfg).await;

    // Page 3 was never attempted; the first two outcomes are kept.
    assert_eq!(run.attempted(), 2);
    assert_eq!(run.succeeded(), 1);
    assert!(run.aborted());
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn malformed_responses_count_as_successes() {
    let client = MockClient::new(vec![
        Ok("```json\n{\"headers\": [\"X\"], \"rows\": []}\n```".to_string()),
        Ok("Col1\tCol2\nval1\tval2".to_string()),
        Ok("no table here, sorry".to_string()),
    ]);
    let pages = vec![page(1), page(2), page(3)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;

    // Content-level problems degrade inside the table, never to failures.
    assert_eq!(run.succeeded(), 3);
    assert_eq!(run.failed(), 0);
}

#[tokio::test]
async fn cancellation_stops_before_the_next_page() {
    struct CancelAfterFirst {
        flag: Arc<AtomicBool>,
    }
    impl ExtractionProgressCallback for CancelAfterFirst {
        fn on_page_done(&self, _outcome: &PageOutcome, _total: usize) {
            self.flag.store(true, Ordering::Relaxed);
        }
    }

    let flag = Arc::new(AtomicBool::new(false));
    let client = MockClient::new(vec![ok_table("[]"), ok_table("[]"), ok_table("[]")]);
    let pages = vec![page(1), page(2), page(3)];

    let mut cfg = config();
    cfg.cancel_flag = Some(flag.clone());
    cfg.progress_callback = Some(Arc::new(CancelAfterFirst { flag }));

    let (run, _) = run_extraction(&client, &pages, &cfg).await;

    assert_eq!(run.attempted(), 1);
    assert!(run.aborted());
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn progress_callback_sees_every_page() {
    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<usize>>,
        done: AtomicUsize,
        completed: AtomicBool,
    }
    impl ExtractionProgressCallback for Recorder {
        fn on_page_start(&self, page: usize, _total: usize) {
            self.started.lock().unwrap().push(page);
        }
        fn on_page_done(&self, _outcome: &PageOutcome, _total: usize) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _attempted: usize, _succeeded: usize) {
            self.completed.store(true, Ordering::SeqCst);
        }
    }

    let recorder = Arc::new(Recorder::default());
    let client = MockClient::new(vec![ok_table("[]"), transport_failure()]);
    let pages = vec![page(1), page(2)];

    let mut cfg = config();
    cfg.progress_callback = Some(recorder.clone());

    run_extraction(&client, &pages, &cfg).await;

    assert_eq!(*recorder.started.lock().unwrap(), vec![1, 2]);
    assert_eq!(recorder.done.load(Ordering::SeqCst), 2);
    assert!(recorder.completed.load(Ordering::SeqCst));
}

// ── Loop plus assembly ───────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_run_assembles_one_sheet_per_attempted_page() {
    let client = MockClient::new(vec![
        ok_table(r#"[["1", "2"]]"#),
        transport_failure(),
        ok_table(r#"[["5", "6"]]"#),
    ]);
    let pages = vec![page(1), page(2), page(3)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;
    let mut workbook = assemble(&run, FailedPagePolicy::DiagnosticSheet).unwrap();

    let names: Vec<String> = workbook.worksheets().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["Page 1", "Page 2", "Page 3"]);
}

#[tokio::test]
async fn all_failed_with_skip_policy_is_an_empty_run() {
    let client = MockClient::new(vec![transport_failure(), transport_failure()]);
    let pages = vec![page(1), page(2)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;
    let err = match assemble(&run, FailedPagePolicy::Skip) {
        Ok(_) => panic!("expected assemble to fail"),
        Err(e) => e,
    };

    match err {
        Pdf2XlsxError::EmptyRun { attempted, first_error } => {
            assert_eq!(attempted, 2);
            assert!(first_error.contains("HTTP 500"));
        }
        other => panic!("expected EmptyRun, got {other:?}"),
    }
}

#[tokio::test]
async fn workbook_saves_to_disk_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockClient::new(vec![ok_table(r#"[["x", "y"]]"#)]);
    let pages = vec![page(1)];

    let (run, _) = run_extraction(&client, &pages, &config()).await;
    let mut workbook = assemble(&run, FailedPagePolicy::DiagnosticSheet).unwrap();
    let path = save_workbook(&mut workbook, dir.path(), "sample").unwrap();

    assert!(path.exists());
    assert!(path.extension().is_some_and(|e| e == "xlsx"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

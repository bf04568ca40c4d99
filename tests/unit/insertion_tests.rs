//! Unit tests for paced code insertion.
//!
//! Covers:
//! - clear first, then one insertion per line with a trailing newline
//! - consecutive insertions are at least `pacing` apart
//! - no active document: nothing is touched
//! - cancellation between lines stops the sequence
//! - declined confirmation leaves the document alone

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use worker_bridge::host::{BoxFuture, Editor, Notifier};
use worker_bridge::insertion::{type_code, CodeInserter, InsertionOutcome, INSERT_PROMPT};
use worker_bridge::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Clear,
    Insert(String),
}

struct RecordingEditor {
    active: bool,
    ops: Mutex<Vec<(Op, Instant)>>,
}

impl RecordingEditor {
    fn new(active: bool) -> Self {
        Self {
            active,
            ops: Mutex::new(Vec::new()),
        }
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().iter().map(|(op, _)| op.clone()).collect()
    }

    fn times(&self) -> Vec<Instant> {
        self.ops.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

impl Editor for RecordingEditor {
    fn clear_document(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if !self.active {
                return Ok(false);
            }
            self.ops.lock().unwrap().push((Op::Clear, Instant::now()));
            Ok(true)
        })
    }

    fn insert_at_cursor(&self, text: String) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if !self.active {
                return Ok(false);
            }
            self.ops.lock().unwrap().push((Op::Insert(text), Instant::now()));
            Ok(true)
        })
    }
}

struct FixedAnswer {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl Notifier for FixedAnswer {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}

    fn confirm(&self, prompt: String) -> BoxFuture<'_, bool> {
        self.prompts.lock().unwrap().push(prompt);
        Box::pin(async move { self.answer })
    }
}

/// Notifier whose confirmation dialog stays open until released.
struct HeldDialog {
    opened: Notify,
    release: Notify,
}

impl Notifier for HeldDialog {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}

    fn confirm(&self, _prompt: String) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.opened.notify_one();
            self.release.notified().await;
            true
        })
    }
}

fn insert(text: &str) -> Op {
    Op::Insert(text.to_owned())
}

#[tokio::test]
async fn clears_then_inserts_each_line_paced() {
    let editor = RecordingEditor::new(true);
    let pacing = Duration::from_millis(150);

    let outcome = type_code(&editor, "a\nb\nc", pacing, &CancellationToken::new())
        .await
        .expect("insert");

    assert_eq!(outcome, InsertionOutcome::Completed { lines: 3 });
    assert_eq!(
        editor.ops(),
        vec![Op::Clear, insert("a\n"), insert("b\n"), insert("c\n")]
    );

    let times = editor.times();
    for pair in times[1..].windows(2) {
        assert!(
            pair[1].duration_since(pair[0]) >= pacing,
            "insertions must be at least {pacing:?} apart"
        );
    }
}

#[tokio::test]
async fn single_line_has_no_pause() {
    let editor = RecordingEditor::new(true);
    let started = Instant::now();

    let outcome = type_code(
        &editor,
        "print(1)",
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .expect("insert");

    assert_eq!(outcome, InsertionOutcome::Completed { lines: 1 });
    assert_eq!(editor.ops(), vec![Op::Clear, insert("print(1)\n")]);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn trailing_newline_inserts_empty_last_line() {
    let editor = RecordingEditor::new(true);

    let outcome = type_code(
        &editor,
        "x\n",
        Duration::from_millis(1),
        &CancellationToken::new(),
    )
    .await
    .expect("insert");

    assert_eq!(outcome, InsertionOutcome::Completed { lines: 2 });
    assert_eq!(editor.ops(), vec![Op::Clear, insert("x\n"), insert("\n")]);
}

#[tokio::test]
async fn no_active_document_is_a_no_op() {
    let editor = RecordingEditor::new(false);

    let outcome = type_code(
        &editor,
        "a\nb",
        Duration::from_millis(1),
        &CancellationToken::new(),
    )
    .await
    .expect("insert");

    assert_eq!(outcome, InsertionOutcome::NoEditor);
    assert!(editor.ops().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let editor = RecordingEditor::new(true);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = type_code(&editor, "a\nb", Duration::from_millis(1), &cancel)
        .await
        .expect("insert");

    assert_eq!(outcome, InsertionOutcome::Cancelled { inserted: 0 });
    assert!(editor.ops().is_empty());
}

#[tokio::test]
async fn cancellation_stops_between_lines() {
    let editor = Arc::new(RecordingEditor::new(true));
    let cancel = CancellationToken::new();

    let task = {
        let editor = Arc::clone(&editor);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            type_code(
                editor.as_ref(),
                "one\ntwo\nthree",
                Duration::from_millis(300),
                &cancel,
            )
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = task.await.expect("join").expect("insert");
    assert_eq!(outcome, InsertionOutcome::Cancelled { inserted: 1 });
    assert_eq!(editor.ops(), vec![Op::Clear, insert("one\n")]);
}

#[tokio::test]
async fn declined_offer_leaves_document_alone() {
    let editor = Arc::new(RecordingEditor::new(true));
    let notifier = Arc::new(FixedAnswer {
        answer: false,
        prompts: Mutex::new(Vec::new()),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        notifier.clone(),
        Duration::from_millis(1),
    ));

    let outcome = inserter
        .offer("a\nb".into())
        .await
        .expect("join")
        .expect("offer");

    assert_eq!(outcome, InsertionOutcome::Declined);
    assert!(editor.ops().is_empty());
    assert_eq!(*notifier.prompts.lock().unwrap(), vec![INSERT_PROMPT.to_owned()]);
}

#[tokio::test]
async fn accepted_offer_types_code() {
    let editor = Arc::new(RecordingEditor::new(true));
    let notifier = Arc::new(FixedAnswer {
        answer: true,
        prompts: Mutex::new(Vec::new()),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        notifier,
        Duration::from_millis(1),
    ));

    let outcome = inserter
        .offer("x = 1\ny = 2".into())
        .await
        .expect("join")
        .expect("offer");

    assert_eq!(outcome, InsertionOutcome::Completed { lines: 2 });
    assert_eq!(
        editor.ops(),
        vec![Op::Clear, insert("x = 1\n"), insert("y = 2\n")]
    );
}

#[tokio::test]
async fn newer_offer_cancels_previous_one() {
    let editor = Arc::new(RecordingEditor::new(true));
    let notifier = Arc::new(FixedAnswer {
        answer: true,
        prompts: Mutex::new(Vec::new()),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        notifier,
        Duration::from_millis(200),
    ));

    let first = inserter.offer("a1\na2\na3".into());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = inserter.offer("b1\nb2".into());

    let first = first.await.expect("join").expect("first");
    let second = second.await.expect("join").expect("second");

    assert_eq!(first, InsertionOutcome::Cancelled { inserted: 1 });
    assert_eq!(second, InsertionOutcome::Completed { lines: 2 });
    assert_eq!(
        editor.ops(),
        vec![
            Op::Clear,
            insert("a1\n"),
            Op::Clear,
            insert("b1\n"),
            insert("b2\n"),
        ]
    );
}

#[tokio::test]
async fn cancel_stops_in_flight_offer() {
    let editor = Arc::new(RecordingEditor::new(true));
    let notifier = Arc::new(FixedAnswer {
        answer: true,
        prompts: Mutex::new(Vec::new()),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        notifier,
        Duration::from_millis(300),
    ));

    let handle = inserter.offer("l1\nl2\nl3".into());
    tokio::time::sleep(Duration::from_millis(100)).await;
    inserter.cancel();

    let outcome = handle.await.expect("join").expect("offer");
    assert_eq!(outcome, InsertionOutcome::Cancelled { inserted: 1 });
}

#[tokio::test]
async fn cancel_during_confirmation_prevents_edits() {
    let editor = Arc::new(RecordingEditor::new(true));
    let dialog = Arc::new(HeldDialog {
        opened: Notify::new(),
        release: Notify::new(),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        dialog.clone(),
        Duration::from_millis(1),
    ));

    let handle = inserter.offer("a\nb".into());
    dialog.opened.notified().await;

    inserter.cancel();
    dialog.release.notify_one();

    let outcome = handle.await.expect("join").expect("offer");
    assert_eq!(outcome, InsertionOutcome::Cancelled { inserted: 0 });
    assert!(editor.ops().is_empty());
}

#[tokio::test]
async fn offer_after_cancel_still_inserts() {
    let editor = Arc::new(RecordingEditor::new(true));
    let notifier = Arc::new(FixedAnswer {
        answer: true,
        prompts: Mutex::new(Vec::new()),
    });
    let inserter = Arc::new(CodeInserter::new(
        editor.clone(),
        notifier,
        Duration::from_millis(1),
    ));

    inserter.cancel();
    let outcome = inserter
        .offer("z".into())
        .await
        .expect("join")
        .expect("offer");

    assert_eq!(outcome, InsertionOutcome::Completed { lines: 1 });
    assert_eq!(editor.ops(), vec![Op::Clear, insert("z\n")]);
}

//! The submission lifecycle tying input, requests and results together.
//!
//! A `Session` owns everything a user interface needs to keep between
//! events: the `InputCollector`, the `ResultPresenter`, and the state of the
//! current submission.
//!
//! ```text
//! Idle ──submit──▶ Submitting ──ok──▶ Succeeded
//!                       │                 │
//!                       └──err──▶ Failed  │
//!                                   │     │
//!                 (next submit) ◀───┴─────┘
//! ```
//!
//! While `Submitting`, further submissions are rejected with
//! `Error::SubmissionInProgress` and nothing is dispatched. If the
//! `PendingSubmission` for the request in flight is dropped without being
//! finished (say, because the future driving it was cancelled), the session
//! goes back to `Idle`.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::client::Submit;
use crate::collector::{read_dataset, FileSelection, InputCollector};
use crate::errors::*;
use crate::payload::{self, ClusteringRequest};
use crate::presenter::{ClusteringResult, ResultPresenter};

/// Where we are in the submission lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionState {
    /// Waiting for the user to submit.
    Idle,
    /// A request has been built and is in flight.
    Submitting,
    /// The last submission produced a result, which is in the presenter.
    Succeeded,
    /// The last submission failed while building or sending.
    Failed(FailureReport),
}

impl SubmissionState {
    /// Is a request currently in flight?
    pub fn is_submitting(&self) -> bool {
        *self == SubmissionState::Submitting
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Idle
    }
}

/// A description of a failure, suitable for showing to a user.
#[derive(Clone, Debug, PartialEq)]
pub struct FailureReport {
    /// What sort of failure this was.
    pub kind: ErrorKind,
    /// A human-readable description.
    pub message: String,
    /// Whether trying again might help.
    pub might_be_temporary: bool,
}

impl<'a> From<&'a Error> for FailureReport {
    fn from(err: &'a Error) -> Self {
        FailureReport {
            kind: err.kind(),
            message: err.to_string(),
            might_be_temporary: err.might_be_temporary(),
        }
    }
}

/// What `Session::state` reports after an in-flight submission was
/// abandoned.
static ABANDONED: SubmissionState = SubmissionState::Idle;

/// A request which has been built and must now be sent. Created by
/// `Session::begin_submit`, and handed back to `Session::finish_submit`.
///
/// The session stays `Submitting` only as long as this value is alive.
#[derive(Debug)]
pub struct PendingSubmission {
    request: ClusteringRequest,
    token: Arc<()>,
}

impl PendingSubmission {
    /// The request to send. This is a snapshot: later edits to the session's
    /// parameters don't affect it.
    pub fn request(&self) -> &ClusteringRequest {
        &self.request
    }
}

/// All the client-side state of one interactive session.
#[derive(Debug, Default)]
pub struct Session {
    collector: InputCollector,
    presenter: ResultPresenter,
    state: SubmissionState,
    /// Dead unless a `PendingSubmission` for this session is alive.
    in_flight: Weak<()>,
}

impl Session {
    /// Create a new, idle session with default parameters.
    pub fn new() -> Session {
        Session::default()
    }

    /// The user's input.
    pub fn collector(&self) -> &InputCollector {
        &self.collector
    }

    /// Mutable access to the user's input. Edits made while a submission is
    /// in flight only affect the next submission.
    pub fn collector_mut(&mut self) -> &mut InputCollector {
        &mut self.collector
    }

    /// The latest result.
    pub fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    /// Mutable access to the latest result, so it can be cleared.
    pub fn presenter_mut(&mut self) -> &mut ResultPresenter {
        &mut self.presenter
    }

    /// The current submission state.
    pub fn state(&self) -> &SubmissionState {
        if self.state.is_submitting() && !self.is_in_flight() {
            &ABANDONED
        } else {
            &self.state
        }
    }

    fn is_in_flight(&self) -> bool {
        self.state.is_submitting() && self.in_flight.strong_count() > 0
    }

    /// Read `path` and use its contents as the dataset. If the file can't
    /// be read, we move to `Failed` (unless a request is in flight) and keep
    /// the previous dataset.
    pub async fn select_file<P: Into<PathBuf>>(&mut self, path: P) -> Result<()> {
        let selection = self.begin_file_selection(path);
        let contents = read_dataset(selection.path()).await;
        self.complete_file_selection(selection, contents)?;
        Ok(())
    }

    /// Start selecting a dataset file, for callers that read it themselves.
    /// See `InputCollector::begin_file_selection`.
    pub fn begin_file_selection<P: Into<PathBuf>>(&mut self, path: P) -> FileSelection {
        self.collector.begin_file_selection(path)
    }

    /// Apply the result of reading `selection`, as
    /// `InputCollector::complete_file_selection` does, and record a read
    /// failure in our state.
    pub fn complete_file_selection(
        &mut self,
        selection: FileSelection,
        contents: Result<String>,
    ) -> Result<bool> {
        match self.collector.complete_file_selection(selection, contents) {
            Ok(updated) => Ok(updated),
            // The in-flight request owns the state until it finishes.
            Err(err) if self.is_in_flight() => {
                warn!("{}", err);
                Err(err)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Build the request that `begin_submit` would send, applying the same
    /// checks, without changing any state.
    pub fn preview_request(&self) -> Result<ClusteringRequest> {
        self.build_request()
    }

    /// Validate and build a request from the current input, and move to
    /// `Submitting`.
    ///
    /// If a submission is already in flight, this fails with
    /// `Error::SubmissionInProgress` and changes nothing. If the request
    /// can't be built, we move to `Failed` and return the error; nothing
    /// should be sent.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission> {
        if self.is_in_flight() {
            warn!("ignoring submit while a request is in flight");
            return Err(Error::SubmissionInProgress {});
        } else if self.state.is_submitting() {
            warn!("previous submission was abandoned before it finished");
        }
        self.state = SubmissionState::Idle;

        for advisory in self.collector.validate() {
            warn!("{}", advisory);
        }
        match self.build_request() {
            Ok(request) => {
                debug!("submitting {} request", request.algorithm());
                let token = Arc::new(());
                self.in_flight = Arc::downgrade(&token);
                self.state = SubmissionState::Submitting;
                Ok(PendingSubmission { request, token })
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Record the outcome of sending `pending`. On success the result is
    /// shown and returned; on failure we move to `Failed` and return the
    /// error.
    pub fn finish_submit(
        &mut self,
        pending: PendingSubmission,
        outcome: Result<ClusteringResult>,
    ) -> Result<&ClusteringResult> {
        debug_assert!(Weak::ptr_eq(&self.in_flight, &Arc::downgrade(&pending.token)));
        match outcome {
            Ok(result) => {
                debug!("{} submission succeeded", pending.request.algorithm());
                self.state = SubmissionState::Succeeded;
                Ok(self.presenter.show(result))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Build, send and record a submission in one step.
    pub async fn submit<S>(&mut self, client: &S) -> Result<&ClusteringResult>
    where
        S: Submit + ?Sized,
    {
        let pending = self.begin_submit()?;
        let outcome = client.submit(pending.request()).await;
        self.finish_submit(pending, outcome)
    }

    fn build_request(&self) -> Result<ClusteringRequest> {
        let params = self.collector.parameters();
        if params.dataset_text.trim().is_empty() {
            return Err(Error::EmptyDataset {});
        }
        payload::build(self.collector.variant(), params)
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!("failed: {}", err);
        self.state = SubmissionState::Failed(FailureReport::from(&err));
        err
    }
}

/// Submit from a session shared with an event loop on the same thread.
///
/// The session is only borrowed while building the request and while
/// recording the outcome, never across the network exchange, so other
/// events (including further submit attempts, which will be rejected) can
/// be handled in the meantime.
pub async fn submit_shared<S>(
    session: &RefCell<Session>,
    client: &S,
) -> Result<ClusteringResult>
where
    S: Submit + ?Sized,
{
    let pending = session.borrow_mut().begin_submit()?;
    let outcome = client.submit(pending.request()).await;
    let mut session = session.borrow_mut();
    let result = session.finish_submit(pending, outcome)?;
    Ok(result.clone())
}


#[cfg(test)]
fn ready_session() -> Session {
    let mut session = Session::new();
    session.collector_mut().set_dataset_text("1,2\n3,4\n");
    session
}

#[test]
fn successful_submission_shows_result() {
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let client = fakes::CannedClient {
        calls: AtomicUsize::new(0),
        answer: || Ok(ClusteringResult(serde_json::json!({"centers": []}))),
    };
    let mut session = ready_session();
    assert_eq!(session.state(), &SubmissionState::Idle);

    block_on(session.submit(&client)).unwrap();
    assert_eq!(session.state(), &SubmissionState::Succeeded);
    assert!(session.presenter().current().is_some());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn malformed_membership_fails_before_dispatch() {
    use crate::variant::AlgorithmVariant;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let client = fakes::CannedClient {
        calls: AtomicUsize::new(0),
        answer: || Ok(ClusteringResult(serde_json::Value::Null)),
    };
    let mut session = ready_session();
    session
        .collector_mut()
        .set_variant(AlgorithmVariant::SemiSupervised);
    session
        .collector_mut()
        .set_supervised_membership_text("{not json");

    let err = block_on(session.submit(&client)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    match session.state() {
        SubmissionState::Failed(report) => assert_eq!(report.kind, ErrorKind::Parse),
        other => panic!("unexpected state {:?}", other),
    }
}

#[test]
fn empty_dataset_is_rejected() {
    let mut session = Session::new();
    let err = session.begin_submit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(session.state(), SubmissionState::Failed(_)));
}

#[test]
fn failure_keeps_previous_result_and_is_visible() {
    use futures::executor::block_on;
    use std::sync::atomic::AtomicUsize;

    let mut session = ready_session();
    let ok = fakes::CannedClient {
        calls: AtomicUsize::new(0),
        answer: || Ok(ClusteringResult(serde_json::json!({"run": 1}))),
    };
    block_on(session.submit(&ok)).unwrap();

    let failing = fakes::CannedClient {
        calls: AtomicUsize::new(0),
        answer: || Err(Error::EmptyDataset {}),
    };
    assert!(block_on(session.submit(&failing)).is_err());
    assert!(matches!(session.state(), SubmissionState::Failed(_)));
    assert_eq!(
        session.presenter().current().unwrap().as_json(),
        &serde_json::json!({"run": 1})
    );

    // Failed goes back round to Submitting on the next attempt.
    block_on(session.submit(&ok)).unwrap();
    assert_eq!(session.state(), &SubmissionState::Succeeded);
}

#[test]
fn no_second_dispatch_while_submitting() {
    let mut session = ready_session();
    let pending = session.begin_submit().unwrap();
    assert!(session.state().is_submitting());

    let err = session.begin_submit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    // The rejected attempt doesn't disturb the one in flight.
    assert!(session.state().is_submitting());

    let result = ClusteringResult(serde_json::json!({"ok": true}));
    session.finish_submit(pending, Ok(result)).unwrap();
    assert_eq!(session.state(), &SubmissionState::Succeeded);
}

#[test]
fn shared_session_rejects_concurrent_submit_and_snapshots_payload() {
    use futures::executor::block_on;
    use std::sync::atomic::Ordering;

    let session = RefCell::new(ready_session());
    let (client, release) = fakes::GatedClient::new();

    let first = submit_shared(&session, &client);
    let (session_ref, client_ref) = (&session, &client);
    let second = async move {
        // By the time this runs, the first submission is waiting on the gate.
        assert!(session_ref.borrow().state().is_submitting());
        session_ref
            .borrow_mut()
            .collector_mut()
            .set_dataset_text("9,9\n");
        let err = submit_shared(session_ref, client_ref).await.unwrap_err();
        release
            .send(ClusteringResult(serde_json::json!({"done": true})))
            .unwrap();
        err
    };
    let (first, second) = block_on(async { futures::join!(first, second) });

    assert_eq!(first.unwrap().as_json(), &serde_json::json!({"done": true}));
    assert_eq!(second.kind(), ErrorKind::Busy);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.seen.lock().unwrap()[0].data, "1,2\n3,4\n");
    assert_eq!(session.borrow().state(), &SubmissionState::Succeeded);
}

#[test]
fn cancelled_submission_returns_to_idle() {
    use futures::FutureExt;

    let mut session = ready_session();
    {
        let mut submit = Box::pin(session.submit(&fakes::SilentClient));
        assert!(submit.as_mut().now_or_never().is_none());
    }
    assert_eq!(session.state(), &SubmissionState::Idle);

    // The next attempt goes through instead of being rejected as busy.
    let pending = session.begin_submit().unwrap();
    assert!(session.state().is_submitting());
    let result = ClusteringResult(serde_json::json!({"ok": true}));
    session.finish_submit(pending, Ok(result)).unwrap();
    assert_eq!(session.state(), &SubmissionState::Succeeded);
}

#[test]
fn cancelled_shared_submission_returns_to_idle() {
    use futures::FutureExt;

    let session = RefCell::new(ready_session());
    let mut submit = Box::pin(submit_shared(&session, &fakes::SilentClient));
    assert!(submit.as_mut().now_or_never().is_none());
    assert!(session.borrow().state().is_submitting());
    assert_eq!(
        session.borrow_mut().begin_submit().unwrap_err().kind(),
        ErrorKind::Busy
    );

    drop(submit);
    assert_eq!(session.borrow().state(), &SubmissionState::Idle);
    assert!(session.borrow_mut().begin_submit().is_ok());
}

#[test]
fn dropping_pending_submission_releases_session() {
    let mut session = ready_session();
    let pending = session.begin_submit().unwrap();
    drop(pending);
    assert_eq!(session.state(), &SubmissionState::Idle);
    assert!(session.begin_submit().is_ok());
}

#[test]
fn unreadable_file_moves_to_failed() {
    let mut session = ready_session();
    let selection = session.begin_file_selection("/nonexistent/x.csv");
    let err = session
        .complete_file_selection(
            selection,
            Err(Error::could_not_read_file(
                "/nonexistent/x.csv",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileRead);
    match session.state() {
        SubmissionState::Failed(report) => {
            assert_eq!(report.kind, ErrorKind::FileRead);
            assert!(report.message.contains("/nonexistent/x.csv"));
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(session.collector().parameters().dataset_text, "1,2\n3,4\n");
}

#[test]
fn unreadable_file_leaves_in_flight_submission_alone() {
    let mut session = ready_session();
    let pending = session.begin_submit().unwrap();
    let selection = session.begin_file_selection("missing.csv");
    let err = session
        .complete_file_selection(
            selection,
            Err(Error::could_not_read_file(
                "missing.csv",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileRead);
    assert!(session.state().is_submitting());

    let result = ClusteringResult(serde_json::json!({"ok": true}));
    session.finish_submit(pending, Ok(result)).unwrap();
    assert_eq!(session.state(), &SubmissionState::Succeeded);
}

#[test]
fn preview_applies_submit_checks_without_changing_state() {
    let session = Session::new();
    let err = session.preview_request().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.state(), &SubmissionState::Idle);

    let session = ready_session();
    let request = session.preview_request().unwrap();
    assert_eq!(request.data, "1,2\n3,4\n");
    assert_eq!(session.state(), &SubmissionState::Idle);
}

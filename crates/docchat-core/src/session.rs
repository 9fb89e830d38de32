//! Document chat session state machine
//!
//! A `Session` holds the uploaded document, the transcript, and at most one
//! in-flight request. It performs no I/O: callers start an operation with one
//! of the `begin_*` methods, send the returned [`Request`] to the service, and
//! hand the outcome back through [`Session::finish`].
//!
//! ```text
//!   idle --begin_ingest--> ingesting --finish--> idle
//!   idle --begin_ask/begin_retry--> querying --finish--> idle
//! ```
//!
//! Any `begin_*` call outside `idle` is rejected without touching state.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::SessionError;
use crate::service::BOOTSTRAP_QUESTION;
use crate::transcript::{MessageId, Role, Transcript};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingOperation {
    #[default]
    None,
    Ingesting,
    Querying,
}

/// Identifies one request so its outcome can only be applied to the session
/// and operation that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    session: SessionId,
    seq: u64,
    operation: PendingOperation,
}

impl Ticket {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn operation(&self) -> PendingOperation {
        self.operation
    }
}

/// What has to be sent to the service for a started operation.
#[derive(Debug, Clone)]
pub struct Request {
    pub ticket: Ticket,
    pub document: Document,
    pub question: String,
}

/// A failed operation kept on the session until dismissed or superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub error: SessionError,
    /// User message left without an answer, for failed questions
    pub turn: Option<MessageId>,
}

/// Result of handing an outcome back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Document accepted; transcript restarted with this seed message
    Ingested(MessageId),
    /// Assistant answer appended
    Answered(MessageId),
    /// The operation failed and was recorded as the session's last failure
    Failed(SessionError),
    /// The outcome did not belong to the in-flight operation and was dropped
    Stale,
}

#[derive(Debug)]
struct InFlight {
    ticket: Ticket,
    /// Document to restore if ingestion fails
    previous_document: Option<Document>,
    turn: Option<MessageId>,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    document: Option<Document>,
    transcript: Transcript,
    in_flight: Option<InFlight>,
    last_failure: Option<Failure>,
    next_seq: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::next(),
            document: None,
            transcript: Transcript::new(),
            in_flight: None,
            last_failure: None,
            next_seq: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn pending(&self) -> PendingOperation {
        self.in_flight
            .as_ref()
            .map(|f| f.ticket.operation)
            .unwrap_or(PendingOperation::None)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    /// True when the composer should accept input.
    pub fn can_ask(&self) -> bool {
        self.is_idle() && self.document.is_some()
    }

    /// True when the last failure left a question that can be sent again.
    pub fn can_retry(&self) -> bool {
        self.can_ask() && self.last_failure.as_ref().is_some_and(|f| f.turn.is_some())
    }

    pub fn dismiss_failure(&mut self) {
        self.last_failure = None;
    }

    fn issue(&mut self, operation: PendingOperation) -> Ticket {
        let seq = self.next_seq;
        self.next_seq += 1;
        Ticket {
            session: self.id,
            seq,
            operation,
        }
    }

    /// Start ingesting `document`. The document is stored optimistically and
    /// rolled back if the service rejects it.
    pub fn begin_ingest(&mut self, document: Document) -> Result<Request, SessionError> {
        if !self.is_idle() {
            return Err(SessionError::Busy);
        }
        if !document.is_supported() {
            return Err(SessionError::UnsupportedDocument {
                media_type: document.media_type.clone(),
            });
        }

        let ticket = self.issue(PendingOperation::Ingesting);
        let previous_document = self.document.replace(document.clone());
        self.in_flight = Some(InFlight {
            ticket,
            previous_document,
            turn: None,
        });

        debug!(document = %document.name, bytes = document.len(), "ingest started");
        Ok(Request {
            ticket,
            document,
            question: BOOTSTRAP_QUESTION.to_string(),
        })
    }

    /// Start a question. The user message is appended immediately.
    pub fn begin_ask(&mut self, question: &str) -> Result<Request, SessionError> {
        if question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let document = self.ready_document()?;

        let turn = self.transcript.push(Role::User, question);
        self.start_query(document, question.to_string(), turn)
    }

    /// Send the question of the last failed turn again without adding a new message.
    pub fn begin_retry(&mut self) -> Result<Request, SessionError> {
        let turn = self
            .last_failure
            .as_ref()
            .and_then(|f| f.turn)
            .ok_or(SessionError::NothingToRetry)?;
        let document = self.ready_document()?;
        let question = self
            .transcript
            .get(turn)
            .map(|m| m.content().to_string())
            .ok_or(SessionError::NothingToRetry)?;

        self.start_query(document, question, turn)
    }

    fn ready_document(&self) -> Result<Document, SessionError> {
        if !self.is_idle() {
            return Err(SessionError::Busy);
        }
        self.document.clone().ok_or(SessionError::NoDocument)
    }

    fn start_query(&mut self, document: Document, question: String, turn: MessageId) -> Result<Request, SessionError> {
        let ticket = self.issue(PendingOperation::Querying);
        self.in_flight = Some(InFlight {
            ticket,
            previous_document: None,
            turn: Some(turn),
        });
        self.last_failure = None;

        debug!(turn = turn.0, "query started");
        Ok(Request {
            ticket,
            document,
            question,
        })
    }

    /// Apply the outcome of the request identified by `ticket`.
    ///
    /// The session always returns to idle when the ticket matches. Outcomes for
    /// any other ticket are dropped.
    pub fn finish(&mut self, ticket: Ticket, outcome: Result<String, SessionError>) -> Applied {
        let matches = self.in_flight.as_ref().is_some_and(|f| f.ticket == ticket);
        if !matches {
            debug!(?ticket, "dropping stale outcome");
            return Applied::Stale;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return Applied::Stale;
        };

        match (ticket.operation, outcome) {
            (PendingOperation::Ingesting, Ok(answer)) => {
                let seed = if answer.trim().is_empty() {
                    let name = self.document.as_ref().map(|d| d.name.as_str()).unwrap_or_default();
                    format!("Document \"{}\" uploaded and processed.", name)
                } else {
                    answer
                };
                self.last_failure = None;
                let id = self.transcript.restart(seed);
                info!(document = ?self.document.as_ref().map(|d| &d.name), "document ingested");
                Applied::Ingested(id)
            }
            (PendingOperation::Ingesting, Err(error)) => {
                warn!(%error, "ingest failed");
                self.document = in_flight.previous_document;
                self.last_failure = Some(Failure {
                    error: error.clone(),
                    turn: None,
                });
                Applied::Failed(error)
            }
            (_, Ok(answer)) => {
                self.last_failure = None;
                Applied::Answered(self.transcript.push(Role::Assistant, answer))
            }
            (_, Err(error)) => {
                warn!(%error, "question failed");
                self.last_failure = Some(Failure {
                    error: error.clone(),
                    turn: in_flight.turn,
                });
                Applied::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PDF_MEDIA_TYPE;

    fn pdf(name: &str) -> Document {
        Document::new(name, PDF_MEDIA_TYPE, b"%PDF-1.4".to_vec())
    }

    fn loaded_session() -> Session {
        let mut session = Session::new();
        let request = session.begin_ingest(pdf("report.pdf")).unwrap();
        session.finish(request.ticket, Ok("Report loaded.".into()));
        session
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = Session::new();
        assert_eq!(session.pending(), PendingOperation::None);
        assert!(session.document().is_none());
        assert!(session.transcript().is_empty());
        assert!(!session.can_ask());
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(Session::new().id(), Session::new().id());
    }

    #[test]
    fn test_ingest_sends_bootstrap_question() {
        let mut session = Session::new();
        let request = session.begin_ingest(pdf("report.pdf")).unwrap();
        assert_eq!(request.question, BOOTSTRAP_QUESTION);
        assert_eq!(request.document.name, "report.pdf");
        assert_eq!(session.pending(), PendingOperation::Ingesting);
        assert_eq!(session.document().unwrap().name, "report.pdf");
    }

    #[test]
    fn test_ingest_success_seeds_transcript() {
        let session = loaded_session();
        assert!(session.is_idle());
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::Assistant);
        assert_eq!(messages[0].content(), "Report loaded.");
    }

    #[test]
    fn test_ingest_blank_answer_uses_fallback_text() {
        let mut session = Session::new();
        let request = session.begin_ingest(pdf("report.pdf")).unwrap();
        session.finish(request.ticket, Ok("  ".into()));
        assert_eq!(
            session.transcript().messages()[0].content(),
            "Document \"report.pdf\" uploaded and processed."
        );
    }

    #[test]
    fn test_ingest_rejects_non_pdf_without_state_change() {
        let mut session = Session::new();
        let err = session
            .begin_ingest(Document::new("notes.txt", "text/plain", b"hi".to_vec()))
            .unwrap_err();
        assert_eq!(err, SessionError::UnsupportedDocument { media_type: "text/plain".into() });
        assert!(session.document().is_none());
        assert!(session.is_idle());
        assert!(session.last_failure().is_none());
    }

    #[test]
    fn test_ingest_failure_reverts_document() {
        let mut session = Session::new();
        let request = session.begin_ingest(pdf("report.pdf")).unwrap();
        let applied = session.finish(request.ticket, Err(SessionError::Transport("refused".into())));
        assert!(matches!(applied, Applied::Failed(_)));
        assert!(session.document().is_none());
        assert!(session.transcript().is_empty());
        assert!(session.is_idle());
        assert!(session.last_failure().unwrap().turn.is_none());
    }

    #[test]
    fn test_reupload_failure_restores_previous_document() {
        let mut session = loaded_session();
        let request = session.begin_ingest(pdf("invoice.pdf")).unwrap();
        session.finish(request.ticket, Err(SessionError::Status { status: 500, detail: "x".into() }));
        assert_eq!(session.document().unwrap().name, "report.pdf");
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_reupload_success_restarts_transcript() {
        let mut session = loaded_session();
        let ask = session.begin_ask("hello?").unwrap();
        session.finish(ask.ticket, Ok("hi".into()));
        assert_eq!(session.transcript().len(), 3);

        let request = session.begin_ingest(pdf("invoice.pdf")).unwrap();
        session.finish(request.ticket, Ok("Invoice loaded.".into()));
        assert_eq!(session.document().unwrap().name, "invoice.pdf");
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript().messages()[0].content(), "Invoice loaded.");
    }

    #[test]
    fn test_ask_appends_user_message_immediately() {
        let mut session = loaded_session();
        let request = session.begin_ask("What is the total?").unwrap();
        assert_eq!(request.question, "What is the total?");
        assert_eq!(request.document.name, "report.pdf");
        assert_eq!(session.pending(), PendingOperation::Querying);
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role(), Role::User);
        assert_eq!(last.content(), "What is the total?");

        let applied = session.finish(request.ticket, Ok("- $100\n- $200".into()));
        assert!(matches!(applied, Applied::Answered(_)));
        assert_eq!(session.transcript().last().unwrap().role(), Role::Assistant);
        assert!(session.is_idle());
    }

    #[test]
    fn test_ask_rejections_leave_state_alone() {
        let mut empty = Session::new();
        assert_eq!(empty.begin_ask("hi").unwrap_err(), SessionError::NoDocument);
        assert!(empty.transcript().is_empty());

        let mut session = loaded_session();
        assert_eq!(session.begin_ask("   \n").unwrap_err(), SessionError::EmptyQuestion);
        assert_eq!(session.transcript().len(), 1);

        let _pending = session.begin_ask("first").unwrap();
        assert_eq!(session.begin_ask("second").unwrap_err(), SessionError::Busy);
        assert_eq!(session.begin_ingest(pdf("other.pdf")).unwrap_err(), SessionError::Busy);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.document().unwrap().name, "report.pdf");
    }

    #[test]
    fn test_ask_failure_keeps_turn_and_records_failure() {
        let mut session = loaded_session();
        let request = session.begin_ask("What is the total?").unwrap();
        let turn = session.transcript().last().unwrap().id();
        session.finish(request.ticket, Err(SessionError::Status { status: 500, detail: "boom".into() }));

        assert!(session.is_idle());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript().last().unwrap().role(), Role::User);
        let failure = session.last_failure().unwrap();
        assert_eq!(failure.turn, Some(turn));
        assert!(session.can_retry());
    }

    #[test]
    fn test_retry_resends_without_new_message() {
        let mut session = loaded_session();
        let request = session.begin_ask("What is the total?").unwrap();
        session.finish(request.ticket, Err(SessionError::Transport("timeout".into())));

        let retry = session.begin_retry().unwrap();
        assert_eq!(retry.question, "What is the total?");
        assert_eq!(session.transcript().len(), 2);
        assert!(session.last_failure().is_none());

        session.finish(retry.ticket, Ok("$300".into()));
        let contents: Vec<&str> = session.transcript().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["Report loaded.", "What is the total?", "$300"]);
    }

    #[test]
    fn test_retry_without_failure() {
        let mut session = loaded_session();
        assert_eq!(session.begin_retry().unwrap_err(), SessionError::NothingToRetry);

        let request = session.begin_ingest(pdf("bad.pdf")).unwrap();
        session.finish(request.ticket, Err(SessionError::Transport("x".into())));
        assert_eq!(session.begin_retry().unwrap_err(), SessionError::NothingToRetry);
    }

    #[test]
    fn test_stale_outcome_is_ignored() {
        let mut session = loaded_session();
        let first = session.begin_ask("one").unwrap();
        session.finish(first.ticket, Ok("1".into()));

        let second = session.begin_ask("two").unwrap();
        assert_eq!(session.finish(first.ticket, Ok("late".into())), Applied::Stale);
        assert_eq!(session.pending(), PendingOperation::Querying);

        session.finish(second.ticket, Ok("2".into()));
        assert_eq!(session.transcript().last().unwrap().content(), "2");
    }

    #[test]
    fn test_outcome_from_other_session_is_ignored() {
        let mut old = loaded_session();
        let request = old.begin_ask("question").unwrap();

        let mut fresh = Session::new();
        assert_eq!(fresh.finish(request.ticket, Ok("answer".into())), Applied::Stale);
        assert!(fresh.transcript().is_empty());
    }

    #[test]
    fn test_dismiss_failure() {
        let mut session = loaded_session();
        let request = session.begin_ask("q").unwrap();
        session.finish(request.ticket, Err(SessionError::MalformedResponse("no answer".into())));
        session.dismiss_failure();
        assert!(session.last_failure().is_none());
        assert!(!session.can_retry());
    }
}

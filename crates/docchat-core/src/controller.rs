use std::sync::Arc;
use tracing::debug;

use crate::document::Document;
use crate::error::SessionError;
use crate::service::ChatService;
use crate::session::{Applied, Request, Session, Ticket};

/// Drives a [`Session`] against a [`ChatService`].
///
/// Front ends with their own event loop use the split form: `start_*` returns a
/// [`PendingExchange`] that can be spawned, and its [`Completion`] is handed back
/// through [`SessionController::apply`]. The awaitable `ingest_document`, `ask`
/// and `retry` do both steps in place.
pub struct SessionController {
    service: Arc<dyn ChatService>,
    session: Session,
}

/// A started request that has not been sent yet.
pub struct PendingExchange {
    service: Arc<dyn ChatService>,
    request: Request,
}

impl std::fmt::Debug for PendingExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingExchange")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Outcome of a [`PendingExchange`], to be applied to the session that issued it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Result<String, SessionError>,
}

impl PendingExchange {
    pub fn ticket(&self) -> Ticket {
        self.request.ticket
    }

    pub fn question(&self) -> &str {
        &self.request.question
    }

    /// Send the request. Never fails: errors are carried in the completion.
    pub async fn run(self) -> Completion {
        let Request {
            ticket,
            document,
            question,
        } = self.request;
        let outcome = self.service.chat(&document, &question).await;
        Completion { ticket, outcome }
    }
}

impl Completion {
    /// Completion for a request whose task died before producing an outcome.
    pub fn aborted(ticket: Ticket, reason: impl std::fmt::Display) -> Self {
        Self {
            ticket,
            outcome: Err(SessionError::Transport(format!("request aborted: {}", reason))),
        }
    }
}

/// Returns the session to idle if an awaited request is dropped before it resolves.
struct ReleaseOnDrop<'a> {
    session: &'a mut Session,
    ticket: Option<Ticket>,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.session
                .finish(ticket, Err(SessionError::Transport("request cancelled".to_string())));
        }
    }
}

impl SessionController {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_failure();
    }

    fn exchange(&self, request: Request) -> PendingExchange {
        PendingExchange {
            service: Arc::clone(&self.service),
            request,
        }
    }

    pub fn start_ingest(&mut self, document: Document) -> Result<PendingExchange, SessionError> {
        let request = self.session.begin_ingest(document)?;
        Ok(self.exchange(request))
    }

    pub fn start_ask(&mut self, question: &str) -> Result<PendingExchange, SessionError> {
        let request = self.session.begin_ask(question)?;
        Ok(self.exchange(request))
    }

    pub fn start_retry(&mut self) -> Result<PendingExchange, SessionError> {
        let request = self.session.begin_retry()?;
        Ok(self.exchange(request))
    }

    pub fn apply(&mut self, completion: Completion) -> Applied {
        let applied = self.session.finish(completion.ticket, completion.outcome);
        debug!(?applied, "completion applied");
        applied
    }

    async fn run_to_end(&mut self, exchange: PendingExchange) -> Result<(), SessionError> {
        let mut guard = ReleaseOnDrop {
            session: &mut self.session,
            ticket: Some(exchange.ticket()),
        };
        let completion = exchange.run().await;
        guard.ticket = None;

        match guard.session.finish(completion.ticket, completion.outcome) {
            Applied::Failed(error) => Err(error),
            _ => Ok(()),
        }
    }

    /// Upload `document` and seed the transcript with the service's description of it.
    pub async fn ingest_document(&mut self, document: Document) -> Result<(), SessionError> {
        let exchange = self.start_ingest(document)?;
        self.run_to_end(exchange).await
    }

    pub async fn ask(&mut self, question: &str) -> Result<(), SessionError> {
        let exchange = self.start_ask(question)?;
        self.run_to_end(exchange).await
    }

    pub async fn retry(&mut self) -> Result<(), SessionError> {
        let exchange = self.start_retry()?;
        self.run_to_end(exchange).await
    }
}

pub mod client;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod render;
pub mod service;
pub mod session;
pub mod transcript;

// Re-export main types for convenience
pub use client::HttpChatService;
pub use config::Config;
pub use controller::{Completion, PendingExchange, SessionController};
pub use document::Document;
pub use error::{ErrorKind, SessionError};
pub use render::{render, Block};
pub use service::{ChatService, BOOTSTRAP_QUESTION};
pub use session::{Applied, Failure, PendingOperation, Session, SessionId, Ticket};
pub use transcript::{Message, MessageId, Role, Transcript};

use docchat_core::{
    render, Applied, Block, ChatService, Completion, Config, Document, PendingExchange, Role,
    Session, SessionController,
};
use anyhow::anyhow;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(anyhow!("unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a question in the composer
    Editing,
    /// Typing the path of a document to upload
    Upload,
}

/// The chat screen. Owns the one live session; dropping it discards the session.
pub struct ChatView {
    pub controller: SessionController,
    pub scroll: u16,
    request: Option<AbortHandle>,
}

impl ChatView {
    fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            controller: SessionController::new(service),
            scroll: 0,
            request: None,
        }
    }

    pub fn session(&self) -> &Session {
        self.controller.session()
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            request.abort();
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub theme: Theme,
    pub input_mode: InputMode,

    // Composer state
    pub composer: String,
    pub composer_cursor: usize, // cursor position in characters
    pub upload_path: String,

    /// Inline message for problems caught before any request (bad file, empty question)
    pub notice: Option<String>,

    pub chat: Option<ChatView>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Chat area size, updated during render for scroll calculations
    pub chat_height: u16,
    pub chat_width: u16,

    pub service_url: String,
    service: Arc<dyn ChatService>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        service: Arc<dyn ChatService>,
        service_url: String,
        theme: Theme,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Home,
            theme,
            input_mode: InputMode::Normal,

            composer: String::new(),
            composer_cursor: 0,
            upload_path: String::new(),

            notice: None,
            chat: None,

            animation_frame: 0,
            chat_height: 0,
            chat_width: 0,

            service_url,
            service,
            events,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.chat.as_ref().map(ChatView::session)
    }

    pub fn is_busy(&self) -> bool {
        self.session().is_some_and(|s| !s.is_idle())
    }

    /// Open the chat screen with a fresh session.
    pub fn enter_chat(&mut self) {
        self.screen = Screen::Chat;
        self.chat = Some(ChatView::new(Arc::clone(&self.service)));
        self.input_mode = InputMode::Normal;
        self.composer.clear();
        self.composer_cursor = 0;
        self.notice = None;
        debug!("chat session opened");
    }

    /// Go back home. The session is discarded along with any request in flight.
    pub fn leave_chat(&mut self) {
        self.screen = Screen::Home;
        self.input_mode = InputMode::Normal;
        self.notice = None;
        if self.chat.take().is_some() {
            debug!("chat session discarded");
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = Config::save_theme(self.theme.as_str()) {
            warn!("failed to save theme: {}", e);
        }
    }

    pub async fn upload(&mut self, path: &Path) {
        let Some(chat) = self.chat.as_mut() else { return };

        let document = match Document::open(path).await {
            Ok(document) => document,
            Err(e) => {
                self.notice = Some(format!("{:#}", e));
                return;
            }
        };

        match chat.controller.start_ingest(document) {
            Ok(exchange) => {
                self.notice = None;
                self.spawn_exchange(exchange);
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn submit_question(&mut self) {
        let Some(chat) = self.chat.as_mut() else { return };

        match chat.controller.start_ask(&self.composer) {
            Ok(exchange) => {
                self.composer.clear();
                self.composer_cursor = 0;
                self.notice = None;
                self.spawn_exchange(exchange);
                self.scroll_to_bottom();
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn retry(&mut self) {
        let Some(chat) = self.chat.as_mut() else { return };

        match chat.controller.start_retry() {
            Ok(exchange) => {
                self.notice = None;
                self.spawn_exchange(exchange);
                self.scroll_to_bottom();
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.notice = None;
        if let Some(chat) = self.chat.as_mut() {
            chat.controller.dismiss_error();
        }
    }

    /// Run the request in the background and report its completion as an event.
    fn spawn_exchange(&mut self, exchange: PendingExchange) {
        let ticket = exchange.ticket();
        let request = tokio::spawn(exchange.run());
        if let Some(chat) = self.chat.as_mut() {
            chat.request = Some(request.abort_handle());
        }

        let tx = self.events.clone();
        tokio::spawn(async move {
            let completion = match request.await {
                Ok(completion) => completion,
                Err(e) => Completion::aborted(ticket, e),
            };
            let _ = tx.send(AppEvent::Completed(completion));
        });
    }

    pub fn apply_completion(&mut self, completion: Completion) {
        let Some(chat) = self.chat.as_mut() else {
            debug!("completion arrived after the session was discarded");
            return;
        };

        if chat.controller.apply(completion) == Applied::Stale {
            return;
        }
        chat.request = None;
        self.scroll_to_bottom();
    }

    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self) {
        if let Some(chat) = self.chat.as_mut() {
            chat.scroll = chat.scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        if let Some(chat) = self.chat.as_mut() {
            chat.scroll = chat.scroll.saturating_sub(1);
        }
    }

    /// Scroll chat to bottom so the newest message (or "Thinking...") is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };

        let Some(chat) = self.chat.as_mut() else { return };
        let session = chat.controller.session();

        // Answer text comes from the service, so count in usize and clamp at the end
        let wrapped = |text: &str| -> usize { (text.chars().count() / wrap_width) + 1 };

        let mut total_lines: usize = 0;
        for msg in session.transcript() {
            let body = match msg.role() {
                Role::User => msg.content().lines().map(wrapped).fold(0, usize::saturating_add),
                Role::Assistant => render(msg.content())
                    .iter()
                    .map(|block| match block {
                        Block::Paragraph(text) => wrapped(text),
                        Block::BulletList(items) => items.iter().map(|i| wrapped(i)).fold(0, usize::saturating_add),
                        Block::Spacer => 1,
                    })
                    .fold(0, usize::saturating_add),
            };
            // Role line ("You" or "AI"), body, blank line after message
            total_lines = total_lines.saturating_add(body).saturating_add(2);
        }

        if !session.is_idle() {
            total_lines = total_lines.saturating_add(2); // "AI" + "Thinking..."
        }

        let offset = total_lines.saturating_sub(visible_height as usize);
        chat.scroll = u16::try_from(offset).unwrap_or(u16::MAX);
    }
}

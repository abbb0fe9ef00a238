use std::time::Duration;

use serenity::async_trait;
use uuid::Uuid;

use crate::errors::BotResult;
use crate::services::GameServices;
use crate::session::control::{Control, ControlArena};

pub type SessionId = String;

/// The user behind an interaction, as far as the engines care.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub name: String,
}

impl Actor {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Actor { id, name: name.into() }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A control press, optionally carrying text submitted through a modal.
#[derive(Clone, Debug)]
pub struct InteractionEvent {
    pub token: String,
    pub input: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedSpec {
    pub title: Option<String>,
    pub description: Option<String>,
    pub colour: u32,
    pub author: Option<String>,
    pub fields: Vec<EmbedField>,
}

impl EmbedSpec {
    pub fn new(colour: u32) -> Self {
        EmbedSpec {
            title: None,
            description: None,
            colour,
            author: None,
            fields: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline });
        self
    }

    /// Replaces the value of the named field, appending it when missing.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>, inline: bool) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.value = value.into();
                field.inline = inline;
            }
            None => self.fields.push(EmbedField { name: name.to_string(), value: value.into(), inline }),
        }
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}

/// What the renderer should show for a session's message.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderInstruction {
    pub session_id: SessionId,
    pub content: Option<String>,
    pub embed: Option<EmbedSpec>,
    pub controls: Vec<Control>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub content: String,
    pub ephemeral: bool,
}

impl Notice {
    pub fn private(content: impl Into<String>) -> Self {
        Notice { content: content.into(), ephemeral: true }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Notice { content: content.into(), ephemeral: false }
    }
}

/// A single-input modal the acting user should be shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalSpec {
    pub token: String,
    pub title: String,
    pub input_label: String,
    pub placeholder: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimerChange {
    #[default]
    Keep,
    Reset(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredEvent {
    PreviewElapsed,
    ConcealMismatch { first: usize, second: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deferred {
    pub delay: Duration,
    pub event: DeferredEvent,
}

/// The result of feeding one event into an engine.
#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub render: Option<RenderInstruction>,
    pub notice: Option<Notice>,
    pub modal: Option<ModalSpec>,
    pub terminal: bool,
    pub timer: TimerChange,
    pub deferred: Option<Deferred>,
}

impl Transition {
    pub fn render(render: RenderInstruction) -> Self {
        Transition { render: Some(render), ..Default::default() }
    }

    pub fn notice(notice: Notice) -> Self {
        Transition { notice: Some(notice), ..Default::default() }
    }

    pub fn modal(modal: ModalSpec) -> Self {
        Transition { modal: Some(modal), ..Default::default() }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn with_timer(mut self, timer: TimerChange) -> Self {
        self.timer = timer;
        self
    }

    pub fn after(mut self, delay: Duration, event: DeferredEvent) -> Self {
        self.deferred = Some(Deferred { delay, event });
        self
    }
}

#[derive(Debug)]
pub struct InteractionSession {
    id: SessionId,
    pub controls: ControlArena,
    timeout: Option<Duration>,
    terminal: bool,
}

impl InteractionSession {
    pub fn new(timeout: Option<Duration>) -> Self {
        InteractionSession {
            id: Uuid::new_v4().simple().to_string()[..12].to_string(),
            controls: ControlArena::new(),
            timeout,
            terminal: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Marks the session terminal. Only the first call returns true.
    pub fn stop(&mut self) -> bool {
        !std::mem::replace(&mut self.terminal, true)
    }

    pub fn instruction(&self, content: Option<String>, embed: Option<EmbedSpec>) -> RenderInstruction {
        RenderInstruction {
            session_id: self.id.clone(),
            content,
            embed,
            controls: self.controls.snapshot(),
        }
    }
}

/// One interactive flow. The manager serializes calls per session, so
/// implementations only ever see one event at a time.
#[async_trait]
pub trait SessionEngine: Send {
    fn session(&self) -> &InteractionSession;

    fn session_mut(&mut self) -> &mut InteractionSession;

    /// Rejects actors that may not touch this session, without mutating it.
    fn authorize(&self, actor: &Actor) -> BotResult<()>;

    /// The first render, plus any deferred step the flow needs right away.
    fn opening(&mut self) -> Transition;

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition>;

    async fn on_deferred(&mut self, _event: DeferredEvent, _services: &GameServices) -> BotResult<Transition> {
        Ok(Transition::default())
    }

    async fn on_timeout(&mut self, services: &GameServices) -> BotResult<Transition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent() {
        let mut session = InteractionSession::new(None);
        assert!(!session.is_terminal());
        assert!(session.stop());
        assert!(!session.stop());
        assert!(session.is_terminal());
    }

    #[test]
    fn set_field_replaces_in_place() {
        let mut embed = EmbedSpec::new(0).field("Status", "Waiting", true).field("Type", "Boolean", true);
        embed.set_field("Status", "Done", false);
        assert_eq!(embed.fields[0].value, "Done");
        assert_eq!(embed.fields.len(), 2);
        embed.set_field("Log", "x", false);
        assert_eq!(embed.field_value("Log"), Some("x"));
    }
}

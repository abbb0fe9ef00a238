use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serenity::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::errors::{BotError, BotResult};
use crate::services::GameServices;
use crate::session::session::{Actor, Deferred, DeferredEvent, InteractionEvent, Notice, RenderInstruction, SessionEngine, SessionId, TimerChange, Transition};

lazy_static! {
    static ref COMPONENT_ID_REGEX: Regex = Regex::new(r"^([0-9a-f]{12}):([0-9a-f]{8})$").unwrap();
}

pub fn component_id(session_id: &str, token: &str) -> String {
    format!("{}:{}", session_id, token)
}

pub fn parse_component_id(custom_id: &str) -> Option<(&str, &str)> {
    let captures = COMPONENT_ID_REGEX.captures(custom_id)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

/// The message a session is drawn on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Draws transitions that don't originate from a user interaction (timers, deferred steps).
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, target: RenderTarget, instruction: RenderInstruction) -> BotResult<()>;

    async fn announce(&self, target: RenderTarget, notice: Notice) -> BotResult<()>;
}

struct SessionSlot {
    engine: Box<dyn SessionEngine>,
    target: Option<RenderTarget>,
    timer: Option<JoinHandle<()>>,
    timer_epoch: u64,
}

/// Registry of live sessions. Each session sits behind its own lock, the
/// registry lock is never held across an await.
#[derive(Clone)]
pub struct SessionManager {
    slots: Arc<StdMutex<HashMap<SessionId, Arc<Mutex<SessionSlot>>>>>,
    services: GameServices,
    renderer: Arc<dyn Renderer>,
}

impl SessionManager {
    pub fn new(services: GameServices, renderer: Arc<dyn Renderer>) -> Self {
        SessionManager {
            slots: Arc::new(StdMutex::new(HashMap::new())),
            services,
            renderer,
        }
    }

    pub fn services(&self) -> &GameServices {
        &self.services
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Mutex<SessionSlot>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, id: &str) -> Option<Arc<Mutex<SessionSlot>>> {
        self.lock_slots().get(id).cloned()
    }

    pub fn active_sessions(&self) -> usize {
        self.lock_slots().len()
    }

    /// Registers the engine, arms its timeout and returns the opening transition.
    pub async fn start(&self, mut engine: Box<dyn SessionEngine>) -> (SessionId, Transition) {
        let opening = engine.opening();
        let id = engine.session().id().to_string();
        let timeout = engine.session().timeout();

        let slot = Arc::new(Mutex::new(SessionSlot { engine, target: None, timer: None, timer_epoch: 0 }));
        self.lock_slots().insert(id.clone(), Arc::clone(&slot));

        let mut slot = slot.lock().await;
        if let Some(timeout) = timeout {
            self.arm_timer(&id, &mut slot, timeout);
        }
        if let Some(deferred) = opening.deferred {
            self.schedule(&id, deferred);
        }

        tracing::info!("Started session {}", id);
        (id, opening)
    }

    /// Records where the session was rendered so timers can redraw it.
    pub async fn attach(&self, id: &str, target: RenderTarget) {
        if let Some(slot) = self.slot(id) {
            slot.lock().await.target = Some(target);
        }
    }

    /// Routes a component press (or modal submit) to its session.
    pub async fn dispatch(&self, custom_id: &str, actor: &Actor, input: Option<String>) -> BotResult<Transition> {
        let (id, token) = parse_component_id(custom_id).ok_or(BotError::SessionEnded)?;
        let slot = self.slot(id).ok_or(BotError::SessionEnded)?;
        let mut slot = slot.lock().await;

        if slot.engine.session().is_terminal() {
            return Err(BotError::SessionEnded);
        }
        slot.engine.authorize(actor)?;
        if !slot.engine.session().controls.contains(token) {
            return Err(BotError::SessionEnded);
        }

        let event = InteractionEvent { token: token.to_string(), input };
        let transition = match slot.engine.on_interaction(actor, event, &self.services).await {
            Ok(transition) => transition,
            Err(e) if e.is_user_facing() => return Err(e),
            Err(e) => {
                // Infrastructure failures end the session so no later press can act on it.
                tracing::error!("Session {} aborted: {}", id, e);
                let session = slot.engine.session_mut();
                session.controls.disable_all();
                let frozen = Transition::render(session.instruction(None, None)).terminal();
                self.settle(id, &mut slot, &frozen);

                let target = slot.target;
                drop(slot);
                self.publish(id, target, frozen).await;
                return Err(e);
            }
        };
        self.settle(id, &mut slot, &transition);

        Ok(transition)
    }

    /// Ends a session from outside. Returns false if it was already gone.
    pub async fn stop(&self, id: &str) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        let mut slot = slot.lock().await;
        let stopped = slot.engine.session_mut().stop();
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        self.lock_slots().remove(id);
        stopped
    }

    fn settle(&self, id: &str, slot: &mut SessionSlot, transition: &Transition) {
        if transition.terminal {
            slot.engine.session_mut().stop();
            slot.timer_epoch += 1;
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            self.lock_slots().remove(id);
            tracing::info!("Session {} reached a terminal state", id);
            return;
        }

        match transition.timer {
            TimerChange::Keep => {}
            TimerChange::Reset(duration) => self.arm_timer(id, slot, duration),
        }

        if let Some(deferred) = transition.deferred {
            self.schedule(id, deferred);
        }
    }

    fn arm_timer(&self, id: &str, slot: &mut SessionSlot, duration: Duration) {
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.timer_epoch += 1;

        let epoch = slot.timer_epoch;
        let manager = self.clone();
        let id = id.to_string();
        slot.timer = Some(tokio::spawn(async move {
            sleep(duration).await;
            manager.fire_timeout(id, epoch).await;
        }));
    }

    fn schedule(&self, id: &str, deferred: Deferred) {
        let manager = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            sleep(deferred.delay).await;
            manager.fire_deferred(id, deferred.event).await;
        });
    }

    async fn fire_timeout(&self, id: SessionId, epoch: u64) {
        let Some(slot) = self.slot(&id) else {
            return;
        };
        let mut slot = slot.lock().await;
        if slot.engine.session().is_terminal() || slot.timer_epoch != epoch {
            return;
        }

        let mut transition = match slot.engine.on_timeout(&self.services).await {
            Ok(transition) => transition,
            Err(e) => {
                tracing::error!("Session {} failed while timing out: {}", id, e);
                Transition::default()
            }
        };
        transition.terminal = true;

        // This task is the timer, don't abort it from under ourselves.
        slot.timer = None;
        self.settle(&id, &mut slot, &transition);

        let target = slot.target;
        drop(slot);
        self.publish(&id, target, transition).await;
    }

    async fn fire_deferred(&self, id: SessionId, event: DeferredEvent) {
        let Some(slot) = self.slot(&id) else {
            return;
        };
        let mut slot = slot.lock().await;
        if slot.engine.session().is_terminal() {
            return;
        }

        let transition = match slot.engine.on_deferred(event, &self.services).await {
            Ok(transition) => transition,
            Err(e) => {
                tracing::error!("Session {} failed to run {:?}: {}", id, event, e);
                return;
            }
        };
        self.settle(&id, &mut slot, &transition);

        let target = slot.target;
        drop(slot);
        self.publish(&id, target, transition).await;
    }

    async fn publish(&self, id: &str, target: Option<RenderTarget>, transition: Transition) {
        let Some(target) = target else {
            if transition.render.is_some() {
                tracing::warn!("Session {} has nothing to render on yet", id);
            }
            return;
        };

        if let Some(render) = transition.render {
            if let Err(e) = self.renderer.render(target, render).await {
                tracing::error!("Failed to render session {}: {}", id, e);
            }
        }
        if let Some(notice) = transition.notice {
            if let Err(e) = self.renderer.announce(target, notice).await {
                tracing::error!("Failed to announce for session {}: {}", id, e);
            }
        }
    }
}

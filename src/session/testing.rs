use std::sync::Arc;

use serenity::async_trait;
use tokio::sync::Mutex;

use crate::database::Database;
use crate::errors::BotResult;
use crate::services::GameServices;
use crate::session::manager::{RenderTarget, Renderer, SessionManager};
use crate::session::session::{Actor, Notice, RenderInstruction, SessionEngine, Transition};

#[derive(Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<(RenderTarget, RenderInstruction)>>,
    notices: Mutex<Vec<(RenderTarget, Notice)>>,
}

impl RecordingRenderer {
    pub async fn renders(&self) -> Vec<(RenderTarget, RenderInstruction)> {
        self.renders.lock().await.clone()
    }

    pub async fn notices(&self) -> Vec<(RenderTarget, Notice)> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, target: RenderTarget, instruction: RenderInstruction) -> BotResult<()> {
        self.renders.lock().await.push((target, instruction));
        Ok(())
    }

    async fn announce(&self, target: RenderTarget, notice: Notice) -> BotResult<()> {
        self.notices.lock().await.push((target, notice));
        Ok(())
    }
}

pub fn test_services() -> GameServices {
    GameServices::new(Database::in_memory().unwrap())
}

pub fn test_manager() -> (SessionManager, Arc<RecordingRenderer>) {
    let renderer = Arc::new(RecordingRenderer::default());
    let manager = SessionManager::new(test_services(), renderer.clone());
    (manager, renderer)
}

pub const TARGET: RenderTarget = RenderTarget { channel_id: 100, message_id: 200 };

/// Starts the engine and attaches it to `TARGET`.
pub async fn start_attached(manager: &SessionManager, engine: Box<dyn SessionEngine>) -> (String, Transition) {
    let (id, opening) = manager.start(engine).await;
    manager.attach(&id, TARGET).await;
    (id, opening)
}

/// Lets spawned timer and deferred tasks run to completion.
pub async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn alice() -> Actor {
    Actor::new(1, "alice")
}

pub fn bob() -> Actor {
    Actor::new(2, "bob")
}

pub fn carol() -> Actor {
    Actor::new(3, "carol")
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

use crate::ai::completion::{ChatMessage, CompletionBackend};
use crate::errors::{BotError, BotResult};
use crate::session::paginator::PAGE_SIZE;

pub const QUEUE_CAPACITY: usize = 5;
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const HISTORY_LIMIT: usize = 20;

const FAILURE_NOTICE: &str = "An error occurred while processing your request. The error info has been logged.";

/// The message a queued request answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub channel_id: u64,
    pub message_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Chat,
    Image,
}

#[derive(Clone, Debug)]
pub struct RequestQueueEntry {
    pub requester: u64,
    pub requester_name: String,
    pub payload: String,
    pub kind: RequestKind,
    pub origin: ReplyTarget,
    pub enqueued_at: DateTime<Utc>,
}

impl RequestQueueEntry {
    pub fn new(requester: u64, requester_name: impl Into<String>, payload: impl Into<String>, kind: RequestKind, origin: ReplyTarget) -> Self {
        RequestQueueEntry {
            requester,
            requester_name: requester_name.into(),
            payload: payload.into(),
            kind,
            origin,
            enqueued_at: Utc::now(),
        }
    }
}

/// Bounded FIFO shared between the command handlers and the single consumer.
#[derive(Clone, Debug)]
pub struct RequestQueue {
    entries: Arc<Mutex<VecDeque<RequestQueueEntry>>>,
    capacity: usize,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        RequestQueue {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Returns the entry's 1-based position, or `QueueFull` without waiting.
    pub async fn enqueue(&self, entry: RequestQueueEntry) -> BotResult<usize> {
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            return Err(BotError::QueueFull);
        }
        entries.push_back(entry);
        Ok(entries.len())
    }

    pub async fn dequeue(&self) -> Option<RequestQueueEntry> {
        self.entries.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Too long for one message, delivered through a paginator.
    Paginated(String),
    Image {
        requester_name: String,
        prompt: String,
        url: String,
    },
    Failure(String),
}

/// Delivers consumer results back to the platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, origin: ReplyTarget, reply: Reply) -> BotResult<()>;
}

/// The only task that talks to the completion backend, one request at a time.
pub struct QueueConsumer {
    queue: RequestQueue,
    backend: Arc<dyn CompletionBackend>,
    sink: Arc<dyn ReplySink>,
    history: VecDeque<ChatMessage>,
}

impl QueueConsumer {
    pub fn new(queue: RequestQueue, backend: Arc<dyn CompletionBackend>, sink: Arc<dyn ReplySink>) -> Self {
        QueueConsumer {
            queue,
            backend,
            sink,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn history(&self) -> &VecDeque<ChatMessage> {
        &self.history
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run().instrument(info_span!("request_queue")))
    }

    pub async fn run(mut self) {
        info!("Request queue consumer started");
        loop {
            sleep(POLL_INTERVAL).await;
            self.process_next().await;
        }
    }

    /// Handles at most one entry; false when the queue was empty.
    pub async fn process_next(&mut self) -> bool {
        let Some(entry) = self.queue.dequeue().await else {
            return false;
        };

        let origin = entry.origin;
        let waited = Utc::now().signed_duration_since(entry.enqueued_at);
        info!("Processing {:?} request from {} after waiting {} ms", entry.kind, entry.requester, waited.num_milliseconds());
        let reply = match entry.kind {
            RequestKind::Chat => self.chat(&entry).await,
            RequestKind::Image => self.image(&entry).await,
        };
        let reply = reply.unwrap_or_else(|e| {
            error!("Request from {} failed: {}", entry.requester, e);
            Reply::Failure(FAILURE_NOTICE.to_string())
        });

        if let Err(e) = self.sink.deliver(origin, reply).await {
            warn!("Could not deliver reply to channel {}: {}", origin.channel_id, e);
        }
        true
    }

    async fn chat(&mut self, entry: &RequestQueueEntry) -> BotResult<Reply> {
        let user = ChatMessage::user(entry.payload.clone());
        let skip = (self.history.len() + 1).saturating_sub(HISTORY_LIMIT);
        let mut request: Vec<ChatMessage> = self.history.iter().skip(skip).cloned().collect();
        request.push(user.clone());

        // History only changes once the exchange is complete.
        let response = self.backend.chat(&request).await?;
        self.push_turn(user);
        self.push_turn(ChatMessage::assistant(response.clone()));

        if response.chars().count() > PAGE_SIZE {
            Ok(Reply::Paginated(response))
        } else {
            Ok(Reply::Text(response))
        }
    }

    async fn image(&mut self, entry: &RequestQueueEntry) -> BotResult<Reply> {
        let url = self.backend.image(&entry.payload).await?;
        Ok(Reply::Image {
            requester_name: entry.requester_name.clone(),
            prompt: entry.payload.clone(),
            url,
        })
    }

    fn push_turn(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

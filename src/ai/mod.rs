pub mod completion;
pub mod queue;

pub use completion::OpenAiBackend;
pub use queue::{QueueConsumer, Reply, ReplySink, ReplyTarget, RequestKind, RequestQueue, RequestQueueEntry};

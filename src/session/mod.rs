pub mod control;
pub mod manager;
pub mod paginator;
pub mod session;
#[cfg(test)]
pub mod testing;

pub use control::{Control, ControlStyle};
pub use manager::{RenderTarget, Renderer, SessionManager};
pub use session::{Actor, EmbedSpec, Notice, RenderInstruction, SessionEngine};

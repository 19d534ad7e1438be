//! Room listeners and event fan-out.

pub mod dispatch;
pub mod task;

pub use dispatch::{CommentPrinter, EventDispatcher, EventHandler};
pub use task::{ExitReason, ListenerExit, ListenerTask};

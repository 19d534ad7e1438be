//! Fan-out of room events to registered handlers.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use log::{debug, info};

use livewatch_protocol::LiveEvent;

use crate::registry::ListenerHandle;

/// Receives every event of every monitored room.
///
/// Handlers run inline on the listener task, so they must not block.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, room: &ListenerHandle, event: &LiveEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ListenerHandle, &LiveEvent) + Send + Sync,
{
    fn on_event(&self, room: &ListenerHandle, event: &LiveEvent) {
        self(room, event)
    }
}

/// Ordered list of handlers. Each event is passed to every handler in
/// registration order before the next event is read.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: impl EventHandler + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.register(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, room: &ListenerHandle, event: &LiveEvent) {
        for handler in &self.handlers {
            handler.on_event(room, event);
        }
    }
}

/// Default handler: writes comments to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentPrinter;

impl EventHandler for CommentPrinter {
    fn on_event(&self, room: &ListenerHandle, event: &LiveEvent) {
        match event {
            LiveEvent::Comment(comment) => {
                let time = Local
                    .timestamp_millis_opt(comment.send_time)
                    .single()
                    .unwrap_or_else(Local::now);
                info!(
                    "[{}] [{}] {}: {}",
                    time.format("%H:%M:%S"),
                    room_label(room),
                    comment.nickname,
                    comment.content
                );
            }
            LiveEvent::Audience { watching } => {
                debug!("[{}] {} watching", room_label(room), watching);
            }
        }
    }
}

fn room_label(room: &ListenerHandle) -> String {
    if room.display_name.is_empty() {
        room.owner_id.to_string()
    } else {
        room.display_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livewatch_protocol::{Comment, RoomDescriptor};
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    fn handle() -> ListenerHandle {
        ListenerHandle::new(
            &RoomDescriptor::new(1, "live"),
            "live",
            1,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for tag in ["first", "second"] {
            let seen = seen.clone();
            dispatcher.register(move |_: &ListenerHandle, event: &LiveEvent| {
                if let LiveEvent::Audience { watching } = event {
                    seen.lock().push((tag, *watching));
                }
            });
        }

        let room = handle();
        dispatcher.dispatch(&room, &LiveEvent::Audience { watching: 1 });
        dispatcher.dispatch(&room, &LiveEvent::Audience { watching: 2 });

        assert_eq!(
            *seen.lock(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_comment_printer_handles_all_events() {
        let dispatcher = EventDispatcher::new().with_handler(CommentPrinter);
        assert_eq!(dispatcher.len(), 1);

        let room = handle();
        dispatcher.dispatch(
            &room,
            &LiveEvent::Comment(Comment {
                user_id: 2,
                nickname: "bob".to_string(),
                content: "hello".to_string(),
                send_time: 0,
            }),
        );
        dispatcher.dispatch(&room, &LiveEvent::Audience { watching: 3 });
    }
}

//! Shared definitions for the livewatch room monitor.
//!
//! This crate defines the data model exchanged between the monitor daemon
//! and the platform collaborators, plus the traits those collaborators
//! implement.
//!
//! - [`RoomDescriptor`]: one entry of a live room poll
//! - [`StreamDescriptor`] / [`StreamVariant`]: stream quality metadata
//! - [`Session`]: the write-once credential bundle
//! - [`LiveEvent`]: events delivered by a room subscription
//! - [`RoomSource`], [`LiveConnector`], [`ActionClient`]: collaborator seams
//!
//! ```rust
//! use livewatch_protocol::{StreamDescriptor, StreamVariant};
//!
//! let desc = StreamDescriptor::new(1, vec![
//!     StreamVariant::new(500, "a"),
//!     StreamVariant::new(200, "b"),
//! ]);
//! assert_eq!(desc.lowest_variant().unwrap().bitrate, 200);
//! ```

pub mod error;
pub mod source;
pub mod types;

pub use error::ApiError;
pub use source::{ActionClient, EventStream, LiveConnector, LiveSubscription, RoomSource};
pub use types::{
    Comment, Cookie, LiveEvent, OwnerId, RoomDescriptor, Session, StreamDescriptor, StreamVariant,
};

//! acfun-api - HTTP client for the AcFun live platform.
//!
//! Implements the collaborator traits from `livewatch-protocol` on top of
//! the public web endpoints:
//!
//! - [`AcfunClient::login`]: account login producing the shared session
//! - [`RoomSource`](livewatch_protocol::RoomSource): full live room list
//! - [`LiveConnector`](livewatch_protocol::LiveConnector): play info and
//!   audience polling per room
//! - [`ActionClient`](livewatch_protocol::ActionClient): like, comment, gift

pub mod action;
pub mod client;
mod live_list;
mod login;
mod play;

pub use action::{default_combo_key, BANANA_GIFT_ID};
pub use client::{AcfunClient, ClientConfig};

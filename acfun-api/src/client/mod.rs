//! HTTP client for the AcFun live API.

pub mod connection;

pub use connection::{AcfunClient, ClientConfig};

//! SMPP 3.4 session layer.
//!
//! - [`server`]: accepts connections, authenticates binds against an
//!   account store and dispatches `submit_sm` to an application handler.
//! - [`client`]: binds as a transmitter and submits messages, matching
//!   responses to requests by sequence number.
//! - [`pdu`]: PDU model and the framing codec both sides share.
//! - [`message`]: application-level messages, statuses and TLV tags.

pub mod client;
pub mod config;
pub mod connection;
pub mod message;
pub mod pdu;
pub mod server;
pub mod telemetry;

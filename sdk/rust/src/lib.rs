//! Typed client for the edge session service.

pub mod client;

pub use client::{Acknowledgement, ClientError, Event, EventListing, SessionClient};

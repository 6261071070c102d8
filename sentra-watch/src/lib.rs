//! sentra-watch library interface
//!
//! The watch daemon: evidence accumulation, report creation,
//! notification dispatch, and the loops that drive them. Exposed as
//! a library for integration testing.

pub mod adapters;
pub mod consumer;
pub mod detect;
pub mod notify;
pub mod report;
pub mod session;
pub mod watch;

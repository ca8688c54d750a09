//! Bolt request execution engine
//!
//! Executes saved HTTP requests and replays collections of them:
//!
//! - [`environment`] - variable sets and `{{key}}` substitution
//! - [`cookies`] - domain-scoped cookie jar
//! - [`auth`] - auth configuration to headers and query parameters
//! - [`request`] - request definitions and the final request builder
//! - [`scripting`] - sandboxed pre-request and test scripts
//! - [`transport`] - HTTP transport
//! - [`engine`] - one request, start to finish
//! - [`runner`] - collection runs and their reports
//! - [`history`] - recently sent requests
//! - [`store`] / [`workspace`] - persistence

pub mod auth;
pub mod cli;
pub mod collection;
pub mod config;
pub mod cookies;
pub mod engine;
pub mod environment;
pub mod errors;
pub mod history;
pub mod request;
pub mod runner;
pub mod scripting;
pub mod signals;
pub mod status;
pub mod store;
pub mod transport;
pub mod workspace;

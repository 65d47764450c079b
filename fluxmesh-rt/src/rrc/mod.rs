//! Request/response correlation over the broker.
//!
//! A component that opts in (via `broker_request_response` or
//! `multi_session_request_response`) gets a companion controller: it
//! publishes requests with a generated request id and a transient reply
//! topic, pulls replies on an internal broker input, and hands each reply
//! back to the waiting caller - blocking, fire-and-forget, or streaming.

pub mod controller;
pub mod error;
pub mod session;

pub use controller::{
    RequestOptions, RequestOutcome, RequestResponseController, RrcEvent,
    DEFAULT_REPLY_METADATA_KEY, DEFAULT_REPLY_TOPIC_KEY,
};
pub use error::RrcError;
pub use session::{SessionInfo, SessionManager};

//! Shared utilities: identifiers, configuration merging, payload codec.

pub mod encoding;
pub mod identity;
pub mod ids;
pub mod merge;

pub use encoding::{decode_payload, encode_payload, PayloadEncoding, PayloadFormat};
pub use identity::ComponentIdentity;
pub use ids::{RequestId, SessionId};
pub use merge::deep_merge;

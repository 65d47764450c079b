//! The message-introspection language shared by transforms, input
//! selection, templates, and dynamic configuration.
//!
//! Expressions have the form `<source>:<path>` (see [`Expression`]). The
//! same grammar is reused everywhere a configuration value needs to look
//! inside a message, so this module is implemented once and owns its own
//! exhaustive test suite; its behavior is observable by every user of the
//! runtime.
//!
//! # Components
//!
//! - [`Expression`] / [`SourceExpression`] - parsed expression forms
//! - [`Evaluator`] - resolves expressions against a [`Message`](crate::message::Message)
//! - [`InvokeDescriptor`] / [`InvokeRegistry`] - dynamic `invoke` calls
//! - template rendering with `json://`, `yaml://`, `base64://`,
//!   `datauri:<mime>://` encoders

pub mod error;
pub mod evaluator;
pub mod functions;
pub mod invoke;
pub mod parser;
pub mod template;

pub use error::ExpressionError;
pub use evaluator::Evaluator;
pub use functions::{coerce_value, is_truthy, CoercionType};
pub use invoke::{InvokeDescriptor, InvokeFn, InvokeModule, InvokeParams, InvokeRegistry};
pub use parser::{Expression, SourceExpression};

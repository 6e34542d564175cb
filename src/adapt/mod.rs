//! WeChat adaptation: style inlining, sanitization, and validation.

pub mod engine;
pub mod resolver;
pub mod validate;

pub use engine::{AdaptEngine, SAFE_ATTRIBUTES, WECHAT_SAFE_TAGS};
pub use resolver::{CascadeResolver, StyleResolver};
pub use validate::{Validation, validate_for_wechat};

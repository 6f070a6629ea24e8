//! Shared types for the Fern compiler.
//!
//! - [`span`]: byte-offset spans and on-demand line/column lookup
//! - [`token`]: the token vocabulary produced by `fern-lexer`
//! - [`error`]: lexer errors

pub mod error;
pub mod span;
pub mod token;

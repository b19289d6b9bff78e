//! Convenience re-exports for the common case.
//!
//! ```
//! use convo_budget::prelude::*;
//! ```

pub use crate::context::{
    ContextConfig, ContextManager, ContextStats, ContextUsage, Turn, UsageTotals,
};
pub use crate::error::{ContextError, ContextResult};
pub use crate::{ContentBlock, Message, MessageContent, MessageRole, TokenUsage};

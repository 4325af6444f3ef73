//! Submitted queries: classification, options, the completion handle, and
//! result shaping.

mod handle;
mod kind;
mod options;
mod outcome;

pub use handle::{ConnectionBinding, ConnectionRole, HandleState, QueryFuture, QueryHandle};
pub use kind::QueryKind;
pub use options::{LogFn, Logging, QueryOptions};
pub use outcome::{QueryOutcome, RecordContext, ResultContext, classify_output};

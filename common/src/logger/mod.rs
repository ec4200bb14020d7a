mod init;
mod slow;
mod span;
mod trace_id;

pub use init::{LogTarget, init_tracing};
pub use slow::warn_if_slow;
pub use span::{child_span, root_span};
pub use trace_id::TraceId;

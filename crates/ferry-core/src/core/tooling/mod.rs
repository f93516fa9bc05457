//! CLI-facing outcome shaping and timing instrumentation.

pub(crate) mod outcome;
pub(crate) mod response;
pub(crate) mod timings;

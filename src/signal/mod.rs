//! Shared measurement plumbing: ring-buffer averaging and the
//! change-gated publish policy every sensor module builds on.

pub mod gate;
pub mod window;

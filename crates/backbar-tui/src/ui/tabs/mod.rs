//! Tab content rendering.

pub mod cabinet;

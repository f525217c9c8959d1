//! Route handlers grouped by surface.

pub mod control;
pub mod knowledge;
pub mod osc;

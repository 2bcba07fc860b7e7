//! Core types for clanpulse.

mod group;

pub use group::{AlertTier, Group, WindowCounts};

//! CLI library components for the harmonization engine.

pub mod logging;

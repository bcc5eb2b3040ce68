//! Command implementations.

pub(crate) mod breakers;
pub(crate) mod check;
pub(crate) mod config;
pub(crate) mod graph;
pub(crate) mod plugins;
pub(crate) mod simulate;

//! Core data shared by every layer.

pub mod region;

pub use region::{RegionGraph, RegionId};

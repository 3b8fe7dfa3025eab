//! Bundled job plug-ins.

pub mod item_pairs;

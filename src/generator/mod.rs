//! The QR generation pipeline: classify, optionally track, render, record.

pub mod classifier;
pub mod color;
pub mod debounce;
pub mod options;
pub mod render;
pub mod session;
pub mod tracking;

//! Dashboard UI Module
//!
//! Single-screen viewer: the test image with its detection overlay, a button
//! to rerun detection, and the list of results.

pub mod app;
pub mod theme;
pub mod views;

pub use app::TestImageSource;

//! Dashboard views

pub mod detector;

pub use detector::{render_detector_view, render_results_list, DetectorViewState};

//! Dashboard application entry point

use eframe::egui;
use std::path::PathBuf;
use tracing::info;

use crate::assets::AssetBundle;
use crate::dashboard::theme;
use crate::dashboard::views::{render_detector_view, render_results_list, DetectorViewState};
use crate::overlay::OverlayStyle;
use crate::pipeline::Driver;
use crate::vision::{describe, SourceImage};

/// Where "Load Test Image" reads from
#[derive(Debug, Clone)]
pub enum TestImageSource {
    /// Named image inside the asset bundle
    Bundled { assets: AssetBundle, name: String },
    /// Explicit file given on the command line
    File(PathBuf),
}

impl TestImageSource {
    fn load(&self) -> Result<SourceImage, String> {
        match self {
            TestImageSource::Bundled { assets, name } => assets.load_test_image(name).map_err(|e| e.to_string()),
            TestImageSource::File(path) => SourceImage::open(path).map_err(|e| describe(&e)),
        }
    }
}

/// The single-screen detector viewer
pub struct DashboardApp {
    driver: Driver,
    test_image: TestImageSource,
    style: OverlayStyle,
    view_state: DetectorViewState,
    /// Whether theme has been applied
    theme_applied: bool,
    /// Whether the test image was loaded on the first frame
    auto_loaded: bool,
}

impl DashboardApp {
    /// Create the viewer; state changes published by the driver wake the UI
    pub fn new(ctx: &egui::Context, driver: Driver, test_image: TestImageSource, style: OverlayStyle) -> Self {
        let ctx = ctx.clone();
        Self {
            driver: driver.with_repaint_notifier(move || ctx.request_repaint()),
            test_image,
            style,
            view_state: DetectorViewState::default(),
            theme_applied: false,
            auto_loaded: false,
        }
    }

    /// Native window options
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([900.0, 760.0])
                .with_min_inner_size([480.0, 400.0])
                .with_title("Bus Label Detector"),
            ..Default::default()
        }
    }

    /// Load the test image and start a detection cycle on it
    fn load_and_process_test_image(&mut self) {
        match self.test_image.load() {
            Ok(image) => {
                info!("Loaded test image ({}x{})", image.width(), image.height());
                // The driver publishes the outcome; the handle is not needed
                drop(self.driver.request(image));
            }
            Err(message) => self.driver.report_error(message),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme once
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        if !self.auto_loaded {
            self.auto_loaded = true;
            self.load_and_process_test_image();
        }

        let state = self.driver.snapshot();
        let mut load_clicked = false;

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                load_clicked = ui.button("Load Test Image").clicked();
            });
            ui.add_space(8.0);
            render_results_list(ui, &state);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none().inner_margin(16.0).show(ui, |ui| {
                render_detector_view(ui, &mut self.view_state, &state, &self.style);
            });
        });

        if load_clicked {
            self.load_and_process_test_image();
        }
    }
}

/// Run the viewer (blocking until the window closes)
pub fn run_dashboard(driver: Driver, test_image: TestImageSource, style: OverlayStyle) -> Result<(), eframe::Error> {
    eframe::run_native(
        "Bus Label Detector",
        DashboardApp::options(),
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(&cc.egui_ctx, driver, test_image, style)))),
    )
}

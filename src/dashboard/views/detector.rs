//! Detector view - annotated test image and detection results

use egui::{Align2, Color32, FontId, RichText, Rounding, Stroke};

use crate::dashboard::theme::ThemeColors;
use crate::overlay::{layout, OverlayShape, OverlayStyle, TextMeasure};
use crate::pipeline::{DetectionState, DetectionStatus};
use crate::vision::{Size, SourceImage};

/// View-local state: the uploaded texture and the image it was made from
#[derive(Default)]
pub struct DetectorViewState {
    texture: Option<egui::TextureHandle>,
    texture_source: Option<SourceImage>,
}

impl DetectorViewState {
    /// Upload `image` unless it is already the current texture
    fn sync_texture(&mut self, ctx: &egui::Context, image: &SourceImage) {
        if self.texture_source.as_ref().is_some_and(|current| current.same_as(image)) {
            return;
        }

        let rgb = image.rgb();
        let color_image =
            egui::ColorImage::from_rgb([rgb.width() as usize, rgb.height() as usize], rgb.as_raw());

        match self.texture {
            Some(ref mut texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("detector_image", color_image, egui::TextureOptions::LINEAR));
            }
        }
        self.texture_source = Some(image.clone());
    }
}

/// Text metrics from the egui font atlas
struct EguiMetrics<'a> {
    ctx: &'a egui::Context,
}

impl TextMeasure for EguiMetrics<'_> {
    fn measure(&self, text: &str, font_size: f32) -> Size {
        let galley = self
            .ctx
            .fonts(|fonts| fonts.layout_no_wrap(text.to_string(), FontId::proportional(font_size), Color32::BLACK));
        Size::new(galley.size().x, galley.size().y)
    }
}

fn color(rgba: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Progress, error message and the annotated image
pub fn render_detector_view(
    ui: &mut egui::Ui,
    view_state: &mut DetectorViewState,
    state: &DetectionState,
    style: &OverlayStyle,
) {
    if state.is_running() {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label(RichText::new("Processing...").color(ThemeColors::TEXT_SECONDARY));
        });
    }

    if let Some(error) = state.error_message() {
        ui.label(RichText::new(error).color(ThemeColors::ACCENT_ERROR));
    }

    ui.add_space(6.0);

    let Some(image) = state.image() else {
        ui.centered_and_justified(|ui| {
            ui.label(RichText::new("No image loaded").color(ThemeColors::TEXT_MUTED));
        });
        return;
    };

    view_state.sync_texture(ui.ctx(), image);
    let Some(texture) = view_state.texture.as_ref() else {
        return;
    };

    let (canvas, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
    let canvas_size = Size::new(canvas.width(), canvas.height());
    let image_size = image.size();

    let display = crate::vision::geometry::display_rect(canvas_size, image_size);
    let image_rect = egui::Rect::from_min_size(
        canvas.min + egui::vec2(display.x, display.y),
        egui::vec2(display.width, display.height),
    );
    let painter = ui.painter_at(canvas);
    painter.image(
        texture.id(),
        image_rect,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        Color32::WHITE,
    );

    let metrics = EguiMetrics { ctx: ui.ctx() };
    for shape in layout(canvas_size, image_size, state.detections(), style, &metrics) {
        match shape {
            OverlayShape::Outline { rect } => {
                let rect = egui::Rect::from_min_size(
                    canvas.min + egui::vec2(rect.x, rect.y),
                    egui::vec2(rect.width, rect.height),
                );
                painter.rect_stroke(rect, Rounding::ZERO, Stroke::new(style.stroke_width, color(style.stroke_color)));
            }
            OverlayShape::Label { chip, text, text_pos } => {
                let chip = egui::Rect::from_min_size(
                    canvas.min + egui::vec2(chip.x, chip.y),
                    egui::vec2(chip.width, chip.height),
                );
                painter.rect_filled(chip, Rounding::same(style.corner_radius), color(style.chip_color));
                painter.text(
                    canvas.min + egui::vec2(text_pos.0, text_pos.1),
                    Align2::LEFT_CENTER,
                    text,
                    FontId::proportional(style.font_size),
                    color(style.text_color),
                );
            }
        }
    }
}

/// One row per detection: confidence and recognized text
pub fn render_results_list(ui: &mut egui::Ui, state: &DetectionState) {
    if state.detections().is_empty() {
        if state.status() == DetectionStatus::Succeeded {
            ui.label(RichText::new("No bus labels detected").color(ThemeColors::TEXT_MUTED));
        }
        return;
    }

    egui::ScrollArea::vertical().max_height(150.0).show(ui, |ui| {
        for detection in state.detections() {
            ui.push_id(detection.id, |ui| {
                ui.label(
                    RichText::new(format!("Confidence: {:.2}", detection.confidence))
                        .size(13.0)
                        .color(ThemeColors::TEXT_SECONDARY),
                );
                match &detection.recognized_text {
                    Some(text) => {
                        ui.label(RichText::new(format!("OCR: {}", text)).size(17.0).strong());
                    }
                    None => {
                        ui.label(RichText::new("No text detected").size(13.0).color(ThemeColors::TEXT_MUTED));
                    }
                }
                ui.separator();
            });
        }
    });
}

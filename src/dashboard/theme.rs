//! Viewer theme and styling
//!
//! Neutral dark theme so the red boxes and yellow chips stand out.

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Viewer color palette
pub struct ThemeColors;

impl ThemeColors {
    pub const BG_DARK: Color32 = Color32::from_rgb(20, 20, 22);
    pub const BG_MEDIUM: Color32 = Color32::from_rgb(32, 32, 36);
    pub const BG_LIGHT: Color32 = Color32::from_rgb(44, 44, 50);

    pub const ACCENT_PRIMARY: Color32 = Color32::from_rgb(70, 140, 255);
    pub const ACCENT_ERROR: Color32 = Color32::from_rgb(235, 64, 52);

    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(236, 236, 240);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(165, 165, 175);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(128, 128, 128);
}

/// Apply the viewer theme to egui
pub fn apply_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = Visuals::dark();

    visuals.window_fill = ThemeColors::BG_MEDIUM;
    visuals.panel_fill = ThemeColors::BG_DARK;
    visuals.faint_bg_color = ThemeColors::BG_LIGHT;
    visuals.extreme_bg_color = ThemeColors::BG_DARK;

    // Prominent primary button
    visuals.widgets.inactive.weak_bg_fill = ThemeColors::ACCENT_PRIMARY;
    visuals.widgets.inactive.bg_fill = ThemeColors::ACCENT_PRIMARY;
    visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, ThemeColors::TEXT_PRIMARY);
    visuals.widgets.inactive.rounding = Rounding::same(6.0);

    visuals.widgets.hovered.weak_bg_fill = color_with_alpha(ThemeColors::ACCENT_PRIMARY, 220);
    visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, ThemeColors::TEXT_PRIMARY);
    visuals.widgets.hovered.rounding = Rounding::same(6.0);

    visuals.widgets.active.weak_bg_fill = color_with_alpha(ThemeColors::ACCENT_PRIMARY, 180);
    visuals.widgets.active.rounding = Rounding::same(6.0);

    visuals.selection.bg_fill = color_with_alpha(ThemeColors::ACCENT_PRIMARY, 77);
    visuals.selection.stroke = Stroke::new(1.0, ThemeColors::ACCENT_PRIMARY);

    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(16.0, 8.0);

    style.text_styles = [
        (TextStyle::Small, FontId::new(13.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(16.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
    ]
    .into();

    ctx.set_style(style);
}

/// Helper to create a color with modified alpha
pub fn color_with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

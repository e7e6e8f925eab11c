//! Background painting: floating note glyphs and the pointer marker.

use eframe::egui;
use amg_core::decor::{NoteGlyph, PointerTracker};

const GLYPH_SIZE: f32 = 24.0;
const MARKER_SIZE: f32 = 20.0;

/// Paint each glyph rising from the bottom edge, fading out near the top.
pub fn paint_glyphs(ctx: &egui::Context, glyphs: &[NoteGlyph]) {
    let rect = ctx.screen_rect();
    let elapsed = ctx.input(|i| i.time) as f32;
    let painter = ctx.layer_painter(egui::LayerId::background());

    for glyph in glyphs {
        let Some(progress) = glyph.progress(elapsed) else {
            continue;
        };
        let x = rect.left() + rect.width() * glyph.left / 100.0;
        let y = rect.bottom() - (rect.height() + GLYPH_SIZE) * progress;
        let fade = if progress > 0.8 { (1.0 - progress) / 0.2 } else { 1.0 };
        let color = egui::Color32::from_rgb(0x00, 0xA6, 0x7E).gamma_multiply(glyph.opacity * fade);
        painter.text(
            egui::pos2(x, y),
            egui::Align2::CENTER_CENTER,
            glyph.symbol,
            egui::FontId::proportional(GLYPH_SIZE),
            color,
        );
    }
}

/// Paint the marker that follows the pointer.
pub fn paint_marker(ctx: &egui::Context, pointer: &PointerTracker) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("pointer_marker"),
    ));
    painter.text(
        egui::pos2(pointer.x, pointer.y),
        egui::Align2::LEFT_TOP,
        '♪',
        egui::FontId::proportional(MARKER_SIZE),
        egui::Color32::from_rgb(0x00, 0x99, 0xFF),
    );
}

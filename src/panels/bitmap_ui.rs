//! One bitmap on screen: header band, image, drag rectangle and hover readout.
//!
//! Pointer positions are handed to the session relative to the widget's top
//! left corner, header band included; the mapper strips the chrome offsets.

use egui::{Color32, CornerRadius, Pos2, Rect, Sense, Stroke, StrokeKind, TextureHandle, Ui};

use super::panel_trait::{Panel, PanelContext, PanelState};
use crate::data::mapper::MapperConfig;
use crate::data::readout::{CellColour, Readout};
use crate::data::selection::PixelPos;
use crate::data::view::ViewKind;

const SELECTION_STROKE: Color32 = Color32::from_rgb(255, 200, 0);

pub struct BitmapPanel {
    kind: ViewKind,
    state: PanelState,
    chrome: MapperConfig,
    texture: Option<TextureHandle>,
    texture_revision: u64,
    hovering: bool,
}

impl BitmapPanel {
    pub fn new(kind: ViewKind, chrome: MapperConfig) -> Self {
        Self {
            kind,
            state: PanelState::default(),
            chrome,
            texture: None,
            texture_revision: 0,
            hovering: false,
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }
}

impl Panel for BitmapPanel {
    fn title(&self) -> &'static str {
        match self.kind {
            ViewKind::Origin => "Bitmap",
            ViewKind::Selected => "Selected area",
        }
    }

    fn icon_only(&self) -> Option<&'static str> {
        Some(match self.kind {
            ViewKind::Origin => egui_phosphor::regular::GRID_FOUR,
            ViewKind::Selected => egui_phosphor::regular::MAGNIFYING_GLASS_PLUS,
        })
    }

    fn state(&self) -> &PanelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelContext<'_>) {
        let Some(slot) = cx.session.slot(self.kind) else {
            if self.kind == ViewKind::Origin {
                ui.label("Waiting for the first bitmap…");
            }
            return;
        };

        if self.texture.is_none() || self.texture_revision != slot.revision() {
            let image = slot.image();
            let pixels = egui::ColorImage::from_rgba_unmultiplied(
                [image.width as usize, image.height as usize],
                &image.rgba,
            );
            match &mut self.texture {
                Some(texture) => texture.set(pixels, egui::TextureOptions::NEAREST),
                None => {
                    self.texture = Some(ui.ctx().load_texture(
                        format!("bitmap-{}", self.kind.query_value()),
                        pixels,
                        egui::TextureOptions::NEAREST,
                    ))
                }
            }
            self.texture_revision = slot.revision();
        }
        let image_size = egui::vec2(slot.view().width_px() as f32, slot.view().height_px() as f32);
        let bitmap_label = slot.view().bitmap_type().label();

        let offset = egui::vec2(self.chrome.chrome_offset_x as f32, self.chrome.chrome_offset_y as f32);
        let (rect, response) = ui.allocate_exact_size(image_size + offset, Sense::click_and_drag());
        let image_rect = Rect::from_min_size(rect.min + offset, image_size);
        let to_pixel = |p: Pos2| PixelPos::new((p.x - rect.min.x).floor() as i64, (p.y - rect.min.y).floor() as i64);

        // ── Pointer ──────────────────────────────────────────────────────
        match response.hover_pos() {
            Some(pos) => {
                self.hovering = true;
                if let Some(job) = cx.session.hover(self.kind, to_pixel(pos)) {
                    cx.jobs.push(job);
                }
            }
            None if self.hovering => {
                self.hovering = false;
                cx.session.hover_exit();
            }
            None => {}
        }

        if response.drag_started() {
            let origin = ui
                .input(|i| i.pointer.press_origin())
                .or_else(|| response.interact_pointer_pos());
            if let Some(pos) = origin {
                let lookups = cx.session.pointer_down(self.kind, to_pixel(pos));
                cx.jobs.extend(lookups);
            }
        }
        let dragging_here = cx.session.drag().is_some_and(|(kind, _)| kind == self.kind);
        if dragging_here && response.dragged() {
            if let Some(pos) = ui.ctx().pointer_latest_pos() {
                cx.session.pointer_move(to_pixel(pos));
            }
        }
        if dragging_here && response.drag_stopped() {
            let pos = ui.ctx().pointer_latest_pos().map(to_pixel);
            let jobs = cx.session.pointer_up(pos);
            cx.jobs.extend(jobs);
        }

        // ── Painting ─────────────────────────────────────────────────────
        let painter = ui.painter_at(rect);
        let visuals = ui.visuals();
        painter.text(
            rect.min + egui::vec2(4.0, 4.0),
            egui::Align2::LEFT_TOP,
            format!("{} ({bitmap_label})", self.title()),
            egui::FontId::proportional(14.0),
            visuals.strong_text_color(),
        );
        if let Some(readout) = cx.session.latest_readout().filter(|r| r.kind == self.kind) {
            painter.text(
                rect.min + egui::vec2(4.0, 24.0),
                egui::Align2::LEFT_TOP,
                readout_text(readout),
                egui::FontId::monospace(12.0),
                visuals.text_color(),
            );
        }
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                image_rect,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        if let Some((kind, drag)) = cx.session.drag() {
            if kind == self.kind {
                let drag_rect = Rect::from_min_max(
                    rect.min + egui::vec2(drag.min.x as f32, drag.min.y as f32),
                    rect.min + egui::vec2(drag.max.x as f32, drag.max.y as f32),
                );
                painter.rect_filled(drag_rect, CornerRadius::ZERO, SELECTION_STROKE.gamma_multiply(0.15));
                painter.rect_stroke(
                    drag_rect,
                    CornerRadius::ZERO,
                    Stroke::new(1.0, SELECTION_STROKE),
                    StrokeKind::Inside,
                );
            }
        }
    }
}

/// One-line description of a hover readout.
pub fn readout_text(readout: &Readout) -> String {
    let address = readout
        .address
        .as_ref()
        .map_or_else(|| "undefined".to_string(), ToString::to_string);
    let time = readout
        .time
        .as_ref()
        .map_or_else(|| "undefined".to_string(), ToString::to_string);
    let activity = match &readout.colour {
        CellColour::White => "active",
        CellColour::Black => "idle",
        CellColour::Gray => "outside",
        CellColour::Other(other) => other.as_str(),
    };
    format!("IP {address}  |  {time}  |  {activity}")
}

use egui::Ui;
use egui_phosphor::regular::TABLE;

use super::panel_trait::{Panel, PanelContext, PanelState};
use crate::data::view::{BitmapView, ViewKind};

/// Summary table of the displayed bitmaps.
#[derive(Default)]
pub struct StatsPanel {
    state: PanelState,
}

impl Panel for StatsPanel {
    fn title(&self) -> &'static str {
        "Statistics"
    }

    fn icon_only(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn state(&self) -> &PanelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelContext<'_>) {
        ui.strong(self.title_and_icon());
        let next_poll = cx.session.next_poll_in(cx.now);

        for kind in [ViewKind::Origin, ViewKind::Selected] {
            let Some(view) = cx.session.view(kind) else {
                continue;
            };
            egui::CollapsingHeader::new(match kind {
                ViewKind::Origin => "Bitmap",
                ViewKind::Selected => "Selected area",
            })
            .default_open(true)
            .show(ui, |ui| {
                egui::Grid::new(("stats", kind.query_value()))
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for (name, value) in view_rows(view) {
                            ui.label(name);
                            ui.monospace(value);
                            ui.end_row();
                        }
                    });
            });
        }

        match next_poll {
            Some(wait) => ui.label(format!("Next refresh in {} s", wait.as_secs())),
            None => ui.label("No refresh scheduled"),
        };
    }
}

/// Label/value pairs describing one view.
pub fn view_rows(view: &BitmapView) -> Vec<(&'static str, String)> {
    let span = view.time_range();
    vec![
        ("Type", view.bitmap_type().label().to_string()),
        ("Mode", view.mode().to_string()),
        ("First IP", view.addresses().low().to_string()),
        ("Last IP", view.addresses().high().to_string()),
        ("Granularity", format!("/{}", view.granularity())),
        ("First time", span.first().to_string()),
        ("Last time", span.last().to_string()),
        ("Interval", format!("{} s", view.interval_secs())),
        ("Cells", format!("{} x {}", view.ip_count(), view.time_count())),
    ]
}

use egui::Ui;
use egui_phosphor::regular::{ARROW_COUNTER_CLOCKWISE, MINUS, PLUS, SELECTION};

use super::panel_trait::{Panel, PanelContext, PanelState};
use crate::data::form::GranularityStep;
use crate::data::view::{BitmapType, ViewKind};

/// Bitmap type switch and the manual selection form.
#[derive(Default)]
pub struct SelectionPanel {
    state: PanelState,
}

impl Panel for SelectionPanel {
    fn title(&self) -> &'static str {
        "Selection"
    }

    fn icon_only(&self) -> Option<&'static str> {
        Some(SELECTION)
    }

    fn state(&self) -> &PanelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelContext<'_>) {
        ui.strong("Bitmap");
        let current = cx.session.bitmap_type();
        ui.horizontal(|ui| {
            for bitmap_type in BitmapType::ALL {
                if ui
                    .selectable_label(current == bitmap_type, bitmap_type.label())
                    .clicked()
                    && bitmap_type != current
                {
                    let jobs = cx.session.restart(cx.now, bitmap_type);
                    cx.jobs.extend(jobs);
                }
            }
        });

        ui.separator();
        ui.strong(self.title_and_icon());

        let mut step = None;
        egui::Grid::new("selection_form")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                let form = cx.session.form_mut();
                ui.label("First IP");
                ui.text_edit_singleline(&mut form.first_ip);
                ui.end_row();

                ui.label("Last IP");
                ui.text_edit_singleline(&mut form.last_ip);
                ui.end_row();

                ui.label("First time");
                ui.text_edit_singleline(&mut form.first_time);
                ui.end_row();

                ui.label("Last time");
                ui.text_edit_singleline(&mut form.last_time);
                ui.end_row();

                ui.label("Granularity");
                ui.horizontal(|ui| {
                    if ui.small_button(MINUS).clicked() {
                        step = Some(GranularityStep::Decrement);
                    }
                    ui.add(egui::TextEdit::singleline(&mut form.granularity).desired_width(40.0));
                    if ui.small_button(PLUS).clicked() {
                        step = Some(GranularityStep::Increment);
                    }
                });
                ui.end_row();
            });
        if let Some(step) = step {
            cx.session.step_granularity(step);
        }

        ui.horizontal(|ui| {
            let has_origin = cx.session.view(ViewKind::Origin).is_some();
            if ui
                .add_enabled(has_origin, egui::Button::new(format!("{SELECTION} Select")))
                .clicked()
            {
                // A rejection is reported through the session status line.
                if let Ok(job) = cx.session.submit_form() {
                    cx.jobs.push(job);
                }
            }
            if ui
                .add_enabled(has_origin, egui::Button::new(format!("{ARROW_COUNTER_CLOCKWISE} Reset")))
                .clicked()
            {
                cx.session.reset_form();
            }
        });

        if let Some(message) = cx.session.status() {
            ui.colored_label(ui.visuals().warn_fg_color, message);
        }
    }
}

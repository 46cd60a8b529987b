use std::time::Instant;

use egui::Ui;

use crate::client::Job;
use crate::session::ViewerSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelState {
    pub visible: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self { visible: true }
    }
}

/// What a panel may touch while it renders: the session, and a queue for the
/// requests its widgets produce.
pub struct PanelContext<'a> {
    pub session: &'a mut ViewerSession,
    pub jobs: &'a mut Vec<Job>,
    pub now: Instant,
}

pub trait Panel {
    fn title(&self) -> &'static str;
    fn state(&self) -> &PanelState;
    fn state_mut(&mut self) -> &mut PanelState;

    fn icon_only(&self) -> Option<&'static str> {
        None
    }

    fn title_and_icon(&self) -> String {
        match self.icon_only() {
            Some(icon) => format!("{icon} {}", self.title()),
            None => self.title().to_string(),
        }
    }

    /// Visibility toggle for the menu bar.
    fn render_menu(&mut self, ui: &mut Ui) {
        let label = self.title_and_icon();
        ui.checkbox(&mut self.state_mut().visible, label);
    }

    fn render_panel(&mut self, _ui: &mut Ui, _cx: &mut PanelContext<'_>) {}
}

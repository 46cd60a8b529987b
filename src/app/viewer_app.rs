use std::time::{Duration, Instant};

use eframe::egui;

use crate::client::Dispatcher;
use crate::config::InteractionConfig;
use crate::data::view::ViewKind;
use crate::panels::{BitmapPanel, Panel, PanelContext, SelectionPanel, StatsPanel};
use crate::session::ViewerSession;

/// Upper bound between frames while nothing else asks for a repaint.
const IDLE_REPAINT: Duration = Duration::from_secs(1);

pub struct ViewerApp {
    session: ViewerSession,
    dispatcher: Dispatcher,
    started: bool,

    origin_panel: BitmapPanel,
    selected_panel: BitmapPanel,
    stats_panel: StatsPanel,
    selection_panel: SelectionPanel,
}

impl ViewerApp {
    pub fn new(session: ViewerSession, dispatcher: Dispatcher, interaction: &InteractionConfig) -> Self {
        let chrome = interaction.mapper_config();
        Self {
            session,
            dispatcher,
            started: false,
            origin_panel: BitmapPanel::new(ViewKind::Origin, chrome),
            selected_panel: BitmapPanel::new(ViewKind::Selected, chrome),
            stats_panel: StatsPanel::default(),
            selection_panel: SelectionPanel::default(),
        }
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    /// Apply finished requests, then issue whatever the scheduler says is due.
    fn pump(&mut self, now: Instant) {
        for completion in self.dispatcher.drain() {
            let follow_ups = self.session.on_completion(completion, now);
            self.dispatcher.submit_all(follow_ups);
        }
        let jobs = if self.started {
            self.session.tick(now)
        } else {
            self.started = true;
            self.session.start(now)
        };
        self.dispatcher.submit_all(jobs);
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.pump(now);

        let mut jobs = Vec::new();

        egui::TopBottomPanel::top("viewer_menu").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("View", |ui| {
                    self.stats_panel.render_menu(ui);
                    self.selection_panel.render_menu(ui);
                    self.selected_panel.render_menu(ui);
                });
                ui.separator();
                ui.label(format!(
                    "{}  |  {}",
                    self.session.bitmap_type(),
                    self.session.mode()
                ));
            });
        });

        if self.stats_panel.state().visible || self.selection_panel.state().visible {
            egui::SidePanel::right("viewer_side")
                .resizable(true)
                .default_width(320.0)
                .show(ctx, |ui| {
                    let mut cx = PanelContext {
                        session: &mut self.session,
                        jobs: &mut jobs,
                        now,
                    };
                    if self.stats_panel.state().visible {
                        self.stats_panel.render_panel(ui, &mut cx);
                        ui.separator();
                    }
                    if self.selection_panel.state().visible {
                        self.selection_panel.render_panel(ui, &mut cx);
                    }
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                let mut cx = PanelContext {
                    session: &mut self.session,
                    jobs: &mut jobs,
                    now,
                };
                self.origin_panel.render_panel(ui, &mut cx);
                if self.selected_panel.state().visible {
                    ui.add_space(12.0);
                    self.selected_panel.render_panel(ui, &mut cx);
                }
            });
        });

        self.dispatcher.submit_all(jobs);

        // Completions wake the UI through the dispatcher; the timer needs its own wake-up.
        let wait = self
            .session
            .next_poll_in(now)
            .map_or(IDLE_REPAINT, |due| due.min(IDLE_REPAINT));
        ctx.request_repaint_after(wait);
    }
}

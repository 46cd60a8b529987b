//! Entry point for running the viewer as a native window.

use std::sync::Arc;

use eframe::egui;

use super::viewer_app::ViewerApp;
use crate::client::{Dispatcher, HttpBitmapService};
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::events::EventController;
use crate::session::ViewerSession;

/// Open the viewer window. Blocks until it is closed.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    run_viewer_with_events(config, EventController::new())
}

/// Like [`run_viewer`], publishing session events through `events`.
pub fn run_viewer_with_events(config: ViewerConfig, events: EventController) -> Result<()> {
    let session = ViewerSession::new(&config, events)?;
    let service = Arc::new(HttpBitmapService::new(&config.backend)?);
    tracing::info!(backend = service.base_url(), "starting viewer");

    let title = config.window.title.clone();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(&title)
            .with_inner_size(egui::vec2(config.window.width, config.window.height)),
        ..Default::default()
    };
    let interaction = config.interaction.clone();
    let workers = config.backend.workers;

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            // Install Phosphor icon font before creating the app.
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            let ctx = cc.egui_ctx.clone();
            let dispatcher = Dispatcher::with_workers(service, workers)
                .with_notify(move || ctx.request_repaint());
            Ok(Box::new(ViewerApp::new(session, dispatcher, &interaction)))
        }),
    )
    .map_err(|e| ViewerError::Window {
        message: e.to_string(),
    })
}

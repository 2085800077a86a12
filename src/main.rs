//! Desktop shell for the form designer.

mod app;

use crate::app::FormDesignerApp;

use eframe::egui;
use egui_form_designer::DesignerConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn initial_inner_size(config: &DesignerConfig) -> egui::Vec2 {
    // Canvas plus the default widths of the palette (220) and inspector (260)
    let w = config.canvas_size.x + 260.0 + 220.0 + 16.0;
    // Menubar and status line
    let h = config.canvas_size.y + 64.0;
    egui::vec2(w, h)
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DesignerConfig::from_env().unwrap_or_else(|err| {
        warn!("{err}; using the default configuration");
        DesignerConfig::default()
    });

    let mut native_options = eframe::NativeOptions::default();
    let size = initial_inner_size(&config);
    native_options.viewport = egui::ViewportBuilder::default()
        .with_inner_size(size)
        .with_min_inner_size(egui::vec2(640.0, 480.0))
        .with_resizable(true);

    eframe::run_native(
        "egui Form Designer",
        native_options,
        Box::new(|_cc| Ok(Box::new(FormDesignerApp::new(config)))),
    )
}

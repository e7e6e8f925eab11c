//! Desktop window for the AI Music Generator: pick a seed MIDI file, send it
//! off for generation, then play or save what comes back.

mod app;
mod decor;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([720.0, 560.0])
            .with_min_inner_size([480.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AI Music Generator",
        options,
        Box::new(|cc| Ok(Box::new(app::AmgApp::new(cc)))),
    )
}

mod aggregator;
mod capture_loader;
mod chart;
mod error;
mod field;
mod logging;
mod packet_processor;
mod session;
mod settings;
mod ui;

use capture_loader::PcapFileReader;
use chart::PlottersRenderer;
use session::Session;
use settings::PlotSettings;
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

fn main() {
    logging::init_logging();
    let settings = PlotSettings::from_env();
    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();

    let input_dir = get_input_dir(&mut input, &mut out, &settings);
    let renderer = PlottersRenderer::new(&settings);
    let session = Session::new(input_dir, settings, &PcapFileReader, &renderer);

    if let Err(e) = session.run(&mut input, &mut out) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn get_input_dir(input: &mut impl BufRead, out: &mut impl Write, settings: &PlotSettings) -> PathBuf {
    let raw = match ui::ask_input_dir(input, out) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            eprintln!("Error: no folder given.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    match ui::resolve_input_dir(&raw, settings) {
        Ok(dir) => dir,
        Err(e) => {
            println!("{e}");
            std::process::exit(1);
        }
    }
}

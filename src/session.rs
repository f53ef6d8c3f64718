use crate::{
    aggregator::Aggregate,
    capture_loader::{load_captures, CaptureReader},
    chart::{output_path, ChartRenderer},
    field::{Field, MenuChoice},
    settings::PlotSettings,
    ui,
};
use log::{debug, error};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

/// The interactive menu loop over one capture folder.
pub(crate) struct Session<'a> {
    input_dir: PathBuf,
    settings: PlotSettings,
    reader: &'a dyn CaptureReader,
    renderer: &'a dyn ChartRenderer,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        input_dir: PathBuf,
        settings: PlotSettings,
        reader: &'a dyn CaptureReader,
        renderer: &'a dyn ChartRenderer,
    ) -> Self {
        Self {
            input_dir,
            settings,
            reader,
            renderer,
        }
    }

    /// Shows the menu until the operator picks `0` or input ends.
    pub(crate) fn run(&self, input: &mut impl BufRead, out: &mut impl Write) -> io::Result<()> {
        loop {
            ui::print_menu(out)?;
            let Some(line) = ui::read_line(input)? else {
                writeln!(out)?;
                return Ok(());
            };
            match MenuChoice::parse(&line) {
                MenuChoice::Exit => return Ok(()),
                MenuChoice::Invalid => ui::print_invalid_choice(out)?,
                MenuChoice::Field(field) => {
                    self.plot(field, out)?;
                }
            }
        }
    }

    /// Loads every capture, aggregates `field` and renders one chart.
    /// Returns the written path, or `None` if rendering failed.
    pub(crate) fn plot(&self, field: Field, out: &mut impl Write) -> io::Result<Option<PathBuf>> {
        let aggregate = {
            let files = load_captures(&self.input_dir, &self.settings, self.reader);
            debug!("aggregating {} over {} capture files", field, files.len());
            Aggregate::collect(field, &files)
        };

        let path = output_path(&self.settings.output_dir, field);
        match self.renderer.render(field, &aggregate, &path) {
            Ok(()) => {
                ui::print_saved(out, field, &self.settings.output_dir, &path)?;
                Ok(Some(path))
            }
            Err(e) => {
                error!("Error rendering plot for {}: {}", field, e);
                Ok(None)
            }
        }
    }
}

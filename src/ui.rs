use crate::{error::InputError, field::Field, settings::PlotSettings};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

pub(crate) fn prompt(out: &mut impl Write, text: &str) -> io::Result<()> {
    write!(out, "{text}")?;
    out.flush()
}

/// One line from `input` without its line ending; `None` at end of input.
pub(crate) fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

pub(crate) fn ask_input_dir(input: &mut impl BufRead, out: &mut impl Write) -> io::Result<Option<String>> {
    prompt(out, "Enter file path: ")?;
    read_line(input)
}

/// Checks the capture folder exists and makes sure the output folder does.
pub(crate) fn resolve_input_dir(raw: &str, settings: &PlotSettings) -> Result<PathBuf, InputError> {
    let input_dir = PathBuf::from(raw);
    if !input_dir.exists() {
        return Err(InputError::MissingFolder(raw.to_string()));
    }
    std::fs::create_dir_all(&settings.output_dir).map_err(|source| InputError::OutputFolder {
        path: settings.output_dir.clone(),
        source,
    })?;
    Ok(input_dir)
}

pub(crate) fn print_menu(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Select a field to analyze:")?;
    for (i, field) in Field::ALL.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, field)?;
    }
    writeln!(out, "0. Exit")?;
    prompt(out, "Enter the number corresponding to your choice: ")
}

pub(crate) fn print_invalid_choice(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Invalid choice. Please try again.")
}

pub(crate) fn print_saved(out: &mut impl Write, field: Field, dir: &Path, path: &Path) -> io::Result<()> {
    writeln!(
        out,
        "Plot for {} saved in {} as {}.",
        field,
        dir.display(),
        path.display()
    )
}

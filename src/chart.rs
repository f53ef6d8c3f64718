use crate::{
    aggregator::{flag_labels, Aggregate, FieldValue, FlagCounts, Series},
    error::RenderError,
    field::Field,
    settings::PlotSettings,
};
use chrono::{DateTime, Local};
use plotters::{
    coord::{
        ranged1d::{DefaultFormatting, KeyPointHint, Ranged, ValueFormatter},
        types::RangedCoordf64,
    },
    prelude::*,
};
use std::{
    ops::Range,
    path::{Path, PathBuf},
};

const FONT: &str = "sans-serif";
const LINE_OPACITY: f64 = 0.7;
const MARKER_SIZE: i32 = 3;

/// Draws an aggregate for one field into an image file.
pub(crate) trait ChartRenderer {
    fn render(&self, field: Field, aggregate: &Aggregate, path: &Path) -> Result<(), RenderError>;
}

/// Where the chart for `field` goes: `<Field_Name>.png`, or with a
/// `_YYYYMMDDHHMMSS` suffix when that name is already taken.
pub(crate) fn output_path(dir: &Path, field: Field) -> PathBuf {
    output_path_at(dir, field, Local::now())
}

fn output_path_at(dir: &Path, field: Field, now: DateTime<Local>) -> PathBuf {
    let stem = field.file_stem();
    let path = dir.join(format!("{stem}.png"));
    if !path.exists() {
        return path;
    }

    let stamped = format!("{stem}_{}", now.format("%Y%m%d%H%M%S"));
    let path = dir.join(format!("{stamped}.png"));
    if !path.exists() {
        return path;
    }
    // same field rendered twice within one second
    let mut n = 1;
    loop {
        let path = dir.join(format!("{stamped}_{n}.png"));
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

/// Renders PNG charts with `plotters`' bitmap backend.
pub(crate) struct PlottersRenderer {
    width: u32,
    height: u32,
    bar_width: f64,
}

impl PlottersRenderer {
    pub fn new(settings: &PlotSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            bar_width: settings.bar_width,
        }
    }

    fn draw_flag_counts(&self, tables: &[FlagCounts], path: &Path) -> Result<(), RenderError> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(RenderError::drawing)?;

        let labels = flag_labels(tables);
        let layout = BarLayout::new(labels.len(), tables.len(), self.bar_width);
        let x_axis = layout.axis(&labels);
        let max_count = tables
            .iter()
            .flat_map(|t| t.counts.values())
            .copied()
            .max()
            .unwrap_or(0);
        let y_max = (max_count as f64 * 1.05).max(1.0);

        let mut chart = ChartBuilder::on(&root)
            .caption("TCP Flag Occurrences Across All PCAP Files", (FONT, 24))
            .margin(10)
            .x_label_area_size(70)
            .y_label_area_size(60)
            .build_cartesian_2d(x_axis.clone(), 0f64..y_max)
            .map_err(RenderError::drawing)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(BLACK.mix(0.2))
            .light_line_style(WHITE)
            .x_desc("TCP Flags")
            .y_desc("Count")
            .x_label_style((FONT, 14).into_font().transform(FontTransform::Rotate90))
            .x_label_formatter(&|x| x_axis.label_at(*x))
            .y_label_formatter(&|y| format!("{y:.0}"))
            .draw()
            .map_err(RenderError::drawing)?;

        for (i, table) in tables.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            chart
                .draw_series(labels.iter().enumerate().map(|(g, label)| {
                    let (x0, x1) = layout.bar_span(g, i);
                    Rectangle::new([(x0, 0.0), (x1, table.count(label) as f64)], color.filled())
                }))
                .map_err(RenderError::drawing)?
                .label(table.file.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        if !tables.is_empty() {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(RenderError::drawing)?;
        }

        root.present().map_err(RenderError::drawing)?;
        Ok(())
    }

    fn draw_series(&self, field: Field, series: &[Series], path: &Path) -> Result<(), RenderError> {
        let axis = ValueAxis::for_series(series);
        let lines: Vec<(&str, Vec<(f64, f64)>)> = series
            .iter()
            .filter(|s| !s.points.is_empty())
            .map(|s| {
                let points = s
                    .points
                    .iter()
                    .filter_map(|(t, v)| axis.position(v).map(|y| (*t, y)))
                    .collect();
                (s.file.as_str(), points)
            })
            .collect();

        match axis.keyed() {
            Some(y_axis) => {
                let labels = y_axis.clone();
                let formatter = |y: &f64| labels.label_at(*y);
                let formatter: &dyn Fn(&f64) -> String = &formatter;
                self.draw_lines(field, &lines, y_axis, Some(formatter), path)
            }
            None => self.draw_lines(field, &lines, RangedCoordf64::from(axis.range()), None, path),
        }
    }

    fn draw_lines<Y>(
        &self,
        field: Field,
        lines: &[(&str, Vec<(f64, f64)>)],
        y_axis: Y,
        y_labels: Option<&dyn Fn(&f64) -> String>,
        path: &Path,
    ) -> Result<(), RenderError>
    where
        Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
    {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(RenderError::drawing)?;

        let title = format!("{field} Over Time Across All PCAP Files");
        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(time_range(lines), y_axis)
            .map_err(RenderError::drawing)?;

        let mut mesh = chart.configure_mesh();
        mesh.x_desc("Time (seconds from start)")
            .y_desc(field.name())
            .y_labels(10);
        if let Some(formatter) = y_labels {
            mesh.y_label_formatter(formatter);
        }
        mesh.draw().map_err(RenderError::drawing)?;

        for (i, (file, points)) in lines.iter().enumerate() {
            let color = Palette99::pick(i).mix(LINE_OPACITY);
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(RenderError::drawing)?
                .label(*file)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            chart
                .draw_series(points.iter().map(|p| Circle::new(*p, MARKER_SIZE, color.filled())))
                .map_err(RenderError::drawing)?;
        }

        if !lines.is_empty() {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(RenderError::drawing)?;
        }

        root.present().map_err(RenderError::drawing)?;
        Ok(())
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, field: Field, aggregate: &Aggregate, path: &Path) -> Result<(), RenderError> {
        match aggregate {
            Aggregate::FlagCounts(tables) => self.draw_flag_counts(tables, path),
            Aggregate::Series(series) => self.draw_series(field, series, path),
        }
    }
}

/// A linear `f64` axis whose only ticks are the given positions, each
/// carrying its own label (flag groups, TLS versions).
#[derive(Debug, Clone, PartialEq)]
struct KeyedAxis {
    range: Range<f64>,
    keys: Vec<(f64, String)>,
}

impl KeyedAxis {
    fn new(range: Range<f64>, keys: Vec<(f64, String)>) -> Self {
        Self { range, keys }
    }

    fn label_at(&self, value: f64) -> String {
        self.keys
            .iter()
            .find(|(at, _)| (at - value).abs() < 1e-9)
            .map(|(_, label)| label.clone())
            .unwrap_or_default()
    }
}

impl Ranged for KeyedAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        let span = self.range.end - self.range.start;
        let frac = (value - self.range.start) / span;
        limit.0 + (frac * (limit.1 - limit.0) as f64).round() as i32
    }

    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.keys.iter().map(|(at, _)| *at).collect()
    }

    fn range(&self) -> Range<f64> {
        self.range.clone()
    }
}

/// Side-by-side bars: group `g` starts at `x = g`, file `i` is offset by `i * width`.
#[derive(Debug, Clone, Copy)]
struct BarLayout {
    groups: usize,
    files: usize,
    width: f64,
}

impl BarLayout {
    fn new(groups: usize, files: usize, width: f64) -> Self {
        Self {
            groups,
            files,
            width,
        }
    }

    fn bar_span(&self, group: usize, file: usize) -> (f64, f64) {
        let x0 = group as f64 + file as f64 * self.width;
        (x0, x0 + self.width)
    }

    fn tick(&self, group: usize) -> f64 {
        group as f64 + self.width * (self.files as f64 / 2.0)
    }

    fn x_range(&self) -> Range<f64> {
        let last = self.groups.saturating_sub(1) as f64;
        -0.5..last + self.files as f64 * self.width + 0.5
    }

    /// X axis with one labelled tick centred under each group of bars.
    fn axis(&self, labels: &[String]) -> KeyedAxis {
        let keys = labels
            .iter()
            .take(self.groups)
            .enumerate()
            .map(|(g, label)| (self.tick(g), label.clone()))
            .collect();
        KeyedAxis::new(self.x_range(), keys)
    }
}

/// Y axis of a time-series chart: raw numbers, or categories for labelled
/// values such as TLS versions (in order of first appearance).
#[derive(Debug, Clone, PartialEq)]
enum ValueAxis {
    Numeric { min: f64, max: f64 },
    Categorical(Vec<String>),
}

impl ValueAxis {
    fn for_series(series: &[Series]) -> Self {
        let values = series.iter().flat_map(|s| s.points.iter().map(|(_, v)| v));
        let mut categories: Vec<String> = Vec::new();
        let mut bounds: Option<(f64, f64)> = None;
        for value in values {
            match value {
                FieldValue::Label(label) => {
                    if !categories.contains(label) {
                        categories.push(label.clone());
                    }
                }
                FieldValue::Number(n) => {
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(*n), hi.max(*n)),
                        None => (*n, *n),
                    });
                }
            }
        }

        if !categories.is_empty() {
            return ValueAxis::Categorical(categories);
        }
        let (min, max) = bounds.unwrap_or((0.0, 1.0));
        ValueAxis::Numeric { min, max }
    }

    fn position(&self, value: &FieldValue) -> Option<f64> {
        match (self, value) {
            (ValueAxis::Numeric { .. }, FieldValue::Number(n)) => Some(*n),
            (ValueAxis::Categorical(categories), FieldValue::Label(label)) => {
                categories.iter().position(|c| c == label).map(|i| i as f64)
            }
            _ => None,
        }
    }

    fn range(&self) -> Range<f64> {
        match self {
            ValueAxis::Numeric { min, max } if max > min => {
                let pad = (max - min) * 0.05;
                min - pad..max + pad
            }
            ValueAxis::Numeric { min, .. } => min - 1.0..min + 1.0,
            ValueAxis::Categorical(categories) => -0.5..categories.len() as f64 - 0.5,
        }
    }

    /// Category axis with one tick per label; `None` for numeric values.
    fn keyed(&self) -> Option<KeyedAxis> {
        match self {
            ValueAxis::Numeric { .. } => None,
            ValueAxis::Categorical(categories) => {
                let keys = categories
                    .iter()
                    .enumerate()
                    .map(|(i, label)| (i as f64, label.clone()))
                    .collect();
                Some(KeyedAxis::new(self.range(), keys))
            }
        }
    }
}

/// Spans every relative time, including negative ones from packets that
/// were captured before the file's first record.
fn time_range(lines: &[(&str, Vec<(f64, f64)>)]) -> Range<f64> {
    let mut times = lines
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(t, _)| *t));
    let Some(first) = times.next() else {
        return 0.0..1.0;
    };
    let (lo, hi) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    if hi > lo {
        let pad = (hi - lo) * 0.02;
        lo - pad..hi + pad
    } else {
        lo - 0.5..lo + 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(file: &str, points: Vec<(f64, FieldValue)>) -> Series {
        Series {
            file: file.to_string(),
            points,
        }
    }

    #[test]
    fn output_path_uses_field_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            output_path(dir.path(), Field::TcpWindowSize),
            dir.path().join("TCP_Window_Size.png")
        );
    }

    #[test]
    fn output_path_appends_timestamp_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        std::fs::write(dir.path().join("IP_TTL.png"), b"").unwrap();

        let second = output_path_at(dir.path(), Field::IpTtl, now);
        assert_eq!(second, dir.path().join("IP_TTL_20240309140507.png"));

        std::fs::write(&second, b"").unwrap();
        let third = output_path_at(dir.path(), Field::IpTtl, now);
        assert_eq!(third, dir.path().join("IP_TTL_20240309140507_1.png"));
    }

    #[test]
    fn bars_sit_side_by_side_with_centered_ticks() {
        let layout = BarLayout::new(2, 2, 0.2);
        assert_eq!(layout.bar_span(0, 0), (0.0, 0.2));
        assert_eq!(layout.bar_span(0, 1), (0.2, 0.4));
        let (x0, x1) = layout.bar_span(1, 1);
        assert_eq!(x0, 1.2);
        assert!((x1 - x0 - 0.2).abs() < 1e-9);

        let range = layout.x_range();
        assert!(range.start < 0.0 && range.end > 1.4);
    }

    #[test]
    fn flag_groups_are_labelled_under_their_bars() {
        let labels = vec!["A".to_string(), "SA".to_string()];
        let axis = BarLayout::new(2, 2, 0.2).axis(&labels);

        assert_eq!(axis.key_points(10usize), vec![0.2, 1.2]);
        assert_eq!(axis.label_at(0.2), "A");
        assert_eq!(axis.label_at(1.2), "SA");
        assert_eq!(axis.label_at(0.7), "");
    }

    #[test]
    fn keyed_axis_maps_linearly_onto_pixels() {
        let axis = KeyedAxis::new(-0.5..1.5, vec![]);
        assert_eq!(axis.map(&-0.5, (0, 200)), 0);
        assert_eq!(axis.map(&0.5, (0, 200)), 100);
        assert_eq!(axis.map(&1.5, (0, 200)), 200);
        // y axes come in flipped
        assert_eq!(axis.map(&1.5, (400, 0)), 0);
    }

    #[test]
    fn empty_bar_layout_has_a_usable_range() {
        let layout = BarLayout::new(0, 0, 0.2);
        let axis = layout.axis(&[]);
        assert!(axis.key_points(10usize).is_empty());
        let range = layout.x_range();
        assert!(range.end > range.start);
    }

    #[test]
    fn tls_versions_become_categories_in_first_seen_order() {
        let axis = ValueAxis::for_series(&[
            series(
                "a.pcap",
                vec![
                    (0.0, FieldValue::Label("0x0303".into())),
                    (1.0, FieldValue::Label("0x0301".into())),
                ],
            ),
            series("b.pcap", vec![(0.0, FieldValue::Label("0x0303".into()))]),
        ]);

        assert_eq!(
            axis,
            ValueAxis::Categorical(vec!["0x0303".into(), "0x0301".into()])
        );
        assert_eq!(axis.position(&FieldValue::Label("0x0301".into())), Some(1.0));

        let keyed = axis.keyed().expect("category axis");
        assert_eq!(keyed.key_points(10usize), vec![0.0, 1.0]);
        assert_eq!(keyed.label_at(0.0), "0x0303");
        assert_eq!(keyed.label_at(1.0), "0x0301");
        assert_eq!(keyed.label_at(0.5), "");
    }

    #[test]
    fn numeric_axis_pads_its_bounds() {
        let axis = ValueAxis::for_series(&[series(
            "a.pcap",
            vec![(0.0, FieldValue::Number(40.0)), (1.0, FieldValue::Number(60.0))],
        )]);
        assert_eq!(axis, ValueAxis::Numeric { min: 40.0, max: 60.0 });
        let range = axis.range();
        assert!(range.start < 40.0 && range.end > 60.0);
        assert!(axis.keyed().is_none());
    }

    #[test]
    fn empty_series_give_default_ranges() {
        let axis = ValueAxis::for_series(&[series("a.pcap", vec![])]);
        assert_eq!(axis, ValueAxis::Numeric { min: 0.0, max: 1.0 });
        assert_eq!(time_range(&[]), 0.0..1.0);

        let flat = ValueAxis::Numeric { min: 64.0, max: 64.0 };
        assert_eq!(flat.range(), 63.0..65.0);
    }

    #[test]
    fn time_range_covers_packets_before_the_first_one() {
        let range = time_range(&[("a.pcap", vec![(0.0, 1.0), (-2.0, 5.0), (3.0, 2.0)])]);
        assert!(range.contains(&-2.0));
        assert!(range.contains(&3.0));

        let single = time_range(&[("a.pcap", vec![(0.0, 1.0)])]);
        assert!(single.contains(&0.0));
        assert!(single.end > single.start);
    }

    fn assert_png(path: &Path) {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"), "{}", path.display());
    }

    fn renderer() -> PlottersRenderer {
        PlottersRenderer::new(&PlotSettings::default())
    }

    fn flag_table(file: &str, counts: &[(&str, usize)]) -> FlagCounts {
        FlagCounts {
            file: file.to_string(),
            counts: counts.iter().map(|(l, n)| (l.to_string(), *n)).collect(),
        }
    }

    #[test]
    fn renders_flag_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TCP_Flags.png");
        let aggregate = Aggregate::FlagCounts(vec![
            flag_table("one.pcap", &[("SA", 5), ("A", 3)]),
            flag_table("two.pcap", &[("SA", 2)]),
        ]);

        renderer().render(Field::TcpFlags, &aggregate, &path).unwrap();
        assert_png(&path);
    }

    #[test]
    fn renders_empty_flag_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TCP_Flags.png");
        let aggregate = Aggregate::FlagCounts(vec![flag_table("udp.pcap", &[])]);

        renderer().render(Field::TcpFlags, &aggregate, &path).unwrap();
        assert_png(&path);

        let path = dir.path().join("none.png");
        renderer()
            .render(Field::TcpFlags, &Aggregate::FlagCounts(vec![]), &path)
            .unwrap();
        assert_png(&path);
    }

    #[test]
    fn renders_numeric_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IP_TTL.png");
        let aggregate = Aggregate::Series(vec![
            series(
                "a.pcap",
                vec![
                    (0.0, FieldValue::Number(64.0)),
                    (-0.5, FieldValue::Number(63.0)),
                    (1.5, FieldValue::Number(128.0)),
                ],
            ),
            series("b.pcap", vec![]),
        ]);

        renderer().render(Field::IpTtl, &aggregate, &path).unwrap();
        assert_png(&path);
    }

    #[test]
    fn renders_tls_version_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TLS_Version.png");
        let aggregate = Aggregate::Series(vec![series(
            "tls.pcap",
            vec![
                (0.0, FieldValue::Label("0x0301".into())),
                (0.2, FieldValue::Label("0x0303".into())),
            ],
        )]);

        renderer().render(Field::TlsVersion, &aggregate, &path).unwrap();
        assert_png(&path);
    }

    #[test]
    fn renders_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TCP_Window_Size.png");

        renderer()
            .render(Field::TcpWindowSize, &Aggregate::Series(vec![]), &path)
            .unwrap();
        assert_png(&path);
    }
}

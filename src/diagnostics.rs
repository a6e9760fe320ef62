//! Tensor heatmaps for debugging model internals.
//!
//! Rank 0-2 tensors become one annotated heatmap; rank 3-4 tensors become a
//! grid of rank-2 heatmaps sharing one colour bar. The colour scale is
//! always symmetric around zero so signs read the same across plots.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayView2, ArrayView4, ArrayViewD, Axis, Ix2, Ix4, IxDyn};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use serde::{Deserialize, Serialize};

use crate::error::{DaoError, Result};
use crate::vocab::Vocab;

const CELL: i32 = 44;
const GRID_CELL: i32 = 22;
const GAP: i32 = 22;
const TICK_AREA: i32 = 150;
const TITLE_AREA: i32 = 44;
const COLORBAR_AREA: i32 = 90;
const COLORBAR_STEPS: i32 = 48;

const FONT: &str = "sans-serif";

type DrawResult<DB> = std::result::Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

// ── Axis labels ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Class,
    Emb,
    EntClass,
    Ent,
    EntSent,
    MixEmb,
    Sent,
    Tok,
    Word,
}

/// Sizes needed to label the axes of training tensors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelContext {
    pub batch_size: usize,
    pub class_count: usize,
    pub emb_size: usize,
    pub sent_count: usize,
    pub sent_len: usize,
    #[serde(skip)]
    pub vocab: Option<Vocab>,
}

impl LabelContext {
    pub fn with_vocab(mut self, vocab: Vocab) -> Self {
        self.vocab = Some(vocab);
        self
    }

    pub fn labels(&self, kind: AxisKind) -> Result<Vec<String>> {
        let pairs = |outer: usize, inner: usize, fmt: &dyn Fn(usize, usize) -> String| {
            (0..outer)
                .flat_map(|i| (0..inner).map(move |j| (i, j)))
                .map(|(i, j)| fmt(i, j))
                .collect::<Vec<_>>()
        };
        let labels: Vec<String> = match kind {
            AxisKind::Class => (0..self.class_count).map(|i| format!("class {i}")).collect(),
            AxisKind::Emb => (0..self.emb_size).map(|i| format!("emb {i}")).collect(),
            AxisKind::EntClass => pairs(self.batch_size, self.class_count, &|i, j| {
                format!("ent {i} / class {j}")
            }),
            AxisKind::Ent => (0..self.batch_size).map(|i| format!("ent {i}")).collect(),
            AxisKind::EntSent => pairs(self.batch_size, self.sent_count, &|i, j| {
                format!("ent {i} / sent {j}")
            }),
            AxisKind::MixEmb => pairs(self.class_count, self.emb_size, &|i, j| {
                format!("mix {i} / class {j}")
            }),
            AxisKind::Sent => (0..self.sent_count).map(|i| format!("sent {i}")).collect(),
            AxisKind::Tok => (0..self.sent_len).map(|i| format!("tok {i}")).collect(),
            AxisKind::Word => match &self.vocab {
                Some(vocab) => vocab.itos().to_vec(),
                None => {
                    return Err(DaoError::InvalidTensor(
                        "word labels need a vocabulary".to_string(),
                    ));
                }
            },
        };
        Ok(labels)
    }
}

// ── Tensor dumps ─────────────────────────────────────────────────────────

/// JSON form of a tensor handed to the `plot` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorDump {
    pub title: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    #[serde(default)]
    pub labels: Option<Vec<Vec<String>>>,
}

impl TensorDump {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DaoError::io(path, e))?;
        serde_json::from_str(&json).map_err(|e| DaoError::format(path, e.line(), e.to_string()))
    }

    pub fn to_array(&self) -> Result<ArrayD<f32>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone())
            .map_err(|e| DaoError::InvalidTensor(format!("shape {:?}: {e}", self.shape)))
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// `[-m, +m]` with `m = max(|min|, |max|)`; `(0, 0)` for an empty tensor.
pub fn color_bounds(tensor: &ArrayViewD<f32>) -> (f32, f32) {
    if tensor.is_empty() {
        return (0.0, 0.0);
    }
    let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
    let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let bound = min.abs().max(max.abs());
    (-bound, bound)
}

/// Blue for negative, white at zero, red for positive.
fn color_for(value: f32, bound: f32) -> RGBColor {
    const NEG: (f32, f32, f32) = (59.0, 76.0, 192.0);
    const POS: (f32, f32, f32) = (180.0, 4.0, 38.0);
    if bound <= 0.0 || !value.is_finite() {
        return WHITE;
    }
    let t = (value / bound).clamp(-1.0, 1.0);
    let (r, g, b) = if t < 0.0 { NEG } else { POS };
    let t = t.abs();
    let mix = |c: f32| (255.0 + (c - 255.0) * t).round() as u8;
    RGBColor(mix(r), mix(g), mix(b))
}

fn text_color(fill: &RGBColor) -> RGBColor {
    let luma = 0.299 * fill.0 as f32 + 0.587 * fill.1 as f32 + 0.114 * fill.2 as f32;
    if luma < 140.0 { WHITE } else { BLACK }
}

/// Render `tensor` as an SVG heatmap at `out`. `labels` holds one label
/// list per axis.
pub fn plot_tensor(
    tensor: &ArrayD<f32>,
    title: &str,
    labels: &[Vec<String>],
    out: &Path,
) -> Result<()> {
    if tensor.ndim() > 4 {
        return Err(DaoError::InvalidTensor(format!(
            "rank {} exceeds 4",
            tensor.ndim()
        )));
    }
    if labels.len() != tensor.ndim() {
        return Err(DaoError::InvalidTensor(format!(
            "{} label lists for a rank {} tensor",
            labels.len(),
            tensor.ndim()
        )));
    }

    let (_, vmax) = color_bounds(&tensor.view());

    let mut view = tensor.view();
    let mut labels = labels.to_vec();
    while view.ndim() < 2 {
        view = view.insert_axis(Axis(0));
        labels.insert(0, vec![String::new()]);
    }
    if view.ndim() == 3 {
        view = view.insert_axis(Axis(0));
        labels.insert(0, vec![String::new()]);
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DaoError::io(parent, e))?;
    }

    let shape_err = |e: ndarray::ShapeError| DaoError::InvalidTensor(e.to_string());
    if view.ndim() == 2 {
        let grid = view.into_dimensionality::<Ix2>().map_err(shape_err)?;
        let size = single_size(grid.dim());
        let root = SVGBackend::new(out, size).into_drawing_area();
        draw_single(&root, grid, title, &labels, vmax)
            .and_then(|_| root.present())
            .map_err(|e| DaoError::Plot(e.to_string()))?;
    } else {
        let grid = view.into_dimensionality::<Ix4>().map_err(shape_err)?;
        let size = grid_size(grid.dim());
        let root = SVGBackend::new(out, size).into_drawing_area();
        draw_grid(&root, grid, title, &labels, vmax)
            .and_then(|_| root.present())
            .map_err(|e| DaoError::Plot(e.to_string()))?;
    }

    tracing::debug!("plotted {title:?} to {}", out.display());
    Ok(())
}

/// Log the tensor and plot it to `<dir>/<title>.svg`.
pub fn log_tensor(
    tensor: &ArrayD<f32>,
    title: &str,
    labels: &[Vec<String>],
    dir: &Path,
) -> Result<PathBuf> {
    tracing::info!("{title}\n{tensor}");
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect();
    let out = dir.join(format!("{stem}.svg"));
    plot_tensor(tensor, title, labels, &out)?;
    Ok(out)
}

fn single_size((rows, cols): (usize, usize)) -> (u32, u32) {
    let w = TICK_AREA + cols as i32 * CELL + GAP;
    let h = TITLE_AREA + rows as i32 * CELL + TICK_AREA;
    (w.max(1) as u32, h.max(1) as u32)
}

fn grid_size((rows, cols, h, w): (usize, usize, usize, usize)) -> (u32, u32) {
    let panel_w = w as i32 * GRID_CELL;
    let panel_h = h as i32 * GRID_CELL;
    let width = TICK_AREA + cols as i32 * (panel_w + GAP) + COLORBAR_AREA;
    let height = TITLE_AREA + rows as i32 * (panel_h + GAP) + TICK_AREA;
    (width.max(1) as u32, height.max(1) as u32)
}

fn label<'a>(labels: &'a [Vec<String>], axis: usize, i: usize) -> &'a str {
    labels
        .get(axis)
        .and_then(|l| l.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn draw_title<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, title: &str) -> DrawResult<DB> {
    let style = (FONT, 18.0)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    area.draw(&Text::new(title.to_string(), (TICK_AREA, TITLE_AREA / 2), style))
}

/// Cells, plus value annotations when `cell` is big enough to hold them.
fn draw_cells<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: ArrayView2<f32>,
    origin: (i32, i32),
    cell: i32,
    vmax: f32,
    annotate: bool,
) -> DrawResult<DB> {
    let (x0, y0) = origin;
    for ((i, j), value) in data.indexed_iter() {
        let x = x0 + j as i32 * cell;
        let y = y0 + i as i32 * cell;
        let fill = color_for(*value, vmax);
        area.draw(&Rectangle::new([(x, y), (x + cell, y + cell)], fill.filled()))?;
        if annotate {
            let style = (FONT, 11.0)
                .into_font()
                .color(&text_color(&fill))
                .pos(Pos::new(HPos::Center, VPos::Center));
            area.draw(&Text::new(
                format!("{value:.1}"),
                (x + cell / 2, y + cell / 2),
                style,
            ))?;
        }
    }
    Ok(())
}

fn draw_y_ticks<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    labels: &[Vec<String>],
    axis: usize,
    count: usize,
    origin: (i32, i32),
    cell: i32,
) -> DrawResult<DB> {
    let style = (FONT, 11.0)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Center));
    for i in 0..count {
        let y = origin.1 + i as i32 * cell + cell / 2;
        area.draw(&Text::new(
            label(labels, axis, i).to_string(),
            (origin.0 - 6, y),
            style.clone(),
        ))?;
    }
    Ok(())
}

fn draw_x_ticks<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    labels: &[Vec<String>],
    axis: usize,
    count: usize,
    origin: (i32, i32),
    cell: i32,
) -> DrawResult<DB> {
    let style = (FONT, 11.0)
        .into_font()
        .transform(FontTransform::Rotate90)
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for j in 0..count {
        let x = origin.0 + j as i32 * cell + cell / 2;
        area.draw(&Text::new(
            label(labels, axis, j).to_string(),
            (x, origin.1 + 6),
            style.clone(),
        ))?;
    }
    Ok(())
}

fn draw_single<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: ArrayView2<f32>,
    title: &str,
    labels: &[Vec<String>],
    vmax: f32,
) -> DrawResult<DB> {
    area.fill(&WHITE)?;
    draw_title(area, title)?;

    let (rows, cols) = data.dim();
    let origin = (TICK_AREA, TITLE_AREA);
    draw_cells(area, data, origin, CELL, vmax, true)?;
    draw_y_ticks(area, labels, 0, rows, origin, CELL)?;
    draw_x_ticks(
        area,
        labels,
        1,
        cols,
        (origin.0, origin.1 + rows as i32 * CELL),
        CELL,
    )
}

fn draw_grid<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: ArrayView4<f32>,
    title: &str,
    labels: &[Vec<String>],
    vmax: f32,
) -> DrawResult<DB> {
    area.fill(&WHITE)?;
    draw_title(area, title)?;

    let (rows, cols, h, w) = data.dim();
    let panel_w = w as i32 * GRID_CELL;
    let panel_h = h as i32 * GRID_CELL;
    let caption = (FONT, 11.0)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Bottom));

    for i in 0..rows {
        for j in 0..cols {
            let origin = (
                TICK_AREA + j as i32 * (panel_w + GAP),
                TITLE_AREA + GAP + i as i32 * (panel_h + GAP),
            );
            let panel = data.index_axis(Axis(0), i);
            let panel = panel.index_axis(Axis(0), j);
            draw_cells(area, panel, origin, GRID_CELL, vmax, false)?;

            let name = [label(labels, 0, i), label(labels, 1, j)]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" / ");
            if !name.is_empty() {
                area.draw(&Text::new(name, (origin.0, origin.1 - 3), caption.clone()))?;
            }

            // tick labels only on the outer panels
            if j == 0 {
                draw_y_ticks(area, labels, 2, h, origin, GRID_CELL)?;
            }
            if i == rows - 1 {
                draw_x_ticks(area, labels, 3, w, (origin.0, origin.1 + panel_h), GRID_CELL)?;
            }
        }
    }

    let bar_x = TICK_AREA + cols as i32 * (panel_w + GAP);
    let bar_h = (rows as i32 * (panel_h + GAP) - GAP).max(COLORBAR_STEPS);
    draw_colorbar(area, (bar_x, TITLE_AREA + GAP), bar_h, vmax)
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    origin: (i32, i32),
    height: i32,
    vmax: f32,
) -> DrawResult<DB> {
    let (x, y) = origin;
    let width = 16;
    for step in 0..COLORBAR_STEPS {
        let top = y + step * height / COLORBAR_STEPS;
        let bottom = y + (step + 1) * height / COLORBAR_STEPS;
        // top of the bar is +vmax
        let frac = 1.0 - 2.0 * (step as f32 + 0.5) / COLORBAR_STEPS as f32;
        let fill = color_for(frac * vmax, vmax);
        area.draw(&Rectangle::new([(x, top), (x + width, bottom)], fill.filled()))?;
    }
    area.draw(&Rectangle::new([(x, y), (x + width, y + height)], BLACK.stroke_width(1)))?;

    let style = (FONT, 11.0)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for (value, ty) in [(vmax, y), (0.0, y + height / 2), (-vmax, y + height)] {
        area.draw(&Text::new(format!("{value:.2}"), (x + width + 6, ty), style.clone()))?;
    }
    Ok(())
}

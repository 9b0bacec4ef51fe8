//! Grid layout for the per-coil mosaic.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Outer margin and inter-tile spacing, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub margin: u32,
    pub spacing: u32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            margin: 8,
            spacing: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MosaicLayout {
    pub rows: usize,
    pub cols: usize,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl MosaicLayout {
    /// Degraded layout used when no grid fits: one column of tiles as wide
    /// as the viewport allows, scrolled vertically.
    pub fn scroll_column(coil_count: usize, viewport_width: u32, aspect_ratio: f64, params: LayoutParams) -> Self {
        let cell_width = viewport_width.saturating_sub(2 * params.margin).max(1);
        let cell_height = ((cell_width as f64 / aspect_ratio).floor() as u32).max(1);
        Self {
            rows: coil_count.max(1),
            cols: 1,
            cell_width,
            cell_height,
        }
    }

    /// Canvas size `(width, height)` covering the grid plus margins.
    pub fn extent(&self, params: LayoutParams) -> (u32, u32) {
        let span = |n: usize, cell: u32| -> u32 {
            let n = n as u32;
            2 * params.margin + n * cell + n.saturating_sub(1) * params.spacing
        };
        (span(self.cols, self.cell_width), span(self.rows, self.cell_height))
    }

    /// Top-left pixel of the cell holding tile `index` (row-major).
    pub fn cell_origin(&self, index: usize, params: LayoutParams) -> (u32, u32) {
        let row = (index / self.cols) as u32;
        let col = (index % self.cols) as u32;
        (
            params.margin + col * (self.cell_width + params.spacing),
            params.margin + row * (self.cell_height + params.spacing),
        )
    }
}

/// Pick the rows x cols grid that leaves the least whitespace.
///
/// Rows are scanned from 1 to `coil_count`; each candidate gets the widest
/// cell that fits horizontally and the matching height for `aspect_ratio`
/// (width / height). Candidates taller than the viewport are rejected, the
/// rest are scored by horizontal plus vertical slack, and the first strictly
/// best score wins, so fewer rows are preferred on ties.
pub fn solve_layout(
    coil_count: usize,
    viewport_width: u32,
    viewport_height: u32,
    aspect_ratio: f64,
    params: LayoutParams,
) -> Result<MosaicLayout> {
    let infeasible = ViewerError::LayoutInfeasible {
        coil_count,
        width: viewport_width,
        height: viewport_height,
    };
    if coil_count == 0 || !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
        return Err(infeasible);
    }

    let margin = i64::from(params.margin);
    let spacing = i64::from(params.spacing);
    let mut best: Option<(i64, MosaicLayout)> = None;

    for rows in 1..=coil_count {
        let cols = coil_count.div_ceil(rows);
        let (r, c) = (rows as i64, cols as i64);

        let width_budget = i64::from(viewport_width) - 2 * margin - (c - 1) * spacing;
        let height_budget = i64::from(viewport_height) - 2 * margin - (r - 1) * spacing;
        if width_budget <= 0 || height_budget <= 0 {
            continue;
        }
        let cell_width = width_budget / c;
        let cell_height = (cell_width as f64 / aspect_ratio).floor() as i64;
        if cell_width < 1 || cell_height < 1 || cell_height * r > height_budget {
            continue;
        }

        let score = (height_budget - cell_height * r) + (width_budget - cell_width * c);
        if best.map_or(true, |(s, _)| score < s) {
            best = Some((
                score,
                MosaicLayout {
                    rows,
                    cols,
                    cell_width: cell_width as u32,
                    cell_height: cell_height as u32,
                },
            ));
        }
    }

    best.map(|(_, layout)| layout).ok_or(infeasible)
}

/// Memo of the last solved layout, keyed by everything the solver reads.
#[derive(Debug, Default)]
pub struct LayoutCache {
    entry: Option<(LayoutKey, MosaicLayout)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayoutKey {
    coil_count: usize,
    width: u32,
    height: u32,
    aspect_bits: u64,
    params: LayoutParams,
}

impl LayoutCache {
    pub fn get_or_solve(
        &mut self,
        coil_count: usize,
        viewport_width: u32,
        viewport_height: u32,
        aspect_ratio: f64,
        params: LayoutParams,
    ) -> Result<MosaicLayout> {
        let key = LayoutKey {
            coil_count,
            width: viewport_width,
            height: viewport_height,
            aspect_bits: aspect_ratio.to_bits(),
            params,
        };
        if let Some((cached, layout)) = self.entry {
            if cached == key {
                return Ok(layout);
            }
        }
        let layout = solve_layout(coil_count, viewport_width, viewport_height, aspect_ratio, params)?;
        self.entry = Some((key, layout));
        Ok(layout)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

//! Grid-bucketed spatial index for hit testing
//!
//! Built once per render for one viewport and series set, and authoritative
//! for every surface: all tiers answer nearest and region queries through
//! this index, never through private structures. Any mutation of series,
//! viewport, or scales invalidates it.

use shared_types::{DataPoint, HitResult, Margins, PointRef, Scale, Series, Viewport};
use std::collections::HashMap;

/// Default nearest-query radius in pixels.
pub const DEFAULT_HIT_RADIUS: f64 = 10.0;

#[derive(Debug, Clone)]
struct IndexedPoint {
    series: usize,
    point_index: usize,
    px: f64,
    py: f64,
    point: DataPoint,
}

/// Uniform grid over the projected, visible points of a series set.
///
/// Cell size is twice the hit radius so a 3x3 neighbourhood scan covers
/// every candidate within the radius. Queries take screen coordinates;
/// margins are subtracted internally.
pub struct SpatialIndex {
    cell_size: f64,
    margins: Margins,
    series_ids: Vec<String>,
    entries: Vec<IndexedPoint>,
    cells: HashMap<(i64, i64), Vec<usize>>,
    by_key: HashMap<(usize, usize), usize>,
    per_series: Vec<Vec<usize>>,
}

impl SpatialIndex {
    /// Index every finite point of every visible series.
    pub fn build(
        series: &[Series],
        viewport: &Viewport,
        x_scale: &dyn Scale,
        y_scale: &dyn Scale,
        hit_radius: f64,
    ) -> Self {
        let cell_size = hit_radius.max(1.0) * 2.0;
        let mut index = Self {
            cell_size,
            margins: viewport.margins,
            series_ids: Vec::with_capacity(series.len()),
            entries: Vec::new(),
            cells: HashMap::new(),
            by_key: HashMap::new(),
            per_series: vec![Vec::new(); series.len()],
        };

        for (series_slot, s) in series.iter().enumerate() {
            index.series_ids.push(s.id.clone());
            if !s.visible {
                continue;
            }
            for (point_index, point) in s.data.iter().enumerate() {
                if !point.is_finite() {
                    continue;
                }
                let px = x_scale.to_pixel(point.x);
                let py = y_scale.to_pixel(point.y);
                if !px.is_finite() || !py.is_finite() {
                    continue;
                }
                let entry_index = index.entries.len();
                let cell = index.cell_of(px, py);
                index.entries.push(IndexedPoint {
                    series: series_slot,
                    point_index,
                    px,
                    py,
                    point: point.clone(),
                });
                index.cells.entry(cell).or_default().push(entry_index);
                index.by_key.insert((series_slot, point_index), entry_index);
                index.per_series[series_slot].push(point_index);
            }
        }

        index
    }

    fn cell_of(&self, px: f64, py: f64) -> (i64, i64) {
        (
            (px / self.cell_size).floor() as i64,
            (py / self.cell_size).floor() as i64,
        )
    }

    /// Nearest visible point within `radius` of a screen position.
    ///
    /// Ties break to the smaller series id, then the smaller point index.
    pub fn nearest(&self, screen_x: f64, screen_y: f64, radius: f64) -> Option<HitResult> {
        let qx = screen_x - self.margins.left;
        let qy = screen_y - self.margins.top;
        let (ci, cj) = self.cell_of(qx, qy);

        let mut best: Option<(f64, usize)> = None;
        for di in -1..=1 {
            for dj in -1..=1 {
                let Some(cell) = self.cells.get(&(ci + di, cj + dj)) else {
                    continue;
                };
                for &entry_index in cell {
                    let entry = &self.entries[entry_index];
                    let distance = ((entry.px - qx).powi(2) + (entry.py - qy).powi(2)).sqrt();
                    let better = match best {
                        None => true,
                        Some((best_distance, best_index)) => {
                            let current = &self.entries[best_index];
                            distance < best_distance
                                || (distance == best_distance
                                    && self.entry_key(entry) < self.entry_key(current))
                        }
                    };
                    if better {
                        best = Some((distance, entry_index));
                    }
                }
            }
        }

        let (distance, entry_index) = best?;
        (distance < radius).then(|| self.hit_from_entry(entry_index, distance))
    }

    /// Points whose projected coordinates fall inside the screen-space rect,
    /// bounds inclusive, ordered by (series, point index).
    pub fn points_in_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<DataPoint> {
        self.entries_in_rect(x1, y1, x2, y2)
            .into_iter()
            .map(|entry_index| self.entries[entry_index].point.clone())
            .collect()
    }

    /// Stable references for the points inside the rect, for selection state.
    pub fn refs_in_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<PointRef> {
        self.entries_in_rect(x1, y1, x2, y2)
            .into_iter()
            .map(|entry_index| {
                let entry = &self.entries[entry_index];
                PointRef {
                    series_id: self.series_ids[entry.series].clone(),
                    point_index: entry.point_index,
                }
            })
            .collect()
    }

    fn entries_in_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<usize> {
        let (lo_x, hi_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (lo_y, hi_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        let lo_x = lo_x - self.margins.left;
        let hi_x = hi_x - self.margins.left;
        let lo_y = lo_y - self.margins.top;
        let hi_y = hi_y - self.margins.top;

        let (min_ci, min_cj) = self.cell_of(lo_x, lo_y);
        let (max_ci, max_cj) = self.cell_of(hi_x, hi_y);

        let mut matches = Vec::new();
        for ci in min_ci..=max_ci {
            for cj in min_cj..=max_cj {
                let Some(cell) = self.cells.get(&(ci, cj)) else {
                    continue;
                };
                for &entry_index in cell {
                    let entry = &self.entries[entry_index];
                    if entry.px >= lo_x && entry.px <= hi_x && entry.py >= lo_y && entry.py <= hi_y
                    {
                        matches.push(entry_index);
                    }
                }
            }
        }
        // Entry order is (series iteration order, point index) by construction.
        matches.sort_unstable();
        matches
    }

    /// Hit record for a specific indexed point, if it is visible.
    pub fn entry(&self, series_id: &str, point_index: usize) -> Option<HitResult> {
        let series_slot = self.series_slot(series_id)?;
        let entry_index = *self.by_key.get(&(series_slot, point_index))?;
        Some(self.hit_from_entry(entry_index, 0.0))
    }

    /// Step along the indexed points of one series. `delta` is +1/-1;
    /// `wrap` joins the ends.
    pub fn neighbor(
        &self,
        series_id: &str,
        point_index: usize,
        delta: isize,
        wrap: bool,
    ) -> Option<HitResult> {
        let series_slot = self.series_slot(series_id)?;
        let indexed = &self.per_series[series_slot];
        if indexed.is_empty() {
            return None;
        }
        let position = indexed.binary_search(&point_index).ok()?;
        let len = indexed.len() as isize;
        let mut next = position as isize + delta;
        if wrap {
            next = next.rem_euclid(len);
        } else if next < 0 || next >= len {
            return None;
        }
        let entry_index = *self
            .by_key
            .get(&(series_slot, indexed[next as usize]))?;
        Some(self.hit_from_entry(entry_index, 0.0))
    }

    /// Move to the same ordinal position in an adjacent series with any
    /// visible points. `delta` is +1/-1; clamped at the ends.
    pub fn sibling_series(
        &self,
        series_id: &str,
        point_index: usize,
        delta: isize,
    ) -> Option<HitResult> {
        let series_slot = self.series_slot(series_id)?;
        let position = self.per_series[series_slot]
            .binary_search(&point_index)
            .unwrap_or(0);

        let mut candidate = series_slot as isize;
        loop {
            candidate += delta;
            if candidate < 0 || candidate as usize >= self.per_series.len() {
                return None;
            }
            let indexed = &self.per_series[candidate as usize];
            if indexed.is_empty() {
                continue;
            }
            let clamped = position.min(indexed.len() - 1);
            let entry_index = *self
                .by_key
                .get(&(candidate as usize, indexed[clamped]))?;
            return Some(self.hit_from_entry(entry_index, 0.0));
        }
    }

    /// First indexed point of the first series with any visible points.
    pub fn first_entry(&self) -> Option<HitResult> {
        for (series_slot, indexed) in self.per_series.iter().enumerate() {
            if let Some(&point_index) = indexed.first() {
                let entry_index = *self.by_key.get(&(series_slot, point_index))?;
                return Some(self.hit_from_entry(entry_index, 0.0));
            }
        }
        None
    }

    pub fn series_ids(&self) -> &[String] {
        &self.series_ids
    }

    /// Total indexed points.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of occupied grid cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Sum of per-cell entry counts; equals `len` when every point sits in
    /// exactly one cell.
    pub fn cell_entry_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    fn series_slot(&self, series_id: &str) -> Option<usize> {
        self.series_ids.iter().position(|id| id == series_id)
    }

    fn entry_key<'a>(&'a self, entry: &'a IndexedPoint) -> (&'a str, usize) {
        (&self.series_ids[entry.series], entry.point_index)
    }

    fn hit_from_entry(&self, entry_index: usize, distance: f64) -> HitResult {
        let entry = &self.entries[entry_index];
        HitResult {
            series_id: self.series_ids[entry.series].clone(),
            point_index: entry.point_index,
            point: entry.point.clone(),
            pixel_x: entry.px + self.margins.left,
            pixel_y: entry.py + self.margins.top,
            distance,
        }
    }
}

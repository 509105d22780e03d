// The note grid: voices x pitch rows x steps, run-length encoded.
// Only the first cell of a note holds data; the cells it covers after that
// ("continuations") are implied by its length and found by scanning left.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GridShapeError, OverlapError};
use crate::pipeline::selection::{Patch, PatchNote, Selection};
use crate::shared::{DEFAULT_STEPS, NUM_VOICES, PITCH_ROWS, STEPS_PER_BAR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStart {
    pub length: usize,
}

pub type Lane = Vec<Option<NoteStart>>;
pub type Cells = Vec<Vec<Lane>>; // [voice][row][col]

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Cells", into = "Cells")]
pub struct Grid {
    cells: Cells,
    steps: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

impl From<Grid> for Cells {
    fn from(grid: Grid) -> Self {
        grid.cells
    }
}

impl TryFrom<Cells> for Grid {
    type Error = GridShapeError;

    fn try_from(cells: Cells) -> Result<Self, Self::Error> {
        Grid::from_cells(cells)
    }
}

impl Grid {
    pub fn new(steps: usize) -> Self {
        let steps = steps.max(1);
        Self {
            cells: vec![vec![vec![None; steps]; PITCH_ROWS]; NUM_VOICES],
            steps,
        }
    }

    /// Take over a whole loaded grid. Only the shape is checked; overlapping
    /// spans in the data are kept as they are.
    pub fn from_cells(cells: Cells) -> Result<Self, GridShapeError> {
        if cells.len() != NUM_VOICES {
            return Err(GridShapeError::Voices { expected: NUM_VOICES, found: cells.len() });
        }
        let steps = cells
            .first()
            .and_then(|rows| rows.first())
            .map(|lane| lane.len())
            .unwrap_or(0);
        if steps == 0 {
            return Err(GridShapeError::Empty);
        }
        for (voice, rows) in cells.iter().enumerate() {
            if rows.len() != PITCH_ROWS {
                return Err(GridShapeError::Rows { voice, expected: PITCH_ROWS, found: rows.len() });
            }
            for (row, lane) in rows.iter().enumerate() {
                if lane.len() != steps {
                    return Err(GridShapeError::Steps { voice, row, expected: steps, found: lane.len() });
                }
                if let Some(col) = lane.iter().position(|c| matches!(c, Some(n) if n.length == 0)) {
                    return Err(GridShapeError::ZeroLength { voice, row, col });
                }
            }
        }
        Ok(Self { cells, steps })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn total_bars(&self) -> usize {
        self.steps.div_ceil(STEPS_PER_BAR).max(1)
    }

    fn lane(&self, voice: usize, row: usize) -> Option<&Lane> {
        self.cells.get(voice)?.get(row)
    }

    pub fn note_at(&self, voice: usize, row: usize, col: usize) -> Option<NoteStart> {
        self.lane(voice, row)?.get(col).copied().flatten()
    }

    /// Write a note start. Out-of-range positions are ignored (`Ok(false)`),
    /// lengths are clamped to fit the remaining steps.
    pub fn place(&mut self, voice: usize, row: usize, col: usize, length: usize) -> Result<bool, OverlapError> {
        let steps = self.steps;
        let Some(lane) = self.cells.get_mut(voice).and_then(|rows| rows.get_mut(row)) else {
            return Ok(false);
        };
        if col >= steps {
            return Ok(false);
        }
        let length = length.clamp(1, steps - col);
        if let Some(existing_col) = lane_conflict(lane, col, length) {
            debug!(voice, row, col, length, existing_col, "note placement rejected");
            return Err(OverlapError { voice, row, col, length, existing_col });
        }
        lane[col] = Some(NoteStart { length });
        Ok(true)
    }

    /// True when an earlier note in the same lane still sounds at `col`.
    /// The cell right after a note's last step is not a continuation.
    pub fn is_continuation(&self, voice: usize, row: usize, col: usize) -> bool {
        match self.lane(voice, row) {
            Some(lane) if col < lane.len() => start_before(lane, col)
                .is_some_and(|(start, note)| start + note.length > col),
            _ => false,
        }
    }

    /// Column of the note start whose span covers `col`, the cell itself included.
    pub fn covering_start(&self, voice: usize, row: usize, col: usize) -> Option<usize> {
        let lane = self.lane(voice, row)?;
        lane_covering(lane, col)
    }

    /// Remove the note that starts at or covers `col`. Returns whether anything went.
    pub fn delete_at(&mut self, voice: usize, row: usize, col: usize) -> bool {
        let Some(start) = self.covering_start(voice, row, col) else {
            return false;
        };
        self.cells[voice][row][start] = None;
        true
    }

    pub fn clear_voice(&mut self, voice: usize) {
        if let Some(rows) = self.cells.get_mut(voice) {
            for lane in rows.iter_mut() {
                lane.fill(None);
            }
        }
    }

    pub fn note_count(&self) -> usize {
        self.cells.iter().flatten().flatten().filter(|c| c.is_some()).count()
    }

    /// Every `(voice, row, length)` whose note starts at `col`.
    pub fn notes_starting_at(&self, col: usize) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(move |(voice, rows)| {
            rows.iter().enumerate().filter_map(move |(row, lane)| {
                lane.get(col).copied().flatten().map(|n| (voice, row, n.length))
            })
        })
    }

    /// `(row, col, length)` of every note in one voice, in row then column order.
    pub fn notes(&self, voice: usize) -> Vec<(usize, usize, usize)> {
        let Some(rows) = self.cells.get(voice) else {
            return Vec::new();
        };
        rows.iter()
            .enumerate()
            .flat_map(|(row, lane)| {
                lane.iter()
                    .enumerate()
                    .filter_map(move |(col, c)| c.map(|n| (row, col, n.length)))
            })
            .collect()
    }

    fn selected(&self, sel: &Selection) -> Vec<(usize, usize, usize)> {
        self.notes(sel.voice)
            .into_iter()
            .filter(|&(row, col, _)| sel.contains(row, col))
            .collect()
    }

    pub fn move_notes(&mut self, sel: &Selection, delta_cols: isize) -> bool {
        self.relocate(sel, 0, delta_cols, true)
    }

    pub fn transpose(&mut self, sel: &Selection, delta_rows: isize) -> bool {
        self.relocate(sel, delta_rows, 0, true)
    }

    /// Copy the selected notes to the columns right after the selection.
    pub fn duplicate(&mut self, sel: &Selection) -> bool {
        let width = sel.width() as isize;
        self.relocate(sel, 0, width, false)
    }

    // All-or-nothing bulk edit: work on a copy of the voice plane and only
    // commit when every note lands inside the grid without overlapping.
    fn relocate(&mut self, sel: &Selection, delta_rows: isize, delta_cols: isize, remove_source: bool) -> bool {
        let notes = self.selected(sel);
        if notes.is_empty() {
            return false;
        }
        let mut targets = Vec::with_capacity(notes.len());
        for &(row, col, length) in &notes {
            let (Some(new_row), Some(new_col)) = (offset(row, delta_rows), offset(col, delta_cols)) else {
                return false;
            };
            if new_row >= PITCH_ROWS || new_col >= self.steps || new_col + length > self.steps {
                return false;
            }
            targets.push((new_row, new_col, length));
        }

        let mut plane = self.cells[sel.voice].clone();
        if remove_source {
            for &(row, col, _) in &notes {
                plane[row][col] = None;
            }
        }
        for &(row, col, length) in &targets {
            let lane = &mut plane[row];
            if lane_conflict(lane, col, length).is_some() {
                debug!(voice = sel.voice, row, col, "bulk edit rejected, target overlaps");
                return false;
            }
            lane[col] = Some(NoteStart { length });
        }
        self.cells[sel.voice] = plane;
        true
    }

    pub fn copy(&self, sel: &Selection) -> Patch {
        let notes = self
            .selected(sel)
            .into_iter()
            .map(|(row, col, length)| PatchNote {
                row_offset: row - sel.rows.start,
                col_offset: col - sel.cols.start,
                length,
            })
            .collect();
        Patch {
            voice: sel.voice,
            rows: sel.rows.len(),
            cols: sel.cols.len(),
            notes,
        }
    }

    /// Write a patch with its origin at `(at_row, at_col)` of the patch's voice.
    /// Notes that would leave the grid or overlap are skipped; returns how many landed.
    pub fn paste(&mut self, patch: &Patch, at_row: usize, at_col: usize) -> usize {
        let mut written = 0;
        for note in &patch.notes {
            let (Some(row), Some(col)) = (at_row.checked_add(note.row_offset), at_col.checked_add(note.col_offset))
            else {
                continue;
            };
            if row >= PITCH_ROWS || col >= self.steps || note.length > self.steps - col {
                continue;
            }
            if let Ok(true) = self.place(patch.voice, row, col, note.length) {
                written += 1;
            }
        }
        written
    }
}

fn offset(value: usize, delta: isize) -> Option<usize> {
    value.checked_add_signed(delta)
}

// nearest note start strictly left of `col`
fn start_before(lane: &[Option<NoteStart>], col: usize) -> Option<(usize, NoteStart)> {
    lane[..col.min(lane.len())]
        .iter()
        .enumerate()
        .rev()
        .find_map(|(c, cell)| cell.map(|n| (c, n)))
}

fn lane_covering(lane: &[Option<NoteStart>], col: usize) -> Option<usize> {
    if col >= lane.len() {
        return None;
    }
    if lane[col].is_some() {
        return Some(col);
    }
    // spans never overlap, so only the nearest start to the left can reach us
    start_before(lane, col)
        .filter(|(start, note)| start + note.length > col)
        .map(|(start, _)| start)
}

// first existing note start whose span intersects [col, col + length)
fn lane_conflict(lane: &[Option<NoteStart>], col: usize, length: usize) -> Option<usize> {
    if let Some(start) = lane_covering(lane, col) {
        return Some(start);
    }
    let end = (col + length).min(lane.len());
    (col + 1..end).find(|&c| lane[c].is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(notes: &[(usize, usize, usize, usize)]) -> Grid {
        let mut g = Grid::default();
        for &(v, r, c, l) in notes {
            assert_eq!(g.place(v, r, c, l), Ok(true));
        }
        g
    }

    #[test]
    fn continuation_boundaries() {
        let g = grid_with(&[(0, 5, 10, 4)]);
        assert!(!g.is_continuation(0, 5, 10));
        for c in 11..14 {
            assert!(g.is_continuation(0, 5, c), "col {c}");
        }
        assert!(!g.is_continuation(0, 5, 14));
        assert!(!g.is_continuation(0, 5, 20));
        assert!(!g.is_continuation(0, 5, 9));
        // other lanes untouched
        assert!(!g.is_continuation(1, 5, 11));
        assert!(!g.is_continuation(0, 6, 11));
    }

    #[test]
    fn continuation_scans_past_gaps_to_a_long_note() {
        let g = grid_with(&[(0, 0, 0, 2), (0, 0, 4, 30)]);
        assert!(g.is_continuation(0, 0, 33));
        assert!(!g.is_continuation(0, 0, 34));
        assert!(!g.is_continuation(0, 0, 2));
        assert!(!g.is_continuation(0, 0, 3));
    }

    #[test]
    fn place_rejects_overlap_in_same_lane() {
        let mut g = grid_with(&[(0, 3, 8, 4)]);
        let err = g.place(0, 3, 10, 1).unwrap_err();
        assert_eq!(err.existing_col, 8);
        assert_eq!(g.place(0, 3, 6, 3).unwrap_err().existing_col, 8);
        assert!(g.place(0, 3, 8, 1).is_err());
        // touching is fine
        assert_eq!(g.place(0, 3, 12, 2), Ok(true));
        assert_eq!(g.place(0, 3, 6, 2), Ok(true));
        // same cell in another voice is fine
        assert_eq!(g.place(1, 3, 9, 1), Ok(true));
    }

    #[test]
    fn place_out_of_range_is_a_noop() {
        let mut g = Grid::default();
        assert_eq!(g.place(3, 0, 0, 1), Ok(false));
        assert_eq!(g.place(0, PITCH_ROWS, 0, 1), Ok(false));
        assert_eq!(g.place(0, 0, DEFAULT_STEPS, 1), Ok(false));
        assert_eq!(g.note_count(), 0);
    }

    #[test]
    fn place_clamps_length() {
        let mut g = Grid::default();
        assert_eq!(g.place(0, 0, 62, 10), Ok(true));
        assert_eq!(g.note_at(0, 0, 62), Some(NoteStart { length: 2 }));
        assert_eq!(g.place(0, 1, 0, 0), Ok(true));
        assert_eq!(g.note_at(0, 1, 0), Some(NoteStart { length: 1 }));
    }

    #[test]
    fn delete_from_any_covered_column() {
        for hit in 20..24 {
            let mut g = grid_with(&[(2, 1, 16, 4), (2, 1, 20, 4), (2, 1, 24, 4)]);
            assert!(g.delete_at(2, 1, hit));
            assert_eq!(g.note_at(2, 1, 20), None);
            assert!(g.note_at(2, 1, 16).is_some());
            assert!(g.note_at(2, 1, 24).is_some());
            assert_eq!(g.note_count(), 2);
        }
    }

    #[test]
    fn delete_in_empty_space_is_silent() {
        let mut g = grid_with(&[(0, 0, 0, 2)]);
        assert!(!g.delete_at(0, 0, 2));
        assert!(!g.delete_at(0, 0, 500));
        assert!(!g.delete_at(9, 0, 0));
        assert_eq!(g.note_count(), 1);
    }

    #[test]
    fn move_shifts_selected_notes_only() {
        let mut g = grid_with(&[(0, 2, 0, 2), (0, 3, 4, 1), (0, 10, 0, 1)]);
        let sel = Selection::new(0, 0..5, 0..8);
        assert!(g.move_notes(&sel, 8));
        assert_eq!(g.note_at(0, 2, 8), Some(NoteStart { length: 2 }));
        assert_eq!(g.note_at(0, 3, 12), Some(NoteStart { length: 1 }));
        assert_eq!(g.note_at(0, 2, 0), None);
        assert_eq!(g.note_at(0, 10, 0), Some(NoteStart { length: 1 }));
    }

    #[test]
    fn move_within_own_span_is_allowed() {
        let mut g = grid_with(&[(0, 0, 0, 4), (0, 0, 4, 4)]);
        let sel = Selection::new(0, 0..1, 0..8);
        assert!(g.move_notes(&sel, 2));
        assert_eq!(g.note_at(0, 0, 2), Some(NoteStart { length: 4 }));
        assert_eq!(g.note_at(0, 0, 6), Some(NoteStart { length: 4 }));
    }

    #[test]
    fn move_out_of_bounds_rejects_everything() {
        let mut g = grid_with(&[(0, 0, 0, 1), (0, 0, 60, 2)]);
        let before = g.clone();
        let sel = Selection::new(0, 0..1, 0..64);
        assert!(!g.move_notes(&sel, 3));
        assert_eq!(g, before);
        assert!(!g.move_notes(&sel, -1));
        assert_eq!(g, before);
    }

    #[test]
    fn move_onto_unselected_note_rejects() {
        let mut g = grid_with(&[(0, 0, 0, 2), (0, 0, 8, 2)]);
        let before = g.clone();
        assert!(!g.move_notes(&Selection::new(0, 0..1, 0..4), 7));
        assert_eq!(g, before);
    }

    #[test]
    fn transpose_keeps_columns() {
        let mut g = grid_with(&[(1, 5, 3, 2), (1, 6, 9, 1)]);
        let sel = Selection::new(1, 5..7, 0..16);
        assert!(g.transpose(&sel, -5));
        assert_eq!(g.note_at(1, 0, 3), Some(NoteStart { length: 2 }));
        assert_eq!(g.note_at(1, 1, 9), Some(NoteStart { length: 1 }));
        assert!(!g.transpose(&Selection::new(1, 0..2, 0..16), -1));
        assert!(!g.transpose(&Selection::new(1, 0..2, 0..16), PITCH_ROWS as isize));
    }

    #[test]
    fn duplicate_copies_after_selection() {
        let mut g = grid_with(&[(0, 4, 0, 2), (0, 7, 3, 1)]);
        let sel = Selection::new(0, 0..PITCH_ROWS, 0..4);
        assert!(g.duplicate(&sel));
        assert_eq!(g.note_at(0, 4, 4), Some(NoteStart { length: 2 }));
        assert_eq!(g.note_at(0, 7, 7), Some(NoteStart { length: 1 }));
        assert_eq!(g.note_count(), 4);

        let mut tail = grid_with(&[(0, 0, 40, 1)]);
        assert!(!tail.duplicate(&Selection::new(0, 0..1, 32..64)));
    }

    #[test]
    fn copy_paste_relative_and_skips_outside() {
        let g = grid_with(&[(0, 10, 4, 2), (0, 12, 6, 1)]);
        let patch = g.copy(&Selection::new(0, 10..13, 4..8));
        assert_eq!(patch.notes.len(), 2);
        assert_eq!(patch.notes[0], PatchNote { row_offset: 0, col_offset: 0, length: 2 });
        assert_eq!(patch.notes[1], PatchNote { row_offset: 2, col_offset: 2, length: 1 });

        let mut target = Grid::default();
        assert_eq!(target.paste(&patch, 0, 32), 2);
        assert_eq!(target.note_at(0, 0, 32), Some(NoteStart { length: 2 }));
        assert_eq!(target.note_at(0, 2, 34), Some(NoteStart { length: 1 }));

        // second note falls off the bottom row, first one still lands
        let mut edge = Grid::default();
        assert_eq!(edge.paste(&patch, PITCH_ROWS - 1, 0), 1);
        assert_eq!(edge.note_at(0, PITCH_ROWS - 1, 0), Some(NoteStart { length: 2 }));
    }

    #[test]
    fn paste_at_huge_origin_is_skipped() {
        let patch = Patch {
            voice: 1,
            rows: 2,
            cols: 1,
            notes: vec![
                PatchNote { row_offset: 1, col_offset: 0, length: 1 },
                PatchNote { row_offset: 0, col_offset: 0, length: usize::MAX },
            ],
        };
        let mut g = Grid::default();
        assert_eq!(g.paste(&patch, usize::MAX, 0), 0);
        assert_eq!(g.paste(&patch, 0, usize::MAX), 0);
        // an absurd length doesn't wrap around the bounds check either
        assert_eq!(g.paste(&patch, 0, 0), 1);
        assert_eq!(g.note_at(1, 1, 0), Some(NoteStart { length: 1 }));
        assert_eq!(g.note_count(), 1);
    }

    #[test]
    fn notes_starting_at_lists_every_voice() {
        let g = grid_with(&[(0, 1, 4, 1), (2, 30, 4, 3), (1, 1, 5, 1)]);
        let mut found: Vec<_> = g.notes_starting_at(4).collect();
        found.sort();
        assert_eq!(found, vec![(0, 1, 1), (2, 30, 3)]);
        assert_eq!(g.notes_starting_at(5).count(), 1);
        assert_eq!(g.notes_starting_at(999).count(), 0);
    }

    #[test]
    fn from_cells_checks_shape() {
        assert_eq!(
            Grid::from_cells(vec![]),
            Err(GridShapeError::Voices { expected: NUM_VOICES, found: 0 })
        );
        let mut cells: Cells = Grid::new(32).into();
        cells[1][3].push(None);
        assert!(matches!(Grid::from_cells(cells), Err(GridShapeError::Steps { voice: 1, row: 3, .. })));

        let mut zero: Cells = Grid::new(16).into();
        zero[0][0][2] = Some(NoteStart { length: 0 });
        assert!(matches!(Grid::from_cells(zero), Err(GridShapeError::ZeroLength { col: 2, .. })));
    }

    #[test]
    fn json_keeps_only_note_starts() {
        let g = grid_with(&[(0, 0, 0, 4)]);
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json[0][0][0]["length"], 4);
        assert!(json[0][0][1].is_null());
        let back: Grid = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }
}

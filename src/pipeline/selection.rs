use std::ops::Range;

// A rectangle of the grid inside one voice. Both ranges are half-open.
// A note belongs to the selection when its *start* cell is inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub voice: usize,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Selection {
    pub fn new(voice: usize, rows: Range<usize>, cols: Range<usize>) -> Self {
        Self { voice, rows, cols }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchNote {
    pub row_offset: usize,
    pub col_offset: usize,
    pub length: usize,
}

// clipboard contents, positions relative to the selection's top-left corner
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patch {
    pub voice: usize,
    pub rows: usize,
    pub cols: usize,
    pub notes: Vec<PatchNote>,
}

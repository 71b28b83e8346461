//! Shapes and shape selection.
//!
//! A [`Shape`] is an opaque boolean matrix plus a color token; the engine
//! never inspects what a shape "is", only which cells it occupies. Rows are
//! stored bottom-up to match the playfield's row convention (row 0 is the
//! bottom row).

use rand::Rng;

/// Opaque color/identifier carried by a shape into the grid cells it locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorToken(pub u8);

/// An immutable multi-cell block pattern. Rotation produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    cells: Vec<Vec<bool>>,
    color: ColorToken,
}

impl Shape {
    /// `cells[row][col]`, row 0 at the bottom. Rows must be non-empty and of
    /// equal width.
    pub fn new(cells: Vec<Vec<bool>>, color: ColorToken) -> Self {
        Self { cells, color }
    }

    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn color(&self) -> ColorToken {
        self.color
    }

    pub fn cells(&self) -> &[Vec<bool>] {
        &self.cells
    }

    /// Whether the local cell `(row, col)` is occupied.
    pub fn filled(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// The 90-degrees-clockwise rotation of this shape, as a new value.
    ///
    /// With rows bottom-up, the on-screen clockwise turn maps local
    /// `(row, col)` of the old matrix to `(old_width - 1 - col, row)`.
    pub fn rotated_cw(&self) -> Shape {
        let (h, w) = (self.height(), self.width());
        let mut cells = vec![vec![false; h]; w];
        for (i, row) in self.cells.iter().enumerate() {
            for (j, &filled) in row.iter().enumerate() {
                if filled {
                    cells[w - 1 - j][i] = true;
                }
            }
        }
        Shape {
            cells,
            color: self.color,
        }
    }
}

// ============================================================================
// Shape Selection
// ============================================================================

/// Source of piece choices. Injected so selection is deterministic in tests.
pub trait ShapeSelector {
    /// Returns an index into a pool of `pool_len` shapes. `pool_len` > 0.
    fn select(&mut self, pool_len: usize) -> usize;
}

/// Uniform random selection for normal play.
pub struct RandomSelector;

impl ShapeSelector for RandomSelector {
    fn select(&mut self, pool_len: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_len)
    }
}

/// Fixed, cycling index sequence for deterministic tests.
pub struct SequenceSelector {
    indices: Vec<usize>,
    cursor: usize,
}

impl SequenceSelector {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices, cursor: 0 }
    }
}

impl ShapeSelector for SequenceSelector {
    fn select(&mut self, pool_len: usize) -> usize {
        let i = self.indices[self.cursor % self.indices.len()];
        self.cursor += 1;
        i % pool_len
    }
}

// ============================================================================
// Standard Pool
// ============================================================================

/// The seven standard tetrominoes, each with a distinct color token.
/// Matrices are written bottom row first.
pub fn standard_shapes() -> Vec<Shape> {
    let t = true;
    let f = false;
    vec![
        // I
        Shape::new(vec![vec![t, t, t, t]], ColorToken(0)),
        // O
        Shape::new(vec![vec![t, t], vec![t, t]], ColorToken(1)),
        // T
        Shape::new(vec![vec![t, t, t], vec![f, t, f]], ColorToken(2)),
        // S
        Shape::new(vec![vec![t, t, f], vec![f, t, t]], ColorToken(3)),
        // Z
        Shape::new(vec![vec![f, t, t], vec![t, t, f]], ColorToken(4)),
        // J
        Shape::new(vec![vec![t, t, t], vec![t, f, f]], ColorToken(5)),
        // L
        Shape::new(vec![vec![t, t, t], vec![f, f, t]], ColorToken(6)),
    ]
}

//! The playfield controller: grid, active piece, gravity, line clearing,
//! scoring and leveling, and the status state machine.
//!
//! All mutation happens synchronously inside an intent call or inside
//! [`PlayField::advance`] when the single pending deferred action comes due.
//! State changes are reported as drained [`PlayFieldEvent`] values; the
//! display surface is [`PlayField::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::level::{Level, LEVELS};
use crate::shape::{ColorToken, Shape, ShapeSelector};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Filled(ColorToken),
}

/// Rectangular cell matrix; row 0 is the bottom row, indices increase upward.
pub type Grid = Vec<Vec<CellState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    New,
    InProgress,
    GameOver,
    Eliminating,
    Paused,
}

/// Stable identifier for one controller instance, constant for its lifetime.
/// Lets consumers tell multiple concurrent playfields apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

fn next_session_id() -> SessionId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// The currently falling piece: a shape plus the grid offset of its local
/// cell (0, 0). The row may exceed the grid height at spawn (the piece hovers
/// above the visible area).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePiece {
    pub shape: Shape,
    pub row: i16,
    pub col: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayFieldEvent {
    /// The display surface changed; pull a fresh [`PlayField::snapshot`].
    Redraw,
    /// The status machine transitioned.
    StatusChanged { status: Status, session: SessionId },
}

/// Immutable view handed to renderers: the base grid with the falling
/// piece's cells overlaid, plus everything an info panel needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub grid: Grid,
    pub status: Status,
    pub score: u32,
    pub next_shape: Shape,
    pub level: &'static Level,
    /// Row indices mid-clear-animation; empty outside ELIMINATING.
    pub clearing_rows: Vec<usize>,
}

// ============================================================================
// Deferred actions
// ============================================================================

/// The one timed action the whole system needs: either the next gravity step
/// or the resolution of a clear animation. At most one is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Deferred {
    Fall,
    ResolveClear { rebuilt: Grid, cleared: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    action: Deferred,
    remaining: Duration,
}

/// What `pause()` interrupted, restored verbatim by `resume()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PausedPhase {
    status: Status,
    pending: Option<Pending>,
}

// ============================================================================
// PlayField
// ============================================================================

pub struct PlayField {
    session: SessionId,
    height: usize,
    width: usize,
    pool: Vec<Shape>,
    selector: Box<dyn ShapeSelector>,
    grid: Grid,
    active: Option<ActivePiece>,
    next_shape: Shape,
    status: Status,
    level_idx: usize,
    score: u32,
    clearing_rows: Vec<usize>,
    pending: Option<Pending>,
    paused_from: Option<PausedPhase>,
    events: Vec<PlayFieldEvent>,
}

impl PlayField {
    /// A fresh controller in status NEW. `pool` must be non-empty and the
    /// dimensions positive; both are caller-guaranteed preconditions.
    pub fn new(
        height: usize,
        width: usize,
        pool: Vec<Shape>,
        mut selector: Box<dyn ShapeSelector>,
    ) -> Self {
        let next_shape = pool[selector.select(pool.len())].clone();
        let mut field = Self {
            session: next_session_id(),
            height,
            width,
            pool,
            selector,
            grid: empty_grid(height, width),
            active: None,
            next_shape,
            status: Status::New,
            level_idx: 0,
            score: 0,
            clearing_rows: Vec::new(),
            pending: None,
            paused_from: None,
            events: Vec::new(),
        };
        field.push_status_event();
        field.redraw();
        field
    }

    /// A controller over a preset grid, in status NEW. Dimensions are taken
    /// from the grid.
    pub fn with_grid(grid: Grid, pool: Vec<Shape>, selector: Box<dyn ShapeSelector>) -> Self {
        let height = grid.len();
        let width = grid.first().map_or(0, Vec::len);
        let mut field = Self::new(height, width, pool, selector);
        field.grid = grid;
        field
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> &'static Level {
        &LEVELS[self.level_idx]
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn active(&self) -> Option<&ActivePiece> {
        self.active.as_ref()
    }

    pub fn next_shape(&self) -> &Shape {
        &self.next_shape
    }

    pub fn clearing_rows(&self) -> &[usize] {
        &self.clearing_rows
    }

    /// Time until the pending deferred action fires, if one is outstanding.
    /// Useful as a poll timeout in a host loop.
    pub fn time_until_due(&self) -> Option<Duration> {
        self.pending.as_ref().map(|p| p.remaining)
    }

    /// Takes and clears all pending events.
    pub fn take_events(&mut self) -> Vec<PlayFieldEvent> {
        std::mem::take(&mut self.events)
    }

    /// The base grid with the falling piece's cells overlaid. Off-grid piece
    /// cells are skipped.
    pub fn render_grid(&self) -> Grid {
        let mut grid = self.grid.clone();
        if let Some(piece) = &self.active {
            let color = piece.shape.color();
            for (i, row) in piece.shape.cells().iter().enumerate() {
                for (j, &filled) in row.iter().enumerate() {
                    if !filled {
                        continue;
                    }
                    let r = piece.row + i as i16;
                    let c = piece.col + j as i16;
                    if r >= 0 && (r as usize) < self.height && c >= 0 && (c as usize) < self.width {
                        grid[r as usize][c as usize] = CellState::Filled(color);
                    }
                }
            }
        }
        grid
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.render_grid(),
            status: self.status,
            score: self.score,
            next_shape: self.next_shape.clone(),
            level: self.level(),
            clearing_rows: self.clearing_rows.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle intents
    // ------------------------------------------------------------------

    /// Legal only from NEW: spawns the first piece and starts the fall loop.
    pub fn start(&mut self) {
        if self.status != Status::New {
            return;
        }
        self.spawn_next();
        self.set_status(Status::InProgress);
        self.schedule(Deferred::Fall);
    }

    /// Full reset and immediate new game. No-op while a game is being played
    /// (IN_PROGRESS or ELIMINATING).
    pub fn restart(&mut self) {
        if self.status == Status::InProgress || self.status == Status::Eliminating {
            return;
        }
        self.reset();
        self.spawn_next();
        self.set_status(Status::InProgress);
        self.schedule(Deferred::Fall);
    }

    /// Suspends play, stashing the interrupted phase so `resume` can pick the
    /// game up exactly where it stopped, including a mid-flight clear
    /// resolution. Legal from IN_PROGRESS or ELIMINATING; idempotent.
    pub fn pause(&mut self) {
        if self.status != Status::InProgress && self.status != Status::Eliminating {
            return;
        }
        self.paused_from = Some(PausedPhase {
            status: self.status,
            pending: self.pending.take(),
        });
        self.set_status(Status::Paused);
    }

    /// Restores the phase interrupted by `pause`. No-op otherwise.
    pub fn resume(&mut self) {
        if self.status != Status::Paused {
            return;
        }
        let phase = self.paused_from.take().unwrap_or(PausedPhase {
            status: Status::InProgress,
            pending: None,
        });
        self.pending = phase.pending;
        if self.pending.is_none() {
            self.pending = Some(Pending {
                action: Deferred::Fall,
                remaining: self.level().interval,
            });
        }
        self.set_status(phase.status);
    }

    // ------------------------------------------------------------------
    // Movement intents
    // ------------------------------------------------------------------

    pub fn move_left(&mut self) {
        self.shift(-1);
    }

    pub fn move_right(&mut self) {
        self.shift(1);
    }

    fn shift(&mut self, dc: i16) {
        if self.status != Status::InProgress {
            return;
        }
        let Some(piece) = self.active.clone() else {
            return;
        };
        if self.can_place(piece.row, piece.col + dc, &piece.shape) {
            if let Some(active) = self.active.as_mut() {
                active.col += dc;
            }
            self.redraw();
        }
    }

    /// Swaps in the clockwise rotation when it fits at the current offset.
    /// No wall kicks.
    pub fn rotate(&mut self) {
        if self.status != Status::InProgress {
            return;
        }
        let Some(piece) = self.active.clone() else {
            return;
        };
        let rotated = piece.shape.rotated_cw();
        if self.can_place(piece.row, piece.col, &rotated) {
            if let Some(active) = self.active.as_mut() {
                active.shape = rotated;
            }
            self.redraw();
        }
    }

    /// Hard drop: cancels the fall timer, slides the piece to rest, and
    /// resolves locking/clearing immediately.
    pub fn hard_drop(&mut self) {
        if self.status != Status::InProgress || self.active.is_none() {
            return;
        }
        self.pending = None;
        loop {
            let Some(piece) = self.active.clone() else {
                return;
            };
            if !self.can_place(piece.row - 1, piece.col, &piece.shape) {
                break;
            }
            if let Some(active) = self.active.as_mut() {
                active.row -= 1;
            }
        }
        self.redraw();
        self.settle();
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    /// Advances the scheduler by `elapsed` wall time, firing the pending
    /// deferred action (and any it chains into) as it comes due. Inert when
    /// nothing is outstanding, so hosts may call it unconditionally.
    pub fn advance(&mut self, mut elapsed: Duration) {
        loop {
            match self.pending.as_mut() {
                None => return,
                Some(pending) if elapsed < pending.remaining => {
                    pending.remaining -= elapsed;
                    return;
                }
                Some(_) => {}
            }
            let Some(pending) = self.pending.take() else {
                return;
            };
            elapsed -= pending.remaining;
            match pending.action {
                Deferred::Fall => self.fall_step(),
                Deferred::ResolveClear { rebuilt, cleared } => {
                    self.resolve_clear(rebuilt, cleared);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Collision & placement
    // ------------------------------------------------------------------

    /// Whether `shape` fits with its local (0, 0) at `(row, col)`. Horizontal
    /// out-of-bounds and dipping below the floor are always illegal; rows at
    /// or above the grid top are free space, so a freshly spawned piece may
    /// hover above the visible area.
    pub fn can_place(&self, row: i16, col: i16, shape: &Shape) -> bool {
        for (i, shape_row) in shape.cells().iter().enumerate() {
            for (j, &filled) in shape_row.iter().enumerate() {
                if !filled {
                    continue;
                }
                let r = row + i as i16;
                let c = col + j as i16;
                if r < 0 || c < 0 || c >= self.width as i16 {
                    return false;
                }
                if (r as usize) < self.height
                    && self.grid[r as usize][c as usize] != CellState::Empty
                {
                    return false;
                }
            }
        }
        true
    }

    /// Whether the resting piece still sticks out of the grid: the terminal
    /// condition, checked only once gravity can no longer move it down.
    fn is_terminal(&self) -> bool {
        let Some(piece) = &self.active else {
            return false;
        };
        for (i, shape_row) in piece.shape.cells().iter().enumerate() {
            for (j, &filled) in shape_row.iter().enumerate() {
                if !filled {
                    continue;
                }
                let r = piece.row + i as i16;
                let c = piece.col + j as i16;
                if r < 0 || r >= self.height as i16 || c < 0 || c >= self.width as i16 {
                    return true;
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Fall / lock / clear state machine
    // ------------------------------------------------------------------

    fn fall_step(&mut self) {
        let Some(piece) = self.active.clone() else {
            return;
        };
        if self.can_place(piece.row - 1, piece.col, &piece.shape) {
            if let Some(active) = self.active.as_mut() {
                active.row -= 1;
            }
            self.redraw();
            self.schedule(Deferred::Fall);
            return;
        }
        self.settle();
    }

    /// The piece can no longer fall: either the game ends here, or the piece
    /// locks into the grid and clearing is evaluated.
    fn settle(&mut self) {
        if self.is_terminal() {
            self.active = None;
            self.pending = None;
            self.set_status(Status::GameOver);
            self.redraw();
            return;
        }
        self.lock_active();
        self.eliminate();
    }

    /// Burns the active piece's color into every grid cell it covers.
    /// Off-grid cells are skipped silently.
    fn lock_active(&mut self) {
        let Some(piece) = self.active.clone() else {
            return;
        };
        let color = piece.shape.color();
        for (i, shape_row) in piece.shape.cells().iter().enumerate() {
            for (j, &filled) in shape_row.iter().enumerate() {
                if !filled {
                    continue;
                }
                let r = piece.row + i as i16;
                let c = piece.col + j as i16;
                if r >= 0 && (r as usize) < self.height && c >= 0 && (c as usize) < self.width {
                    self.grid[r as usize][c as usize] = CellState::Filled(color);
                }
            }
        }
    }

    /// Scans for full rows. With none, the next piece enters play at once.
    /// Otherwise the immediate per-line award is applied, the cleared rows
    /// are exposed for the flash animation, and the rebuilt grid is parked in
    /// a one-shot deferred action that completes the clear.
    fn eliminate(&mut self) {
        let mut kept: Grid = Vec::new();
        let mut cleared: Vec<usize> = Vec::new();
        for (i, row) in self.grid.iter().enumerate() {
            if row.iter().all(|cell| *cell != CellState::Empty) {
                cleared.push(i);
            } else {
                kept.push(row.clone());
            }
        }

        if cleared.is_empty() {
            self.spawn_next();
            self.redraw();
            self.schedule(Deferred::Fall);
            return;
        }

        // Kept rows settle to the bottom; fresh empty rows fill in from the top.
        while kept.len() < self.height {
            kept.push(vec![CellState::Empty; self.width]);
        }

        self.score += cleared.len() as u32 * self.level().ordinal;
        self.clearing_rows = cleared.clone();
        self.set_status(Status::Eliminating);
        self.redraw();
        self.schedule(Deferred::ResolveClear {
            rebuilt: kept,
            cleared: cleared.len(),
        });
    }

    /// Completes a clear: combo bonus (quadratic in lines), at most one level
    /// advance, grid swap, and the next piece.
    fn resolve_clear(&mut self, rebuilt: Grid, cleared: usize) {
        self.score += (cleared * cleared) as u32 * self.level().score_delta;
        if let Some(threshold) = self.level().next_level_score {
            if self.score >= threshold && self.level_idx + 1 < LEVELS.len() {
                self.level_idx += 1;
            }
        }
        self.clearing_rows.clear();
        self.grid = rebuilt;
        self.redraw();
        self.set_status(Status::InProgress);
        self.spawn_next();
        self.schedule(Deferred::Fall);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn reset(&mut self) {
        self.level_idx = 0;
        self.score = 0;
        self.clearing_rows.clear();
        self.grid = empty_grid(self.height, self.width);
        self.active = None;
        self.pending = None;
        self.paused_from = None;
        self.next_shape = self.draw();
        self.set_status(Status::New);
        self.redraw();
    }

    /// Promotes the pre-selected next shape to the active piece, centered
    /// horizontally and hovering just above the top row, then pre-selects a
    /// fresh next shape.
    fn spawn_next(&mut self) {
        let drawn = self.draw();
        let shape = std::mem::replace(&mut self.next_shape, drawn);
        let col = (self.width as i16 - shape.width() as i16) / 2;
        self.active = Some(ActivePiece {
            shape,
            row: self.height as i16,
            col,
        });
    }

    fn draw(&mut self) -> Shape {
        let i = self.selector.select(self.pool.len());
        self.pool[i].clone()
    }

    fn schedule(&mut self, action: Deferred) {
        self.pending = Some(Pending {
            action,
            remaining: self.level().interval,
        });
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        self.push_status_event();
    }

    fn push_status_event(&mut self) {
        self.events.push(PlayFieldEvent::StatusChanged {
            status: self.status,
            session: self.session,
        });
    }

    fn redraw(&mut self) {
        self.events.push(PlayFieldEvent::Redraw);
    }
}

pub fn empty_grid(height: usize, width: usize) -> Grid {
    vec![vec![CellState::Empty; width]; height]
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;

    pub fn fill_row(grid: &mut Grid, row: usize) {
        for cell in &mut grid[row] {
            *cell = CellState::Filled(ColorToken(9));
        }
    }

    pub fn fill_row_with_gap(grid: &mut Grid, row: usize, gap_col: usize) {
        for (col, cell) in grid[row].iter_mut().enumerate() {
            if col != gap_col {
                *cell = CellState::Filled(ColorToken(9));
            }
        }
    }

    /// A single-cell shape.
    pub fn unit_shape() -> Shape {
        Shape::new(vec![vec![true]], ColorToken(0))
    }

    /// A 1-column shape spanning `len` rows.
    pub fn vertical_bar(len: usize) -> Shape {
        Shape::new(vec![vec![true]; len], ColorToken(1))
    }

    /// A 1-row shape spanning `len` columns.
    pub fn horizontal_bar(len: usize) -> Shape {
        Shape::new(vec![vec![true; len]], ColorToken(2))
    }

    pub fn filled_count_in_row(grid: &Grid, row: usize) -> usize {
        grid[row]
            .iter()
            .filter(|cell| **cell != CellState::Empty)
            .count()
    }

    pub fn total_filled_cells(grid: &Grid) -> usize {
        grid.iter()
            .flatten()
            .filter(|cell| **cell != CellState::Empty)
            .count()
    }
}

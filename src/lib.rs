//! Rules engine for a falling-block puzzle game.
//!
//! The [`playfield::PlayField`] controller owns the grid, the active piece,
//! gravity timing, collision rules, line clearing, and scoring/leveling.
//! Everything else (rendering, input wiring) is a thin consumer that reacts
//! to [`playfield::Snapshot`] values and forwards user intents.

pub mod level;
pub mod playfield;
pub mod shape;

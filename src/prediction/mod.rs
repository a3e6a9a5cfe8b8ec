// Client-side prediction module for reducing input lag in multiplayer
//
// This module implements client-side prediction with server reconciliation:
// 1. Client predicts movement locally for instant feedback
// 2. Server remains authoritative and processes batched moves
// 3. Client reconciles predictions against server corrections by replaying
//    the moves the server has not acknowledged yet
// 4. Smooth visual correction handles any mispredictions

pub mod replay;
pub mod saved_move;
pub mod smooth_correction;

pub use replay::{needs_correction, reconcile, PredictedHistory, ServerCorrection};
pub use saved_move::{MoveBuffer, SavedMove};
pub use smooth_correction::SmoothCorrection;

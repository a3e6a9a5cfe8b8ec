//! Deterministic character movement simulation.
//!
//! Everything in here is engine-agnostic and side-effect free apart from the
//! character state it mutates: the server tick, client prediction and
//! reconciliation replay all run [`simulate::perform_move`] against a
//! [`world::CollisionWorld`] and get identical results for identical inputs.

pub mod config;
pub mod mantle;
pub mod rooted;
pub mod rules;
pub mod simulate;
pub mod state;
pub mod transitions;
pub mod velocity;
pub mod walk;
pub mod wall_run;
pub mod world;

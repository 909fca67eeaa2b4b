//! Clinical note generation.
//!
//! Rendering and persistence of notes, plus the escalation hook that
//! fires for the most severe policy levels.

pub mod alert;
pub mod composer;

pub use alert::{requires_alert, NoopNotifier, Notifier, SimulatedPager};
pub use composer::{Note, NoteComposer};

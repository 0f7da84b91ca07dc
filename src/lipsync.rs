//! Phoneme timing to mouth-shape timeline.

pub mod frame;
pub mod generate;
pub mod phonetics;
pub mod query;

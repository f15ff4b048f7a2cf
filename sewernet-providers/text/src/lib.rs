//! Text providers reading pipe tables, rainfall series, and diameter lists
//! from line-based UTF-8 sources.

mod errors;
mod pipes;
mod rain;
mod table;

pub use crate::{
    errors::TextProviderError,
    pipes::{PipeTable, REQUIRED_COLUMNS},
    rain::{open_diameters, open_rainfall, read_diameters, read_rainfall},
};

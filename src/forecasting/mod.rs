//! Reference forecasters
mod naive;

pub use naive::{NaiveForecaster, NaiveForecasterParams, NaiveForecasterValidParams, NaiveStrategy};

//! Reference time series regressors
mod dummy;
mod neighbors;

pub use dummy::{DummyRegressor, DummyRegressorParams, DummyRegressorValidParams, DummyStrategy};
pub use neighbors::{
    KNeighborsRegressor, KNeighborsRegressorParams, KNeighborsRegressorValidParams,
};

//! Reference time series classifiers
mod dummy;
mod neighbors;

pub use dummy::{DummyClassifier, DummyClassifierStrategy};
pub use neighbors::{
    KNeighborsClassifier, KNeighborsClassifierParams, KNeighborsClassifierValidParams,
};

//! Tempora prelude.
//!
//! This module contains the most used types, type aliases, traits and
//! functions that you can import easily as a group.
//!

#[doc(no_inline)]
pub use crate::error::{Error, Result};

#[doc(no_inline)]
pub use crate::traits::*;

#[doc(no_inline)]
pub use crate::base::{BaseObject, ParamPath, ParamValue, Params, TestParams};

#[doc(no_inline)]
pub use crate::dataset::{Float, ForecastingHorizon, MType, Scitype, TsData};

#[doc(no_inline)]
pub use crate::tags::{Tag, TagSet};

#[doc(no_inline)]
pub use crate::param_guard::ParamGuard;

#[doc(no_inline)]
pub use crate::composition::{compose, Composable, Step};

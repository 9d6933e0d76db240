pub use anyhow::{ensure, format_err, Result};
pub use itertools::Itertools as _;
pub use log::debug;
pub use std::ops::Range;
pub use tch::{kind::FLOAT_CPU, IndexOp, Kind, Tensor};

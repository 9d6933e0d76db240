//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use approx::assert_abs_diff_eq;
pub use cache::{ConfigMap, ExpCache, MeshGroups, Record};
pub use chrono::{DateTime, FixedOffset};
pub use futures::future::FutureExt;
pub use indexmap::IndexMap;
pub use itertools::{izip, Itertools};
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use regex::Regex;
pub use semver::{Version, VersionReq};
pub use serde::{
    de::Error as DeserializeError, Deserialize, Deserializer, Serialize, Serializer,
};
pub use serde_json::Value;
pub use std::{
    fmt::{self, Debug, Display},
    fs,
    ops::Range,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
pub use strum::AsRefStr;
pub use tch::{kind::FLOAT_CPU, CModule, Device, IValue, Kind, Tensor};
pub use tch_goodies::{expand_to_square, slice_pair, temporal_chop, Region};
pub use tracing::{debug, info, info_span, warn, Instrument};

pub type Fallible<T> = Result<T, Error>;

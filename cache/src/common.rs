pub use anyhow::{ensure, Context as _, Result};
pub use futures::AsyncWriteExt as _;
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use log::{info, warn};
pub use percent_encoding::NON_ALPHANUMERIC;
pub use serde::{de::DeserializeOwned, Deserialize, Serialize};
pub use serde_json::{Map, Value};
pub use std::path::{Path, PathBuf};
pub use uuid::Uuid;

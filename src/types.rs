//! Common imports shared across modules.

pub use std::collections::BTreeMap;
pub use std::path::{Path, PathBuf};

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

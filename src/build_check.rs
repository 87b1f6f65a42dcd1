//! API-level gates.
//!
//! Each check answers "is the host at least at API level X". The level is
//! read at call time from an injected [`ApiLevelSource`] so the gates can be
//! exercised without a real host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Environment variable consulted by [`EnvApiLevel`].
pub const API_LEVEL_VAR: &str = "LOOPER_API_LEVEL";

/// Android 5.0.
pub const LOLLIPOP: ApiLevel = ApiLevel(21);
/// Android 6.0 (`M`).
pub const MARSHMALLOW: ApiLevel = ApiLevel(23);
/// Android 12 (API 31).
pub const S: ApiLevel = ApiLevel(31);

/// Platform API level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApiLevel(pub u32);

impl fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ApiLevel)
            .map_err(|e| Error::Config(format!("invalid API level {s:?}: {e}")))
    }
}

impl From<u32> for ApiLevel {
    fn from(level: u32) -> Self {
        Self(level)
    }
}

/// `level >= threshold`.
pub fn at_least(level: ApiLevel, threshold: ApiLevel) -> bool {
    level >= threshold
}

/// Supplies the ambient API level.
pub trait ApiLevelSource {
    fn api_level(&self) -> ApiLevel;
}

impl ApiLevelSource for ApiLevel {
    fn api_level(&self) -> ApiLevel {
        *self
    }
}

impl<F> ApiLevelSource for F
where
    F: Fn() -> ApiLevel,
{
    fn api_level(&self) -> ApiLevel {
        self()
    }
}

/// Reads [`API_LEVEL_VAR`] on every call.
///
/// An unset or unparsable variable yields level 0, so every gate is closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvApiLevel;

impl ApiLevelSource for EnvApiLevel {
    fn api_level(&self) -> ApiLevel {
        std::env::var(API_LEVEL_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

/// The four named gates over one level source.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildCheck<L> {
    source: L,
}

impl<L: ApiLevelSource> BuildCheck<L> {
    pub fn new(source: L) -> Self {
        Self { source }
    }

    /// The level the gates currently see.
    pub fn api_level(&self) -> ApiLevel {
        self.source.api_level()
    }

    pub fn is_at_least(&self, threshold: ApiLevel) -> bool {
        at_least(self.source.api_level(), threshold)
    }

    pub fn is_lollipop(&self) -> bool {
        self.is_at_least(LOLLIPOP)
    }

    pub fn is_marshmallow(&self) -> bool {
        self.is_at_least(MARSHMALLOW)
    }

    /// Same threshold as [`is_lollipop`](Self::is_lollipop).
    pub fn is_android5(&self) -> bool {
        self.is_at_least(LOLLIPOP)
    }

    pub fn is_api31(&self) -> bool {
        self.is_at_least(S)
    }

    /// Evaluate every gate against a single read of the level.
    pub fn report(&self) -> GateReport {
        let level = self.source.api_level();
        GateReport {
            api_level: level,
            lollipop: at_least(level, LOLLIPOP),
            marshmallow: at_least(level, MARSHMALLOW),
            android5: at_least(level, LOLLIPOP),
            api31: at_least(level, S),
        }
    }
}

/// Snapshot of all gates, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub api_level: ApiLevel,
    pub lollipop: bool,
    pub marshmallow: bool,
    pub android5: bool,
    pub api31: bool,
}

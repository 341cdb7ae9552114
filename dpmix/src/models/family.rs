use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The supported likelihood/prior families.
///
/// Parsed once from a tag when a sampler is configured; the concrete [`LikelihoodModel`]
/// type is picked from the variant and never re-dispatched afterwards.
///
/// [`LikelihoodModel`]: crate::models::LikelihoodModel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Family {
    /// Multivariate Gaussian clusters, see [`crate::models::Niw`].
    Niw,
    /// Linear regression clusters, see [`crate::models::Nig`].
    Nig,
    /// Noisy line segments, see [`crate::models::SegmentMixture`].
    Segment,
    /// Directed segments with a weight schedule, see [`crate::models::ScheduleMixture`].
    Schedule,
}

impl Family {
    pub const ALL: [Self; 4] = [Self::Niw, Self::Nig, Self::Segment, Self::Schedule];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Niw => "niw",
            Self::Nig => "nig",
            Self::Segment => "segment",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "niw" | "normal-inverse-wishart" => Ok(Self::Niw),
            "nig" | "normal-inverse-gamma" | "regression" => Ok(Self::Nig),
            "segment" | "segments" => Ok(Self::Segment),
            "schedule" | "directional" => Ok(Self::Schedule),
            _ => Err(Error::InvalidFamily(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Family {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Family> for String {
    fn from(family: Family) -> Self {
        family.tag().to_owned()
    }
}

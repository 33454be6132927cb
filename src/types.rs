// =============================================================================
// Shared selection types used across the HoneyCoin projection service
// =============================================================================

use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// A named revenue/user growth trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scenario {
    Best,
    Base,
    Downside,
}

impl Scenario {
    /// Every scenario, in display order.
    pub const ALL: [Scenario; 3] = [Scenario::Best, Scenario::Base, Scenario::Downside];

    /// Wire identifier (`best`, `base`, `downside`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Base => "base",
            Self::Downside => "downside",
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::Base
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(Self::Best),
            "base" => Ok(Self::Base),
            "downside" => Ok(Self::Downside),
            other => bail!("Invalid scenario: '{other}'. Use 'best', 'base' or 'downside'."),
        }
    }
}

/// An expansion region the projections can be scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    Kenya,
    EastAfrica,
    Africa,
}

impl Region {
    /// Every region, ordered by increasing market size.
    pub const ALL: [Region; 3] = [Region::Kenya, Region::EastAfrica, Region::Africa];

    /// Wire identifier (`kenya`, `eastAfrica`, `africa`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kenya => "kenya",
            Self::EastAfrica => "eastAfrica",
            Self::Africa => "africa",
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::Kenya
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kenya" => Ok(Self::Kenya),
            "eastAfrica" => Ok(Self::EastAfrica),
            "africa" => Ok(Self::Africa),
            other => bail!("Invalid region: '{other}'. Use 'kenya', 'eastAfrica' or 'africa'."),
        }
    }
}

/// The user-chosen scenario and region. Always holds valid keys because both
/// fields are closed enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub scenario: Scenario,
    pub region: Region,
}

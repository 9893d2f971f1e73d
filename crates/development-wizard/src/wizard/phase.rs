use std::fmt;

use serde::{Deserialize, Serialize};

/// The wizard steps, numbered from 1 in the order a user walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WizardPhase {
    Identity = 1,
    Classification = 2,
    Overview = 3,
    UnitTypes = 4,
    Finalisation = 5,
}

impl WizardPhase {
    pub const FIRST: Self = Self::Identity;
    pub const LAST: Self = Self::Finalisation;

    pub const fn ordered() -> [Self; 5] {
        [
            Self::Identity,
            Self::Classification,
            Self::Overview,
            Self::UnitTypes,
            Self::Finalisation,
        ]
    }

    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Identity),
            2 => Some(Self::Classification),
            3 => Some(Self::Overview),
            4 => Some(Self::UnitTypes),
            5 => Some(Self::Finalisation),
            _ => None,
        }
    }

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "Development Identity",
            Self::Classification => "Classification",
            Self::Overview => "Overview",
            Self::UnitTypes => "Unit Types",
            Self::Finalisation => "Finalisation",
        }
    }

    pub const fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Identity => None,
            other => Self::from_number(other.number() - 1),
        }
    }
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.number())
    }
}

impl From<WizardPhase> for u8 {
    fn from(phase: WizardPhase) -> Self {
        phase.number()
    }
}

impl TryFrom<u8> for WizardPhase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("invalid wizard phase {value}"))
    }
}

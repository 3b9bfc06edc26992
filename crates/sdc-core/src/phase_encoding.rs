//! Phase-encoding direction codes.
//!
//! Two letterings are in use: BIDS sidecars name voxel axes `i`, `j`, `k`;
//! FSL/FUGUE names the same axes `x`, `y`, `z`. Either may carry a trailing
//! `-` for reversed polarity (a trailing `+` is accepted and means positive).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SdcError};

/// Voxel axis along which phase encoding runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    I,
    J,
    K,
}

impl Axis {
    /// Index into `(x, y, z)` ordered vectors.
    pub fn index(self) -> usize {
        match self {
            Self::I => 0,
            Self::J => 1,
            Self::K => 2,
        }
    }

    pub fn bids_letter(self) -> char {
        match self {
            Self::I => 'i',
            Self::J => 'j',
            Self::K => 'k',
        }
    }

    pub fn fugue_letter(self) -> char {
        match self {
            Self::I => 'x',
            Self::J => 'y',
            Self::K => 'z',
        }
    }
}

/// Phase-encoding polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// Phase-encoding axis plus polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseEncodingDirection {
    axis: Axis,
    polarity: Polarity,
}

impl PhaseEncodingDirection {
    pub fn new(axis: Axis, polarity: Polarity) -> Self {
        Self { axis, polarity }
    }

    /// Parse a code such as `j`, `j-`, `y-` or `k+`.
    ///
    /// Anything outside that grammar is an error; there is no default axis.
    pub fn parse(code: &str) -> Result<Self> {
        let invalid = || SdcError::InvalidPhaseEncoding(code.to_string());
        let mut chars = code.trim().chars();

        let axis = match chars.next().ok_or_else(invalid)? {
            'i' | 'x' => Axis::I,
            'j' | 'y' => Axis::J,
            'k' | 'z' => Axis::K,
            _ => return Err(invalid()),
        };
        let polarity = match chars.next() {
            None | Some('+') => Polarity::Positive,
            Some('-') => Polarity::Negative,
            Some(_) => return Err(invalid()),
        };
        if chars.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { axis, polarity })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// `+1.0` or `-1.0`.
    pub fn sign(&self) -> f64 {
        self.polarity.sign()
    }

    /// BIDS lettering, e.g. `j-`.
    pub fn to_bids(&self) -> String {
        self.render(self.axis.bids_letter())
    }

    /// FSL/FUGUE lettering, e.g. `y-`.
    pub fn to_fugue(&self) -> String {
        self.render(self.axis.fugue_letter())
    }

    /// Unit vector in `(x, y, z)` order with the polarity applied.
    pub fn unit_vector(&self) -> [i8; 3] {
        let mut v = [0i8; 3];
        v[self.axis.index()] = match self.polarity {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
        };
        v
    }

    fn render(&self, letter: char) -> String {
        match self.polarity {
            Polarity::Positive => letter.to_string(),
            Polarity::Negative => format!("{letter}-"),
        }
    }
}

impl FromStr for PhaseEncodingDirection {
    type Err = SdcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PhaseEncodingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bids())
    }
}

impl Serialize for PhaseEncodingDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bids())
    }
}

impl<'de> Deserialize<'de> for PhaseEncodingDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Self::parse(&code).map_err(serde::de::Error::custom)
    }
}

//! Acquisition metadata read from JSON sidecars.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdcError};
use crate::phase_encoding::PhaseEncodingDirection;

/// The sidecar fields distortion correction needs.
///
/// Every field is optional when deserializing; the accessors fail with
/// [`SdcError::MissingMetadata`] when a pipeline asks for one that is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SidecarMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_echo_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_encoding_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_readout_time: Option<f64>,
}

impl SidecarMetadata {
    /// Parse a sidecar document. Unknown keys are ignored.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SdcError::MetadataParse(e.to_string()))
    }

    pub fn with_effective_echo_spacing(mut self, seconds: f64) -> Self {
        self.effective_echo_spacing = Some(seconds);
        self
    }

    pub fn with_phase_encoding_direction(mut self, code: impl Into<String>) -> Self {
        self.phase_encoding_direction = Some(code.into());
        self
    }

    pub fn with_total_readout_time(mut self, seconds: f64) -> Self {
        self.total_readout_time = Some(seconds);
        self
    }

    /// Dwell time between phase-encoding lines, in seconds.
    pub fn effective_echo_spacing(&self) -> Result<f64> {
        let value = self
            .effective_echo_spacing
            .ok_or(SdcError::MissingMetadata { field: "EffectiveEchoSpacing" })?;
        positive("EffectiveEchoSpacing", value)
    }

    pub fn total_readout_time(&self) -> Result<f64> {
        let value = self
            .total_readout_time
            .ok_or(SdcError::MissingMetadata { field: "TotalReadoutTime" })?;
        positive("TotalReadoutTime", value)
    }

    pub fn phase_encoding_direction(&self) -> Result<PhaseEncodingDirection> {
        let code = self
            .phase_encoding_direction
            .as_deref()
            .ok_or(SdcError::MissingMetadata { field: "PhaseEncodingDirection" })?;
        PhaseEncodingDirection::parse(code)
    }
}

fn positive(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SdcError::InvalidMetadata {
            field,
            reason: format!("expected a positive number of seconds, got {value}"),
        })
    }
}

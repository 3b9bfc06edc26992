//! Acquisition parameter tables for blip-pair distortion estimation.
//!
//! One row per volume of the merged series: the phase-encoding unit vector
//! followed by the total readout time in seconds, e.g. `0 -1 0 0.0425`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdcError};
use crate::metadata::SidecarMetadata;
use crate::phase_encoding::PhaseEncodingDirection;

/// Phase-encoding vector and readout time of one volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionParameterRow {
    direction: [i8; 3],
    readout_time: f64,
}

impl AcquisitionParameterRow {
    pub fn new(pe: PhaseEncodingDirection, readout_time: f64) -> Self {
        Self {
            direction: pe.unit_vector(),
            readout_time,
        }
    }

    /// Row for a volume described by `meta`.
    pub fn from_metadata(meta: &SidecarMetadata) -> Result<Self> {
        Ok(Self::new(meta.phase_encoding_direction()?, meta.total_readout_time()?))
    }

    /// Axis components in `(x, y, z)` order; exactly one is `±1`.
    pub fn direction(&self) -> [i8; 3] {
        self.direction
    }

    pub fn readout_time(&self) -> f64 {
        self.readout_time
    }
}

impl fmt::Display for AcquisitionParameterRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.direction;
        write!(f, "{x} {y} {z} {}", self.readout_time)
    }
}

/// Ordered acquisition rows, reference volume first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionTable {
    rows: Vec<AcquisitionParameterRow>,
}

impl AcquisitionTable {
    pub fn new(rows: Vec<AcquisitionParameterRow>) -> Self {
        Self { rows }
    }

    /// One row for the reference, then one per additional volume in order.
    ///
    /// Each row is taken from that volume's own metadata only.
    pub fn synthesize(reference: &SidecarMetadata, others: &[SidecarMetadata]) -> Result<Self> {
        let rows = std::iter::once(reference)
            .chain(others)
            .map(AcquisitionParameterRow::from_metadata)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[AcquisitionParameterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Text form consumed by blip-pair estimation tools, one row per line.
    pub fn to_text(&self) -> String {
        self.rows.iter().map(|row| format!("{row}\n")).collect()
    }

    /// Fail unless the table has one row per volume of a series.
    pub fn ensure_covers(&self, volumes: usize) -> Result<()> {
        if self.rows.len() != volumes {
            return Err(SdcError::invalid_argument(format!(
                "acquisition table has {} rows for {} volumes",
                self.rows.len(),
                volumes
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AcquisitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pe: &str, trt: f64) -> SidecarMetadata {
        SidecarMetadata::default()
            .with_phase_encoding_direction(pe)
            .with_total_readout_time(trt)
    }

    #[test]
    fn test_synthesize_orders_reference_first() {
        let reference = meta("j", 0.05);
        let others = vec![meta("j-", 0.0425), meta("i", 0.03)];
        let table = AcquisitionTable::synthesize(&reference, &others).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].direction(), [0, 1, 0]);
        assert_eq!(table.rows()[0].readout_time(), 0.05);
        assert_eq!(table.rows()[1].direction(), [0, -1, 0]);
        assert_eq!(table.rows()[2].direction(), [1, 0, 0]);
        for row in table.rows() {
            assert_eq!(row.direction().iter().filter(|c| c.abs() == 1).count(), 1);
        }
        assert_eq!(table.to_text(), "0 1 0 0.05\n0 -1 0 0.0425\n1 0 0 0.03\n");
    }

    #[test]
    fn test_synthesize_requires_readout_time() {
        let reference = SidecarMetadata::default().with_phase_encoding_direction("j");
        let err = AcquisitionTable::synthesize(&reference, &[]).unwrap_err();
        assert_eq!(err, SdcError::MissingMetadata { field: "TotalReadoutTime" });
    }
}

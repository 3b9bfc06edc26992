//! Voxel-shift estimation from a fieldmap.

use std::f64::consts::PI;

use burn::tensor::backend::Backend;

use crate::error::{Result, SdcError};
use crate::field::VoxelShiftMap;
use crate::image::Image;
use crate::phase_encoding::PhaseEncodingDirection;
use crate::units::apply_mask;

/// Shift in voxels along the phase-encoding axis:
/// `vsm = fmap / 2π · dwell_time · N_pe`.
///
/// `fieldmap` is in rad/s and `dwell_time` (effective echo spacing) in
/// seconds; `N_pe` is the number of voxels along the PE axis. Polarity is not
/// applied here. With a mask, shifts outside it are zero.
pub fn fieldmap_to_shift<B: Backend>(
    fieldmap: &Image<B, 3>,
    dwell_time: f64,
    pe: PhaseEncodingDirection,
    mask: Option<&Image<B, 3>>,
) -> Result<VoxelShiftMap<B>> {
    if !(dwell_time.is_finite() && dwell_time > 0.0) {
        return Err(SdcError::invalid_argument(format!(
            "dwell time must be positive, got {dwell_time}"
        )));
    }

    let [nz, ny, nx] = fieldmap.shape();
    let n_pe = [nx, ny, nz][pe.axis().index()];
    let scale = dwell_time * n_pe as f64 / (2.0 * PI);
    tracing::debug!(n_pe, dwell_time, pe = %pe, "computing voxel-shift map");

    let shift = fieldmap.with_data(fieldmap.data().clone().mul_scalar(scale))?;
    let shift = match mask {
        Some(mask) => apply_mask(&shift, mask)?,
        None => shift,
    };
    Ok(VoxelShiftMap::new(shift))
}

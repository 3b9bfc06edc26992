//! Jacobian determinant of a displacement field.

use burn::tensor::backend::Backend;
use nalgebra::Matrix3;

use crate::error::Result;
use crate::field::DisplacementField;
use crate::image::Image;

/// `det(I + ∂u/∂x)` at every voxel of `field`.
///
/// Derivatives are central differences along each voxel axis (one-sided at
/// the borders, zero along singleton axes), mapped to physical units through
/// the spacing and direction of the field grid. Values above 1 mark local
/// expansion, below 1 compression.
pub fn jacobian_determinant<B: Backend>(field: &DisplacementField<B>) -> Result<Image<B, 3>> {
    let [nz, ny, nx] = field.shape();
    let geometry = field.geometry();
    let values = field.values()?;
    let plane = nz * ny * nx;

    // ∂idx/∂x = S^-1 D^-1
    let inv_dir = geometry.inverse_direction()?;
    let spacing = geometry.spacing();
    let mut index_per_mm = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            index_per_mm[(r, c)] = inv_dir[(r, c)] / spacing[r];
        }
    }

    let at = |c: usize, z: usize, y: usize, x: usize| values[c * plane + (z * ny + y) * nx + x] as f64;
    let diff = |c: usize, z: usize, y: usize, x: usize, axis: usize| -> f64 {
        let (pos, len) = match axis {
            0 => (x, nx),
            1 => (y, ny),
            _ => (z, nz),
        };
        if len < 2 {
            return 0.0;
        }
        let (lo, hi) = (pos.saturating_sub(1), (pos + 1).min(len - 1));
        let sample = |p: usize| match axis {
            0 => at(c, z, y, p),
            1 => at(c, z, p, x),
            _ => at(c, p, y, x),
        };
        (sample(hi) - sample(lo)) / (hi - lo) as f64
    };

    let mut out = Vec::with_capacity(plane);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                // Rows: displacement component, columns: voxel axis.
                let mut du_didx = Matrix3::zeros();
                for c in 0..3 {
                    for axis in 0..3 {
                        du_didx[(c, axis)] = diff(c, z, y, x, axis);
                    }
                }
                let jac = Matrix3::identity() + du_didx * index_per_mm;
                out.push(jac.determinant() as f32);
            }
        }
    }

    Image::from_values(out, [nz, ny, nx], *geometry, &field.device())
}

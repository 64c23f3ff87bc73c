//! Pure matrix derivations between vehicle and image coordinates.
//!
//! # Ground-plane assumption
//!
//! [`image_to_vehicle_matrix`] does not invert the full projection. A pixel
//! corresponds to a whole ray in the vehicle frame, so it can only be mapped
//! back to a single point by fixing one coordinate. These functions fix
//! vehicle z=0: every pixel is assumed to show a point on the flat ground
//! plane. Pixels showing anything above the ground (other vehicles, poles,
//! the sky) come back as the point where their ray crosses z=0, which may be
//! far away, behind the camera, or at infinity for rays parallel to the
//! ground.
//!
//! For degenerate calibrations the reduced 3x3 matrix is singular. The
//! pseudo-inverse still returns a finite matrix in the least-squares sense, so
//! nothing fails, but the mapped coordinates are meaningless. Use
//! [`ground_plane_rank`] to detect this: a rank below 3 means the
//! calibration cannot map pixels to the ground.

use nalgebra::{convert, linalg::SVD, Matrix3, Matrix3x4, RealField, Vector3};

use crate::{Error, Result};

const SVD_MAX_ITERATIONS: usize = 1_000_000;

/// Build the 3x3 pinhole intrinsics matrix.
///
/// ```text
/// [[fx,  0, cx],
///  [ 0, fy, cy],
///  [ 0,  0,  1]]
/// ```
#[inline]
pub fn intrinsics_matrix<R: RealField + Copy>(fx: R, fy: R, cx: R, cy: R) -> Matrix3<R> {
    let zero = R::zero();
    let one = R::one();
    #[rustfmt::skip]
    let m = Matrix3::new(
        fx,   zero, cx,
        zero, fy,   cy,
        zero, zero, one,
    );
    m
}

/// Build the 3x4 vehicle to image projection `intrinsics * [rotation | translation]`.
///
/// The result maps homogeneous vehicle coordinates `(x, y, z, 1)` to
/// homogeneous pixel coordinates `(s*u, s*v, s)`.
pub fn projection_matrix<R: RealField + Copy>(
    intrinsics: &Matrix3<R>,
    rotation: &Matrix3<R>,
    translation: &Vector3<R>,
) -> Matrix3x4<R> {
    let mut rt = Matrix3x4::<R>::zeros();
    rt.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    rt.set_column(3, translation);
    intrinsics * rt
}

/// Remove the vehicle z column (index 2) from a projection matrix.
///
/// With z=0 this is the homography from ground-plane `(x, y, 1)` to
/// homogeneous pixels.
#[inline]
pub fn ground_plane_matrix<R: RealField + Copy>(projection: &Matrix3x4<R>) -> Matrix3<R> {
    (*projection).remove_column(2)
}

/// Compute the 3x3 image to vehicle matrix for points on the ground plane.
///
/// This is the Moore-Penrose pseudo-inverse of [`ground_plane_matrix`]. See
/// the [module documentation](index.html) for the ground-plane assumption and
/// the behavior for singular input.
///
/// Returns [`Error::NumericError`] only if `projection` contains non-finite
/// values or the SVD fails to converge.
pub fn image_to_vehicle_matrix<R: RealField + Copy>(
    projection: &Matrix3x4<R>,
) -> Result<Matrix3<R>> {
    svd_pseudo_inverse(ground_plane_svd(projection)?)
}

/// Numerical rank of [`ground_plane_matrix`].
///
/// Singular values below `3 * eps * max singular value` count as zero. A rank
/// below 3 means pixels cannot be mapped back to the ground plane.
pub fn ground_plane_rank<R: RealField + Copy>(projection: &Matrix3x4<R>) -> Result<usize> {
    Ok(svd_rank(&ground_plane_svd(projection)?))
}

/// [`image_to_vehicle_matrix`] and [`ground_plane_rank`] from a single SVD.
pub(crate) fn image_to_vehicle_matrix_and_rank<R: RealField + Copy>(
    projection: &Matrix3x4<R>,
) -> Result<(Matrix3<R>, usize)> {
    let svd = ground_plane_svd(projection)?;
    let rank = svd_rank(&svd);
    Ok((svd_pseudo_inverse(svd)?, rank))
}

fn svd_pseudo_inverse<R: RealField + Copy>(
    svd: SVD<R, nalgebra::U3, nalgebra::U3>,
) -> Result<Matrix3<R>> {
    let cutoff = svd.singular_values.max() * convert(1e-15);
    svd.pseudo_inverse(cutoff).map_err(Error::NumericError)
}

fn svd_rank<R: RealField + Copy>(svd: &SVD<R, nalgebra::U3, nalgebra::U3>) -> usize {
    let tol = svd.singular_values.max() * convert(3.0) * R::default_epsilon();
    svd.rank(tol)
}

fn ground_plane_svd<R: RealField + Copy>(
    projection: &Matrix3x4<R>,
) -> Result<SVD<R, nalgebra::U3, nalgebra::U3>> {
    if projection.iter().any(|x| !x.is_finite()) {
        return Err(Error::NumericError("projection matrix is not finite"));
    }
    SVD::try_new(
        ground_plane_matrix(projection),
        true,
        true,
        R::default_epsilon(),
        SVD_MAX_ITERATIONS,
    )
    .ok_or(Error::NumericError("singular value decomposition did not converge"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_test_utils::{forward_looking_extrinsics, generate_ground_grid};
    use nalgebra::Rotation3;

    #[test]
    fn intrinsics_exact() {
        let k = intrinsics_matrix(1000.0, 1000.0, 960.0, 540.0);
        #[rustfmt::skip]
        let expected = Matrix3::new(
            1000.0, 0.0, 960.0,
            0.0, 1000.0, 540.0,
            0.0, 0.0, 1.0,
        );
        assert_eq!(k, expected);
    }

    #[test]
    fn intrinsics_structure() {
        for &(fx, fy, cx, cy) in &[
            (1.0, 2.0, 3.0, 4.0),
            (-5.5, 1e9, -1e-9, 0.0),
            (0.0, 0.0, 0.0, 0.0),
            (f64::MAX, f64::MIN, 1e-300, -7.25),
        ] {
            let k = intrinsics_matrix(fx, fy, cx, cy);
            assert_eq!(k[(0, 1)], 0.0);
            assert_eq!(k[(1, 0)], 0.0);
            assert_eq!(k[(2, 0)], 0.0);
            assert_eq!(k[(2, 1)], 0.0);
            assert_eq!(k[(2, 2)], 1.0);
            assert_eq!(k[(0, 0)], fx);
            assert_eq!(k[(1, 1)], fy);
            assert_eq!(k[(0, 2)], cx);
            assert_eq!(k[(1, 2)], cy);
        }
    }

    #[test]
    fn projection_composition_order() {
        let k = intrinsics_matrix(800.0, 810.0, 320.0, 240.0);
        let r = *Rotation3::from_euler_angles(0.1, -0.2, 0.3).matrix();
        let t = Vector3::new(0.5, -1.0, 2.0);
        let p = projection_matrix(&k, &r, &t);

        // column by column, directly from the definition
        for j in 0..3 {
            let expected = k * r.column(j);
            approx::assert_relative_eq!(p.column(j).into_owned(), expected, epsilon = 1e-12);
        }
        approx::assert_relative_eq!(p.column(3).into_owned(), k * t, epsilon = 1e-12);

        // intrinsics and rotation swapped
        let wrong = r * k;
        assert!((p.fixed_view::<3, 3>(0, 0) - wrong).abs().max() > 1.0);
    }

    #[test]
    fn projection_linear_in_translation() {
        let k = intrinsics_matrix(1000.0, 990.0, 960.0, 540.0);
        let r = *Rotation3::from_euler_angles(-0.05, 0.02, 1.5).matrix();
        let t = Vector3::new(0.3, 1.4, -0.7);

        let p0 = projection_matrix(&k, &r, &Vector3::zeros());
        let p1 = projection_matrix(&k, &r, &t);
        let p2 = projection_matrix(&k, &r, &(t * 2.0));

        // rotation part is untouched by translation
        approx::assert_relative_eq!(
            p1.fixed_view::<3, 3>(0, 0).into_owned(),
            p0.fixed_view::<3, 3>(0, 0).into_owned(),
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            p2.fixed_view::<3, 3>(0, 0).into_owned(),
            p0.fixed_view::<3, 3>(0, 0).into_owned(),
            epsilon = 1e-12
        );

        // translation contribution doubles
        let d1 = p1 - p0;
        let d2 = p2 - p0;
        approx::assert_relative_eq!(d2, d1 * 2.0, epsilon = 1e-9);
        approx::assert_relative_eq!(d1.column(3).into_owned(), k * t, epsilon = 1e-9);
    }

    #[test]
    fn ground_plane_drops_z_column() {
        #[rustfmt::skip]
        let p = Matrix3x4::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
        );
        #[rustfmt::skip]
        let expected = Matrix3::new(
            1.0, 2.0, 4.0,
            5.0, 6.0, 8.0,
            9.0, 10.0, 12.0,
        );
        assert_eq!(ground_plane_matrix(&p), expected);
    }

    #[test]
    fn roundtrip_ground_points() {
        let k = intrinsics_matrix(1000.0, 1000.0, 960.0, 540.0);
        let extrinsics = forward_looking_extrinsics(1.5, 0.1);
        let p = projection_matrix(&k, extrinsics.rotation(), extrinsics.translation());
        let back = image_to_vehicle_matrix(&p).unwrap();
        assert_eq!(ground_plane_rank(&p).unwrap(), 3);

        let grid = generate_ground_grid::<f64>(4, 40, -10, 10, 2);
        for i in 0..grid.data.nrows() {
            let (x, y) = (grid.data[(i, 0)], grid.data[(i, 1)]);
            let pix = p * nalgebra::Vector4::new(x, y, 0.0, 1.0);
            let (u, v) = (pix[0] / pix[2], pix[1] / pix[2]);

            let ground = back * Vector3::new(u, v, 1.0);
            approx::assert_abs_diff_eq!(ground[0] / ground[2], x, epsilon = 1e-6);
            approx::assert_abs_diff_eq!(ground[1] / ground[2], y, epsilon = 1e-6);
        }
    }

    #[test]
    fn pinv_matches_inverse_when_regular() {
        let k = intrinsics_matrix(700.0, 710.0, 640.0, 360.0);
        let extrinsics = forward_looking_extrinsics(2.0, 0.2);
        let p = projection_matrix(&k, extrinsics.rotation(), extrinsics.translation());
        let inv = ground_plane_matrix(&p).try_inverse().unwrap();
        let pinv = image_to_vehicle_matrix(&p).unwrap();
        approx::assert_relative_eq!(pinv, inv, max_relative = 1e-9);
    }

    #[test]
    fn singular_is_finite_and_rank_deficient() {
        // identity rotation and zero translation put the camera on the
        // ground plane, so the reduced matrix has a zero column
        let k = intrinsics_matrix(1000.0, 1000.0, 960.0, 540.0);
        let p = projection_matrix(&k, &Matrix3::identity(), &Vector3::zeros());
        assert_eq!(ground_plane_rank(&p).unwrap(), 2);

        let pinv = image_to_vehicle_matrix(&p).unwrap();
        assert!(pinv.iter().all(|x: &f64| x.is_finite()));
        // Moore-Penrose condition A * A+ * A = A
        let a = ground_plane_matrix(&p);
        approx::assert_relative_eq!(a * pinv * a, a, epsilon = 1e-9);
    }

    #[test]
    fn combined_matches_separate() {
        let k = intrinsics_matrix(1000.0, 1000.0, 960.0, 540.0);
        for p in [
            projection_matrix(&k, &Matrix3::identity(), &Vector3::zeros()),
            projection_matrix(
                &k,
                forward_looking_extrinsics(1.5, 0.1).rotation(),
                forward_looking_extrinsics(1.5, 0.1).translation(),
            ),
        ] {
            let (pinv, rank) = image_to_vehicle_matrix_and_rank(&p).unwrap();
            assert_eq!(pinv, image_to_vehicle_matrix(&p).unwrap());
            assert_eq!(rank, ground_plane_rank(&p).unwrap());
        }
    }

    #[test]
    fn zero_projection() {
        let p = Matrix3x4::<f64>::zeros();
        assert_eq!(ground_plane_rank(&p).unwrap(), 0);
        assert_eq!(image_to_vehicle_matrix(&p).unwrap(), Matrix3::zeros());
    }

    #[test]
    fn non_finite_rejected() {
        let mut p = Matrix3x4::<f64>::identity();
        p[(1, 3)] = f64::NAN;
        assert!(matches!(
            image_to_vehicle_matrix(&p),
            Err(Error::NumericError(_))
        ));
        assert!(matches!(ground_plane_rank(&p), Err(Error::NumericError(_))));
    }
}

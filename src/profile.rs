use nalgebra::{Matrix3, Matrix3x4};
use serde::Deserialize;

use crate::{
    transform::{image_to_vehicle_matrix, projection_matrix},
    Error, ExtrinsicParameters, PinholeParams, Result,
};

/// Image resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Resolution {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
}

/// Position of the camera in the vehicle frame, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CameraPosition {
    /// Forward.
    pub x: f64,
    /// Left.
    pub y: f64,
    /// Up. This is the camera height above the ground plane.
    pub z: f64,
}

/// Calibration of one named camera, as read from a calibration file.
///
/// A profile holds both the components of the projection (intrinsics,
/// rotation, translation) and the two precomputed matrices stored alongside
/// them. The stored matrices are returned exactly as read; nothing checks
/// that they agree with the components unless
/// [`check_consistency`](struct.CameraProfile.html#method.check_consistency)
/// is called. The `derived_*` methods recompute them from the components.
///
/// Profiles are immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    pub(crate) name: String,
    pub(crate) intrinsics: PinholeParams<f64>,
    pub(crate) resolution: Resolution,
    pub(crate) position: CameraPosition,
    pub(crate) distortion_coeffs: Vec<f64>,
    pub(crate) extrinsics: ExtrinsicParameters<f64>,
    pub(crate) vehicle_to_image: Matrix3x4<f64>,
    pub(crate) image_to_vehicle: Matrix3<f64>,
}

impl CameraProfile {
    /// Name of the profile in the calibration file, e.g. `roof_cam_2`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Focal lengths and principal point.
    #[inline]
    pub fn intrinsics(&self) -> &PinholeParams<f64> {
        &self.intrinsics
    }

    /// The 3x3 intrinsics matrix.
    #[inline]
    pub fn intrinsics_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.as_matrix()
    }

    /// Image resolution.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Camera position in the vehicle frame.
    #[inline]
    pub fn position(&self) -> CameraPosition {
        self.position
    }

    /// Lens distortion coefficients in file order.
    #[inline]
    pub fn distortion_coeffs(&self) -> &[f64] {
        &self.distortion_coeffs
    }

    /// Vehicle to camera rotation and translation.
    #[inline]
    pub fn extrinsics(&self) -> &ExtrinsicParameters<f64> {
        &self.extrinsics
    }

    /// Vehicle to camera rotation.
    #[inline]
    pub fn rotation(&self) -> &Matrix3<f64> {
        self.extrinsics.rotation()
    }

    /// Vehicle to camera translation.
    #[inline]
    pub fn translation(&self) -> &nalgebra::Vector3<f64> {
        self.extrinsics.translation()
    }

    /// The vehicle to image matrix stored in the file.
    #[inline]
    pub fn stored_vehicle_to_image(&self) -> &Matrix3x4<f64> {
        &self.vehicle_to_image
    }

    /// The image to vehicle matrix stored in the file.
    #[inline]
    pub fn stored_image_to_vehicle(&self) -> &Matrix3<f64> {
        &self.image_to_vehicle
    }

    /// Vehicle to image matrix recomputed from intrinsics, rotation and translation.
    pub fn derived_vehicle_to_image(&self) -> Matrix3x4<f64> {
        projection_matrix(
            &self.intrinsics_matrix(),
            self.extrinsics.rotation(),
            self.extrinsics.translation(),
        )
    }

    /// Image to vehicle matrix recomputed from intrinsics, rotation and translation.
    ///
    /// See [`image_to_vehicle_matrix`](transform/fn.image_to_vehicle_matrix.html)
    /// for the ground-plane assumption.
    pub fn derived_image_to_vehicle(&self) -> Result<Matrix3<f64>> {
        image_to_vehicle_matrix(&self.derived_vehicle_to_image())
    }

    /// Verify the stored matrices against the components.
    ///
    /// The stored vehicle to image matrix is compared with
    /// [`derived_vehicle_to_image`](#method.derived_vehicle_to_image), and the
    /// stored image to vehicle matrix with the pseudo-inverse of the stored
    /// vehicle to image matrix. Both comparisons are up to scale and sign:
    /// each matrix is divided by its Frobenius norm before taking the largest
    /// absolute difference, which must not exceed `tolerance`.
    pub fn check_consistency(&self, tolerance: f64) -> Result<()> {
        let deviation = max_deviation_up_to_scale(
            self.vehicle_to_image.as_slice(),
            self.derived_vehicle_to_image().as_slice(),
        );
        if !(deviation <= tolerance) {
            return Err(self.inconsistent("transform_veh2image_matrix", deviation));
        }

        let pinv = image_to_vehicle_matrix(&self.vehicle_to_image)?;
        let deviation =
            max_deviation_up_to_scale(self.image_to_vehicle.as_slice(), pinv.as_slice());
        if !(deviation <= tolerance) {
            return Err(self.inconsistent("transform_image2veh_matrix", deviation));
        }
        Ok(())
    }

    fn inconsistent(&self, matrix: &'static str, deviation: f64) -> Error {
        Error::InconsistentProfile {
            profile: self.name.clone(),
            matrix,
            deviation,
        }
    }
}

/// Largest absolute difference between `a` and `b` after normalizing each to
/// unit Frobenius norm and aligning their signs.
pub(crate) fn max_deviation_up_to_scale(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return if norm_a == norm_b { 0.0 } else { f64::INFINITY };
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let sign = if dot < 0.0 { -1.0 } else { 1.0 };
    a.iter()
        .zip(b)
        .map(|(x, y)| (x / norm_a - sign * y / norm_b).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground_test_utils::forward_looking_extrinsics;

    fn synthetic_profile() -> CameraProfile {
        let intrinsics: PinholeParams<f64> = [1000.0, 1000.0, 960.0, 540.0].into();
        let extrinsics = forward_looking_extrinsics(1.5, 0.05);
        let vehicle_to_image = projection_matrix(
            &intrinsics.as_matrix(),
            extrinsics.rotation(),
            extrinsics.translation(),
        );
        let image_to_vehicle = image_to_vehicle_matrix(&vehicle_to_image).unwrap();
        CameraProfile {
            name: "front".into(),
            intrinsics,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            position: CameraPosition {
                x: 0.0,
                y: 0.0,
                z: 1.5,
            },
            distortion_coeffs: vec![0.0; 5],
            extrinsics,
            vehicle_to_image,
            image_to_vehicle,
        }
    }

    #[test]
    fn consistent_profile_passes() {
        let profile = synthetic_profile();
        profile.check_consistency(1e-9).unwrap();
        assert_eq!(
            profile.derived_vehicle_to_image(),
            *profile.stored_vehicle_to_image()
        );
    }

    #[test]
    fn scaled_and_negated_storage_is_consistent() {
        let mut profile = synthetic_profile();
        profile.vehicle_to_image *= -0.001;
        profile.image_to_vehicle *= 42.0;
        profile.check_consistency(1e-9).unwrap();
    }

    #[test]
    fn stored_projection_mismatch_detected() {
        let mut profile = synthetic_profile();
        profile.vehicle_to_image[(0, 3)] += 50.0;
        match profile.check_consistency(1e-6) {
            Err(Error::InconsistentProfile {
                profile, matrix, ..
            }) => {
                assert_eq!(profile, "front");
                assert_eq!(matrix, "transform_veh2image_matrix");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stored_inverse_mismatch_detected() {
        let mut profile = synthetic_profile();
        profile.image_to_vehicle = profile.image_to_vehicle.transpose();
        match profile.check_consistency(1e-6) {
            Err(Error::InconsistentProfile { matrix, .. }) => {
                assert_eq!(matrix, "transform_image2veh_matrix");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn deviation_edge_cases() {
        assert_eq!(max_deviation_up_to_scale(&[0.0; 3], &[0.0; 3]), 0.0);
        assert_eq!(
            max_deviation_up_to_scale(&[0.0; 3], &[1.0, 0.0, 0.0]),
            f64::INFINITY
        );
        approx::assert_abs_diff_eq!(
            max_deviation_up_to_scale(&[1.0, 0.0], &[0.0, 1.0]),
            1.0,
            epsilon = 1e-15
        );
    }
}

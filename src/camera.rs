use nalgebra::{
    allocator::Allocator,
    storage::{Owned, Storage},
    DefaultAllocator, Dim, Matrix3, Matrix3x4, OMatrix, RealField, Vector3, Vector4, U2, U3,
};

use crate::{
    coordinate_system::VehicleFrame,
    transform::{ground_plane_rank, image_to_vehicle_matrix_and_rank, projection_matrix},
    CameraProfile, ExtrinsicParameters, Pixels, PinholeParams, Points, Result,
};

/// Stored and derived matrices further apart than this are logged.
const CONSISTENCY_WARN_TOL: f64 = 1e-6;

/// Which matrices of a [`CameraProfile`](struct.CameraProfile.html) to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSource {
    /// Use both matrices stored in the calibration file verbatim.
    Stored,
    /// Recompute both matrices from intrinsics, rotation and translation.
    Derived,
}

/// A camera mapping vehicle coordinates to pixels and pixels back to the
/// ground plane.
///
/// The mapping from pixels assumes every pixel shows a point at vehicle z=0.
/// See the [`transform`](transform/index.html) module documentation.
///
/// # Examples
///
/// ```
/// use vehicle_cam_geom::*;
/// use vehicle_cam_geom::ground_test_utils::forward_looking_extrinsics;
/// use nalgebra::Matrix1x3;
///
/// let intrinsics: PinholeParams<f64> = [1000.0, 1000.0, 960.0, 540.0].into();
/// let extrinsics = forward_looking_extrinsics(1.5, 0.0);
/// let cam = GroundPlaneCamera::from_parts(&intrinsics, &extrinsics).unwrap();
///
/// let ground = Points::new(Matrix1x3::new(10.0, 0.0, 0.0));
/// let pixels = cam.vehicle_to_pixel(&ground);
/// assert_eq!(pixels.data[(0, 0)], 960.0);
/// assert_eq!(pixels.data[(0, 1)], 690.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlaneCamera<R: RealField> {
    vehicle_to_image: Matrix3x4<R>,
    image_to_vehicle: Matrix3<R>,
}

impl<R: RealField + Copy> GroundPlaneCamera<R> {
    /// Create a camera from a 3x4 vehicle to image matrix.
    ///
    /// The image to vehicle matrix is computed as the ground-plane
    /// pseudo-inverse. A rank deficient ground-plane matrix is logged but
    /// still accepted.
    pub fn new(vehicle_to_image: Matrix3x4<R>) -> Result<Self> {
        let (image_to_vehicle, rank) = image_to_vehicle_matrix_and_rank(&vehicle_to_image)?;
        if rank < 3 {
            log::warn!(
                "ground-plane matrix has rank {}, pixels cannot be mapped to the ground",
                rank
            );
        }
        Ok(Self {
            vehicle_to_image,
            image_to_vehicle,
        })
    }

    /// Create a camera from intrinsic and extrinsic parameters.
    pub fn from_parts(
        intrinsics: &PinholeParams<R>,
        extrinsics: &ExtrinsicParameters<R>,
    ) -> Result<Self> {
        Self::new(projection_matrix(
            &intrinsics.as_matrix(),
            extrinsics.rotation(),
            extrinsics.translation(),
        ))
    }

    /// Create a camera from both matrices without checking that they belong
    /// together.
    #[inline]
    pub fn from_matrices(vehicle_to_image: Matrix3x4<R>, image_to_vehicle: Matrix3<R>) -> Self {
        Self {
            vehicle_to_image,
            image_to_vehicle,
        }
    }

    /// Return the 3x4 vehicle to image matrix.
    #[inline]
    pub fn vehicle_to_image(&self) -> &Matrix3x4<R> {
        &self.vehicle_to_image
    }

    /// Return the 3x3 image to vehicle matrix.
    #[inline]
    pub fn image_to_vehicle(&self) -> &Matrix3<R> {
        &self.image_to_vehicle
    }

    /// Numerical rank of the ground-plane part of the vehicle to image matrix.
    pub fn ground_plane_rank(&self) -> Result<usize> {
        ground_plane_rank(&self.vehicle_to_image)
    }

    /// Project 3D vehicle coordinates to pixel coordinates.
    pub fn vehicle_to_pixel<NPTS, InStorage>(
        &self,
        vehicle: &Points<VehicleFrame, R, NPTS, InStorage>,
    ) -> Pixels<R, NPTS, Owned<R, NPTS, U2>>
    where
        NPTS: Dim,
        InStorage: Storage<R, NPTS, U3>,
        DefaultAllocator: Allocator<NPTS, U2>,
    {
        let mut result = Pixels::new(OMatrix::zeros_generic(
            NPTS::from_usize(vehicle.data.nrows()),
            U2::from_usize(2),
        ));

        for i in 0..vehicle.data.nrows() {
            let x = Vector4::new(
                vehicle.data[(i, 0)],
                vehicle.data[(i, 1)],
                vehicle.data[(i, 2)],
                R::one(),
            );
            let rst = self.vehicle_to_image * x;
            result.data[(i, 0)] = rst[0] / rst[2];
            result.data[(i, 1)] = rst[1] / rst[2];
        }
        result
    }

    /// Map pixel coordinates to points on the ground plane.
    ///
    /// The returned points all have z=0. Pixels at or above the horizon
    /// produce points behind the camera or non-finite coordinates.
    pub fn pixel_to_ground<NPTS, InStorage>(
        &self,
        pixels: &Pixels<R, NPTS, InStorage>,
    ) -> Points<VehicleFrame, R, NPTS, Owned<R, NPTS, U3>>
    where
        NPTS: Dim,
        InStorage: Storage<R, NPTS, U2>,
        DefaultAllocator: Allocator<NPTS, U3>,
    {
        let mut result = Points::new(OMatrix::zeros_generic(
            NPTS::from_usize(pixels.data.nrows()),
            U3::from_usize(3),
        ));

        for i in 0..pixels.data.nrows() {
            let uv1 = Vector3::new(pixels.data[(i, 0)], pixels.data[(i, 1)], R::one());
            let xyw = self.image_to_vehicle * uv1;
            result.data[(i, 0)] = xyw[0] / xyw[2];
            result.data[(i, 1)] = xyw[1] / xyw[2];
            // z stays zero
        }
        result
    }
}

impl GroundPlaneCamera<f64> {
    /// Create a camera from a loaded calibration profile.
    ///
    /// With [`ProjectionSource::Stored`] both stored matrices are used as
    /// they are, and a disagreement with the derived matrices is logged.
    /// With [`ProjectionSource::Derived`] both are recomputed and the stored
    /// ones are ignored.
    pub fn from_profile(profile: &CameraProfile, source: ProjectionSource) -> Result<Self> {
        match source {
            ProjectionSource::Stored => {
                if let Err(e) = profile.check_consistency(CONSISTENCY_WARN_TOL) {
                    log::warn!("using stored matrices anyway: {}", e);
                }
                Ok(Self::from_matrices(
                    *profile.stored_vehicle_to_image(),
                    *profile.stored_image_to_vehicle(),
                ))
            }
            ProjectionSource::Derived => Self::from_parts(profile.intrinsics(), profile.extrinsics()),
        }
    }
}

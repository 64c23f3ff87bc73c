use nalgebra::{
    allocator::Allocator,
    storage::{Owned, Storage},
    DefaultAllocator, Dim, Matrix3, Matrix3x4, OMatrix, Point3, RealField, Vector3, U3,
};

use crate::{
    coordinate_system::{CameraFrame, VehicleFrame},
    Points,
};

/// Defines the pose of a camera relative to the vehicle.
///
/// A point `p` in the vehicle frame has camera frame coordinates
/// `rotation * p + translation`.
///
/// The rotation is kept as a plain 3x3 matrix because calibration files
/// store it with limited precision. Use
/// [`is_rotation`](struct.ExtrinsicParameters.html#method.is_rotation) to
/// check it.
#[derive(Clone, PartialEq)]
pub struct ExtrinsicParameters<R: RealField> {
    rotation: Matrix3<R>,
    translation: Vector3<R>,
    cache: ExtrinsicsCache<R>,
}

impl<R: RealField> std::fmt::Debug for ExtrinsicParameters<R> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // This should match the auto derived Debug implementation but not print
        // the cache field.
        fmt.debug_struct("ExtrinsicParameters")
            .field("rotation", &self.rotation)
            .field("translation", &self.translation)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
struct ExtrinsicsCache<R: RealField> {
    rt: Matrix3x4<R>,
    camcenter: Point3<R>,
}

impl<R: RealField + Copy> ExtrinsicParameters<R> {
    /// Create a new instance from the vehicle to camera rotation and translation.
    pub fn new(rotation: Matrix3<R>, translation: Vector3<R>) -> Self {
        let mut rt = Matrix3x4::<R>::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        rt.set_column(3, &translation);
        let camcenter = Point3::from(-(rotation.transpose() * translation));
        Self {
            rotation,
            translation,
            cache: ExtrinsicsCache { rt, camcenter },
        }
    }

    /// Create a new instance from a rotation and the camera center in the
    /// vehicle frame.
    pub fn from_rotation_and_camcenter(rotation: Matrix3<R>, camcenter: Point3<R>) -> Self {
        let translation = -(rotation * camcenter.coords);
        Self::new(rotation, translation)
    }

    /// Return the vehicle to camera rotation.
    #[inline]
    pub fn rotation(&self) -> &Matrix3<R> {
        &self.rotation
    }

    /// Return the vehicle to camera translation.
    #[inline]
    pub fn translation(&self) -> &Vector3<R> {
        &self.translation
    }

    /// Return the pose as the 3x4 matrix `[rotation | translation]`.
    #[inline]
    pub fn matrix(&self) -> &Matrix3x4<R> {
        &self.cache.rt
    }

    /// Return the camera center in the vehicle frame.
    ///
    /// Computed as `-rotation^T * translation`, so it is only meaningful when
    /// the rotation is orthonormal.
    #[inline]
    pub fn camcenter(&self) -> &Point3<R> {
        &self.cache.camcenter
    }

    /// Check that the rotation is orthonormal and right handed within `eps`.
    pub fn is_rotation(&self, eps: R) -> bool {
        let should_be_identity = self.rotation * self.rotation.transpose();
        approx::abs_diff_eq!(should_be_identity, Matrix3::identity(), epsilon = eps)
            && approx::abs_diff_eq!(self.rotation.determinant(), R::one(), epsilon = eps)
    }

    /// Convert points in vehicle coordinates to camera coordinates.
    pub fn vehicle_to_camera<NPTS, InStorage>(
        &self,
        vehicle: &Points<VehicleFrame, R, NPTS, InStorage>,
    ) -> Points<CameraFrame, R, NPTS, Owned<R, NPTS, U3>>
    where
        NPTS: Dim,
        InStorage: Storage<R, NPTS, U3>,
        DefaultAllocator: Allocator<NPTS, U3>,
    {
        let mut cam_coords = Points::new(OMatrix::zeros_generic(
            NPTS::from_usize(vehicle.data.nrows()),
            U3::from_usize(3),
        ));

        // Points are rows, so transform each one individually.
        for i in 0..vehicle.data.nrows() {
            let v = Vector3::new(
                vehicle.data[(i, 0)],
                vehicle.data[(i, 1)],
                vehicle.data[(i, 2)],
            );
            let c = self.rotation * v + self.translation;
            for j in 0..3 {
                cam_coords.data[(i, j)] = c[j];
            }
        }
        cam_coords
    }
}

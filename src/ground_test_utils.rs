//! Utilities for testing ground-plane projections.
use nalgebra::{
    convert, storage::Owned, Dyn, Matrix3, OMatrix, Point3, RealField, Rotation3, Vector3, U3,
};

use crate::{ExtrinsicParameters, GroundPlaneCamera, Points, VehicleFrame};

/// Generate a regular grid of points on the ground plane (z=0).
///
/// `x` runs from `x_min` up to but excluding `x_max`, likewise for `y`.
pub fn generate_ground_grid<R: RealField + Copy>(
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
    step: i32,
) -> Points<VehicleFrame, R, Dyn, Owned<R, Dyn, U3>> {
    let mut xys: Vec<[R; 2]> = Vec::new();
    for x in num_iter::range_step(x_min, x_max, step) {
        for y in num_iter::range_step(y_min, y_max, step) {
            xys.push([convert(x as f64), convert(y as f64)]);
        }
    }

    let mut data = OMatrix::<R, Dyn, U3>::zeros(xys.len());
    for (i, xy) in xys.iter().enumerate() {
        data[(i, 0)] = xy[0];
        data[(i, 1)] = xy[1];
    }
    Points::new(data)
}

/// Extrinsics of a camera at `height` above the vehicle origin, looking along
/// vehicle +x and pitched down by `pitch` radians.
///
/// The vehicle frame is x forward, y left, z up.
pub fn forward_looking_extrinsics<R: RealField + Copy>(
    height: R,
    pitch: R,
) -> ExtrinsicParameters<R> {
    let zero = R::zero();
    let one = R::one();
    #[rustfmt::skip]
    let level = Matrix3::new(
        zero, -one, zero,
        zero, zero, -one,
        one,  zero, zero,
    );
    let tilt = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch);
    let camcenter = Point3::new(zero, zero, height);
    ExtrinsicParameters::from_rotation_and_camcenter(tilt.matrix() * level, camcenter)
}

/// Test roundtrip projection from the ground plane to pixels and back.
///
/// Project a grid of ground points ahead of the vehicle to pixels, map the
/// pixels back with the image to vehicle matrix, and compare with the
/// original points.
pub fn roundtrip_ground<R: RealField + Copy>(cam: &GroundPlaneCamera<R>, eps: R) {
    let ground = generate_ground_grid::<R>(3, 50, -12, 12, 3);
    let pixels = cam.vehicle_to_pixel(&ground);
    let actual = cam.pixel_to_ground(&pixels);
    approx::assert_abs_diff_eq!(ground.data, actual.data, epsilon = eps);
}

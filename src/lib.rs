#![deny(rust_2018_idioms, unsafe_code, missing_docs)]
#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]

//! # Examples
//!
//! ## Example - from a calibration file to ground-plane coordinates.
//!
//! ```
//! use vehicle_cam_geom::*;
//! use nalgebra::Matrix2;
//!
//! let yaml = "
//! roof_cam_2:
//!   intrinsics: {data: [1000.0, 1000.0, 960.0, 540.0]}
//!   resolution: {width: 1920, height: 1080}
//!   translation_veh_cam: {x: 0.0, y: 0.0, z: 1.5}
//!   distortion_coeffs: {data: [0.0, 0.0, 0.0, 0.0]}
//!   rotation_veh2cam_matrix: {rows: 3, cols: 3, data: [0, -1, 0, 0, 0, -1, 1, 0, 0]}
//!   tanslation_veh2cam_matrix: {rows: 3, cols: 1, data: [0.0, 1.5, 0.0]}
//!   transform_veh2image_matrix:
//!     rows: 3
//!     cols: 4
//!     data: [960, -1000, 0, 0, 540, 0, -1000, 1500, 1, 0, 0, 0]
//!   transform_image2veh_matrix: {rows: 3, cols: 3, data: [0, 0, 1, -0.001, 0, 0.96, 0, 0.000666667, -0.36]}
//! ";
//!
//! let file = CalibrationFile::from_yaml_str(yaml).unwrap();
//! let profile = file.profile("roof_cam_2").unwrap();
//!
//! // Recompute both matrices from intrinsics, rotation and translation.
//! let camera = GroundPlaneCamera::from_profile(&profile, ProjectionSource::Derived).unwrap();
//!
//! // The principal point row 690 looks at the ground 10 meters ahead.
//! let pixels = Pixels::new(Matrix2::new(
//!     960.0, 690.0, // pixel 1
//!     760.0, 690.0, // pixel 2
//! ));
//! let ground = camera.pixel_to_ground(&pixels);
//! approx::assert_abs_diff_eq!(ground.data[(0, 0)], 10.0, epsilon = 1e-9);
//! approx::assert_abs_diff_eq!(ground.data[(1, 1)], 2.0, epsilon = 1e-9);
//! ```

use std::path::PathBuf;

use nalgebra::{Dim, RealField, U2, U3};

pub mod ground_test_utils;

mod intrinsics;
pub use intrinsics::PinholeParams;

mod extrinsics;
pub use extrinsics::ExtrinsicParameters;

pub mod transform;
pub use transform::{
    ground_plane_matrix, ground_plane_rank, image_to_vehicle_matrix, intrinsics_matrix,
    projection_matrix,
};

mod profile;
pub use profile::{CameraProfile, CameraPosition, Resolution};

mod config;
pub use config::{load_profile, load_verified_profile, CalibrationFile};

mod camera;
pub use camera::{GroundPlaneCamera, ProjectionSource};

mod vehicle;
pub use vehicle::{BaseParam, VehicleGeometry};

/// All possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The calibration file could not be opened.
    #[error("calibration file {} could not be opened: {source}", path.display())]
    ConfigNotFound {
        /// Path given by the caller.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The calibration file is not a YAML mapping.
    #[error("error parsing calibration YAML: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    /// No profile with the requested name exists in the file.
    #[error("camera profile `{0}` not found")]
    ProfileNotFound(String),
    /// A required field is missing, has the wrong type, or the wrong length.
    #[error("malformed camera profile `{profile}`: {reason}")]
    MalformedProfile {
        /// Name of the offending profile.
        profile: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A stored matrix disagrees with the one derived from the other fields.
    #[error("camera profile `{profile}`: stored {matrix} deviates from derived by {deviation:e}")]
    InconsistentProfile {
        /// Name of the offending profile.
        profile: String,
        /// Which stored matrix failed the check.
        matrix: &'static str,
        /// Largest absolute difference after normalization.
        deviation: f64,
    },
    /// Non-finite input or a singular value decomposition that did not converge.
    #[error("numeric error: {0}")]
    NumericError(&'static str),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// 2D pixel locations on the image sensor.
///
/// These are raw pixel coordinates. Lens distortion is not removed.
///
/// This is a newtype wrapping an `nalgebra::Matrix`.
#[derive(Clone)]
pub struct Pixels<R: RealField, NPTS: Dim, STORAGE> {
    /// The matrix storing pixel locations.
    pub data: nalgebra::Matrix<R, NPTS, U2, STORAGE>,
}

impl<R: RealField, NPTS: Dim, STORAGE> Pixels<R, NPTS, STORAGE> {
    /// Create a new Pixels instance
    #[inline]
    pub fn new(data: nalgebra::Matrix<R, NPTS, U2, STORAGE>) -> Self {
        Self { data }
    }
}

/// A coordinate system in which points can be defined.
pub trait CoordinateSystem {}

/// Implementations of [`CoordinateSystem`](trait.CoordinateSystem.html).
pub mod coordinate_system {

    /// Coordinates in the camera coordinate system.
    ///
    /// The camera center is at (0,0,0) looking along +z with +y pointing down
    /// in the image.
    #[derive(Debug, Clone, PartialEq)]
    pub struct CameraFrame {}
    impl crate::CoordinateSystem for CameraFrame {}

    /// Coordinates in the vehicle coordinate system.
    ///
    /// The ground plane is z=0. Pixels mapped back from the image always land
    /// on this plane.
    #[derive(Debug, Clone, PartialEq)]
    pub struct VehicleFrame {}
    impl crate::CoordinateSystem for VehicleFrame {}
}
pub use coordinate_system::{CameraFrame, VehicleFrame};

/// 3D points. Can be in any [`CoordinateSystem`](trait.CoordinateSystem.html).
///
/// This is a newtype wrapping an `nalgebra::Matrix`.
pub struct Points<Coords: CoordinateSystem, R: RealField, NPTS: Dim, STORAGE> {
    coords: std::marker::PhantomData<Coords>,
    /// The matrix storing point locations.
    pub data: nalgebra::Matrix<R, NPTS, U3, STORAGE>,
}

impl<Coords: CoordinateSystem, R: RealField, NPTS: Dim, STORAGE: std::fmt::Debug> std::fmt::Debug
    for Points<Coords, R, NPTS, STORAGE>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Points").field("data", &self.data).finish()
    }
}

impl<Coords, R, NPTS, STORAGE> Points<Coords, R, NPTS, STORAGE>
where
    Coords: CoordinateSystem,
    R: RealField,
    NPTS: Dim,
{
    /// Create a new Points instance from the underlying storage.
    #[inline]
    pub fn new(data: nalgebra::Matrix<R, NPTS, U3, STORAGE>) -> Self {
        Self {
            coords: std::marker::PhantomData,
            data,
        }
    }
}

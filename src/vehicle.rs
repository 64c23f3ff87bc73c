use std::path::Path;

use nalgebra::Matrix3x4;

use crate::{load_profile, CameraProfile, Result};

/// Vehicle dimensions, in meters.
///
/// These are not part of the calibration file and are supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleGeometry {
    /// Vehicle width.
    pub tread: f64,
    /// Distance between front and rear axles.
    pub wheelbase: f64,
    /// Height of the front of the vehicle above the ground.
    pub head_height: f64,
    /// Distance from the front wheel center to the front of the vehicle.
    pub front_wheel_to_head_d: f64,
}

/// Vehicle geometry combined with the calibration of the camera mounted on it.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseParam {
    vehicle: VehicleGeometry,
    camera: CameraProfile,
}

impl BaseParam {
    /// Combine vehicle geometry with an already loaded camera profile.
    pub fn new(vehicle: VehicleGeometry, camera: CameraProfile) -> Self {
        Self { vehicle, camera }
    }

    /// Combine vehicle geometry with the profile `profile_name` read from `path`.
    pub fn load<P: AsRef<Path>>(
        vehicle: VehicleGeometry,
        path: P,
        profile_name: &str,
    ) -> Result<Self> {
        Ok(Self::new(vehicle, load_profile(path, profile_name)?))
    }

    /// The vehicle geometry.
    #[inline]
    pub fn vehicle(&self) -> &VehicleGeometry {
        &self.vehicle
    }

    /// The camera profile.
    #[inline]
    pub fn camera(&self) -> &CameraProfile {
        &self.camera
    }

    /// Image width in pixels.
    #[inline]
    pub fn screen_width(&self) -> u32 {
        self.camera.resolution().width
    }

    /// Image height in pixels.
    #[inline]
    pub fn screen_height(&self) -> u32 {
        self.camera.resolution().height
    }

    /// Camera height above the ground plane.
    #[inline]
    pub fn camera_height(&self) -> f64 {
        self.camera.position().z
    }

    /// Distance from the front of the vehicle to the rear axle.
    #[inline]
    pub fn head_to_back_wheel_d(&self) -> f64 {
        self.vehicle.wheelbase + self.vehicle.front_wheel_to_head_d
    }

    /// Distance from the camera to the front of the vehicle.
    ///
    /// The camera is taken to sit above the front axle.
    #[inline]
    pub fn camera_to_head_d(&self) -> f64 {
        self.vehicle.front_wheel_to_head_d
    }

    /// The stored vehicle to image matrix of the camera.
    #[inline]
    pub fn tf_matrix(&self) -> &Matrix3x4<f64> {
        self.camera.stored_vehicle_to_image()
    }
}

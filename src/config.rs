//! Reading camera profiles from YAML calibration files.
//!
//! A calibration file is a mapping from profile name to profile block:
//!
//! ```text
//! roof_cam_2:
//!   intrinsics: {data: [fx, fy, cx, cy]}
//!   resolution: {width: 1920, height: 1080}
//!   translation_veh_cam: {x: 0.0, y: 0.0, z: 1.5}
//!   distortion_coeffs: {data: [k1, k2, p1, p2]}
//!   rotation_veh2cam_matrix: {rows: 3, cols: 3, data: [...]}
//!   tanslation_veh2cam_matrix: {rows: 3, cols: 1, data: [...]}
//!   transform_veh2image_matrix: {rows: 3, cols: 4, data: [...]}
//!   transform_image2veh_matrix: {rows: 3, cols: 3, data: [...]}
//! ```
//!
//! Matrices are flattened in row-major order. `rows` and `cols` are optional.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use nalgebra::SMatrix;
use serde::Deserialize;

use crate::{
    profile::{CameraPosition, CameraProfile, Resolution},
    Error, ExtrinsicParameters, PinholeParams, Result,
};

/// Rotations further than this from orthonormal are logged.
const ROTATION_WARN_EPS: f64 = 1e-3;

#[derive(Debug, Deserialize)]
struct RawMatrix {
    #[serde(default)]
    rows: Option<usize>,
    #[serde(default)]
    cols: Option<usize>,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    intrinsics: RawMatrix,
    resolution: Resolution,
    translation_veh_cam: CameraPosition,
    distortion_coeffs: RawMatrix,
    rotation_veh2cam_matrix: RawMatrix,
    #[serde(
        rename = "tanslation_veh2cam_matrix",
        alias = "translation_veh2cam_matrix"
    )]
    translation_veh2cam_matrix: RawMatrix,
    transform_veh2image_matrix: RawMatrix,
    transform_image2veh_matrix: RawMatrix,
}

/// A parsed calibration file holding any number of named camera profiles.
///
/// Parse once with [`open`](#method.open), then extract profiles with
/// [`profile`](#method.profile).
#[derive(Debug, Clone)]
pub struct CalibrationFile {
    source: Option<PathBuf>,
    profiles: serde_yaml::Mapping,
}

impl CalibrationFile {
    /// Read and parse the calibration file at `path`.
    ///
    /// Fails with [`Error::ConfigNotFound`] if the file cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path).map_err(|source| Error::ConfigNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read calibration file {}", path.display());
        let mut result = Self::from_yaml_str(&buf)?;
        result.source = Some(path.to_path_buf());
        Ok(result)
    }

    /// Parse a calibration file from a reader.
    pub fn from_reader<Rd: Read>(rdr: Rd) -> Result<Self> {
        let profiles: serde_yaml::Mapping = serde_yaml::from_reader(rdr)?;
        Ok(Self {
            source: None,
            profiles,
        })
    }

    /// Parse a calibration file from a YAML string.
    pub fn from_yaml_str(buf: &str) -> Result<Self> {
        let profiles: serde_yaml::Mapping = serde_yaml::from_str(buf)?;
        Ok(Self {
            source: None,
            profiles,
        })
    }

    /// Path this file was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Names of all profiles, in file order.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.profiles.keys().filter_map(|k| k.as_str())
    }

    /// Extract the profile called `name`.
    ///
    /// The stored transform matrices are taken as they are. Use
    /// [`verified_profile`](#method.verified_profile) to check them.
    pub fn profile(&self, name: &str) -> Result<CameraProfile> {
        let value = self
            .profiles
            .get(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
        let raw: RawProfile = serde_yaml::from_value(value.clone())
            .map_err(|e| malformed(name, e.to_string()))?;
        let profile = raw.into_profile(name)?;

        if !profile.extrinsics.is_rotation(ROTATION_WARN_EPS) {
            log::warn!(
                "camera profile `{}`: rotation_veh2cam_matrix is not a proper rotation",
                name
            );
        }
        match self.source() {
            Some(path) => {
                log::debug!("loaded camera profile `{}` from {}", name, path.display())
            }
            None => log::debug!("loaded camera profile `{}`", name),
        }
        Ok(profile)
    }

    /// Extract the profile called `name` and check its stored matrices.
    ///
    /// See [`CameraProfile::check_consistency`](struct.CameraProfile.html#method.check_consistency).
    pub fn verified_profile(&self, name: &str, tolerance: f64) -> Result<CameraProfile> {
        let profile = self.profile(name)?;
        profile.check_consistency(tolerance)?;
        Ok(profile)
    }
}

/// Load the profile called `name` from the calibration file at `path`.
pub fn load_profile<P: AsRef<Path>>(path: P, name: &str) -> Result<CameraProfile> {
    CalibrationFile::open(path)?.profile(name)
}

/// Load the profile called `name` and check its stored matrices.
pub fn load_verified_profile<P: AsRef<Path>>(
    path: P,
    name: &str,
    tolerance: f64,
) -> Result<CameraProfile> {
    CalibrationFile::open(path)?.verified_profile(name, tolerance)
}

impl RawProfile {
    fn into_profile(self, name: &str) -> Result<CameraProfile> {
        let k: SMatrix<f64, 4, 1> = self.intrinsics.reshape(name, "intrinsics")?;
        let rotation = self
            .rotation_veh2cam_matrix
            .reshape(name, "rotation_veh2cam_matrix")?;
        let translation = self
            .translation_veh2cam_matrix
            .reshape(name, "tanslation_veh2cam_matrix")?;
        let vehicle_to_image = self
            .transform_veh2image_matrix
            .reshape(name, "transform_veh2image_matrix")?;
        let image_to_vehicle = self
            .transform_image2veh_matrix
            .reshape(name, "transform_image2veh_matrix")?;
        let distortion_coeffs = self.distortion_coeffs.into_vec(name, "distortion_coeffs")?;

        Ok(CameraProfile {
            name: name.to_string(),
            intrinsics: PinholeParams::from([k[0], k[1], k[2], k[3]]),
            resolution: self.resolution,
            position: self.translation_veh_cam,
            distortion_coeffs,
            extrinsics: ExtrinsicParameters::new(rotation, translation),
            vehicle_to_image,
            image_to_vehicle,
        })
    }
}

impl RawMatrix {
    /// Reshape `data` row-major into an `R`x`C` matrix.
    ///
    /// Vectors (`R` or `C` equal to 1) accept either orientation in the
    /// declared `rows` and `cols`.
    fn reshape<const R: usize, const C: usize>(
        self,
        profile: &str,
        field: &str,
    ) -> Result<SMatrix<f64, R, C>> {
        let is_vector = R == 1 || C == 1;
        let declared_ok = match (self.rows, self.cols) {
            (Some(r), Some(c)) => (r, c) == (R, C) || (is_vector && (c, r) == (R, C)),
            (Some(r), None) => r == R || (is_vector && (r == 1 || r == R * C)),
            (None, Some(c)) => c == C || (is_vector && (c == 1 || c == R * C)),
            (None, None) => true,
        };
        if !declared_ok {
            return Err(malformed(
                profile,
                format!(
                    "`{}` declares {}x{}, expected {}x{}",
                    field,
                    dim_str(self.rows),
                    dim_str(self.cols),
                    R,
                    C
                ),
            ));
        }
        if self.data.len() != R * C {
            return Err(malformed(
                profile,
                format!(
                    "`{}.data` has {} values, expected {} ({}x{})",
                    field,
                    self.data.len(),
                    R * C,
                    R,
                    C
                ),
            ));
        }
        Ok(SMatrix::from_row_slice(&self.data))
    }

    /// Take `data` as a vector of any length.
    fn into_vec(self, profile: &str, field: &str) -> Result<Vec<f64>> {
        if let (Some(r), Some(c)) = (self.rows, self.cols) {
            if r * c != self.data.len() {
                return Err(malformed(
                    profile,
                    format!(
                        "`{}` declares {}x{} but has {} values",
                        field,
                        r,
                        c,
                        self.data.len()
                    ),
                ));
            }
        }
        Ok(self.data)
    }
}

fn dim_str(d: Option<usize>) -> String {
    d.map_or_else(|| "?".to_string(), |d| d.to_string())
}

fn malformed(profile: &str, reason: String) -> Error {
    Error::MalformedProfile {
        profile: profile.to_string(),
        reason,
    }
}

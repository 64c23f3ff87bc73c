use nalgebra::{Matrix3, RealField};

/// Parameters defining a pinhole perspective camera model without skew.
///
/// These will be used to make the 3x3 intrinsic parameter matrix
/// ```text
/// [[fx,  0, cx],
///  [ 0, fy, cy],
///  [ 0,  0,  1]]
/// ```
///
/// Calibration files store these as the 4-vector `[fx, fy, cx, cy]`, which
/// converts via `.into()`:
///
/// ```
/// use vehicle_cam_geom::*;
/// let params: PinholeParams<f64> = [1000.0, 1000.0, 960.0, 540.0].into();
/// assert_eq!(params.cx, 960.0);
/// ```
///
/// Read more about the [pinhole perspective
/// projection](https://en.wikipedia.org/wiki/Pinhole_camera_model).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeParams<R: RealField> {
    /// Horizontal focal length.
    pub fx: R,
    /// Vertical focal length.
    pub fy: R,
    /// Horizontal component of the principal point.
    pub cx: R,
    /// Vertical component of the principal point.
    pub cy: R,
}

impl<R: RealField> From<[R; 4]> for PinholeParams<R> {
    fn from(v: [R; 4]) -> Self {
        let [fx, fy, cx, cy] = v;
        Self { fx, fy, cx, cy }
    }
}

impl<R: RealField + Copy> PinholeParams<R> {
    /// Create the 3x3 intrinsics matrix.
    #[inline]
    pub fn as_matrix(&self) -> Matrix3<R> {
        crate::transform::intrinsics_matrix(self.fx, self.fy, self.cx, self.cy)
    }

    /// Return the parameters in on-disk order `[fx, fy, cx, cy]`.
    #[inline]
    pub fn to_array(&self) -> [R; 4] {
        [self.fx, self.fy, self.cx, self.cy]
    }
}

//! Math utilities and types
//!
//! Provides the fundamental math types used by the scene graph, the cameras
//! and the shadow lights. All matrices follow OpenGL conventions: column
//! vectors, right-handed view space looking down -Z, clip depth in [-1, 1].

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid pose with optional non-uniform scale
///
/// Scene nodes store their local pose as a `Transform`; the homogeneous
/// form is `T * R * S`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in the parent frame
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only a translation
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create a transform from a position and roll/pitch/yaw angles (radians)
    ///
    /// The rotation is [`cart_to_rotation`], so the result matches
    /// [`cart_to_matrix`] exactly.
    pub fn from_cartesian(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        let rotation = Quat::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(
            cart_to_rotation(roll, pitch, yaw),
        ));
        Self::from_position_rotation(Vec3::new(x, y, z), rotation)
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
            && self.scale.iter().all(|v| v.is_finite())
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.to_matrix().transform_point(&point)
    }
}

/// Rotation matrix from roll (X), pitch (Y) and yaw (Z)
///
/// Composition is `Rz(yaw) * Ry(pitch) * Rx(roll)`. The entries are written
/// out explicitly; swapping the order silently changes world orientation.
pub fn cart_to_rotation(roll: f32, pitch: f32, yaw: f32) -> Mat3 {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sq, cq) = yaw.sin_cos();

    Mat3::new(
        cp * cq, -cr * sq + sr * sp * cq, sr * sq + cr * sp * cq,
        cp * sq, cr * cq + sr * sp * sq, -sr * cq + cr * sp * sq,
        -sp, sr * cp, cr * cp,
    )
}

/// Homogeneous transform from position and roll/pitch/yaw
pub fn cart_to_matrix(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Mat4 {
    let mut m = cart_to_rotation(roll, pitch, yaw).to_homogeneous();
    m[(0, 3)] = x;
    m[(1, 3)] = y;
    m[(2, 3)] = z;
    m
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with the projection/view builders the viewer needs
pub trait Mat4Ext {
    /// Off-axis perspective frustum (`glFrustum`)
    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Perspective projection from pinhole intrinsics
    ///
    /// `fu`, `fv` are focal lengths in pixels and `(u0, v0)` the principal
    /// point of a `width` x `height` image with a bottom-left origin.
    fn from_intrinsics(width: f32, height: f32, fu: f32, fv: f32, u0: f32, v0: f32, near: f32, far: f32) -> Mat4;

    /// Symmetric perspective projection (`gluPerspective`)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix (`gluLookAt`)
    ///
    /// When `up` is parallel to the view direction a perpendicular
    /// fallback axis is used so the matrix stays invertible.
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Bias matrix mapping clip space [-1, 1] into texture space [0, 1]
    fn clip_to_texture_bias() -> Mat4;

    /// True when every entry is finite
    fn all_finite(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::zeros();
        result[(0, 0)] = 2.0 * near / (right - left);
        result[(0, 2)] = (right + left) / (right - left);
        result[(1, 1)] = 2.0 * near / (top - bottom);
        result[(1, 2)] = (top + bottom) / (top - bottom);
        result[(2, 2)] = -(far + near) / (far - near);
        result[(2, 3)] = -(2.0 * far * near) / (far - near);
        result[(3, 2)] = -1.0;
        result
    }

    fn from_intrinsics(width: f32, height: f32, fu: f32, fv: f32, u0: f32, v0: f32, near: f32, far: f32) -> Mat4 {
        let left = -u0 * near / fu;
        let right = (width - u0) * near / fu;
        let bottom = -v0 * near / fv;
        let top = (height - v0) * near / fv;
        Mat4::frustum(left, right, bottom, top, near, far)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let mut right = forward.cross(&up);
        if right.norm_squared() < 1e-12 {
            // up is parallel to the view direction
            let fallback = if forward.y.abs() < 0.9 { Vec3::y() } else { Vec3::x() };
            right = forward.cross(&fallback);
        }
        let right = right.normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new_translation(&-eye);

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn clip_to_texture_bias() -> Mat4 {
        Mat4::new(
            0.5, 0.0, 0.0, 0.5,
            0.0, 0.5, 0.0, 0.5,
            0.0, 0.0, 0.5, 0.5,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_cart_to_rotation_pure_yaw() {
        let r = cart_to_rotation(0.0, 0.0, constants::HALF_PI);
        let x_axis = r * Vec3::x();
        assert_relative_eq!(x_axis, Vec3::y(), epsilon = EPSILON);
    }

    #[test]
    fn test_cart_to_rotation_composition_order() {
        let (roll, pitch, yaw) = (0.3, -0.7, 1.1);
        let rx = nalgebra::Rotation3::from_axis_angle(&Vec3::x_axis(), roll).into_inner();
        let ry = nalgebra::Rotation3::from_axis_angle(&Vec3::y_axis(), pitch).into_inner();
        let rz = nalgebra::Rotation3::from_axis_angle(&Vec3::z_axis(), yaw).into_inner();

        assert_relative_eq!(cart_to_rotation(roll, pitch, yaw), rz * ry * rx, epsilon = EPSILON);
    }

    #[test]
    fn test_cart_to_matrix_translation() {
        let m = cart_to_matrix(1.0, 2.0, 3.0, 0.0, 0.0, 0.0);
        let p = m.transform_point(&Point3::origin());
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
    }

    #[test]
    fn test_transform_from_cartesian_matches_matrix() {
        let t = Transform::from_cartesian(1.0, -2.0, 0.5, 0.2, 0.4, -0.6);
        assert_relative_eq!(
            t.to_matrix(),
            cart_to_matrix(1.0, -2.0, 0.5, 0.2, 0.4, -0.6),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_look_at_maps_target_onto_negative_z() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::z());
        let p = view.transform_point(&Point3::origin());

        assert_relative_eq!(p.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(p.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(p.z, -eye.norm(), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_parallel_up_stays_finite() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), -Vec3::z());
        assert!(view.all_finite());
        assert!(view.try_inverse().is_some());
    }

    #[test]
    fn test_intrinsics_centered_principal_point_is_symmetric() {
        let p = Mat4::from_intrinsics(640.0, 480.0, 500.0, 500.0, 320.0, 240.0, 0.1, 100.0);
        assert_relative_eq!(p[(0, 2)], 0.0, epsilon = EPSILON);
        assert_relative_eq!(p[(1, 2)], 0.0, epsilon = EPSILON);
        assert_relative_eq!(p[(0, 0)], 2.0 * 500.0 / 640.0, epsilon = EPSILON);
    }
}

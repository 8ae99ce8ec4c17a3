//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics and game development.

pub use nalgebra::{
    Point3,
    Vector2, Vector3, Vector4,
    Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Rotation about the X axis, angle in degrees
pub fn rotation_x_degrees(degrees: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::x_axis(), degrees.to_radians())
}

/// Rotation about the Y axis, angle in degrees
pub fn rotation_y_degrees(degrees: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::y_axis(), degrees.to_radians())
}

/// Rotation about the Z axis, angle in degrees
pub fn rotation_z_degrees(degrees: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::z_axis(), degrees.to_radians())
}

/// Compose translate * rotX * rotY * rotZ * scale
///
/// Rotation is given as Euler angles in degrees and applied in fixed axis order.
pub fn euler_degrees_trs(position: &Vec3, rotation: &Vec3, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position)
        * rotation_x_degrees(rotation.x)
        * rotation_y_degrees(rotation.y)
        * rotation_z_degrees(rotation.z)
        * Mat4::new_nonuniform_scaling(scale)
}

/// Column-major float array, the layout GLSL expects for `mat4`
pub fn mat4_to_cols(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Right-handed perspective camera looking from `eye` at `target`, Y up
pub fn look_at_perspective(eye: &Vec3, target: &Vec3, aspect: f32, fov_degrees: f32, near: f32, far: f32) -> Mat4 {
    let projection = Mat4::new_perspective(aspect, fov_degrees.to_radians(), near, far);
    let view = Mat4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), &Vec3::y());
    projection * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_trs() {
        let m = euler_degrees_trs(&Vec3::zeros(), &Vec3::zeros(), &Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(m, Mat4::identity());
    }

    #[test]
    fn test_trs_order() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let m = euler_degrees_trs(&position, &Vec3::new(0.0, 90.0, 0.0), &Vec3::new(2.0, 2.0, 2.0));

        // Scale first, then rotate +X onto -Z, then translate
        let p = m * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vec4::new(1.0, 2.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_column_major_export() {
        let m = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let cols = mat4_to_cols(&m);
        assert_eq!(&cols[12..15], &[4.0, 5.0, 6.0]);
        assert_eq!(cols[15], 1.0);
    }

    #[test]
    fn test_look_at_centers_target() {
        let vp = look_at_perspective(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), 1.0, 60.0, 0.1, 100.0);
        let clip = vp * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        assert!(clip.w > 0.0);
    }
}

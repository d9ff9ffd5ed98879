use std::f32::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{
    Dim, Isometry3, Matrix, Matrix4, Orthographic3, Perspective3, RawStorage, UnitQuaternion,
    Vector3,
};
use tracing::warn;

use crate::Pos;

/// Closest the polar angle may get to either pole, in radians.
pub const POLAR_EPSILON: f32 = 0.1;
/// Field of view limits, in degrees.
pub const MIN_FIELD_OF_VIEW: f32 = 20.0;
pub const MAX_FIELD_OF_VIEW: f32 = 120.0;
/// Smallest sine of the angle allowed between the view direction and up.
const MIN_UP_ANGLE_SIN: f32 = 1e-3;

/// Camera orbiting `target` on a sphere of `radius`, parametrized by an
/// azimuth and a polar angle. The view and projection matrices are rebuilt
/// eagerly by every method that changes one of their inputs.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    radius: f32,
    azimuth: f32,
    polar: f32,

    target: Pos,
    up: Pos,
    position: Pos,

    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,

    orthogonal: bool,
    borders: OrthoBorders,

    view: Matrix4<f32>,
    inv_view_rotation: UnitQuaternion<f32>,
    projection: Matrix4<f32>,
    inv_projection: Matrix4<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoBorders {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl OrbitCamera {
    pub fn new() -> Self {
        let mut camera = Self {
            radius: 0.0,
            azimuth: 0.0,
            polar: 0.0,
            target: Vector3::zeros(),
            up: Vector3::zeros(),
            position: Vector3::zeros(),
            fov: 0.0,
            aspect: 0.0,
            near: 0.0,
            far: 0.0,
            orthogonal: false,
            borders: OrthoBorders::default(),
            view: Matrix4::identity(),
            inv_view_rotation: UnitQuaternion::identity(),
            projection: Matrix4::identity(),
            inv_projection: Matrix4::identity(),
        };
        camera.reset();
        camera
    }

    /// Restores the default orbit and projection and rebuilds both matrices.
    pub fn reset(&mut self) {
        self.radius = 2.0;
        self.azimuth = 0.0;
        self.polar = FRAC_PI_2;

        self.target = Vector3::zeros();
        self.up = Vector3::y();

        self.fov = 45.0;
        self.aspect = 4.0 / 3.0;
        self.near = 0.01;
        self.far = 1000.0;

        self.orthogonal = false;
        self.borders = OrthoBorders::default();

        self.build_view_matrix();
        self.build_projection_matrix();
    }

    /// Narrows (positive `delta`) or widens the field of view by `delta`
    /// degrees. Zooming never moves the camera, so it behaves the same no
    /// matter the scale of the scene.
    pub fn zoom(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }

        let fov = (self.fov - delta).clamp(MIN_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW);
        self.update_projection(|camera| camera.fov = fov);
    }

    pub fn rotate_azimuth(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }

        let azimuth = (self.azimuth + delta).rem_euclid(TAU);
        self.update_view(|camera| camera.azimuth = azimuth);
    }

    /// Rotates towards (negative `delta`) or away from the up pole. The
    /// angle stops short of both poles so the view never flips over.
    pub fn rotate_polar(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }

        let polar = (self.polar + delta).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        self.update_view(|camera| camera.polar = polar);
    }

    /// Moves the orbit (target and camera together) along the view direction.
    pub fn move_forwards(&mut self, t: f32) {
        let forward = self.inv_view_rotation * -Vector3::z();
        self.translate(forward * t);
    }

    pub fn move_right(&mut self, t: f32) {
        self.translate(self.right() * t);
    }

    pub fn move_up(&mut self, t: f32) {
        let up = self.inv_view_rotation * Vector3::y();
        self.translate(up * t);
    }

    fn translate(&mut self, offset: Pos) {
        self.set_target(self.target + offset);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if !(aspect.is_finite() && aspect > f32::EPSILON) {
            warn!("Ignoring invalid aspect ratio {aspect}");
            return;
        }

        self.update_projection(|camera| camera.aspect = aspect);
    }

    pub fn set_field_of_view(&mut self, fov: f32) {
        if fov.is_finite() {
            let fov = fov.clamp(MIN_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW);
            self.update_projection(|camera| camera.fov = fov);
        }
    }

    pub fn set_near_plane(&mut self, near: f32) {
        self.set_clip_planes(near, self.far);
    }

    pub fn set_far_plane(&mut self, far: f32) {
        self.set_clip_planes(self.near, far);
    }

    fn set_clip_planes(&mut self, near: f32, far: f32) {
        if !(near.is_finite() && far.is_finite() && near > 0.0 && far - near > f32::EPSILON) {
            warn!("Ignoring invalid clip planes near: {near}, far: {far}");
            return;
        }

        self.update_projection(|camera| {
            camera.near = near;
            camera.far = far;
        });
    }

    pub fn set_target(&mut self, target: Pos) {
        if target.iter().all(|x| x.is_finite()) {
            self.update_view(|camera| camera.target = target);
        }
    }

    /// Sets the up vector. Zero length or non-finite vectors, and ones
    /// parallel to the current view direction, are ignored. Orbits that
    /// would later line the view up with it are refused the same way.
    pub fn set_up(&mut self, up: Pos) {
        if let Some(up) = up.try_normalize(f32::MIN_POSITIVE) {
            self.update_view(|camera| camera.up = up);
        }
    }

    pub fn set_orthogonal(&mut self, orthogonal: bool) {
        self.update_projection(|camera| camera.orthogonal = orthogonal);
    }

    pub fn set_orthogonal_borders(&mut self, left: f32, right: f32, top: f32, bottom: f32) {
        let borders = [left, right, top, bottom];
        if borders.iter().any(|x| !x.is_finite())
            || (right - left).abs() <= f32::EPSILON
            || (top - bottom).abs() <= f32::EPSILON
        {
            warn!("Ignoring degenerate orthographic borders {borders:?}");
            return;
        }

        self.update_projection(|camera| {
            camera.borders = OrthoBorders {
                left,
                right,
                top,
                bottom,
            }
        });
    }

    /// Applies `change` and rebuilds the view, keeping the previous state if
    /// the new one is degenerate.
    fn update_view(&mut self, change: impl FnOnce(&mut Self)) {
        let previous = self.clone();
        change(self);
        self.build_view_matrix();

        let direction = (self.target - self.position).normalize();
        let aligned = direction.cross(&self.up).norm() < MIN_UP_ANGLE_SIN;
        if aligned || !finite(&self.view) || !finite(&self.position) {
            warn!("Ignoring camera change that leaves the view degenerate");
            *self = previous;
        }
    }

    /// Applies `change` and rebuilds the projection, keeping the previous
    /// state if the new one is not finite.
    fn update_projection(&mut self, change: impl FnOnce(&mut Self)) {
        let previous = self.clone();
        change(self);
        self.build_projection_matrix();

        if !finite(&self.projection) || !finite(&self.inv_projection) {
            warn!("Ignoring camera change that leaves the projection degenerate");
            *self = previous;
        }
    }

    fn build_view_matrix(&mut self) {
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let offset = Vector3::new(sin_azimuth * sin_polar, cos_polar, cos_azimuth * sin_polar);
        self.position = self.target + offset * self.radius;

        let view = Isometry3::look_at_rh(&self.position.into(), &self.target.into(), &self.up);
        self.view = view.to_homogeneous();
        self.inv_view_rotation = view.rotation.inverse();
    }

    fn build_projection_matrix(&mut self) {
        if self.orthogonal {
            let OrthoBorders {
                left,
                right,
                top,
                bottom,
            } = self.borders;
            let ortho = Orthographic3::new(left, right, bottom, top, self.near, self.far);
            self.projection = ortho.to_homogeneous();
            self.inv_projection = ortho.inverse();
        } else {
            let perspective =
                Perspective3::new(self.aspect, self.fov.to_radians(), self.near, self.far);
            self.projection = perspective.to_homogeneous();
            self.inv_projection = perspective.inverse();
        }
    }
}

impl OrbitCamera {
    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn inverse_projection_matrix(&self) -> &Matrix4<f32> {
        &self.inv_projection
    }

    /// Rotation taking view space directions into world space.
    pub fn inverse_view_rotation(&self) -> &UnitQuaternion<f32> {
        &self.inv_view_rotation
    }

    /// The camera's right vector in world space, the first column of the
    /// inverse view matrix.
    pub fn right(&self) -> Pos {
        self.inv_view_rotation * Vector3::x()
    }

    pub fn position(&self) -> Pos {
        self.position
    }

    pub fn target(&self) -> Pos {
        self.target
    }

    pub fn up(&self) -> Pos {
        self.up
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    /// Vertical field of view in degrees.
    pub fn field_of_view(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near_plane(&self) -> f32 {
        self.near
    }

    pub fn far_plane(&self) -> f32 {
        self.far
    }

    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    pub fn orthogonal_borders(&self) -> OrthoBorders {
        self.borders
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for OrthoBorders {
    fn default() -> Self {
        Self {
            left: -100.0,
            right: 100.0,
            top: 100.0,
            bottom: -100.0,
        }
    }
}

fn finite<R, C, S>(matrix: &Matrix<f32, R, C, S>) -> bool
where
    R: Dim,
    C: Dim,
    S: RawStorage<f32, R, C>,
{
    matrix.iter().all(|x| x.is_finite())
}

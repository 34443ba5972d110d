//! Perspective camera, orbit controls and the camera uniform.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Transform as _, Vector3};
use instant::Duration;

use crate::{config::CameraConfig, data_structures::geometry::Ray};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(eye: P, target: P) -> Self {
        Self {
            eye: eye.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// OpenGL clip space; multiply with [`OPENGL_TO_WGPU_MATRIX`] for the GPU.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// A world space ray from the eye through a point given in normalized device
/// coordinates (`-1..=1`, y up).
pub fn ray_from_ndc(camera: &Camera, projection: &Projection, ndc: (f32, f32)) -> Option<Ray> {
    let inverse = (projection.calc_matrix() * camera.calc_matrix()).invert()?;
    let near = inverse.transform_point(Point3::new(ndc.0, ndc.1, -1.0));
    let far = inverse.transform_point(Point3::new(ndc.0, ndc.1, 1.0));
    let direction = far - near;
    // a degenerate view (eye on its target, or looking along `up`) yields NaN
    let length = direction.magnitude2();
    if length == 0.0 || !length.is_finite() {
        return None;
    }
    Some(Ray::new(camera.eye, direction))
}

/// Orbits the camera around a target. Input accumulates and is applied with
/// exponential damping so the motion eases out over a few frames.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    /// Share of the pending motion applied per 1/60 s.
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pending_theta: f32,
    pending_phi: f32,
    /// Log of the distance factor still to apply.
    pending_zoom: f32,
}

impl OrbitControls {
    const MIN_POLAR: f32 = 1e-3;

    pub fn new(damping: f32, rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            damping,
            rotate_speed,
            zoom_speed,
            min_distance: 0.5,
            max_distance: 50.0,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_zoom: 0.0,
        }
    }

    pub fn from_config(cfg: &CameraConfig) -> Self {
        Self::new(cfg.damping, cfg.rotate_speed, cfg.zoom_speed)
    }

    /// Pointer drag in pixels. A drag across the full viewport height is a
    /// full turn.
    pub fn rotate(&mut self, dx: f64, dy: f64, viewport_height: u32) {
        let per_pixel = std::f32::consts::TAU / viewport_height.max(1) as f32 * self.rotate_speed;
        self.pending_theta -= dx as f32 * per_pixel;
        self.pending_phi -= dy as f32 * per_pixel;
    }

    /// Positive `lines` zoom in.
    pub fn zoom(&mut self, lines: f32) {
        self.pending_zoom -= lines * 0.1 * self.zoom_speed;
    }

    pub fn is_settled(&self) -> bool {
        self.pending_theta.abs() < 1e-6 && self.pending_phi.abs() < 1e-6 && self.pending_zoom.abs() < 1e-6
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        if self.is_settled() {
            return;
        }
        let frames = dt.as_secs_f32() * 60.0;
        let share = 1.0 - (1.0 - self.damping.clamp(0.0, 1.0)).powf(frames);

        let offset = camera.eye - camera.target;
        let radius = offset.magnitude();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius.max(f32::EPSILON)).clamp(-1.0, 1.0).acos();

        theta += self.pending_theta * share;
        phi = (phi + self.pending_phi * share)
            .clamp(Self::MIN_POLAR, std::f32::consts::PI - Self::MIN_POLAR);
        let radius = (radius * (self.pending_zoom * share).exp())
            .clamp(self.min_distance, self.max_distance);

        self.pending_theta *= 1.0 - share;
        self.pending_phi *= 1.0 - share;
        self.pending_zoom *= 1.0 - share;

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.eye = camera.target + offset;
        log::trace!("orbit eye {:?}", camera.eye);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.eye.to_homogeneous().into();
        self.view_proj = (OPENGL_TO_WGPU_MATRIX * projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state owned by the scene: pose, lens and controls.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub camera: Camera,
    pub projection: Projection,
    pub controls: OrbitControls,
}

impl CameraRig {
    pub fn from_config(cfg: &CameraConfig, width: u32, height: u32) -> Self {
        Self {
            camera: Camera::new(cfg.position, cfg.target),
            projection: Projection::new(width, height, cgmath::Deg(cfg.fov_deg), cfg.near, cfg.far),
            controls: OrbitControls::from_config(cfg),
        }
    }

    pub fn ray(&self, ndc: (f32, f32)) -> Option<Ray> {
        ray_from_ndc(&self.camera, &self.projection, ndc)
    }

    pub fn eye(&self) -> Point3<f32> {
        self.camera.eye
    }
}

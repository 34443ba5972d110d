//! CPU side geometry: rays, bounding boxes and the primitive meshes used for
//! walls, floors and furniture blocks.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Transform as _, Vector3};

use crate::data_structures::model::{MeshData, ModelVertex};

/// A ray with a normalized direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Möller–Trumbore. Returns the distance along the ray, both faces count.
    pub fn intersect_triangle(&self, a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Option<f32> {
        const EPSILON: f32 = 1e-7;
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}

/// Axis aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Self {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.grow(p);
            aabb
        })
    }

    pub fn grow(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after an affine transformation.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(self.corners().into_iter().map(|p| matrix.transform_point(p)))
    }

    /// Slab test. Returns the entry distance, or the exit distance when the
    /// origin is inside.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let (mut t0, mut t1) = ((lo - origin) * inv, (hi - origin) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            return None;
        }
        Some(if t_min >= 0.0 { t_min } else { t_max })
    }
}

fn vertex(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> ModelVertex {
    ModelVertex {
        position,
        tex_coords: uv,
        normal,
    }
}

/// A `width` × `height` plane in the XY plane facing +Z, centred on the origin.
pub fn plane(name: &str, width: f32, height: f32) -> MeshData {
    let (w, h) = (width / 2.0, height / 2.0);
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        vertex([-w, -h, 0.0], n, [0.0, 1.0]),
        vertex([w, -h, 0.0], n, [1.0, 1.0]),
        vertex([w, h, 0.0], n, [1.0, 0.0]),
        vertex([-w, h, 0.0], n, [0.0, 0.0]),
    ];
    MeshData::new(name, vertices, vec![0, 1, 2, 0, 2, 3], 0)
}

/// An axis aligned box centred on the origin.
pub fn cuboid(name: &str, width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
    // (normal, u axis, v axis) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let half = Vector3::new(x, y, z);
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let n = Vector3::from(normal);
        let u = Vector3::from(u);
        let v = Vector3::from(v);
        let base = vertices.len() as u32;
        for (su, sv, uv) in [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ] {
            let p = n + u * su + v * sv;
            let p = Vector3::new(p.x * half.x, p.y * half.y, p.z * half.z);
            vertices.push(vertex(p.into(), normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData::new(name, vertices, indices, 0)
}

/// A capped cylinder along Y centred on the origin.
pub fn cylinder(name: &str, radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let half = height / 2.0;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let slope = (radius_bottom - radius_top) / height;
    for i in 0..=segments {
        let u = i as f32 / segments as f32;
        let theta = u * std::f32::consts::TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vector3::new(sin, slope, cos).normalize();
        vertices.push(vertex([radius_top * sin, half, radius_top * cos], normal.into(), [u, 0.0]));
        vertices.push(vertex(
            [radius_bottom * sin, -half, radius_bottom * cos],
            normal.into(),
            [u, 1.0],
        ));
    }
    for i in 0..segments {
        let a = i * 2;
        indices.extend_from_slice(&[a, a + 1, a + 3, a, a + 3, a + 2]);
    }
    for (y, radius, normal) in [(half, radius_top, 1.0f32), (-half, radius_bottom, -1.0)] {
        let centre = vertices.len() as u32;
        vertices.push(vertex([0.0, y, 0.0], [0.0, normal, 0.0], [0.5, 0.5]));
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * std::f32::consts::TAU;
            let (sin, cos) = theta.sin_cos();
            vertices.push(vertex(
                [radius * sin, y, radius * cos],
                [0.0, normal, 0.0],
                [0.5 + sin / 2.0, 0.5 + cos / 2.0],
            ));
        }
        for i in 0..segments {
            let (a, b) = (centre + 1 + i, centre + 2 + i);
            if normal > 0.0 {
                indices.extend_from_slice(&[centre, a, b]);
            } else {
                indices.extend_from_slice(&[centre, b, a]);
            }
        }
    }
    MeshData::new(name, vertices, indices, 0)
}

pub(crate) fn point(p: [f32; 3]) -> Point3<f32> {
    Point3::from_vec(Vector3::from(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_box_in_front() {
        let aabb = Aabb {
            min: Point3::new(-1.0, -1.0, -1.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(aabb.intersect(&ray), Some(4.0));
    }

    #[test]
    fn ray_misses_box_behind_it() {
        let aabb = Aabb {
            min: Point3::new(-1.0, -1.0, -1.0),
            max: Point3::new(1.0, 1.0, 1.0),
        };
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(aabb.intersect(&ray), None);
    }

    #[test]
    fn triangle_hit_reports_distance() {
        let ray = Ray::new(Point3::new(0.25, 0.25, 3.0), Vector3::new(0.0, 0.0, -1.0));
        let t = ray.intersect_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(t, Some(3.0));
    }

    #[test]
    fn triangle_outside_barycentric_range_misses() {
        let ray = Ray::new(Point3::new(0.9, 0.9, 3.0), Vector3::new(0.0, 0.0, -1.0));
        let t = ray.intersect_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(t, None);
    }

    #[test]
    fn cuboid_bounds_match_dimensions() {
        let mesh = cuboid("couch", 3.0, 0.3, 1.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.bounds.min, Point3::new(-1.5, -0.15, -0.5));
        assert_eq!(mesh.bounds.max, Point3::new(1.5, 0.15, 0.5));
    }

    #[test]
    fn cylinder_is_capped() {
        let mesh = cylinder("leg", 0.05, 0.05, 0.45, 24);
        // side quads plus two fans
        assert_eq!(mesh.indices.len(), (24 * 6 + 24 * 3 * 2) as usize);
        assert!((mesh.bounds.max.y - 0.225).abs() < 1e-6);
    }

    #[test]
    fn transformed_box_is_translated() {
        let aabb = plane("wall", 5.0, 2.5).bounds;
        let moved = aabb.transformed(&Matrix4::from_translation(Vector3::new(0.0, 1.25, -2.5)));
        assert_eq!(moved.min, Point3::new(-2.5, 0.0, -2.5));
        assert_eq!(moved.max, Point3::new(2.5, 2.5, -2.5));
    }
}

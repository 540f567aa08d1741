//! Ray and triangle primitives shared by meshes, cameras and accelerators

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Ray with normalized direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray, normalizing `direction`
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point at distance `t` along the ray
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    #[inline]
    pub fn inverse_direction(&self) -> Vec3 {
        self.direction.recip()
    }
}

/// Triangle with optional per-vertex normals
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub p: [Vec3; 3],
    pub n: Option<[Vec3; 3]>,
}

/// Barycentric hit on a triangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    /// Weights of the second and third vertex
    pub uv: Vec2,
}

impl Triangle {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self {
            p: [p0, p1, p2],
            n: None,
        }
    }

    pub fn with_normals(mut self, n: [Vec3; 3]) -> Self {
        self.n = Some(n);
        self
    }

    /// Unit normal of the triangle plane, zero for degenerate triangles
    pub fn geometric_normal(&self) -> Vec3 {
        (self.p[1] - self.p[0])
            .cross(self.p[2] - self.p[0])
            .normalize_or_zero()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.p)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.p[0] + self.p[1] + self.p[2]) / 3.0
    }

    /// Surface point at barycentric coordinates `uv`
    ///
    /// The shading normal interpolates vertex normals when present and
    /// falls back to the geometric normal.
    pub fn surface_point(&self, uv: Vec2) -> PointGeometry {
        let w = 1.0 - uv.x - uv.y;
        let p = self.p[0] * w + self.p[1] * uv.x + self.p[2] * uv.y;
        let n = match self.n {
            Some(n) => {
                let interpolated = n[0] * w + n[1] * uv.x + n[2] * uv.y;
                interpolated.try_normalize().unwrap_or_else(|| self.geometric_normal())
            }
            None => self.geometric_normal(),
        };
        PointGeometry { p, n, uv }
    }

    /// Möller–Trumbore intersection, two-sided
    pub fn intersect(&self, ray: &Ray, tmin: f32, tmax: f32) -> Option<TriangleHit> {
        const EPSILON: f32 = 1e-9;

        let edge1 = self.p[1] - self.p[0];
        let edge2 = self.p[2] - self.p[0];
        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Parallel to the triangle plane
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.p[0];
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if t <= tmin || t >= tmax {
            return None;
        }

        Some(TriangleHit {
            t,
            uv: Vec2::new(u, v),
        })
    }
}

/// Geometry information at a surface point
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    pub p: Vec3,
    pub n: Vec3,
    pub uv: Vec2,
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box that any union overrides
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: &[Vec3]) -> Self {
        points
            .iter()
            .fold(Self::EMPTY, |bounds, p| bounds.expand(*p))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[must_use]
    pub fn expand(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    #[must_use]
    pub fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the longest axis
    pub fn largest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// Slab test; `true` when the ray overlaps the box within `[tmin, tmax]`
    ///
    /// Boxes are closed: a ray running inside a face plane touches the box.
    pub fn hit(&self, ray: &Ray, inv_dir: Vec3, mut tmin: f32, mut tmax: f32) -> bool {
        for axis in 0..3 {
            // Parallel to the slab, `(bound - origin) * inf` may be NaN
            if inv_dir[axis].is_infinite() {
                let o = ray.origin[axis];
                if o < self.min[axis] || o > self.max[axis] {
                    return false;
                }
                continue;
            }
            let t0 = (self.min[axis] - ray.origin[axis]) * inv_dir[axis];
            let t1 = (self.max[axis] - ray.origin[axis]) * inv_dir[axis];
            let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            tmin = if near > tmin { near } else { tmin };
            tmax = if far < tmax { far } else { tmax };
            if tmax < tmin {
                return false;
            }
        }
        true
    }
}

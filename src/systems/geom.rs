//! Shared 2-D primitives: axis-aligned rectangles, ray queries, and angle
//! helpers. Everything here is pure math over `DVec2`; the destruction,
//! weapon, projectile, and visibility systems all build on it.

use glam::DVec2;

// ─── Rect ────────────────────────────────────────────────────────────

/// Axis-aligned rectangle, top-left anchored (screen coordinates: +Y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    /// Rect grown by `r` on every side.
    pub fn expanded(&self, r: f64) -> Rect {
        Rect::new(self.x - r, self.y - r, self.w + 2.0 * r, self.h + 2.0 * r)
    }

    /// Closest point on (or in) the rect to `p`.
    pub fn closest_point(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            p.x.clamp(self.x, self.x + self.w),
            p.y.clamp(self.y, self.y + self.h),
        )
    }

    /// Distance from `p` to the rect boundary; zero inside.
    pub fn distance_to(&self, p: DVec2) -> f64 {
        self.closest_point(p).distance(p)
    }
}

// ─── Ray queries ─────────────────────────────────────────────────────

/// Slab-method ray vs AABB. `dir` need not be normalized; returned `t` values
/// are in units of `dir`. Returns `(t_enter, t_exit)` with `t_exit >= 0` and
/// `t_enter <= t_exit`, or `None` on a miss. A ray starting inside reports
/// `t_enter < 0`.
pub fn ray_aabb(origin: DVec2, dir: DVec2, rect: &Rect) -> Option<(f64, f64)> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;

    for axis in 0..2 {
        let (o, d, lo, hi) = if axis == 0 {
            (origin.x, dir.x, rect.x, rect.x + rect.w)
        } else {
            (origin.y, dir.y, rect.y, rect.y + rect.h)
        };

        if d.abs() < 1e-12 {
            if o < lo || o > hi {
                return None;
            }
        } else {
            let inv = 1.0 / d;
            let (t1, t2) = ((lo - o) * inv, (hi - o) * inv);
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            t_min = t_min.max(near);
            t_max = t_max.min(far);
            if t_min > t_max {
                return None;
            }
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some((t_min, t_max))
}

/// Ray vs circle. `dir` must be normalized. Returns the nearest non-negative
/// `t` along the ray, or `None`.
pub fn ray_circle(origin: DVec2, dir: DVec2, center: DVec2, radius: f64) -> Option<f64> {
    let to_center = center - origin;
    let proj = to_center.dot(dir);
    let closest_sq = to_center.length_squared() - proj * proj;
    let r_sq = radius * radius;
    if closest_sq > r_sq {
        return None;
    }
    let half_chord = (r_sq - closest_sq).sqrt();
    let t = if proj - half_chord >= 0.0 {
        proj - half_chord
    } else if proj + half_chord >= 0.0 {
        // Ray starts inside the circle.
        proj + half_chord
    } else {
        return None;
    };
    Some(t)
}

/// Intersections of an infinite line through `a`/`b` with a circle, reported
/// as `t` along the segment (`t ∈ [0,1]` means on the segment).
pub fn line_circle_intersections(
    a: DVec2,
    b: DVec2,
    center: DVec2,
    radius: f64,
) -> Vec<(f64, DVec2)> {
    let d = b - a;
    let f = a - center;
    let qa = d.length_squared();
    if qa < 1e-12 {
        return Vec::new();
    }
    let qb = 2.0 * f.dot(d);
    let qc = f.length_squared() - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrt_disc = disc.sqrt();
    let mut out = Vec::new();
    for t in [(-qb - sqrt_disc) / (2.0 * qa), (-qb + sqrt_disc) / (2.0 * qa)] {
        out.push((t, a + d * t));
    }
    out
}

// ─── Angles ──────────────────────────────────────────────────────────

/// Normalize to [-π, π].
pub fn normalize_angle(a: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = a % two_pi;
    if a > std::f64::consts::PI {
        a -= two_pi;
    } else if a < -std::f64::consts::PI {
        a += two_pi;
    }
    a
}

/// Signed angular offset of `angle` from `reference`, in [-π, π].
pub fn angle_delta(angle: f64, reference: f64) -> f64 {
    normalize_angle(angle - reference)
}

/// Whether `angle` lies within ±`half_angle` of `direction` (wrap-safe).
pub fn angle_in_cone(angle: f64, direction: f64, half_angle: f64) -> bool {
    angle_delta(angle, direction).abs() <= half_angle + 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    // ── Rect ────────────────────────────────────────────────────────

    #[test]
    fn rect_contains_and_closest_point() {
        let r = Rect::new(10.0, 20.0, 30.0, 10.0);
        assert!(r.contains(DVec2::new(25.0, 25.0)));
        assert!(!r.contains(DVec2::new(5.0, 25.0)));

        let cp = r.closest_point(DVec2::new(0.0, 0.0));
        assert_eq!(cp, DVec2::new(10.0, 20.0));

        // Inside point maps to itself
        let inside = DVec2::new(15.0, 22.0);
        assert_eq!(r.closest_point(inside), inside);
    }

    #[test]
    fn rect_expanded_grows_all_sides() {
        let r = Rect::new(10.0, 10.0, 10.0, 10.0).expanded(2.0);
        assert_eq!(r.x, 8.0);
        assert_eq!(r.y, 8.0);
        assert_eq!(r.w, 14.0);
        assert_eq!(r.h, 14.0);
    }

    // ── ray_aabb ────────────────────────────────────────────────────

    #[test]
    fn ray_aabb_hits_straight_on() {
        let r = Rect::new(10.0, -5.0, 10.0, 10.0);
        let hit = ray_aabb(DVec2::ZERO, DVec2::X, &r);
        let (t_in, t_out) = hit.expect("should hit");
        assert!((t_in - 10.0).abs() < 1e-9);
        assert!((t_out - 20.0).abs() < 1e-9);
    }

    #[test]
    fn ray_aabb_misses_parallel_ray() {
        let r = Rect::new(10.0, 10.0, 10.0, 10.0);
        assert!(ray_aabb(DVec2::ZERO, DVec2::X, &r).is_none());
    }

    #[test]
    fn ray_aabb_behind_origin_is_a_miss() {
        let r = Rect::new(-20.0, -5.0, 5.0, 10.0);
        assert!(ray_aabb(DVec2::ZERO, DVec2::X, &r).is_none());
    }

    #[test]
    fn ray_aabb_from_inside_reports_negative_entry() {
        let r = Rect::new(-5.0, -5.0, 10.0, 10.0);
        let (t_in, t_out) = ray_aabb(DVec2::ZERO, DVec2::X, &r).unwrap();
        assert!(t_in < 0.0);
        assert!((t_out - 5.0).abs() < 1e-9);
    }

    // ── ray_circle ──────────────────────────────────────────────────

    #[test]
    fn ray_circle_front_hit() {
        let t = ray_circle(DVec2::ZERO, DVec2::X, DVec2::new(10.0, 0.0), 2.0);
        assert!((t.unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ray_circle_miss_and_behind() {
        assert!(ray_circle(DVec2::ZERO, DVec2::X, DVec2::new(10.0, 5.0), 2.0).is_none());
        assert!(ray_circle(DVec2::ZERO, DVec2::X, DVec2::new(-10.0, 0.0), 2.0).is_none());
    }

    // ── angles ──────────────────────────────────────────────────────

    #[test]
    fn normalize_angle_wraps_both_ways() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
        assert!((normalize_angle(-3.0 * PI) + PI).abs() < 1e-9);
        assert_eq!(normalize_angle(0.5), 0.5);
    }

    #[test]
    fn cone_test_handles_wraparound() {
        // Cone pointing at +π, test an angle just past -π (adjacent across the seam)
        assert!(angle_in_cone(-PI + 0.1, PI - 0.1, 0.3));
        assert!(!angle_in_cone(0.0, PI, 0.5));
    }
}

//! Per-player visibility polygons.
//!
//! A viewer sees a 120° cone out to `VIEW_DISTANCE`, cut by walls. The
//! polygon is built by casting rays at every interesting angle: the cone
//! edges, every harvested occluder corner (nudged ±ε so rays pass on both
//! sides of it), and every wall-edge/arc intersection. Vision reads the
//! destruction mask, never slice health — a soft wall shot to half health
//! is see-through while still stopping bullets.

use glam::DVec2;
use tracing::warn;

use crate::config;
use crate::msg::types::{Vec2Payload, VisionPayload};
use crate::systems::destruction::{DestructionSystem, Orientation, Wall};
use crate::systems::geom::{angle_delta, angle_in_cone, line_circle_intersections, ray_aabb};

#[derive(Debug, Clone)]
pub struct VisibilityPacket {
    pub polygon: Vec<DVec2>,
    pub view_angle: f64,
    pub view_direction: f64,
    pub view_distance: f64,
    pub position: DVec2,
    pub fog_opacity: f64,
}

impl VisibilityPacket {
    pub fn to_payload(&self) -> VisionPayload {
        VisionPayload {
            kind: "polygon",
            polygon: self
                .polygon
                .iter()
                .map(|p| Vec2Payload { x: p.x, y: p.y })
                .collect(),
            view_angle: self.view_angle,
            view_direction: self.view_direction,
            view_distance: self.view_distance,
            position: Vec2Payload {
                x: self.position.x,
                y: self.position.y,
            },
            fog_opacity: self.fog_opacity,
        }
    }
}

// ─── Public API ──────────────────────────────────────────────────────

pub fn compute_visibility(
    viewer: DVec2,
    rotation: f64,
    walls: &DestructionSystem,
) -> VisibilityPacket {
    let half = config::VIEW_ANGLE / 2.0;

    // 1. Candidate ray angles, as offsets from the view direction.
    let mut deltas: Vec<f64> = vec![-half, half];

    for wall in walls.walls() {
        if wall.is_fully_open() {
            continue;
        }
        for corner in harvest_corners(wall) {
            let delta = angle_delta((corner - viewer).to_angle(), rotation);
            for nudged in [
                delta - config::CORNER_ANGLE_EPSILON,
                delta + config::CORNER_ANGLE_EPSILON,
            ] {
                if nudged.abs() <= half {
                    deltas.push(nudged);
                }
            }
        }
        for point in arc_edge_intersections(wall, viewer, rotation, half) {
            let delta = angle_delta((point - viewer).to_angle(), rotation);
            if delta.abs() <= half {
                deltas.push(delta);
            }
        }
    }

    deltas.sort_by(|a, b| a.partial_cmp(b).unwrap());
    deltas.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    // 2. One ray per angle, stopped by the nearest mask-0 slice.
    let hits: Vec<DVec2> = deltas
        .iter()
        .map(|&d| cast_ray(viewer, rotation + d, walls))
        .collect();

    // 3. Smooth the arc between consecutive unobstructed rays.
    let mut polygon = Vec::with_capacity(hits.len() + 8);
    polygon.push(viewer);
    for (i, &hit) in hits.iter().enumerate() {
        if i > 0 {
            let prev = hits[i - 1];
            let on_arc = |p: DVec2| p.distance(viewer) >= config::VIEW_DISTANCE - 1e-6;
            let gap = deltas[i] - deltas[i - 1];
            if on_arc(prev) && on_arc(hit) && gap > config::ARC_STEP_RADIANS {
                let segments = (gap / config::ARC_STEP_RADIANS).ceil() as usize;
                for s in 1..segments {
                    let angle = rotation + deltas[i - 1] + gap * (s as f64 / segments as f64);
                    polygon.push(viewer + DVec2::from_angle(angle) * config::VIEW_DISTANCE);
                }
            }
        }
        polygon.push(hit);
    }

    if polygon.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        warn!("visibility polygon produced non-finite vertex, falling back");
        polygon = vec![viewer];
    }

    VisibilityPacket {
        polygon,
        view_angle: config::VIEW_ANGLE,
        view_direction: rotation,
        view_distance: config::VIEW_DISTANCE,
        position: viewer,
        fog_opacity: config::FOG_OPACITY,
    }
}

/// The vision-disabled packet: the whole field, all directions.
pub fn full_field_packet(viewer: DVec2, rotation: f64) -> VisibilityPacket {
    VisibilityPacket {
        polygon: vec![
            viewer,
            DVec2::new(0.0, 0.0),
            DVec2::new(config::GAME_WIDTH, 0.0),
            DVec2::new(config::GAME_WIDTH, config::GAME_HEIGHT),
            DVec2::new(0.0, config::GAME_HEIGHT),
        ],
        view_angle: 2.0 * std::f64::consts::PI,
        view_direction: rotation,
        view_distance: config::VIEW_DISTANCE,
        position: viewer,
        fog_opacity: 0.0,
    }
}

// ─── Ray casting ─────────────────────────────────────────────────────

/// March a ray to `VIEW_DISTANCE`, stopping at the entry of the nearest
/// blocking (mask-0) slice. Open slices never stop a ray, so holes in walls
/// are seen through and the scan naturally resumes on other walls behind.
pub(crate) fn cast_ray(viewer: DVec2, angle: f64, walls: &DestructionSystem) -> DVec2 {
    let dir = DVec2::from_angle(angle);
    let mut t_min = config::VIEW_DISTANCE;

    for wall in walls.walls() {
        if wall.is_fully_open() {
            continue;
        }
        if ray_aabb(viewer, dir, &wall.rect).is_none() {
            continue;
        }
        for i in 0..config::WALL_SLICES {
            if wall.destruction_mask[i] {
                continue;
            }
            if let Some((t_in, _)) = ray_aabb(viewer, dir, &wall.slice_rect(i)) {
                let t = t_in.max(0.0);
                if t < t_min {
                    t_min = t;
                }
            }
        }
    }

    viewer + dir * t_min
}

// ─── Candidate harvesting ────────────────────────────────────────────

/// Outer corners, plus the two corners on every slice boundary where the
/// mask flips — those are the edges of holes.
fn harvest_corners(wall: &Wall) -> Vec<DVec2> {
    let r = wall.rect;
    let mut corners = vec![
        DVec2::new(r.x, r.y),
        DVec2::new(r.x + r.w, r.y),
        DVec2::new(r.x, r.y + r.h),
        DVec2::new(r.x + r.w, r.y + r.h),
    ];

    for i in 0..config::WALL_SLICES - 1 {
        if wall.destruction_mask[i] == wall.destruction_mask[i + 1] {
            continue;
        }
        let boundary = wall.slice_rect(i + 1);
        match wall.orientation() {
            Orientation::Horizontal => {
                corners.push(DVec2::new(boundary.x, r.y));
                corners.push(DVec2::new(boundary.x, r.y + r.h));
            }
            Orientation::Vertical => {
                corners.push(DVec2::new(r.x, boundary.y));
                corners.push(DVec2::new(r.x + r.w, boundary.y));
            }
        }
    }
    corners
}

/// Points where a wall edge crosses the view arc, kept when they lie on the
/// edge segment and inside the cone.
fn arc_edge_intersections(wall: &Wall, viewer: DVec2, rotation: f64, half: f64) -> Vec<DVec2> {
    let r = wall.rect;
    let corners = [
        DVec2::new(r.x, r.y),
        DVec2::new(r.x + r.w, r.y),
        DVec2::new(r.x + r.w, r.y + r.h),
        DVec2::new(r.x, r.y + r.h),
    ];

    let mut out = Vec::new();
    for e in 0..4 {
        let a = corners[e];
        let b = corners[(e + 1) % 4];
        for (t, point) in line_circle_intersections(a, b, viewer, config::VIEW_DISTANCE) {
            if !(0.0..=1.0).contains(&t) {
                continue;
            }
            if angle_in_cone((point - viewer).to_angle(), rotation, half) {
                out.push(point);
            }
        }
    }
    out
}

// ─── Tile rasterization (legacy consumers) ───────────────────────────

/// Rasterize the polygon onto the 8×8 tile grid: 1 = tile center visible.
pub fn rasterize_tiles(packet: &VisibilityPacket) -> Vec<Vec<u8>> {
    let cols = (config::GAME_WIDTH / config::TILE_SIZE).ceil() as usize;
    let rows = (config::GAME_HEIGHT / config::TILE_SIZE).ceil() as usize;

    (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let center = DVec2::new(
                        (col as f64 + 0.5) * config::TILE_SIZE,
                        (row as f64 + 0.5) * config::TILE_SIZE,
                    );
                    point_in_polygon(center, &packet.polygon) as u8
                })
                .collect()
        })
        .collect()
}

/// Even-odd crossing test.
fn point_in_polygon(p: DVec2, polygon: &[DVec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y)
            && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::destruction::Material;
    use crate::systems::geom::Rect;

    fn no_walls() -> DestructionSystem {
        DestructionSystem::new()
    }

    fn walls_with(wall: Wall) -> DestructionSystem {
        let mut sys = DestructionSystem::new();
        sys.set_walls(vec![wall]);
        sys
    }

    // Vertical wall crossing the viewer's forward ray at x=140
    fn facing_wall() -> Wall {
        Wall::new("w", Rect::new(140.0, 60.0, 10.0, 50.0), Material::Concrete)
    }

    // ── Basic shape ─────────────────────────────────────────────────

    #[test]
    fn polygon_starts_at_the_viewer() {
        let viewer = DVec2::new(100.0, 85.0);
        let packet = compute_visibility(viewer, 0.0, &no_walls());
        assert_eq!(packet.polygon[0], viewer);
        assert!(packet.polygon.len() > 3);
    }

    #[test]
    fn open_field_boundary_sits_on_the_arc_inside_the_cone() {
        let viewer = DVec2::new(240.0, 135.0);
        let packet = compute_visibility(viewer, 0.0, &no_walls());
        let half = config::VIEW_ANGLE / 2.0;

        for p in &packet.polygon[1..] {
            let d = p.distance(viewer);
            assert!(
                (d - config::VIEW_DISTANCE).abs() < 1e-6,
                "open field point should be on the arc, got {d}"
            );
            let delta = angle_delta((*p - viewer).to_angle(), 0.0);
            assert!(delta.abs() <= half + 1e-6);
        }
    }

    #[test]
    fn arc_gaps_are_interpolated() {
        let viewer = DVec2::new(240.0, 135.0);
        let packet = compute_visibility(viewer, 0.0, &no_walls());

        // 120° arc at ≤10° steps needs at least 13 boundary points
        assert!(packet.polygon.len() >= 14);
        let mut prev: Option<f64> = None;
        for p in &packet.polygon[1..] {
            let delta = angle_delta((*p - viewer).to_angle(), 0.0);
            if let Some(last) = prev {
                assert!(delta - last <= config::ARC_STEP_RADIANS + 1e-6);
            }
            prev = Some(delta);
        }
    }

    // ── Occlusion ───────────────────────────────────────────────────

    #[test]
    fn intact_wall_stops_the_forward_ray() {
        let viewer = DVec2::new(100.0, 85.0);
        let hit = cast_ray(viewer, 0.0, &walls_with(facing_wall()));
        assert!((hit.x - 140.0).abs() < 1e-6);
        assert!((hit.y - 85.0).abs() < 1e-9);
    }

    #[test]
    fn ray_passes_through_a_destroyed_slice() {
        // Slice 2 of the facing wall spans y ∈ [80, 90]; open it up.
        let mut wall = facing_wall();
        let idx = wall.slice_index(DVec2::new(145.0, 85.0));
        assert_eq!(idx, 2);
        let max = wall.max_health;
        let mut sys = DestructionSystem::new();
        sys.set_walls(vec![wall]);
        sys.apply_damage("w", idx, max, 0.0);

        let viewer = DVec2::new(100.0, 85.0);
        let through = cast_ray(viewer, 0.0, &sys);
        assert!(
            (through.distance(viewer) - config::VIEW_DISTANCE).abs() < 1e-6,
            "ray through the hole should reach the arc"
        );

        // A ray into a neighbouring intact slice still stops at the face
        let blocked = cast_ray(viewer, 0.35, &sys);
        assert!((blocked.x - 140.0).abs() < 1e-6);
    }

    #[test]
    fn soft_wall_at_half_health_is_transparent_but_solid() {
        // Mask opens at ≤50% health while the slice keeps stopping bullets;
        // vision must read the mask.
        let wall = Wall::new("w", Rect::new(140.0, 60.0, 10.0, 50.0), Material::Wood);
        let max = wall.max_health;
        let mut sys = DestructionSystem::new();
        sys.set_walls(vec![wall]);
        for i in 0..config::WALL_SLICES {
            sys.apply_damage("w", i, max * 0.5, 0.0);
        }
        assert!(sys.get("w").unwrap().has_intact_slice());

        let viewer = DVec2::new(100.0, 85.0);
        let hit = cast_ray(viewer, 0.0, &sys);
        assert!((hit.distance(viewer) - config::VIEW_DISTANCE).abs() < 1e-6);
    }

    #[test]
    fn fully_open_wall_contributes_no_blocking_vertices() {
        let wall = facing_wall();
        let max = wall.max_health;
        let mut sys = DestructionSystem::new();
        sys.set_walls(vec![wall]);
        for i in 0..config::WALL_SLICES {
            sys.apply_damage("w", i, max, 0.0);
        }

        let viewer = DVec2::new(100.0, 85.0);
        let packet = compute_visibility(viewer, 0.0, &sys);
        for p in &packet.polygon[1..] {
            assert!(
                (p.distance(viewer) - config::VIEW_DISTANCE).abs() < 1e-6,
                "no ray should stop short of the arc"
            );
        }
    }

    #[test]
    fn hole_produces_inner_corner_vertices() {
        let mut wall = facing_wall();
        wall.slice_health[2] = 0.0;
        wall.destruction_mask[2] = true;
        let sys = walls_with(wall);

        let viewer = DVec2::new(100.0, 85.0);
        let packet = compute_visibility(viewer, 0.0, &sys);

        // Some vertices stop on the wall face, some sail through the hole
        let stopped = packet.polygon[1..]
            .iter()
            .any(|p| (p.x - 140.0).abs() < 1e-3);
        let through = packet.polygon[1..]
            .iter()
            .any(|p| p.x > 150.0);
        assert!(stopped, "expected rays blocked at the wall face");
        assert!(through, "expected rays passing through the opening");
    }

    // ── Fallbacks & rasterization ───────────────────────────────────

    #[test]
    fn full_field_packet_covers_everything() {
        let packet = full_field_packet(DVec2::new(10.0, 10.0), 1.0);
        assert_eq!(packet.view_angle, 2.0 * std::f64::consts::PI);
        assert_eq!(packet.polygon.len(), 5);

        let tiles = rasterize_tiles(&packet);
        // Interior tile well inside the field rectangle
        assert_eq!(tiles[5][5], 1);
    }

    #[test]
    fn rasterization_marks_visible_tiles_only() {
        let viewer = DVec2::new(240.0, 135.0);
        let packet = compute_visibility(viewer, 0.0, &no_walls());
        let tiles = rasterize_tiles(&packet);

        // Just in front of the viewer: visible
        let front = (
            (135.0 / config::TILE_SIZE) as usize,
            (260.0 / config::TILE_SIZE) as usize,
        );
        assert_eq!(tiles[front.0][front.1], 1);

        // Behind the viewer: outside the cone
        let behind = (
            (135.0 / config::TILE_SIZE) as usize,
            (200.0 / config::TILE_SIZE) as usize,
        );
        assert_eq!(tiles[behind.0][behind.1], 0);
    }
}

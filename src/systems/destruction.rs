//! Destructible walls.
//!
//! A wall is an axis-aligned rectangle split into five equal slices along its
//! long axis. Slice health drives two separate things that must never be
//! collapsed into one: the destruction mask (vision only, material-dependent)
//! and physical intactness (collision and bullets, `health > INTACT_EPSILON`).

use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::msg::types::{Vec2Payload, WallState};
use crate::systems::geom::Rect;

// ─── Materials ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Concrete,
    Wood,
    Metal,
    Glass,
}

impl Material {
    /// Hard materials stay opaque until a slice is fully destroyed.
    pub fn is_hard(self) -> bool {
        matches!(self, Material::Concrete | Material::Metal)
    }

    pub fn health_multiplier(self) -> f64 {
        match self {
            Material::Concrete => config::CONCRETE_HEALTH_MULTIPLIER,
            Material::Wood => config::WOOD_HEALTH_MULTIPLIER,
            Material::Metal => config::METAL_HEALTH_MULTIPLIER,
            Material::Glass => config::GLASS_HEALTH_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

// ─── Wall ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Wall {
    pub id: String,
    pub rect: Rect,
    pub material: Material,
    /// Per-slice maximum (base health × material multiplier).
    pub max_health: f64,
    pub slice_health: [f64; config::WALL_SLICES],
    /// True = vision passes through this slice. Derived from slice health;
    /// mutate health only through the methods below.
    pub destruction_mask: [bool; config::WALL_SLICES],
    pub is_boundary: bool,
}

impl Wall {
    pub fn new(id: impl Into<String>, rect: Rect, material: Material) -> Self {
        let max_health = config::SLICE_HEALTH * material.health_multiplier();
        Self {
            id: id.into(),
            rect,
            material,
            max_health,
            slice_health: [max_health; config::WALL_SLICES],
            destruction_mask: [false; config::WALL_SLICES],
            is_boundary: false,
        }
    }

    /// Boundary strips take no damage and never become transparent.
    pub fn new_boundary(id: impl Into<String>, rect: Rect) -> Self {
        let mut wall = Self::new(id, rect, Material::Concrete);
        wall.is_boundary = true;
        wall
    }

    pub fn orientation(&self) -> Orientation {
        if self.rect.w > self.rect.h {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    fn long_axis_len(&self) -> f64 {
        self.rect.w.max(self.rect.h)
    }

    pub fn slice_rect(&self, index: usize) -> Rect {
        let step = self.long_axis_len() / config::WALL_SLICES as f64;
        match self.orientation() {
            Orientation::Horizontal => Rect::new(
                self.rect.x + index as f64 * step,
                self.rect.y,
                step,
                self.rect.h,
            ),
            Orientation::Vertical => Rect::new(
                self.rect.x,
                self.rect.y + index as f64 * step,
                self.rect.w,
                step,
            ),
        }
    }

    pub fn slice_center(&self, index: usize) -> DVec2 {
        self.slice_rect(index).center()
    }

    /// Slice containing `p`, by its long-axis coordinate. Out-of-range points
    /// clamp to the nearest end slice.
    pub fn slice_index(&self, p: DVec2) -> usize {
        let step = self.long_axis_len() / config::WALL_SLICES as f64;
        let rel = match self.orientation() {
            Orientation::Horizontal => p.x - self.rect.x,
            Orientation::Vertical => p.y - self.rect.y,
        };
        ((rel / step).floor() as i64).clamp(0, config::WALL_SLICES as i64 - 1) as usize
    }

    /// Physically intact: stops bullets and players regardless of the mask.
    pub fn slice_intact(&self, index: usize) -> bool {
        self.slice_health[index] > config::INTACT_EPSILON
    }

    pub fn has_intact_slice(&self) -> bool {
        (0..config::WALL_SLICES).any(|i| self.slice_intact(i))
    }

    pub fn is_fully_destroyed(&self) -> bool {
        self.slice_health.iter().all(|&h| h <= 0.0)
    }

    /// All five mask bits open — the wall no longer blocks vision at all.
    pub fn is_fully_open(&self) -> bool {
        self.destruction_mask.iter().all(|&m| m)
    }

    fn refresh_mask(&mut self, index: usize) {
        if self.is_boundary {
            self.destruction_mask[index] = false;
            return;
        }
        let health = self.slice_health[index];
        self.destruction_mask[index] = if self.material.is_hard() {
            health <= 0.0
        } else {
            health / self.max_health <= config::SOFT_WALL_TRANSPARENT_RATIO
        };
    }

    pub fn to_state(&self) -> WallState {
        WallState {
            id: self.id.clone(),
            position: Vec2Payload {
                x: self.rect.x,
                y: self.rect.y,
            },
            width: self.rect.w,
            height: self.rect.h,
            orientation: self.orientation(),
            material: self.material,
            slice_health: self.slice_health.to_vec(),
            max_health: self.max_health,
            destruction_mask: self.destruction_mask.iter().map(|&m| m as u8).collect(),
        }
    }
}

// ─── Damage events ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DamageEvent {
    pub wall_id: String,
    pub slice_index: usize,
    pub position: DVec2,
    pub damage: f64,
    pub new_health: f64,
    pub is_destroyed: bool,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointHit {
    pub wall_id: String,
    pub slice_index: usize,
}

// ─── DestructionSystem ───────────────────────────────────────────────

/// Exclusive owner of the wall set. Everything else reads.
#[derive(Debug, Default)]
pub struct DestructionSystem {
    walls: HashMap<String, Wall>,
    /// Bumped on any mutation; vision caches key off this.
    version: u64,
}

impl DestructionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_walls(&mut self, walls: Vec<Wall>) {
        self.walls = walls.into_iter().map(|w| (w.id.clone(), w)).collect();
        self.version += 1;
    }

    pub fn get(&self, wall_id: &str) -> Option<&Wall> {
        self.walls.get(wall_id)
    }

    pub fn walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.values()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Point damage to one slice. No-op (returns `None`) on unknown wall,
    /// boundary wall, out-of-range slice, or an already-destroyed slice.
    pub fn apply_damage(
        &mut self,
        wall_id: &str,
        slice_index: usize,
        amount: f64,
        now: f64,
    ) -> Option<DamageEvent> {
        if slice_index >= config::WALL_SLICES {
            return None;
        }
        let wall = self.walls.get_mut(wall_id)?;
        if wall.is_boundary || wall.slice_health[slice_index] <= 0.0 {
            return None;
        }

        let new_health = (wall.slice_health[slice_index] - amount).max(0.0);
        let applied = wall.slice_health[slice_index] - new_health;
        wall.slice_health[slice_index] = new_health;
        wall.refresh_mask(slice_index);
        self.version += 1;

        Some(DamageEvent {
            wall_id: wall_id.to_string(),
            slice_index,
            position: self.walls[wall_id].slice_center(slice_index),
            damage: applied,
            new_health,
            is_destroyed: new_health <= 0.0,
            timestamp: now,
        })
    }

    /// Area damage: every slice whose center lies within `radius` of `center`
    /// takes `base_damage · (1 − d/radius)`. Wall candidates are pre-filtered
    /// by AABB distance.
    pub fn apply_explosion_damage(
        &mut self,
        center: DVec2,
        radius: f64,
        base_damage: f64,
        now: f64,
    ) -> Vec<DamageEvent> {
        if radius <= 0.0 {
            return Vec::new();
        }

        let candidates: Vec<String> = self
            .walls
            .values()
            .filter(|w| !w.is_boundary && w.rect.distance_to(center) <= radius)
            .map(|w| w.id.clone())
            .collect();

        let mut events = Vec::new();
        for wall_id in candidates {
            for i in 0..config::WALL_SLICES {
                let d = self.walls[&wall_id].slice_center(i).distance(center);
                if d > radius {
                    continue;
                }
                let damage = base_damage * (1.0 - d / radius);
                if let Some(event) = self.apply_damage(&wall_id, i, damage, now) {
                    events.push(event);
                }
            }
        }
        events
    }

    /// Which intact slice, if any, contains `pos`. Destroyed slices are empty
    /// space even while their neighbours stand.
    pub fn point_in_any(&self, pos: DVec2) -> Option<PointHit> {
        for wall in self.walls.values() {
            if !wall.rect.contains(pos) {
                continue;
            }
            let index = wall.slice_index(pos);
            if wall.slice_intact(index) {
                return Some(PointHit {
                    wall_id: wall.id.clone(),
                    slice_index: index,
                });
            }
        }
        None
    }

    /// Restore one slice, or the whole wall when `slice_index` is `None`.
    /// Returns false on unknown wall or out-of-range slice.
    pub fn repair(&mut self, wall_id: &str, slice_index: Option<usize>) -> bool {
        let wall = match self.walls.get_mut(wall_id) {
            Some(w) => w,
            None => return false,
        };
        match slice_index {
            Some(i) if i >= config::WALL_SLICES => return false,
            Some(i) => {
                wall.slice_health[i] = wall.max_health;
                wall.refresh_mask(i);
            }
            None => {
                for i in 0..config::WALL_SLICES {
                    wall.slice_health[i] = wall.max_health;
                    wall.refresh_mask(i);
                }
            }
        }
        self.version += 1;
        true
    }

    pub fn repair_all(&mut self) {
        let ids: Vec<String> = self.walls.keys().cloned().collect();
        for id in ids {
            self.repair(&id, None);
        }
    }
}

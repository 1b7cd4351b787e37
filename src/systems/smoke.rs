//! Smoke zones and flashbang effects, fed by the appropriate explosion kinds.

use glam::DVec2;

use crate::config;
use crate::msg::types::{SmokeZoneState, Vec2Payload};

// ─── Smoke ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmokeZone {
    pub id: u32,
    pub position: DVec2,
    pub radius: f64,
    pub created_at: f64,
    pub expires_at: f64,
}

impl SmokeZone {
    pub fn to_state(&self) -> SmokeZoneState {
        SmokeZoneState {
            id: self.id,
            position: Vec2Payload {
                x: self.position.x,
                y: self.position.y,
            },
            radius: self.radius,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct SmokeSystem {
    zones: Vec<SmokeZone>,
    next_id: u32,
}

impl SmokeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_zone(&mut self, position: DVec2, radius: f64, now: f64) -> &SmokeZone {
        self.next_id += 1;
        self.zones.push(SmokeZone {
            id: self.next_id,
            position,
            radius,
            created_at: now,
            expires_at: now + config::SMOKE_DURATION_MS,
        });
        self.zones.last().unwrap()
    }

    /// Age out expired zones. Call once per tick.
    pub fn update(&mut self, now: f64) {
        self.zones.retain(|z| z.expires_at > now);
    }

    pub fn states(&self) -> Vec<SmokeZoneState> {
        self.zones.iter().map(|z| z.to_state()).collect()
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }
}

// ─── Flash ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct FlashViewer {
    pub id: u32,
    pub position: DVec2,
    pub rotation: f64,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FlashHit {
    pub player_id: u32,
    pub intensity: f64,
    pub duration_ms: f64,
}

/// Flash strength per viewer: linear distance falloff scaled by how directly
/// the viewer faces the detonation (a minimum leaks through even looking
/// away). Dead players are skipped.
pub fn compute_flash_effects(
    center: DVec2,
    radius: f64,
    viewers: &[FlashViewer],
) -> Vec<FlashHit> {
    let mut hits = Vec::new();
    for viewer in viewers {
        if !viewer.alive {
            continue;
        }
        let offset = center - viewer.position;
        let d = offset.length();
        if d >= radius {
            continue;
        }

        let facing = if d > 1e-9 {
            let to_flash = offset / d;
            let view_dir = DVec2::from_angle(viewer.rotation);
            ((view_dir.dot(to_flash) + 1.0) / 2.0).max(config::FLASH_MIN_FACING_FACTOR)
        } else {
            1.0 // standing on it
        };

        let intensity = (1.0 - d / radius) * facing;
        if intensity <= 0.0 {
            continue;
        }
        hits.push(FlashHit {
            player_id: viewer.id,
            intensity,
            duration_ms: intensity * config::FLASH_MAX_DURATION_MS,
        });
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_zones_expire() {
        let mut smoke = SmokeSystem::new();
        smoke.create_zone(DVec2::new(100.0, 100.0), config::SMOKE_RADIUS, 0.0);
        assert_eq!(smoke.states().len(), 1);

        smoke.update(config::SMOKE_DURATION_MS - 1.0);
        assert_eq!(smoke.states().len(), 1);

        smoke.update(config::SMOKE_DURATION_MS);
        assert!(smoke.states().is_empty());
    }

    #[test]
    fn facing_the_flash_hurts_more() {
        let center = DVec2::new(100.0, 0.0);
        let viewers = [
            FlashViewer {
                id: 1,
                position: DVec2::new(80.0, 0.0),
                rotation: 0.0, // looking straight at it
                alive: true,
            },
            FlashViewer {
                id: 2,
                position: DVec2::new(80.0, 0.0),
                rotation: std::f64::consts::PI, // back turned
                alive: true,
            },
        ];
        let hits = compute_flash_effects(center, 50.0, &viewers);
        assert_eq!(hits.len(), 2);
        let facing = hits.iter().find(|h| h.player_id == 1).unwrap();
        let away = hits.iter().find(|h| h.player_id == 2).unwrap();
        assert!(facing.intensity > away.intensity);
        // The minimum facing factor still leaks through
        let expected_away = (1.0 - 20.0 / 50.0) * config::FLASH_MIN_FACING_FACTOR;
        assert!((away.intensity - expected_away).abs() < 1e-9);
        assert!(facing.duration_ms > away.duration_ms);
    }

    #[test]
    fn flash_skips_dead_and_distant_viewers() {
        let center = DVec2::ZERO;
        let viewers = [
            FlashViewer {
                id: 1,
                position: DVec2::new(10.0, 0.0),
                rotation: 0.0,
                alive: false,
            },
            FlashViewer {
                id: 2,
                position: DVec2::new(500.0, 0.0),
                rotation: 0.0,
                alive: true,
            },
        ];
        assert!(compute_flash_effects(center, 50.0, &viewers).is_empty());
    }
}

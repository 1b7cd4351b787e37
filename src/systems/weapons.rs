//! Weapon policy: ammunition, fire-rate, reload, heat, spread, damage
//! falloff, and hitscan resolution.
//!
//! This module is stateless policy over caller-owned state: `Weapon`
//! instances live inside players, wall state lives in the destruction
//! system, and every operation here returns data for the orchestrator
//! to route.

use std::collections::HashSet;

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::game::player::MovementState;
use crate::systems::destruction::DestructionSystem;
use crate::systems::geom::{ray_aabb, ray_circle};
use crate::systems::projectiles::ProjectileKind;

// ─── Weapon types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponType {
    Rifle = 0,
    Shotgun = 1,
    MachineGun = 2,
    AntiMaterialRifle = 3,
    Pistol = 4,
    RocketLauncher = 5,
    GrenadeLauncher = 6,
    FragGrenade = 7,
    SmokeGrenade = 8,
    FlashGrenade = 9,
}

impl WeaponType {
    /// Stable string key, matching the wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            WeaponType::Rifle => "rifle",
            WeaponType::Shotgun => "shotgun",
            WeaponType::MachineGun => "machineGun",
            WeaponType::AntiMaterialRifle => "antiMaterialRifle",
            WeaponType::Pistol => "pistol",
            WeaponType::RocketLauncher => "rocketLauncher",
            WeaponType::GrenadeLauncher => "grenadeLauncher",
            WeaponType::FragGrenade => "fragGrenade",
            WeaponType::SmokeGrenade => "smokeGrenade",
            WeaponType::FlashGrenade => "flashGrenade",
        }
    }
}

/// How a trigger pull turns into world effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    Hitscan,
    Projectile(ProjectileKind),
    Thrown(ProjectileKind),
}

// ─── Weapon configuration ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WeaponConfig {
    pub weapon_type: WeaponType,
    pub name: &'static str,
    pub damage: f64,
    pub fire_rate_rpm: f64,
    pub reload_time_ms: f64,
    pub magazine_size: u32,
    pub reserve_size: u32,
    pub range: f64,
    /// Base accuracy in [0, 1]; 1.0 is laser-straight.
    pub accuracy: f64,
    pub mode: FireMode,
    pub pellet_count: Option<u32>,
    pub explosion_radius: Option<f64>,
    pub projectile_speed: Option<f64>,
    pub fuse_time_ms: Option<f64>,
    pub uses_heat: bool,
}

impl WeaponConfig {
    pub fn is_thrown(&self) -> bool {
        matches!(self.mode, FireMode::Thrown(_))
    }

    /// Minimum interval between shots.
    pub fn fire_interval_ms(&self) -> f64 {
        60_000.0 / self.fire_rate_rpm
    }
}

pub static WEAPON_CONFIGS: [WeaponConfig; 10] = [
    WeaponConfig {
        weapon_type: WeaponType::Rifle,
        name: "Rifle",
        damage: 25.0,
        fire_rate_rpm: 600.0,
        reload_time_ms: 2_000.0,
        magazine_size: 30,
        reserve_size: 90,
        range: 300.0,
        accuracy: 0.85,
        mode: FireMode::Hitscan,
        pellet_count: None,
        explosion_radius: None,
        projectile_speed: None,
        fuse_time_ms: None,
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::Shotgun,
        name: "Shotgun",
        damage: 60.0,
        fire_rate_rpm: 70.0,
        reload_time_ms: 2_800.0,
        magazine_size: 6,
        reserve_size: 24,
        range: 120.0,
        accuracy: 0.7,
        mode: FireMode::Hitscan,
        pellet_count: Some(config::SHOTGUN_PELLET_COUNT),
        explosion_radius: None,
        projectile_speed: None,
        fuse_time_ms: None,
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::MachineGun,
        name: "Machine Gun",
        damage: 18.0,
        fire_rate_rpm: 900.0,
        reload_time_ms: 4_000.0,
        magazine_size: 100,
        reserve_size: 200,
        range: 280.0,
        accuracy: 0.75,
        mode: FireMode::Hitscan,
        pellet_count: None,
        explosion_radius: None,
        projectile_speed: None,
        fuse_time_ms: None,
        uses_heat: true,
    },
    WeaponConfig {
        weapon_type: WeaponType::AntiMaterialRifle,
        name: "Anti-Material Rifle",
        damage: 120.0,
        fire_rate_rpm: 30.0,
        reload_time_ms: 3_500.0,
        magazine_size: 5,
        reserve_size: 15,
        range: 480.0,
        accuracy: 0.95,
        mode: FireMode::Hitscan,
        pellet_count: None,
        explosion_radius: None,
        projectile_speed: None,
        fuse_time_ms: None,
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::Pistol,
        name: "Pistol",
        damage: 15.0,
        fire_rate_rpm: 300.0,
        reload_time_ms: 1_500.0,
        magazine_size: 12,
        reserve_size: 48,
        range: 200.0,
        accuracy: 0.8,
        mode: FireMode::Hitscan,
        pellet_count: None,
        explosion_radius: None,
        projectile_speed: None,
        fuse_time_ms: None,
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::RocketLauncher,
        name: "Rocket Launcher",
        damage: 80.0,
        fire_rate_rpm: 40.0,
        reload_time_ms: 3_000.0,
        magazine_size: 1,
        reserve_size: 4,
        range: 400.0,
        accuracy: 0.9,
        mode: FireMode::Projectile(ProjectileKind::Rocket),
        pellet_count: None,
        explosion_radius: Some(40.0),
        projectile_speed: Some(250.0),
        fuse_time_ms: None,
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::GrenadeLauncher,
        name: "Grenade Launcher",
        damage: 50.0,
        fire_rate_rpm: 60.0,
        reload_time_ms: 2_500.0,
        magazine_size: 4,
        reserve_size: 12,
        range: 250.0,
        accuracy: 0.85,
        mode: FireMode::Projectile(ProjectileKind::LaunchedGrenade),
        pellet_count: None,
        explosion_radius: Some(35.0),
        projectile_speed: Some(180.0),
        fuse_time_ms: Some(2_000.0),
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::FragGrenade,
        name: "Frag Grenade",
        damage: 100.0,
        fire_rate_rpm: 60.0,
        reload_time_ms: 0.0,
        magazine_size: 3,
        reserve_size: 0,
        range: 200.0,
        accuracy: 1.0,
        mode: FireMode::Thrown(ProjectileKind::Grenade),
        pellet_count: None,
        explosion_radius: Some(40.0),
        projectile_speed: None,
        fuse_time_ms: Some(config::FUSE_TIME_MS),
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::SmokeGrenade,
        name: "Smoke Grenade",
        damage: 0.0,
        fire_rate_rpm: 60.0,
        reload_time_ms: 0.0,
        magazine_size: 2,
        reserve_size: 0,
        range: 200.0,
        accuracy: 1.0,
        mode: FireMode::Thrown(ProjectileKind::Smoke),
        pellet_count: None,
        explosion_radius: Some(config::SMOKE_RADIUS),
        projectile_speed: None,
        fuse_time_ms: Some(2_000.0),
        uses_heat: false,
    },
    WeaponConfig {
        weapon_type: WeaponType::FlashGrenade,
        name: "Flash Grenade",
        damage: 0.0,
        fire_rate_rpm: 60.0,
        reload_time_ms: 0.0,
        magazine_size: 2,
        reserve_size: 0,
        range: 200.0,
        accuracy: 1.0,
        mode: FireMode::Thrown(ProjectileKind::Flash),
        pellet_count: None,
        explosion_radius: Some(50.0),
        projectile_speed: None,
        fuse_time_ms: Some(1_500.0),
        uses_heat: false,
    },
];

pub fn get_weapon_config(weapon_type: WeaponType) -> &'static WeaponConfig {
    &WEAPON_CONFIGS[weapon_type as usize]
}

// ─── Weapon instance state ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Weapon {
    pub weapon_type: WeaponType,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
    pub is_reloading: bool,
    pub reload_complete_at: Option<f64>,
    pub last_fire_time: f64,
    pub heat_level: f64,
    pub is_overheated: bool,
    pub overheat_until: Option<f64>,
}

impl Weapon {
    pub fn new(weapon_type: WeaponType) -> Self {
        let cfg = get_weapon_config(weapon_type);
        Self {
            weapon_type,
            current_ammo: cfg.magazine_size,
            reserve_ammo: cfg.reserve_size,
            is_reloading: false,
            reload_complete_at: None,
            last_fire_time: f64::NEG_INFINITY,
            heat_level: 0.0,
            is_overheated: false,
            overheat_until: None,
        }
    }

    pub fn config(&self) -> &'static WeaponConfig {
        get_weapon_config(self.weapon_type)
    }
}

// ─── Gate results ────────────────────────────────────────────────────

/// Typed deny reason for every weapon gate. Denied operations mutate
/// nothing and emit no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponDeny {
    Reloading,
    EmptyMagazine,
    Overheated,
    RateGated,
    TimestampSkew,
    NotThrowable,
    CannotReload,
    MagazineFull,
    NoReserve,
    MissingWeapon,
    BadChargeLevel,
}

impl std::fmt::Display for WeaponDeny {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reloading => "reloading",
            Self::EmptyMagazine => "empty magazine",
            Self::Overheated => "overheated",
            Self::RateGated => "fire rate",
            Self::TimestampSkew => "timestamp skew",
            Self::NotThrowable => "not a throwable",
            Self::CannotReload => "cannot reload",
            Self::MagazineFull => "magazine full",
            Self::NoReserve => "no reserve ammo",
            Self::MissingWeapon => "missing weapon",
            Self::BadChargeLevel => "bad charge level",
        };
        f.write_str(s)
    }
}

// ─── Fire / reload / throw gates ─────────────────────────────────────

/// The single authoritative fire gate. Any input-side check is an
/// early-out only and must defer to this decision.
pub fn try_fire(weapon: &mut Weapon, now: f64, client_timestamp: f64) -> Result<(), WeaponDeny> {
    if weapon.is_reloading {
        return Err(WeaponDeny::Reloading);
    }
    if weapon.current_ammo == 0 {
        return Err(WeaponDeny::EmptyMagazine);
    }
    if weapon.is_overheated {
        return Err(WeaponDeny::Overheated);
    }
    if (now - client_timestamp).abs() > config::FIRE_TIMESTAMP_TOLERANCE_MS {
        return Err(WeaponDeny::TimestampSkew);
    }
    if now - weapon.last_fire_time < weapon.config().fire_interval_ms() {
        return Err(WeaponDeny::RateGated);
    }

    weapon.current_ammo -= 1;
    weapon.last_fire_time = now;

    if weapon.config().uses_heat {
        weapon.heat_level += config::HEAT_GAIN_PER_SHOT;
        if weapon.heat_level >= config::OVERHEAT_THRESHOLD {
            weapon.heat_level = config::OVERHEAT_THRESHOLD;
            weapon.is_overheated = true;
            weapon.overheat_until = Some(now + config::OVERHEAT_PENALTY_MS);
        }
    }
    Ok(())
}

pub fn try_reload(weapon: &mut Weapon, now: f64) -> Result<(), WeaponDeny> {
    let cfg = weapon.config();
    if cfg.is_thrown() {
        return Err(WeaponDeny::CannotReload);
    }
    if weapon.is_reloading {
        return Err(WeaponDeny::Reloading);
    }
    if weapon.current_ammo >= cfg.magazine_size {
        return Err(WeaponDeny::MagazineFull);
    }
    if weapon.reserve_ammo == 0 {
        return Err(WeaponDeny::NoReserve);
    }

    weapon.is_reloading = true;
    weapon.reload_complete_at = Some(now + cfg.reload_time_ms);
    Ok(())
}

/// Finish a pending reload. Idempotent: completing an already-completed
/// weapon is a no-op returning false.
pub fn complete_reload(weapon: &mut Weapon) -> bool {
    if !weapon.is_reloading {
        return false;
    }
    let cfg = weapon.config();
    let deficit = cfg.magazine_size - weapon.current_ammo;
    let transfer = deficit.min(weapon.reserve_ammo);
    weapon.current_ammo += transfer;
    weapon.reserve_ammo -= transfer;
    weapon.is_reloading = false;
    weapon.reload_complete_at = None;
    true
}

pub fn try_throw(weapon: &mut Weapon, now: f64, charge_level: u8) -> Result<(), WeaponDeny> {
    if !weapon.config().is_thrown() {
        return Err(WeaponDeny::NotThrowable);
    }
    if weapon.current_ammo == 0 {
        return Err(WeaponDeny::EmptyMagazine);
    }
    if charge_level == 0 || charge_level > config::CHARGE_LEVELS {
        return Err(WeaponDeny::BadChargeLevel);
    }
    if now - weapon.last_fire_time < weapon.config().fire_interval_ms() {
        return Err(WeaponDeny::RateGated);
    }

    weapon.current_ammo -= 1;
    weapon.last_fire_time = now;
    Ok(())
}

/// What per-tick upkeep did to a weapon.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeaponTickResult {
    pub reload_completed: bool,
    pub heat_reset: bool,
}

/// Deferred timers, applied coherently at tick boundaries: reload
/// completion, overheat penalty expiry, passive cooling.
pub fn tick_weapon(weapon: &mut Weapon, now: f64, dt_ms: f64) -> WeaponTickResult {
    let mut result = WeaponTickResult::default();

    if let Some(at) = weapon.reload_complete_at {
        if now >= at {
            result.reload_completed = complete_reload(weapon);
        }
    }

    if weapon.is_overheated {
        if let Some(until) = weapon.overheat_until {
            if now >= until {
                weapon.is_overheated = false;
                weapon.overheat_until = None;
                weapon.heat_level = config::OVERHEAT_THRESHOLD * 0.5;
                result.heat_reset = true;
            }
        }
    } else if weapon.heat_level > 0.0 {
        weapon.heat_level =
            (weapon.heat_level - config::HEAT_COOLDOWN_RATE * dt_ms / 1000.0).max(0.0);
    }

    result
}

// ─── Accuracy & spread ───────────────────────────────────────────────

pub fn effective_accuracy(base: f64, is_ads: bool, movement: MovementState) -> f64 {
    let mut acc = base;
    if is_ads {
        acc += config::ADS_ACCURACY_BONUS;
    }
    if matches!(
        movement,
        MovementState::Walking | MovementState::Running | MovementState::Sneaking
    ) {
        acc -= config::MOVEMENT_ACCURACY_PENALTY;
    }
    if movement == MovementState::Running {
        acc -= config::RUNNING_ACCURACY_PENALTY;
    }
    acc.clamp(0.1, 1.0)
}

pub fn apply_spread(direction: f64, accuracy: f64, rng: &mut impl Rng) -> f64 {
    direction + (rng.gen::<f64>() - 0.5) * config::SPREAD_MAX_RADIANS * (1.0 - accuracy)
}

// ─── Damage falloff ──────────────────────────────────────────────────

/// Full damage up to `range · DAMAGE_FALLOFF_START`, then linear decay to
/// `damage · DAMAGE_FALLOFF_MIN` at `range`.
pub fn damage_falloff(damage: f64, distance: f64, range: f64) -> f64 {
    let start = range * config::DAMAGE_FALLOFF_START;
    if distance <= start {
        return damage;
    }
    let t = ((distance - start) / (range - start)).clamp(0.0, 1.0);
    damage * (1.0 - t * (1.0 - config::DAMAGE_FALLOFF_MIN))
}

/// Stepped shotgun falloff table; past the last step the last multiplier holds.
pub fn shotgun_falloff(damage: f64, distance: f64) -> f64 {
    for (i, &r) in config::SHOTGUN_FALLOFF_RANGES.iter().enumerate() {
        if distance <= r {
            return damage * config::SHOTGUN_FALLOFF_MULTIPLIERS[i];
        }
    }
    damage * config::SHOTGUN_FALLOFF_MULTIPLIERS[config::SHOTGUN_FALLOFF_MULTIPLIERS.len() - 1]
}

/// Explosion damage to players: `damage · (1 − d/r)^EXPLOSION_FALLOFF_POWER`.
pub fn explosion_damage(base: f64, distance: f64, radius: f64) -> f64 {
    if distance >= radius || radius <= 0.0 {
        return 0.0;
    }
    base * (1.0 - distance / radius).powf(config::EXPLOSION_FALLOFF_POWER)
}

// ─── Hitscan ─────────────────────────────────────────────────────────

/// Live, non-shooter player exposed to ray queries.
#[derive(Debug, Clone, Copy)]
pub struct HitscanTarget {
    pub id: u32,
    pub position: DVec2,
}

#[derive(Debug, Clone)]
pub enum HitscanHit {
    Wall {
        wall_id: String,
        slice_index: usize,
        damage: f64,
        position: DVec2,
    },
    Player {
        player_id: u32,
        damage: f64,
        position: DVec2,
    },
}

#[derive(Debug, Clone)]
pub struct HitscanOutcome {
    /// Ordered along the ray.
    pub hits: Vec<HitscanHit>,
    pub end_point: DVec2,
}

enum ContactKind {
    Wall {
        wall_id: String,
        slice_index: usize,
        is_soft: bool,
        slice_health: f64,
        exit_t: f64,
    },
    Player {
        id: u32,
    },
}

struct Contact {
    t: f64,
    point: DVec2,
    kind: ContactKind,
}

/// Nearest interaction along the ray: any intact slice of any wall (the
/// union-of-intact-slice-AABBs rule — destroyed slices never stop a ray,
/// damaged-but-intact slices always do), or any target player circle.
fn nearest_contact(
    origin: DVec2,
    dir: DVec2,
    max_t: f64,
    walls: &DestructionSystem,
    targets: &[HitscanTarget],
) -> Option<Contact> {
    let mut best: Option<Contact> = None;

    for wall in walls.walls() {
        if !wall.has_intact_slice() {
            continue;
        }
        // Cheap whole-wall reject before per-slice tests
        if ray_aabb(origin, dir, &wall.rect).is_none() {
            continue;
        }
        for i in 0..config::WALL_SLICES {
            if !wall.slice_intact(i) {
                continue;
            }
            if let Some((t_in, t_out)) = ray_aabb(origin, dir, &wall.slice_rect(i)) {
                // A slice fully behind the cursor (t_out ≤ 0) is one the ray
                // already left; a penetrating ray re-cast from just inside
                // the next slice must still contact it, at t = 0.
                if t_out <= 1e-6 {
                    continue;
                }
                let t = t_in.max(0.0);
                if t > max_t {
                    continue;
                }
                if best.as_ref().map(|b| t < b.t).unwrap_or(true) {
                    best = Some(Contact {
                        t,
                        point: origin + dir * t,
                        kind: ContactKind::Wall {
                            wall_id: wall.id.clone(),
                            slice_index: i,
                            is_soft: !wall.material.is_hard(),
                            slice_health: wall.slice_health[i],
                            exit_t: t_out,
                        },
                    });
                }
            }
        }
    }

    let player_radius = config::PLAYER_SIZE / 2.0;
    for target in targets {
        if let Some(t) = ray_circle(origin, dir, target.position, player_radius) {
            if t <= 1e-6 || t > max_t {
                continue;
            }
            if best.as_ref().map(|b| t < b.t).unwrap_or(true) {
                best = Some(Contact {
                    t,
                    point: origin + dir * t,
                    kind: ContactKind::Player { id: target.id },
                });
            }
        }
    }

    best
}

/// Standard bullet: penetrates soft walls at `SOFT_WALL_PENETRATION_DAMAGE`
/// per slice (bounded by that slice's remaining health), stops at hard walls
/// and at the first player.
pub fn hitscan_standard(
    origin: DVec2,
    direction: f64,
    damage: f64,
    range: f64,
    walls: &DestructionSystem,
    targets: &[HitscanTarget],
) -> HitscanOutcome {
    let dir = DVec2::from_angle(direction);
    let mut hits = Vec::new();
    let mut remaining = damage;
    let mut cursor = origin;
    let mut traveled = 0.0;

    for _ in 0..config::PENETRATION_SAFETY_CAP {
        let max_t = range - traveled;
        if max_t <= 0.0 {
            break;
        }
        let contact = match nearest_contact(cursor, dir, max_t, walls, targets) {
            Some(c) => c,
            None => {
                return HitscanOutcome {
                    hits,
                    end_point: cursor + dir * max_t,
                };
            }
        };

        match contact.kind {
            ContactKind::Player { id } => {
                hits.push(HitscanHit::Player {
                    player_id: id,
                    damage: damage_falloff(remaining, traveled + contact.t, range),
                    position: contact.point,
                });
                return HitscanOutcome {
                    hits,
                    end_point: contact.point,
                };
            }
            ContactKind::Wall {
                wall_id,
                slice_index,
                is_soft,
                slice_health,
                exit_t,
            } => {
                let cost = config::SOFT_WALL_PENETRATION_DAMAGE.min(slice_health);
                if is_soft && remaining >= cost {
                    // Pay the toll, punch through, keep going past the slice.
                    remaining -= cost;
                    hits.push(HitscanHit::Wall {
                        wall_id,
                        slice_index,
                        damage: cost,
                        position: contact.point,
                    });
                    let advance = exit_t + config::PENETRATION_ADVANCE;
                    cursor += dir * advance;
                    traveled += advance;
                } else {
                    hits.push(HitscanHit::Wall {
                        wall_id,
                        slice_index,
                        damage: remaining,
                        position: contact.point,
                    });
                    return HitscanOutcome {
                        hits,
                        end_point: contact.point,
                    };
                }
            }
        }
    }

    let end_point = cursor;
    HitscanOutcome { hits, end_point }
}

/// Anti-material round: punches through up to `ANTI_MATERIAL_MAX_WALLS`
/// walls of any material and `ANTI_MATERIAL_MAX_PLAYERS` players, hard-capped
/// at `MAX_PENETRATIONS` total; each penetration scales the remaining damage
/// by the next entry of the loss table.
pub fn hitscan_anti_material(
    origin: DVec2,
    direction: f64,
    damage: f64,
    range: f64,
    walls: &DestructionSystem,
    targets: &[HitscanTarget],
) -> HitscanOutcome {
    let dir = DVec2::from_angle(direction);
    let mut hits = Vec::new();
    let mut remaining = damage;
    let mut cursor = origin;
    let mut traveled = 0.0;
    let mut walls_pierced = 0usize;
    let mut players_pierced = 0usize;
    let mut total = 0usize;
    let mut hit_players: HashSet<u32> = HashSet::new();

    for _ in 0..config::PENETRATION_SAFETY_CAP {
        let max_t = range - traveled;
        if max_t <= 0.0 {
            break;
        }
        let live_targets: Vec<HitscanTarget> = targets
            .iter()
            .filter(|t| !hit_players.contains(&t.id))
            .copied()
            .collect();
        let contact = match nearest_contact(cursor, dir, max_t, walls, &live_targets) {
            Some(c) => c,
            None => {
                return HitscanOutcome {
                    hits,
                    end_point: cursor + dir * max_t,
                };
            }
        };

        let advance_t = match contact.kind {
            ContactKind::Player { id } => {
                hit_players.insert(id);
                hits.push(HitscanHit::Player {
                    player_id: id,
                    damage: damage_falloff(remaining, traveled + contact.t, range),
                    position: contact.point,
                });
                if players_pierced >= config::ANTI_MATERIAL_MAX_PLAYERS
                    || total >= config::MAX_PENETRATIONS
                {
                    return HitscanOutcome {
                        hits,
                        end_point: contact.point,
                    };
                }
                players_pierced += 1;
                contact.t + config::PENETRATION_ADVANCE
            }
            ContactKind::Wall {
                wall_id,
                slice_index,
                exit_t,
                ..
            } => {
                hits.push(HitscanHit::Wall {
                    wall_id,
                    slice_index,
                    damage: remaining,
                    position: contact.point,
                });
                if walls_pierced >= config::ANTI_MATERIAL_MAX_WALLS
                    || total >= config::MAX_PENETRATIONS
                {
                    return HitscanOutcome {
                        hits,
                        end_point: contact.point,
                    };
                }
                walls_pierced += 1;
                exit_t + config::PENETRATION_ADVANCE
            }
        };

        remaining *= config::ANTI_MATERIAL_DAMAGE_LOSS[total.min(
            config::ANTI_MATERIAL_DAMAGE_LOSS.len() - 1,
        )];
        total += 1;
        cursor += dir * advance_t;
        traveled += advance_t;
    }

    let end_point = cursor;
    HitscanOutcome { hits, end_point }
}

/// One shotgun blast: `pellet_count` independent single-hit rays from an
/// origin pushed clear of the shooter's own hitbox, each with uniform spread
/// and a stepped falloff on its hit distance.
pub fn fire_shotgun(
    shooter_pos: DVec2,
    direction: f64,
    weapon_damage: f64,
    range: f64,
    walls: &DestructionSystem,
    targets: &[HitscanTarget],
    rng: &mut impl Rng,
) -> Vec<HitscanOutcome> {
    let pellet_count = config::SHOTGUN_PELLET_COUNT;
    let pellet_damage = weapon_damage / pellet_count as f64;
    let aim = DVec2::from_angle(direction);
    let origin = shooter_pos + aim * (config::PLAYER_SIZE / 2.0 + 2.0);

    (0..pellet_count)
        .map(|_| {
            let angle =
                direction + (rng.gen::<f64>() - 0.5) * 2.0 * config::SHOTGUN_SPREAD_RADIANS;
            let dir = DVec2::from_angle(angle);
            match nearest_contact(origin, dir, range, walls, targets) {
                None => HitscanOutcome {
                    hits: Vec::new(),
                    end_point: origin + dir * range,
                },
                Some(contact) => {
                    let hit = match contact.kind {
                        ContactKind::Player { id } => HitscanHit::Player {
                            player_id: id,
                            damage: shotgun_falloff(pellet_damage, contact.t),
                            position: contact.point,
                        },
                        ContactKind::Wall {
                            wall_id,
                            slice_index,
                            ..
                        } => HitscanHit::Wall {
                            wall_id,
                            slice_index,
                            damage: shotgun_falloff(pellet_damage, contact.t),
                            position: contact.point,
                        },
                    };
                    HitscanOutcome {
                        hits: vec![hit],
                        end_point: contact.point,
                    }
                }
            }
        })
        .collect()
}

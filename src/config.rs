#![allow(dead_code)]
/// All tunables for the game core. Times are milliseconds on the room clock
/// unless a name says otherwise; distances are playfield pixels.

pub const PORT: u16 = 8777;
pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PLAYERS: usize = 8;

// Playfield
pub const GAME_WIDTH: f64 = 480.0;
pub const GAME_HEIGHT: f64 = 270.0;
/// Anything this far outside the field is a runaway projectile.
pub const SENTINEL_BOUND: f64 = 1000.0;

// Tick / broadcast
pub const TICK_RATE: u32 = 60;
pub const NETWORK_RATE: u32 = 20;

// Player
pub const PLAYER_SIZE: f64 = 10.0; // diameter; collision radius is half
pub const PLAYER_HEALTH: f64 = 100.0;
pub const WALK_SPEED: f64 = 70.0; // px/sec
pub const RUN_SPEED_MULTIPLIER: f64 = 1.6;
pub const SNEAK_SPEED_MULTIPLIER: f64 = 0.5;
pub const MAX_INPUT_BUFFER_SIZE: usize = 10;

// Input validation
pub const INPUT_TIMESTAMP_TOLERANCE_MS: f64 = 5_000.0;
pub const INPUT_SEQUENCE_SLACK: u32 = 10;
pub const FIRE_TIMESTAMP_TOLERANCE_MS: f64 = 1_000.0;

// Rate budgets (per peer, per second)
pub const INPUT_RATE_LIMIT: u32 = 60;
pub const WEAPON_RATE_LIMIT: u32 = 10;

// Destruction
pub const WALL_SLICES: usize = 5;
pub const SLICE_HEALTH: f64 = 100.0; // base, before material multiplier
pub const CONCRETE_HEALTH_MULTIPLIER: f64 = 1.5;
pub const WOOD_HEALTH_MULTIPLIER: f64 = 0.8;
pub const METAL_HEALTH_MULTIPLIER: f64 = 2.0;
pub const GLASS_HEALTH_MULTIPLIER: f64 = 0.3;
/// A slice with health above this still stops bullets and players,
/// whatever its vision mask says.
pub const INTACT_EPSILON: f64 = 0.01;
/// Soft materials go see-through at or below this health fraction.
pub const SOFT_WALL_TRANSPARENT_RATIO: f64 = 0.5;
pub const SOFT_WALL_PENETRATION_DAMAGE: f64 = 10.0;

// Combat
pub const ADS_ACCURACY_BONUS: f64 = 0.3;
pub const MOVEMENT_ACCURACY_PENALTY: f64 = 0.25;
pub const RUNNING_ACCURACY_PENALTY: f64 = 0.2;
pub const SPREAD_MAX_RADIANS: f64 = 0.2;
pub const DAMAGE_FALLOFF_START: f64 = 0.6; // fraction of range at full damage
pub const DAMAGE_FALLOFF_MIN: f64 = 0.4; // damage multiplier at max range
pub const EXPLOSION_FALLOFF_POWER: f64 = 1.5;
pub const MAX_PENETRATIONS: usize = 5;
pub const PENETRATION_SAFETY_CAP: usize = 20;
/// Nudge past a surface before re-casting a penetrating ray.
pub const PENETRATION_ADVANCE: f64 = 0.5;
pub const SHOTGUN_PELLET_COUNT: u32 = 8;
pub const SHOTGUN_SPREAD_RADIANS: f64 = 0.18;
pub const SHOTGUN_FALLOFF_RANGES: [f64; 3] = [40.0, 80.0, 120.0];
pub const SHOTGUN_FALLOFF_MULTIPLIERS: [f64; 3] = [1.0, 0.6, 0.3];
/// Remaining-damage multiplier after each anti-material penetration.
pub const ANTI_MATERIAL_DAMAGE_LOSS: [f64; 5] = [0.8, 0.65, 0.5, 0.4, 0.3];
pub const ANTI_MATERIAL_MAX_WALLS: usize = 3;
pub const ANTI_MATERIAL_MAX_PLAYERS: usize = 2;

// Machine-gun heat
pub const HEAT_GAIN_PER_SHOT: f64 = 4.0;
pub const OVERHEAT_THRESHOLD: f64 = 100.0;
pub const OVERHEAT_PENALTY_MS: f64 = 3_000.0;
pub const HEAT_COOLDOWN_RATE: f64 = 25.0; // per second while not overheated

// Vision
pub const VIEW_ANGLE: f64 = 2.0 * std::f64::consts::PI / 3.0; // 120 degrees
pub const VIEW_DISTANCE: f64 = 150.0;
pub const TILE_SIZE: f64 = 8.0;
pub const FOG_OPACITY: f64 = 0.85;
/// Force rays just past either side of an occluder corner.
pub const CORNER_ANGLE_EPSILON: f64 = 1e-4;
/// Max angular gap between samples on the view arc.
pub const ARC_STEP_RADIANS: f64 = 10.0 * std::f64::consts::PI / 180.0;
pub const VISION_ENABLED: bool = true;

// Grenades
pub const GRENADE_RADIUS: f64 = 2.0;
pub const GROUND_FRICTION: f64 = 0.35; // per-second multiplicative decay base
pub const BOUNCE_DAMPING: f64 = 0.7;
pub const WALL_FRICTION: f64 = 0.85;
pub const MIN_BOUNCE_SPEED: f64 = 15.0;
/// Below this the grenade stops moving; one tick later it is stuck.
pub const GRENADE_REST_SPEED: f64 = 2.0;
pub const GRENADE_COLLISION_COOLDOWN_MS: f64 = 200.0;
pub const FUSE_TIME_MS: f64 = 3_000.0;
pub const CHARGE_LEVELS: u8 = 3;
pub const CHARGE_SPEED_MULTIPLIERS: [f64; 3] = [0.6, 1.0, 1.4];
pub const GRENADE_THROW_SPEED: f64 = 120.0;

// Smoke / flash
pub const SMOKE_DURATION_MS: f64 = 10_000.0;
pub const SMOKE_RADIUS: f64 = 35.0;
pub const FLASH_MAX_DURATION_MS: f64 = 2_500.0;
pub const FLASH_MIN_FACING_FACTOR: f64 = 0.2;

// Death & respawn
pub const RESPAWN_DELAY_MS: f64 = 3_000.0;
pub const INVULNERABILITY_MS: f64 = 2_000.0;
pub const RED_SPAWN_FALLBACK: (f64, f64) = (50.0, 135.0);
pub const BLUE_SPAWN_FALLBACK: (f64, f64) = (430.0, 135.0);

// Debug
pub const DEBUG_COMMANDS: bool = true;
pub const MAP_FILE: &str = "map.json";

#![allow(dead_code)]
//! Weapon and combat payloads (0x20-0x44).

use serde::{Deserialize, Serialize};

use super::types::Vec2Payload;
use crate::game::player::Team;
use crate::systems::destruction::Material;
use crate::systems::projectiles::ProjectileKind;
use crate::systems::weapons::WeaponType;

/// What actually hurt someone, for kill feeds and hit markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageKind {
    Bullet,
    Pellet,
    Explosion,
}

// ─── Requests (peer → core) ─────────────────────────────────────────

/// C->S 0x20. Position and direction are advisory; the server fires from its
/// own authoritative player state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponFireRequest {
    pub weapon_type: WeaponType,
    pub position: Vec2Payload,
    pub direction: f64,
    pub is_ads: bool,
    pub timestamp: f64,
    pub sequence: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponReloadRequest {
    pub weapon_type: WeaponType,
    pub timestamp: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponSwitchRequest {
    pub from_weapon: WeaponType,
    pub to_weapon: WeaponType,
    pub timestamp: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrenadeThrowRequest {
    pub position: Vec2Payload,
    pub direction: f64,
    pub charge_level: u8,
    pub timestamp: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRepairRequest {
    pub wall_id: Option<String>,
    pub slice_index: Option<usize>,
}

// ─── Weapon events (core → peers) ───────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponFiredPayload {
    pub player_id: u32,
    pub weapon_type: WeaponType,
    pub position: Vec2Payload,
    pub direction: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponHitPayload {
    pub player_id: u32,
    pub weapon_type: WeaponType,
    /// "player" or "wall".
    pub target_kind: &'static str,
    pub target_id: String,
    pub position: Vec2Payload,
    pub damage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pellet_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponMissPayload {
    pub player_id: u32,
    pub weapon_type: WeaponType,
    /// Where the ray ended (range exhaustion or field edge).
    pub position: Vec2Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pellet_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponReloadedPayload {
    pub player_id: u32,
    pub weapon_type: WeaponType,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponHeatUpdatePayload {
    pub player_id: u32,
    pub heat_level: f64,
    pub is_overheated: bool,
}

// ─── Wall events (core → peers) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallDamagedPayload {
    pub wall_id: String,
    pub slice_index: usize,
    pub damage: f64,
    pub new_health: f64,
    pub is_destroyed: bool,
    pub material: Material,
    pub weapon_type: Option<WeaponType>,
    pub position: Vec2Payload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallDestroyedPayload {
    pub wall_id: String,
    pub material: Material,
    pub weapon_type: Option<WeaponType>,
}

// ─── Player events (core → peers) ───────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDamagedPayload {
    pub victim_id: u32,
    pub attacker_id: u32,
    pub damage: f64,
    pub new_health: f64,
    pub damage_type: DamageKind,
    pub position: Vec2Payload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDiedPayload {
    pub victim_id: u32,
    pub killer_id: u32,
    pub victim_team: Team,
    pub killer_team: Team,
    pub weapon_type: Option<WeaponType>,
    pub damage_type: DamageKind,
    pub position: Vec2Payload,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRespawnedPayload {
    pub player_id: u32,
    pub position: Vec2Payload,
    pub health: f64,
    pub invulnerable_until: f64,
}

// ─── Projectile & area events (core → peers) ────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileExplodedPayload {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ProjectileKind,
    pub position: Vec2Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplosionCreatedPayload {
    pub position: Vec2Payload,
    pub radius: f64,
    pub damage: f64,
    pub source_player_id: u32,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashbangEffectPayload {
    pub player_id: u32,
    pub intensity: f64,
    pub duration_ms: f64,
    pub position: Vec2Payload,
}

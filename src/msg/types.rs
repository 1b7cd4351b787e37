#![allow(dead_code)]
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::player::{MovementState, Team};
use crate::systems::destruction::{Material, Orientation};
use crate::systems::projectiles::ProjectileKind;
use crate::systems::weapons::WeaponType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2Payload {
    pub x: f64,
    pub y: f64,
}

// ─── Core payloads (0x01-0x09) ──────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub version: u32,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub player_id: u32,
    pub team: Team,
    pub tick_rate: u32,
    pub spawn_pos: Vec2Payload,
    pub field_width: f64,
    pub field_height: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InputKeys {
    #[serde(default)]
    pub w: bool,
    #[serde(default)]
    pub a: bool,
    #[serde(default)]
    pub s: bool,
    #[serde(default)]
    pub d: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub r: bool,
    #[serde(default)]
    pub g: bool,
    #[serde(default, rename = "1")]
    pub slot1: bool,
    #[serde(default, rename = "2")]
    pub slot2: bool,
    #[serde(default, rename = "3")]
    pub slot3: bool,
    #[serde(default, rename = "4")]
    pub slot4: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMouse {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPayload {
    pub keys: InputKeys,
    pub mouse: InputMouse,
    pub sequence: u32,
    pub timestamp: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedPayload {
    pub id: u32,
    pub name: String,
    pub team: Team,
    pub position: Vec2Payload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingPayload {
    pub client_time: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub client_time: f64,
}

// ─── Snapshot schema (0x04) ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponSnapshot {
    pub weapon_type: WeaponType,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
    pub is_reloading: bool,
    pub heat_level: f64,
    pub is_overheated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u32,
    pub name: String,
    pub position: Vec2Payload,
    pub rotation: f64,
    pub velocity: Vec2Payload,
    /// 0 for dead players regardless of internal value.
    pub health: f64,
    pub armor: f64,
    pub team: Team,
    pub weapon_id: WeaponType,
    pub weapons: HashMap<String, WeaponSnapshot>,
    pub is_alive: bool,
    pub movement_state: MovementState,
    pub is_ads: bool,
    pub kills: u32,
    pub deaths: u32,
    pub last_processed_input: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respawn_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invulnerable_until: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallState {
    pub id: String,
    pub position: Vec2Payload,
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
    pub material: Material,
    pub slice_health: Vec<f64>,
    pub max_health: f64,
    pub destruction_mask: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileState {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: ProjectileKind,
    pub owner_id: u32,
    pub position: Vec2Payload,
    pub velocity: Vec2Payload,
    pub timestamp: f64,
    pub range: f64,
    pub traveled_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explosion_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_level: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeZoneState {
    pub id: u32,
    pub position: Vec2Payload,
    pub radius: f64,
    pub created_at: f64,
    pub expires_at: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionPayload {
    #[serde(rename = "type")]
    pub kind: &'static str, // always "polygon"
    pub polygon: Vec<Vec2Payload>,
    pub view_angle: f64,
    pub view_direction: f64,
    pub view_distance: f64,
    pub position: Vec2Payload,
    pub fog_opacity: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub players: HashMap<String, PlayerSnapshot>,
    pub walls: HashMap<String, WallState>,
    pub projectiles: Vec<ProjectileState>,
    pub smoke_zones: Vec<SmokeZoneState>,
    pub timestamp: f64,
    pub tick_rate: u32,
    pub vision: VisionPayload,
}

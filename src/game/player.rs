use std::collections::HashMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::msg::types::{InputKeys, InputPayload, PlayerSnapshot, Vec2Payload, WeaponSnapshot};
use crate::systems::weapons::{Weapon, WeaponDeny, WeaponType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    Idle,
    Walking,
    Running,
    Sneaking,
    Dead,
}

// ─── Rate budgets ────────────────────────────────────────────────────

/// Fixed-window per-second budget; over-budget events are dropped silently.
#[derive(Debug, Clone, Copy)]
pub struct RateBudget {
    limit: u32,
    window_start: f64,
    count: u32,
}

impl RateBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window_start: 0.0,
            count: 0,
        }
    }

    pub fn allow(&mut self, now: f64) -> bool {
        if now - self.window_start >= 1_000.0 {
            self.window_start = now;
            self.count = 0;
        }
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn count_for_test(&self) -> u32 {
        self.count
    }
}

// ─── Player ──────────────────────────────────────────────────────────

pub struct Player {
    pub id: u32,
    pub name: String,
    pub team: Team,
    pub position: DVec2,
    pub rotation: f64,
    pub velocity: DVec2,
    pub movement_state: MovementState,
    pub health: f64,
    pub armor: f64,
    pub is_ads: bool,
    pub weapons: HashMap<WeaponType, Weapon>,
    pub equipped: WeaponType,
    /// Keys 1-4 map onto these slots.
    pub loadout: [WeaponType; 4],
    pub kills: u32,
    pub deaths: u32,
    pub death_time: Option<f64>,
    pub respawn_time: Option<f64>,
    pub killer_id: Option<u32>,
    pub invulnerable_until: f64,
    pub last_processed_input: u32,

    input_buffer: Vec<InputPayload>,
    /// Previous applied input, for key/button edge detection.
    pub prev_keys: InputKeys,
    pub prev_mouse_right: bool,

    pub input_budget: RateBudget,
    pub weapon_budget: RateBudget,
}

pub const DEFAULT_LOADOUT: [WeaponType; 4] = [
    WeaponType::Rifle,
    WeaponType::Pistol,
    WeaponType::FragGrenade,
    WeaponType::SmokeGrenade,
];

impl Player {
    pub fn new(id: u32, name: String, team: Team, spawn: DVec2) -> Self {
        let loadout = DEFAULT_LOADOUT;
        let weapons = loadout
            .iter()
            .map(|&t| (t, Weapon::new(t)))
            .collect();

        Self {
            id,
            name,
            team,
            position: spawn,
            rotation: 0.0,
            velocity: DVec2::ZERO,
            movement_state: MovementState::Idle,
            health: config::PLAYER_HEALTH,
            armor: 0.0,
            is_ads: false,
            weapons,
            equipped: loadout[0],
            loadout,
            kills: 0,
            deaths: 0,
            death_time: None,
            respawn_time: None,
            killer_id: None,
            invulnerable_until: 0.0,
            last_processed_input: 0,
            input_buffer: Vec::new(),
            prev_keys: InputKeys::default(),
            prev_mouse_right: false,
            input_budget: RateBudget::new(config::INPUT_RATE_LIMIT),
            weapon_budget: RateBudget::new(config::WEAPON_RATE_LIMIT),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn is_invulnerable(&self, now: f64) -> bool {
        now < self.invulnerable_until
    }

    pub fn push_input(&mut self, input: InputPayload) {
        if self.input_buffer.len() < config::MAX_INPUT_BUFFER_SIZE {
            self.input_buffer.push(input);
        }
    }

    pub fn consume_inputs(&mut self) -> Vec<InputPayload> {
        std::mem::take(&mut self.input_buffer)
    }

    pub fn equipped_weapon(&self) -> Option<&Weapon> {
        self.weapons.get(&self.equipped)
    }

    pub fn equipped_weapon_mut(&mut self) -> Option<&mut Weapon> {
        self.weapons.get_mut(&self.equipped)
    }

    /// Switch gate: deny when the target weapon is absent or mid-reload.
    pub fn try_switch(&mut self, to: WeaponType) -> Result<(), WeaponDeny> {
        let target = self.weapons.get(&to).ok_or(WeaponDeny::MissingWeapon)?;
        if target.is_reloading {
            return Err(WeaponDeny::Reloading);
        }
        self.equipped = to;
        Ok(())
    }

    pub fn mark_dead(&mut self, now: f64, killer_id: u32) {
        self.health = 0.0;
        self.movement_state = MovementState::Dead;
        self.velocity = DVec2::ZERO;
        self.death_time = Some(now);
        self.respawn_time = Some(now + config::RESPAWN_DELAY_MS);
        self.killer_id = Some(killer_id);
        self.deaths += 1;
        self.is_ads = false;
    }

    /// Back to life with a fresh loadout and a short grace window.
    pub fn respawn(&mut self, now: f64, spawn: DVec2) {
        self.health = config::PLAYER_HEALTH;
        self.movement_state = MovementState::Idle;
        self.position = spawn;
        self.velocity = DVec2::ZERO;
        self.death_time = None;
        self.respawn_time = None;
        self.killer_id = None;
        self.invulnerable_until = now + config::INVULNERABILITY_MS;
        self.weapons = self
            .loadout
            .iter()
            .map(|&t| (t, Weapon::new(t)))
            .collect();
        self.equipped = self.loadout[0];
    }

    pub fn to_snapshot(&self) -> PlayerSnapshot {
        let weapons = self
            .weapons
            .iter()
            .map(|(&t, w)| {
                (
                    t.as_str().to_string(),
                    WeaponSnapshot {
                        weapon_type: t,
                        current_ammo: w.current_ammo,
                        reserve_ammo: w.reserve_ammo,
                        is_reloading: w.is_reloading,
                        heat_level: w.heat_level,
                        is_overheated: w.is_overheated,
                    },
                )
            })
            .collect();

        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            position: Vec2Payload {
                x: self.position.x,
                y: self.position.y,
            },
            rotation: self.rotation,
            velocity: Vec2Payload {
                x: self.velocity.x,
                y: self.velocity.y,
            },
            health: if self.is_alive() { self.health } else { 0.0 },
            armor: self.armor,
            team: self.team,
            weapon_id: self.equipped,
            weapons,
            is_alive: self.is_alive(),
            movement_state: self.movement_state,
            is_ads: self.is_ads,
            kills: self.kills,
            deaths: self.deaths,
            last_processed_input: self.last_processed_input,
            death_time: self.death_time,
            respawn_time: self.respawn_time,
            invulnerable_until: if self.invulnerable_until > 0.0 {
                Some(self.invulnerable_until)
            } else {
                None
            },
            killer_id: self.killer_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(1, "tester".into(), Team::Red, DVec2::new(50.0, 135.0))
    }

    #[test]
    fn new_player_has_full_loadout() {
        let p = player();
        assert_eq!(p.weapons.len(), 4);
        assert_eq!(p.equipped, WeaponType::Rifle);
        assert!(p.is_alive());
    }

    #[test]
    fn switch_denies_missing_and_reloading() {
        let mut p = player();
        assert_eq!(
            p.try_switch(WeaponType::RocketLauncher),
            Err(WeaponDeny::MissingWeapon)
        );

        p.weapons.get_mut(&WeaponType::Pistol).unwrap().is_reloading = true;
        assert_eq!(p.try_switch(WeaponType::Pistol), Err(WeaponDeny::Reloading));
        assert_eq!(p.equipped, WeaponType::Rifle);

        p.weapons.get_mut(&WeaponType::Pistol).unwrap().is_reloading = false;
        assert!(p.try_switch(WeaponType::Pistol).is_ok());
        assert_eq!(p.equipped, WeaponType::Pistol);
    }

    #[test]
    fn death_and_respawn_bookkeeping() {
        let mut p = player();
        p.mark_dead(1_000.0, 7);
        assert!(!p.is_alive());
        assert_eq!(p.movement_state, MovementState::Dead);
        assert_eq!(p.deaths, 1);
        assert_eq!(p.killer_id, Some(7));
        assert_eq!(p.respawn_time, Some(1_000.0 + config::RESPAWN_DELAY_MS));
        assert_eq!(p.to_snapshot().health, 0.0);

        let spawn = DVec2::new(50.0, 135.0);
        p.respawn(5_000.0, spawn);
        assert!(p.is_alive());
        assert_eq!(p.position, spawn);
        assert!(p.is_invulnerable(5_000.0 + config::INVULNERABILITY_MS - 1.0));
        assert!(!p.is_invulnerable(5_000.0 + config::INVULNERABILITY_MS));
        assert_eq!(p.killer_id, None);
    }

    #[test]
    fn input_buffer_is_bounded() {
        let mut p = player();
        for i in 0..(config::MAX_INPUT_BUFFER_SIZE + 5) {
            p.push_input(InputPayload {
                keys: InputKeys::default(),
                mouse: Default::default(),
                sequence: i as u32,
                timestamp: 0.0,
            });
        }
        assert_eq!(p.consume_inputs().len(), config::MAX_INPUT_BUFFER_SIZE);
        assert!(p.consume_inputs().is_empty());
    }

    #[test]
    fn rate_budget_resets_each_window() {
        let mut budget = RateBudget::new(3);
        assert!(budget.allow(0.0));
        assert!(budget.allow(10.0));
        assert!(budget.allow(20.0));
        assert!(!budget.allow(30.0)); // over budget, dropped

        assert!(budget.allow(1_000.0)); // fresh window
    }
}

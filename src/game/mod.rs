pub mod map;
pub mod player;
pub mod simulation;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use glam::DVec2;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config;
use crate::msg::combat::{
    DamageKind, DebugRepairRequest, ExplosionCreatedPayload, FlashbangEffectPayload,
    GrenadeThrowRequest, PlayerDamagedPayload, PlayerDiedPayload, PlayerRespawnedPayload,
    WallDamagedPayload, WallDestroyedPayload, WeaponFireRequest, WeaponFiredPayload,
    WeaponHeatUpdatePayload, WeaponHitPayload, WeaponMissPayload, WeaponReloadRequest,
    WeaponReloadedPayload, WeaponSwitchRequest,
};
use crate::msg::id;
use crate::msg::types::{
    GameStatePayload, InputPayload, JoinPayload, PingPayload, PlayerJoinedPayload,
    PlayerLeftPayload, PlayerSnapshot, PongPayload, Vec2Payload, WallState, WelcomePayload,
};
use crate::net::protocol::{
    decode_message, decode_payload, encode_message, is_disconnect_sentinel,
};
use crate::systems::destruction::{DamageEvent, DestructionSystem};
use crate::systems::physics::PhysicsWorld;
use crate::systems::projectiles::{
    ExplosionTarget, ProjectileKind, ProjectileSystem, StepEvent,
};
use crate::systems::smoke::{compute_flash_effects, FlashViewer, SmokeSystem};
use crate::systems::visibility::{self, VisibilityPacket};
use crate::systems::weapons::{
    self, get_weapon_config, FireMode, HitscanHit, HitscanOutcome, HitscanTarget, WeaponType,
};

use self::map::MapData;
use self::player::{MovementState, Player, Team};

/// A message from a WebSocket connection into the game loop.
pub struct ClientMessage {
    pub conn_id: u64,
    pub data: Vec<u8>,
}

/// A message from the game loop to a specific connection.
pub struct ServerMessage {
    pub data: Vec<u8>,
}

/// Sender half given to each connection task.
pub type GameTx = mpsc::UnboundedSender<ClientMessage>;

/// Per-connection sender the game loop uses to push frames out.
pub type ConnTx = mpsc::UnboundedSender<ServerMessage>;

/// Cached vision polygon, valid while the viewer and the wall set hold still.
struct VisionCache {
    position: DVec2,
    rotation: f64,
    wall_version: u64,
    packet: VisibilityPacket,
}

/// Player action harvested from an input packet, applied after the borrow
/// on the player is released.
enum InputAction {
    Fire { client_timestamp: f64 },
    Reload,
    Throw,
}

pub struct GameServer {
    players: HashMap<u32, Player>,
    connections: HashMap<u64, ConnTx>,
    conn_to_player: HashMap<u64, u32>,
    player_to_conn: HashMap<u32, u64>,
    next_player_id: u32,
    tick: u64,
    start_time: Instant,
    rx: mpsc::UnboundedReceiver<ClientMessage>,

    map: MapData,
    destruction: DestructionSystem,
    projectiles: ProjectileSystem,
    physics: PhysicsWorld,
    smoke: SmokeSystem,
    vision_cache: HashMap<u32, VisionCache>,

    /// Encoded events accumulated across simulation ticks, flushed to every
    /// peer together with the next snapshot.
    pending_events: Vec<Vec<u8>>,
    /// Players already warned about fire-origin mismatch (log once).
    fire_origin_warned: HashSet<u32>,
}

impl GameServer {
    pub fn new(rx: mpsc::UnboundedReceiver<ClientMessage>) -> Self {
        let map = map::load_map(config::MAP_FILE);
        let mut destruction = DestructionSystem::new();
        destruction.set_walls(map.all_walls());

        let mut physics = PhysicsWorld::new();
        for wall in destruction.walls() {
            physics.add_static_rect(&wall.id, wall.rect.x, wall.rect.y, wall.rect.w, wall.rect.h);
        }

        Self {
            players: HashMap::new(),
            connections: HashMap::new(),
            conn_to_player: HashMap::new(),
            player_to_conn: HashMap::new(),
            next_player_id: 0,
            tick: 0,
            start_time: Instant::now(),
            rx,
            map,
            destruction,
            projectiles: ProjectileSystem::new(),
            physics,
            smoke: SmokeSystem::new(),
            vision_cache: HashMap::new(),
            pending_events: Vec::new(),
            fire_origin_warned: HashSet::new(),
        }
    }

    /// Milliseconds on the room's monotonic clock.
    fn now(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }

    /// Register a new connection's sender. Called from the accept loop.
    pub fn add_connection(&mut self, conn_id: u64, tx: ConnTx) {
        self.connections.insert(conn_id, tx);
    }

    /// Run one simulation tick: drain messages + simulate.
    pub fn run_tick(&mut self) {
        self.drain_messages();
        self.game_tick();
    }

    pub fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.handle_raw_message(msg);
        }
    }

    fn handle_raw_message(&mut self, msg: ClientMessage) {
        if is_disconnect_sentinel(&msg.data) {
            self.handle_disconnect(msg.conn_id);
            return;
        }

        let conn_id = msg.conn_id;
        let (type_id, body) = match decode_message(&msg.data) {
            Ok(v) => v,
            Err(e) => {
                warn!("Bad message from conn {conn_id}: {e}");
                return;
            }
        };

        match type_id {
            id::JOIN => {
                if let Some(payload) = parse_or_warn::<JoinPayload>(conn_id, body) {
                    self.handle_join(conn_id, payload);
                }
            }
            id::INPUT => {
                if let Some(payload) = parse_or_warn::<InputPayload>(conn_id, body) {
                    self.handle_input(conn_id, payload);
                }
            }
            id::PING => {
                if let Some(payload) = parse_or_warn::<PingPayload>(conn_id, body) {
                    let pong = PongPayload {
                        client_time: payload.client_time,
                    };
                    self.send_to_conn(conn_id, id::PONG, &pong);
                }
            }
            id::WEAPON_FIRE => {
                if let Some(payload) = parse_or_warn::<WeaponFireRequest>(conn_id, body) {
                    self.handle_fire(conn_id, payload);
                }
            }
            id::WEAPON_RELOAD => {
                if let Some(payload) = parse_or_warn::<WeaponReloadRequest>(conn_id, body) {
                    self.handle_reload(conn_id, payload);
                }
            }
            id::WEAPON_SWITCH => {
                if let Some(payload) = parse_or_warn::<WeaponSwitchRequest>(conn_id, body) {
                    self.handle_switch(conn_id, payload);
                }
            }
            id::GRENADE_THROW => {
                if let Some(payload) = parse_or_warn::<GrenadeThrowRequest>(conn_id, body) {
                    self.handle_throw(conn_id, payload);
                }
            }
            id::RESPAWN_REQUEST => {
                self.handle_respawn(conn_id);
            }
            id::DEBUG_REPAIR => {
                if let Some(payload) = parse_or_warn::<DebugRepairRequest>(conn_id, body) {
                    self.handle_debug_repair(payload);
                }
            }
            id::DEBUG_RESET => {
                self.handle_debug_reset();
            }
            other => {
                warn!("Unknown message type 0x{other:02X} from conn {conn_id}");
            }
        }
    }

    // ─── Join / leave ────────────────────────────────────────────────

    fn handle_join(&mut self, conn_id: u64, payload: JoinPayload) {
        if self.conn_to_player.contains_key(&conn_id) {
            return;
        }
        if self.players.len() >= config::MAX_PLAYERS {
            warn!("Room full, rejecting join from conn {conn_id}");
            return;
        }

        let name = if payload.name.is_empty() {
            "Player".to_string()
        } else {
            payload.name
        };

        // Balance teams by head-count; ties go red.
        let reds = self.players.values().filter(|p| p.team == Team::Red).count();
        let blues = self.players.len() - reds;
        let team = if reds <= blues { Team::Red } else { Team::Blue };

        self.next_player_id += 1;
        let player_id = self.next_player_id;
        let spawn = self.map.pick_spawn(team, &mut rand::thread_rng());

        let player = Player::new(player_id, name.clone(), team, spawn);
        self.players.insert(player_id, player);
        self.conn_to_player.insert(conn_id, player_id);
        self.player_to_conn.insert(player_id, conn_id);

        let welcome = WelcomePayload {
            player_id,
            team,
            tick_rate: config::TICK_RATE,
            spawn_pos: Vec2Payload {
                x: spawn.x,
                y: spawn.y,
            },
            field_width: config::GAME_WIDTH,
            field_height: config::GAME_HEIGHT,
        };
        self.send_to_conn(conn_id, id::WELCOME, &welcome);

        let joined = PlayerJoinedPayload {
            id: player_id,
            name: name.clone(),
            team,
            position: Vec2Payload {
                x: spawn.x,
                y: spawn.y,
            },
        };
        self.broadcast_except(player_id, id::PLAYER_JOINED, &joined);

        // Existing roster for the newcomer
        let existing: Vec<PlayerJoinedPayload> = self
            .players
            .values()
            .filter(|p| p.id != player_id)
            .map(|p| PlayerJoinedPayload {
                id: p.id,
                name: p.name.clone(),
                team: p.team,
                position: Vec2Payload {
                    x: p.position.x,
                    y: p.position.y,
                },
            })
            .collect();
        for msg in existing {
            self.send_to_conn(conn_id, id::PLAYER_JOINED, &msg);
        }

        info!(
            "Player {player_id} \"{name}\" joined {:?} ({} in room)",
            team,
            self.players.len()
        );
    }

    pub fn handle_disconnect(&mut self, conn_id: u64) {
        self.connections.remove(&conn_id);
        let player_id = match self.conn_to_player.remove(&conn_id) {
            Some(id) => id,
            None => return,
        };

        self.player_to_conn.remove(&player_id);
        self.players.remove(&player_id);
        self.vision_cache.remove(&player_id);
        self.fire_origin_warned.remove(&player_id);
        self.projectiles.remove_owned_by(player_id, &mut self.physics);

        let left = PlayerLeftPayload { id: player_id };
        self.broadcast_except(player_id, id::PLAYER_LEFT, &left);
        info!("Player {player_id} left, state purged");
    }

    // ─── Input ───────────────────────────────────────────────────────

    fn handle_input(&mut self, conn_id: u64, payload: InputPayload) {
        let now = self.now();
        let player = match self.player_for_conn_mut(conn_id) {
            Some(p) => p,
            None => return,
        };

        if !player.input_budget.allow(now) {
            return;
        }
        if (payload.timestamp - now).abs() > config::INPUT_TIMESTAMP_TOLERANCE_MS {
            return;
        }
        let last = player.last_processed_input;
        if last != 0
            && (payload.sequence <= last
                || payload.sequence - last > config::INPUT_SEQUENCE_SLACK)
        {
            return;
        }
        if payload.mouse.x < 0.0
            || payload.mouse.x > config::GAME_WIDTH
            || payload.mouse.y < 0.0
            || payload.mouse.y > config::GAME_HEIGHT
        {
            return;
        }

        player.push_input(payload);
    }

    /// Drain input buffers: movement, ADS/switch edges, fire/reload/throw.
    fn apply_inputs(&mut self, dt: f64, now: f64) {
        let ids: Vec<u32> = self.players.keys().copied().collect();
        let mut actions: Vec<(u32, InputAction)> = Vec::new();

        for player_id in ids {
            let player = match self.players.get_mut(&player_id) {
                Some(p) => p,
                None => continue,
            };
            let inputs = player.consume_inputs();
            let latest = match inputs.last() {
                Some(i) => *i,
                None => {
                    if player.is_alive() {
                        player.velocity = DVec2::ZERO;
                        player.movement_state = MovementState::Idle;
                    }
                    continue;
                }
            };
            player.last_processed_input = latest.sequence;

            if player.is_alive() {
                if latest.mouse.right && !player.prev_mouse_right {
                    player.is_ads = !player.is_ads;
                }
                let slots = [
                    latest.keys.slot1 && !player.prev_keys.slot1,
                    latest.keys.slot2 && !player.prev_keys.slot2,
                    latest.keys.slot3 && !player.prev_keys.slot3,
                    latest.keys.slot4 && !player.prev_keys.slot4,
                ];
                for (slot, pressed) in slots.iter().enumerate() {
                    if *pressed {
                        let target = player.loadout[slot];
                        let _ = player.try_switch(target);
                    }
                }
                if latest.keys.r && !player.prev_keys.r {
                    actions.push((player_id, InputAction::Reload));
                }
                if latest.keys.g && !player.prev_keys.g {
                    actions.push((player_id, InputAction::Throw));
                }
                if latest.mouse.left {
                    actions.push((
                        player_id,
                        InputAction::Fire {
                            client_timestamp: latest.timestamp,
                        },
                    ));
                }

                simulation::resolve_movement(player, &latest, dt, &self.destruction);
            }

            player.prev_keys = latest.keys;
            player.prev_mouse_right = latest.mouse.right;
        }

        for (player_id, action) in actions {
            match action {
                InputAction::Fire { client_timestamp } => {
                    self.fire_equipped(player_id, client_timestamp, now);
                }
                InputAction::Reload => self.reload_equipped(player_id, now),
                InputAction::Throw => {
                    let charge = self
                        .players
                        .get(&player_id)
                        .map(|p| default_charge(p.equipped))
                        .unwrap_or(1);
                    self.throw_equipped(player_id, charge, now);
                }
            }
        }
    }

    // ─── Weapon handlers ─────────────────────────────────────────────

    fn handle_fire(&mut self, conn_id: u64, payload: WeaponFireRequest) {
        let now = self.now();
        let player_id = match self.player_for_conn(conn_id) {
            Some(p) => p,
            None => return,
        };
        if !self
            .players
            .get_mut(&player_id)
            .map(|p| p.weapon_budget.allow(now))
            .unwrap_or(false)
        {
            return;
        }

        // Cheat signal: the client's claimed origin is advisory only. Log a
        // mismatch once per player and keep using server state.
        if let Some(player) = self.players.get(&player_id) {
            let claimed = DVec2::new(payload.position.x, payload.position.y);
            if claimed.distance(player.position) > config::PLAYER_SIZE * 2.0
                && self.fire_origin_warned.insert(player_id)
            {
                warn!(
                    "Player {player_id} fire origin mismatch ({:.1} px), overriding",
                    claimed.distance(player.position)
                );
            }
        }

        self.fire_equipped(player_id, payload.timestamp, now);
    }

    /// Expand a fire on the equipped weapon: gate, then hitscan rays or a
    /// projectile spawn. Throwables reroute to the throw path. Denied gates
    /// mutate nothing and emit nothing.
    fn fire_equipped(&mut self, player_id: u32, client_timestamp: f64, now: f64) {
        let (position, rotation, movement, is_ads, equipped) = match self.players.get(&player_id)
        {
            Some(p) if p.is_alive() => {
                (p.position, p.rotation, p.movement_state, p.is_ads, p.equipped)
            }
            _ => return,
        };
        let cfg = get_weapon_config(equipped);

        if cfg.is_thrown() {
            self.throw_equipped(player_id, default_charge(equipped), now);
            return;
        }

        {
            let weapon = match self
                .players
                .get_mut(&player_id)
                .and_then(|p| p.weapons.get_mut(&equipped))
            {
                Some(w) => w,
                None => return,
            };
            if weapons::try_fire(weapon, now, client_timestamp).is_err() {
                return;
            }
            if cfg.uses_heat {
                let update = WeaponHeatUpdatePayload {
                    player_id,
                    heat_level: weapon.heat_level,
                    is_overheated: weapon.is_overheated,
                };
                self.queue_event(id::WEAPON_HEAT_UPDATE, &update);
            }
        }

        self.queue_event(
            id::WEAPON_FIRED,
            &WeaponFiredPayload {
                player_id,
                weapon_type: equipped,
                position: Vec2Payload {
                    x: position.x,
                    y: position.y,
                },
                direction: rotation,
                timestamp: now,
            },
        );

        match cfg.mode {
            FireMode::Thrown(_) => unreachable!("rerouted above"),
            FireMode::Projectile(_) => {
                let origin =
                    position + DVec2::from_angle(rotation) * (config::PLAYER_SIZE / 2.0 + 2.0);
                if let Some(state) = self.projectiles.spawn(
                    player_id,
                    cfg,
                    origin,
                    rotation,
                    None,
                    now,
                    &mut self.physics,
                ) {
                    self.queue_event(id::PROJECTILE_CREATED, &state);
                }
            }
            FireMode::Hitscan => {
                let mut rng = rand::thread_rng();
                let targets = self.hitscan_targets(player_id);
                let accuracy = weapons::effective_accuracy(cfg.accuracy, is_ads, movement);

                match equipped {
                    WeaponType::Shotgun => {
                        let outcomes = weapons::fire_shotgun(
                            position,
                            rotation,
                            cfg.damage,
                            cfg.range,
                            &self.destruction,
                            &targets,
                            &mut rng,
                        );
                        for (index, outcome) in outcomes.iter().enumerate() {
                            self.apply_hitscan_outcome(
                                player_id,
                                equipped,
                                outcome,
                                Some(index as u32),
                                DamageKind::Pellet,
                                now,
                            );
                        }
                    }
                    WeaponType::AntiMaterialRifle => {
                        let direction = weapons::apply_spread(rotation, accuracy, &mut rng);
                        let outcome = weapons::hitscan_anti_material(
                            position,
                            direction,
                            cfg.damage,
                            cfg.range,
                            &self.destruction,
                            &targets,
                        );
                        self.apply_hitscan_outcome(
                            player_id,
                            equipped,
                            &outcome,
                            None,
                            DamageKind::Bullet,
                            now,
                        );
                    }
                    _ => {
                        let direction = weapons::apply_spread(rotation, accuracy, &mut rng);
                        let outcome = weapons::hitscan_standard(
                            position,
                            direction,
                            cfg.damage,
                            cfg.range,
                            &self.destruction,
                            &targets,
                        );
                        self.apply_hitscan_outcome(
                            player_id,
                            equipped,
                            &outcome,
                            None,
                            DamageKind::Bullet,
                            now,
                        );
                    }
                }
            }
        }
    }

    fn apply_hitscan_outcome(
        &mut self,
        shooter: u32,
        weapon: WeaponType,
        outcome: &HitscanOutcome,
        pellet_index: Option<u32>,
        kind: DamageKind,
        now: f64,
    ) {
        if outcome.hits.is_empty() {
            self.queue_event(
                id::WEAPON_MISS,
                &WeaponMissPayload {
                    player_id: shooter,
                    weapon_type: weapon,
                    position: Vec2Payload {
                        x: outcome.end_point.x,
                        y: outcome.end_point.y,
                    },
                    pellet_index,
                },
            );
            return;
        }

        for hit in &outcome.hits {
            match hit {
                HitscanHit::Wall {
                    wall_id,
                    slice_index,
                    damage,
                    position,
                } => {
                    self.queue_event(
                        id::WEAPON_HIT,
                        &WeaponHitPayload {
                            player_id: shooter,
                            weapon_type: weapon,
                            target_kind: "wall",
                            target_id: wall_id.clone(),
                            position: Vec2Payload {
                                x: position.x,
                                y: position.y,
                            },
                            damage: *damage,
                            pellet_index,
                        },
                    );
                    if let Some(event) =
                        self.destruction
                            .apply_damage(wall_id, *slice_index, *damage, now)
                    {
                        self.emit_wall_damage(&event, Some(weapon));
                    }
                }
                HitscanHit::Player {
                    player_id,
                    damage,
                    position,
                } => {
                    self.queue_event(
                        id::WEAPON_HIT,
                        &WeaponHitPayload {
                            player_id: shooter,
                            weapon_type: weapon,
                            target_kind: "player",
                            target_id: player_id.to_string(),
                            position: Vec2Payload {
                                x: position.x,
                                y: position.y,
                            },
                            damage: *damage,
                            pellet_index,
                        },
                    );
                    self.apply_player_damage(
                        *player_id,
                        shooter,
                        *damage,
                        kind,
                        *position,
                        Some(weapon),
                        now,
                    );
                }
            }
        }
    }

    fn handle_reload(&mut self, conn_id: u64, payload: WeaponReloadRequest) {
        let now = self.now();
        let player = match self.player_for_conn_mut(conn_id) {
            Some(p) => p,
            None => return,
        };
        if !player.weapon_budget.allow(now) {
            return;
        }
        if let Some(weapon) = player.weapons.get_mut(&payload.weapon_type) {
            let _ = weapons::try_reload(weapon, now);
        }
    }

    fn reload_equipped(&mut self, player_id: u32, now: f64) {
        if let Some(player) = self.players.get_mut(&player_id) {
            let equipped = player.equipped;
            if let Some(weapon) = player.weapons.get_mut(&equipped) {
                let _ = weapons::try_reload(weapon, now);
            }
        }
    }

    fn handle_switch(&mut self, conn_id: u64, payload: WeaponSwitchRequest) {
        let now = self.now();
        if let Some(player) = self.player_for_conn_mut(conn_id) {
            if player.weapon_budget.allow(now) {
                let _ = player.try_switch(payload.to_weapon);
            }
        }
    }

    fn handle_throw(&mut self, conn_id: u64, payload: GrenadeThrowRequest) {
        let now = self.now();
        let player_id = match self.player_for_conn(conn_id) {
            Some(p) => p,
            None => return,
        };
        if !self
            .players
            .get_mut(&player_id)
            .map(|p| p.weapon_budget.allow(now))
            .unwrap_or(false)
        {
            return;
        }
        self.throw_equipped(player_id, payload.charge_level, now);
    }

    fn throw_equipped(&mut self, player_id: u32, charge_level: u8, now: f64) {
        let (position, rotation, equipped) = match self.players.get(&player_id) {
            Some(p) if p.is_alive() => (p.position, p.rotation, p.equipped),
            _ => return,
        };
        let cfg = get_weapon_config(equipped);

        {
            let weapon = match self
                .players
                .get_mut(&player_id)
                .and_then(|p| p.weapons.get_mut(&equipped))
            {
                Some(w) => w,
                None => return,
            };
            if weapons::try_throw(weapon, now, charge_level).is_err() {
                return;
            }
        }

        let origin = position + DVec2::from_angle(rotation) * (config::PLAYER_SIZE / 2.0 + 2.0);
        if let Some(state) = self.projectiles.spawn(
            player_id,
            cfg,
            origin,
            rotation,
            Some(charge_level),
            now,
            &mut self.physics,
        ) {
            self.queue_event(id::PROJECTILE_CREATED, &state);
        }
    }

    // ─── Damage / death / respawn ────────────────────────────────────

    fn apply_player_damage(
        &mut self,
        victim_id: u32,
        attacker_id: u32,
        damage: f64,
        kind: DamageKind,
        position: DVec2,
        weapon: Option<WeaponType>,
        now: f64,
    ) {
        if damage <= 0.0 {
            return;
        }
        let (new_health, victim_team, victim_pos) = match self.players.get_mut(&victim_id) {
            Some(victim) => {
                if !victim.is_alive() || victim.is_invulnerable(now) {
                    return;
                }
                victim.health = (victim.health - damage).max(0.0);
                (victim.health, victim.team, victim.position)
            }
            None => return,
        };

        self.queue_event(
            id::PLAYER_DAMAGED,
            &PlayerDamagedPayload {
                victim_id,
                attacker_id,
                damage,
                new_health,
                damage_type: kind,
                position: Vec2Payload {
                    x: position.x,
                    y: position.y,
                },
            },
        );

        if new_health > 0.0 {
            return;
        }

        if let Some(victim) = self.players.get_mut(&victim_id) {
            victim.mark_dead(now, attacker_id);
        }
        let killer_team = self.players.get(&attacker_id).map(|k| k.team);
        if let (Some(kt), true) = (killer_team, attacker_id != victim_id) {
            if kt != victim_team {
                if let Some(killer) = self.players.get_mut(&attacker_id) {
                    killer.kills += 1;
                }
            }
        }

        self.queue_event(
            id::PLAYER_DIED,
            &PlayerDiedPayload {
                victim_id,
                killer_id: attacker_id,
                victim_team,
                killer_team: killer_team.unwrap_or(victim_team),
                weapon_type: weapon,
                damage_type: kind,
                position: Vec2Payload {
                    x: victim_pos.x,
                    y: victim_pos.y,
                },
                timestamp: now,
            },
        );
        info!("Player {victim_id} killed by {attacker_id}");
    }

    fn handle_respawn(&mut self, conn_id: u64) {
        let now = self.now();
        if let Some(player_id) = self.player_for_conn(conn_id) {
            self.respawn_player(player_id, now);
        }
    }

    /// Respawn is client-driven: only a dead player past their cooldown
    /// comes back, at a random team spawn, briefly invulnerable.
    fn respawn_player(&mut self, player_id: u32, now: f64) {
        let spawn = {
            let player = match self.players.get(&player_id) {
                Some(p) => p,
                None => return,
            };
            if player.is_alive() {
                return;
            }
            match player.respawn_time {
                Some(at) if now >= at => {}
                _ => return,
            }
            self.map.pick_spawn(player.team, &mut rand::thread_rng())
        };

        let player = self.players.get_mut(&player_id).unwrap();
        player.respawn(now, spawn);
        let payload = PlayerRespawnedPayload {
            player_id,
            position: Vec2Payload {
                x: spawn.x,
                y: spawn.y,
            },
            health: player.health,
            invulnerable_until: player.invulnerable_until,
        };
        self.queue_event(id::PLAYER_RESPAWNED, &payload);
    }

    // ─── Debug / admin ───────────────────────────────────────────────

    fn handle_debug_repair(&mut self, payload: DebugRepairRequest) {
        if !config::DEBUG_COMMANDS {
            return;
        }
        match payload.wall_id {
            Some(wall_id) => {
                if self.destruction.repair(&wall_id, payload.slice_index) {
                    self.restore_wall_body(&wall_id);
                }
            }
            None => {
                self.destruction.repair_all();
                let ids: Vec<String> =
                    self.destruction.walls().map(|w| w.id.clone()).collect();
                for wall_id in ids {
                    self.restore_wall_body(&wall_id);
                }
            }
        }
    }

    fn handle_debug_reset(&mut self) {
        if !config::DEBUG_COMMANDS {
            return;
        }
        let now = self.now();
        self.destruction.set_walls(self.map.all_walls());
        let walls: Vec<(String, f64, f64, f64, f64)> = self
            .destruction
            .walls()
            .map(|w| (w.id.clone(), w.rect.x, w.rect.y, w.rect.w, w.rect.h))
            .collect();
        for (wall_id, x, y, w, h) in walls {
            self.physics.add_static_rect(&wall_id, x, y, w, h);
        }
        self.projectiles.clear(&mut self.physics);
        self.smoke.clear();
        self.vision_cache.clear();

        let ids: Vec<u32> = self.players.keys().copied().collect();
        for player_id in ids {
            let team = match self.players.get(&player_id) {
                Some(p) => p.team,
                None => continue,
            };
            let spawn = self.map.pick_spawn(team, &mut rand::thread_rng());
            self.players.get_mut(&player_id).unwrap().respawn(now, spawn);
        }
        info!("Room reset to map state");
    }

    fn restore_wall_body(&mut self, wall_id: &str) {
        if let Some(wall) = self.destruction.get(wall_id) {
            let (x, y, w, h) = (wall.rect.x, wall.rect.y, wall.rect.w, wall.rect.h);
            self.physics.add_static_rect(wall_id, x, y, w, h);
        }
    }

    // ─── Game tick ───────────────────────────────────────────────────

    pub fn game_tick(&mut self) {
        self.tick += 1;
        let now = self.now();
        let dt = 1.0 / config::TICK_RATE as f64;
        let dt_ms = dt * 1000.0;

        // 1. Auxiliary systems: smoke aging, reload/heat timers.
        self.smoke.update(now);
        let mut reloaded: Vec<WeaponReloadedPayload> = Vec::new();
        let mut heat_updates: Vec<WeaponHeatUpdatePayload> = Vec::new();
        for player in self.players.values_mut() {
            for (&weapon_type, weapon) in player.weapons.iter_mut() {
                let result = weapons::tick_weapon(weapon, now, dt_ms);
                if result.reload_completed {
                    reloaded.push(WeaponReloadedPayload {
                        player_id: player.id,
                        weapon_type,
                        current_ammo: weapon.current_ammo,
                        reserve_ammo: weapon.reserve_ammo,
                    });
                }
                if result.heat_reset {
                    heat_updates.push(WeaponHeatUpdatePayload {
                        player_id: player.id,
                        heat_level: weapon.heat_level,
                        is_overheated: weapon.is_overheated,
                    });
                }
            }
        }
        for payload in reloaded {
            self.queue_event(id::WEAPON_RELOADED, &payload);
        }
        for payload in heat_updates {
            self.queue_event(id::WEAPON_HEAT_UPDATE, &payload);
        }

        // 2. Weapon/movement application from buffered inputs.
        self.apply_inputs(dt, now);

        // 3. Projectile integration and collision.
        let targets = self.explosion_targets();
        let step_events =
            self.projectiles
                .step(dt, now, &self.destruction, &targets, &mut self.physics);
        for event in step_events {
            match event {
                StepEvent::Updated(state) => self.queue_event(id::PROJECTILE_UPDATED, &state),
                StepEvent::Exploded {
                    id: projectile_id,
                    kind,
                    position,
                    radius,
                } => self.queue_event(
                    id::PROJECTILE_EXPLODED,
                    &crate::msg::combat::ProjectileExplodedPayload {
                        id: projectile_id,
                        kind,
                        position: Vec2Payload {
                            x: position.x,
                            y: position.y,
                        },
                        radius,
                    },
                ),
            }
        }

        // 4-5. Explosion resolution: smoke/flash side effects, then wall and
        // player damage, in queue order.
        let outcome = self
            .projectiles
            .process_explosions(&mut self.destruction, &targets, now);
        for explosion in &outcome.explosions {
            match explosion.kind {
                ProjectileKind::Smoke => {
                    self.smoke
                        .create_zone(explosion.center, explosion.radius, now);
                }
                ProjectileKind::Flash => {
                    let viewers: Vec<FlashViewer> = self
                        .players
                        .values()
                        .map(|p| FlashViewer {
                            id: p.id,
                            position: p.position,
                            rotation: p.rotation,
                            alive: p.is_alive(),
                        })
                        .collect();
                    for hit in
                        compute_flash_effects(explosion.center, explosion.radius, &viewers)
                    {
                        self.queue_event(
                            id::FLASHBANG_EFFECT,
                            &FlashbangEffectPayload {
                                player_id: hit.player_id,
                                intensity: hit.intensity,
                                duration_ms: hit.duration_ms,
                                position: Vec2Payload {
                                    x: explosion.center.x,
                                    y: explosion.center.y,
                                },
                            },
                        );
                    }
                }
                _ => {
                    self.queue_event(
                        id::EXPLOSION_CREATED,
                        &ExplosionCreatedPayload {
                            position: Vec2Payload {
                                x: explosion.center.x,
                                y: explosion.center.y,
                            },
                            radius: explosion.radius,
                            damage: explosion.base_damage,
                            source_player_id: explosion.source_player,
                            timestamp: explosion.timestamp,
                        },
                    );
                }
            }
        }
        for event in &outcome.wall_events {
            self.emit_wall_damage(event, None);
        }
        for hit in &outcome.player_hits {
            self.apply_player_damage(
                hit.player_id,
                hit.source_player,
                hit.damage,
                DamageKind::Explosion,
                hit.center,
                None,
                now,
            );
        }
    }

    // ─── Broadcast ───────────────────────────────────────────────────

    /// Flush accumulated events, then send each peer its filtered snapshot.
    pub fn broadcast(&mut self) {
        let now = self.now();
        for data in std::mem::take(&mut self.pending_events) {
            for tx in self.connections.values() {
                let _ = tx.send(ServerMessage { data: data.clone() });
            }
        }

        if self.player_to_conn.is_empty() {
            return;
        }

        let players: HashMap<String, PlayerSnapshot> = self
            .players
            .values()
            .map(|p| (p.id.to_string(), p.to_snapshot()))
            .collect();
        let walls: HashMap<String, WallState> = self
            .destruction
            .walls()
            .map(|w| (w.id.clone(), w.to_state()))
            .collect();
        let projectiles = self.projectiles.states();
        let smoke_zones = self.smoke.states();

        let peers: Vec<(u32, u64)> = self
            .player_to_conn
            .iter()
            .map(|(&p, &c)| (p, c))
            .collect();
        for (player_id, conn_id) in peers {
            let vision = match self.vision_for(player_id) {
                Some(v) => v,
                None => continue,
            };
            let snapshot = GameStatePayload {
                players: players.clone(),
                walls: walls.clone(),
                projectiles: projectiles.clone(),
                smoke_zones: smoke_zones.clone(),
                timestamp: now,
                tick_rate: config::TICK_RATE,
                vision,
            };
            self.send_to_conn(conn_id, id::GAME_STATE, &snapshot);
        }
    }

    /// Per-viewer vision, cached until the viewer or the wall set moves.
    fn vision_for(&mut self, player_id: u32) -> Option<crate::msg::types::VisionPayload> {
        let (position, rotation) = {
            let p = self.players.get(&player_id)?;
            (p.position, p.rotation)
        };

        if !config::VISION_ENABLED {
            return Some(visibility::full_field_packet(position, rotation).to_payload());
        }

        let version = self.destruction.version();
        if let Some(cache) = self.vision_cache.get(&player_id) {
            if cache.position == position
                && cache.rotation == rotation
                && cache.wall_version == version
            {
                return Some(cache.packet.to_payload());
            }
        }

        let packet = visibility::compute_visibility(position, rotation, &self.destruction);
        let payload = packet.to_payload();
        self.vision_cache.insert(
            player_id,
            VisionCache {
                position,
                rotation,
                wall_version: version,
                packet,
            },
        );
        Some(payload)
    }

    // ─── Helpers ─────────────────────────────────────────────────────

    fn emit_wall_damage(&mut self, event: &DamageEvent, weapon: Option<WeaponType>) {
        let (material, fully_destroyed) = match self.destruction.get(&event.wall_id) {
            Some(wall) => (wall.material, wall.is_fully_destroyed()),
            None => return,
        };

        self.queue_event(
            id::WALL_DAMAGED,
            &WallDamagedPayload {
                wall_id: event.wall_id.clone(),
                slice_index: event.slice_index,
                damage: event.damage,
                new_health: event.new_health,
                is_destroyed: event.is_destroyed,
                material,
                weapon_type: weapon,
                position: Vec2Payload {
                    x: event.position.x,
                    y: event.position.y,
                },
            },
        );

        if event.is_destroyed && fully_destroyed {
            self.queue_event(
                id::WALL_DESTROYED,
                &WallDestroyedPayload {
                    wall_id: event.wall_id.clone(),
                    material,
                    weapon_type: weapon,
                },
            );
            self.physics.remove_static(&event.wall_id);
        }
    }

    fn hitscan_targets(&self, shooter: u32) -> Vec<HitscanTarget> {
        self.players
            .values()
            .filter(|p| p.id != shooter && p.is_alive())
            .map(|p| HitscanTarget {
                id: p.id,
                position: p.position,
            })
            .collect()
    }

    fn explosion_targets(&self) -> Vec<ExplosionTarget> {
        self.players
            .values()
            .map(|p| ExplosionTarget {
                id: p.id,
                position: p.position,
                alive: p.is_alive(),
            })
            .collect()
    }

    fn player_for_conn(&self, conn_id: u64) -> Option<u32> {
        self.conn_to_player.get(&conn_id).copied()
    }

    fn player_for_conn_mut(&mut self, conn_id: u64) -> Option<&mut Player> {
        let player_id = self.conn_to_player.get(&conn_id).copied()?;
        self.players.get_mut(&player_id)
    }

    fn send_to_conn<T: serde::Serialize>(&self, conn_id: u64, type_id: u8, payload: &T) {
        if let Some(tx) = self.connections.get(&conn_id) {
            if let Ok(data) = encode_message(type_id, payload) {
                let _ = tx.send(ServerMessage { data });
            }
        }
    }

    fn broadcast_except<T: serde::Serialize>(&self, exclude: u32, type_id: u8, payload: &T) {
        let encoded = match encode_message(type_id, payload) {
            Ok(data) => data,
            Err(_) => return,
        };
        for (&player_id, &conn_id) in &self.player_to_conn {
            if player_id == exclude {
                continue;
            }
            if let Some(tx) = self.connections.get(&conn_id) {
                let _ = tx.send(ServerMessage {
                    data: encoded.clone(),
                });
            }
        }
    }

    /// Events accumulate here and go out with the next broadcast, in
    /// emission order.
    fn queue_event<T: serde::Serialize>(&mut self, type_id: u8, payload: &T) {
        if let Ok(data) = encode_message(type_id, payload) {
            self.pending_events.push(data);
        }
    }
}

fn default_charge(weapon: WeaponType) -> u8 {
    match weapon {
        WeaponType::FragGrenade => 3,
        _ => 1,
    }
}

/// Malformed payloads are validation failures: log, drop, no peer feedback.
fn parse_or_warn<T: DeserializeOwned>(conn_id: u64, body: &[u8]) -> Option<T> {
    match decode_payload(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Malformed payload from conn {conn_id}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::types::{InputKeys, InputMouse, InputPayload};

    fn server() -> GameServer {
        let (_tx, rx) = mpsc::unbounded_channel();
        GameServer::new(rx)
    }

    fn join(server: &mut GameServer, conn_id: u64, name: &str) -> u32 {
        server.handle_join(
            conn_id,
            JoinPayload {
                version: config::PROTOCOL_VERSION,
                name: name.to_string(),
            },
        );
        *server.conn_to_player.get(&conn_id).unwrap()
    }

    fn input_at(sequence: u32, timestamp: f64) -> InputPayload {
        InputPayload {
            keys: InputKeys::default(),
            mouse: InputMouse {
                x: 100.0,
                y: 100.0,
                left: false,
                right: false,
            },
            sequence,
            timestamp,
        }
    }

    fn pending_ids(server: &GameServer) -> Vec<u8> {
        server.pending_events.iter().map(|e| e[0]).collect()
    }

    // ── Join & teams ────────────────────────────────────────────────

    #[test]
    fn joins_alternate_teams() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");
        let b = join(&mut srv, 2, "b");
        let c = join(&mut srv, 3, "c");
        assert_eq!(srv.players[&a].team, Team::Red);
        assert_eq!(srv.players[&b].team, Team::Blue);
        assert_eq!(srv.players[&c].team, Team::Red);
    }

    #[test]
    fn duplicate_join_is_ignored() {
        let mut srv = server();
        join(&mut srv, 1, "a");
        srv.handle_join(
            1,
            JoinPayload {
                version: 1,
                name: "again".into(),
            },
        );
        assert_eq!(srv.players.len(), 1);
    }

    // ── Input validation ────────────────────────────────────────────

    #[test]
    fn stale_or_far_future_sequence_is_dropped() {
        let mut srv = server();
        let pid = join(&mut srv, 1, "a");
        let now = srv.now();

        srv.handle_input(1, input_at(5, now));
        srv.players.get_mut(&pid).unwrap().last_processed_input = 5;

        srv.handle_input(1, input_at(5, now)); // replay
        srv.handle_input(1, input_at(3, now)); // stale
        srv.handle_input(1, input_at(5 + config::INPUT_SEQUENCE_SLACK + 1, now)); // too far
        // The first accepted input is still in the buffer; nothing else got in
        assert_eq!(srv.players.get_mut(&pid).unwrap().consume_inputs().len(), 1);
    }

    #[test]
    fn skewed_timestamp_and_oob_mouse_are_dropped() {
        let mut srv = server();
        let pid = join(&mut srv, 1, "a");
        let now = srv.now();

        srv.handle_input(1, input_at(1, now + config::INPUT_TIMESTAMP_TOLERANCE_MS + 1.0));

        let mut oob = input_at(2, now);
        oob.mouse.x = config::GAME_WIDTH + 50.0;
        srv.handle_input(1, oob);

        assert!(srv.players.get_mut(&pid).unwrap().consume_inputs().is_empty());
    }

    #[test]
    fn input_rate_budget_drops_the_excess() {
        let mut srv = server();
        let pid = join(&mut srv, 1, "a");
        let now = srv.now();

        for i in 0..(config::INPUT_RATE_LIMIT + 20) {
            srv.handle_input(1, input_at(i + 1, now));
        }
        // Buffer caps at MAX_INPUT_BUFFER_SIZE, but the budget counter must
        // have refused everything past the per-second limit.
        assert_eq!(
            srv.players[&pid].input_budget.count_for_test(),
            config::INPUT_RATE_LIMIT
        );
    }

    // ── Fire pipeline ───────────────────────────────────────────────

    #[test]
    fn rifle_fire_hits_a_player_dead_ahead() {
        let mut srv = server();
        let shooter = join(&mut srv, 1, "a");
        let target = join(&mut srv, 2, "b");

        // Clear lane on the fallback map: no wall crosses y=200 here
        srv.players.get_mut(&shooter).unwrap().position = DVec2::new(150.0, 200.0);
        srv.players.get_mut(&shooter).unwrap().rotation = 0.0;
        srv.players.get_mut(&target).unwrap().position = DVec2::new(210.0, 200.0);

        let now = srv.now();
        srv.fire_equipped(shooter, now, now);

        let ids = pending_ids(&srv);
        assert!(ids.contains(&id::WEAPON_FIRED));
        assert!(ids.contains(&id::WEAPON_HIT));
        assert!(ids.contains(&id::PLAYER_DAMAGED));
        assert!(srv.players[&target].health < config::PLAYER_HEALTH);
        // Ammo actually spent
        assert_eq!(
            srv.players[&shooter].equipped_weapon().unwrap().current_ammo,
            get_weapon_config(WeaponType::Rifle).magazine_size - 1
        );
    }

    #[test]
    fn denied_fire_emits_nothing() {
        let mut srv = server();
        let shooter = join(&mut srv, 1, "a");
        srv.players
            .get_mut(&shooter)
            .unwrap()
            .equipped_weapon_mut()
            .unwrap()
            .current_ammo = 0;

        let now = srv.now();
        srv.fire_equipped(shooter, now, now);
        assert!(srv.pending_events.is_empty());
    }

    // ── Damage rules ────────────────────────────────────────────────

    #[test]
    fn invulnerable_player_takes_no_damage() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");
        let b = join(&mut srv, 2, "b");
        let now = srv.now();
        srv.players.get_mut(&b).unwrap().invulnerable_until = now + 1_000.0;

        srv.apply_player_damage(b, a, 50.0, DamageKind::Bullet, DVec2::ZERO, None, now);
        assert_eq!(srv.players[&b].health, config::PLAYER_HEALTH);
        assert!(srv.pending_events.is_empty());
    }

    #[test]
    fn friendly_fire_kills_but_does_not_score() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a"); // red
        join(&mut srv, 2, "b"); // blue
        let c = join(&mut srv, 3, "c"); // red

        let now = srv.now();
        srv.apply_player_damage(
            c,
            a,
            config::PLAYER_HEALTH,
            DamageKind::Bullet,
            DVec2::ZERO,
            Some(WeaponType::Rifle),
            now,
        );

        assert!(!srv.players[&c].is_alive());
        assert_eq!(srv.players[&c].deaths, 1);
        assert_eq!(srv.players[&a].kills, 0, "same-team kill must not score");
        assert!(pending_ids(&srv).contains(&id::PLAYER_DIED));
    }

    #[test]
    fn cross_team_kill_scores() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a"); // red
        let b = join(&mut srv, 2, "b"); // blue

        let now = srv.now();
        srv.apply_player_damage(
            b,
            a,
            config::PLAYER_HEALTH,
            DamageKind::Bullet,
            DVec2::ZERO,
            Some(WeaponType::Rifle),
            now,
        );
        assert_eq!(srv.players[&a].kills, 1);
        assert_eq!(srv.players[&b].killer_id, Some(a));
    }

    // ── Respawn on a map with no red spawns ─────────────────────────

    #[test]
    fn respawn_uses_fallback_spawn_and_grants_invulnerability() {
        let mut srv = server();
        srv.map.red_spawns.clear();
        let a = join(&mut srv, 1, "a"); // red
        let b = join(&mut srv, 2, "b");

        let t0 = srv.now();
        srv.players.get_mut(&a).unwrap().position = DVec2::new(40.0, 130.0);
        srv.apply_player_damage(a, b, config::PLAYER_HEALTH, DamageKind::Bullet, DVec2::ZERO, None, t0);
        assert!(!srv.players[&a].is_alive());

        // Too early: request refused
        srv.respawn_player(a, t0 + config::RESPAWN_DELAY_MS - 1.0);
        assert!(!srv.players[&a].is_alive());

        // 4 s later: back at the hard-coded fallback, fully healed
        let t1 = t0 + 4_000.0;
        srv.respawn_player(a, t1);
        let player = &srv.players[&a];
        assert!(player.is_alive());
        assert_eq!(player.health, config::PLAYER_HEALTH);
        assert_eq!(
            player.position,
            DVec2::new(config::RED_SPAWN_FALLBACK.0, config::RED_SPAWN_FALLBACK.1)
        );

        // Damage inside the invulnerability window does nothing
        srv.apply_player_damage(a, b, 50.0, DamageKind::Bullet, DVec2::ZERO, None, t1 + 1.0);
        assert_eq!(srv.players[&a].health, config::PLAYER_HEALTH);

        // And after it expires, damage lands again
        srv.apply_player_damage(
            a,
            b,
            50.0,
            DamageKind::Bullet,
            DVec2::ZERO,
            None,
            t1 + config::INVULNERABILITY_MS + 1.0,
        );
        assert_eq!(srv.players[&a].health, config::PLAYER_HEALTH - 50.0);
    }

    #[test]
    fn living_player_cannot_respawn() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");
        let before = srv.players[&a].position;
        srv.respawn_player(a, srv.now() + 60_000.0);
        assert_eq!(srv.players[&a].position, before);
    }

    // ── Disconnect purge ────────────────────────────────────────────

    #[test]
    fn disconnect_purges_player_and_their_projectiles() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");
        srv.players.get_mut(&a).unwrap().try_switch(WeaponType::FragGrenade).unwrap();
        let now = srv.now();
        srv.throw_equipped(a, 2, now);
        assert_eq!(srv.projectiles.states().len(), 1);

        srv.handle_disconnect(1);
        assert!(srv.players.is_empty());
        assert!(srv.projectiles.states().is_empty());
        assert!(srv.vision_cache.is_empty());
    }

    // ── Snapshot & vision cache ─────────────────────────────────────

    #[test]
    fn vision_cache_invalidates_on_wall_change() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");

        let v1 = srv.vision_for(a).unwrap();
        assert_eq!(v1.kind, "polygon");
        assert!(srv.vision_cache.contains_key(&a));

        // Unchanged state: cache hit (same polygon back)
        let v2 = srv.vision_for(a).unwrap();
        assert_eq!(v1.polygon.len(), v2.polygon.len());

        // Wall mutation bumps the version and recomputes
        let wall_id = srv
            .destruction
            .walls()
            .find(|w| !w.is_boundary)
            .unwrap()
            .id
            .clone();
        srv.destruction.apply_damage(&wall_id, 0, 10.0, 0.0);
        let cached_version = srv.vision_cache[&a].wall_version;
        let _ = srv.vision_for(a).unwrap();
        assert!(srv.vision_cache[&a].wall_version > cached_version);
    }

    #[test]
    fn grenade_throw_reduces_ammo_and_spawns_projectile() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a");
        srv.players.get_mut(&a).unwrap().try_switch(WeaponType::FragGrenade).unwrap();

        let now = srv.now();
        srv.throw_equipped(a, 3, now);

        assert_eq!(
            srv.players[&a].weapons[&WeaponType::FragGrenade].current_ammo,
            get_weapon_config(WeaponType::FragGrenade).magazine_size - 1
        );
        assert_eq!(srv.projectiles.states().len(), 1);
        assert!(pending_ids(&srv).contains(&id::PROJECTILE_CREATED));
    }

    #[test]
    fn throw_on_non_throwable_is_denied_silently() {
        let mut srv = server();
        let a = join(&mut srv, 1, "a"); // rifle equipped
        srv.throw_equipped(a, 2, srv.now());
        assert!(srv.projectiles.states().is_empty());
        assert!(srv.pending_events.is_empty());
    }
}

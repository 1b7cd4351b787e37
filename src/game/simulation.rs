//! Server-side movement resolution: WASD vector, speed tiers, collision
//! against physically intact wall slices, axis slide, mouse-facing rotation.

use glam::DVec2;

use crate::config;
use crate::msg::types::InputPayload;
use crate::systems::destruction::DestructionSystem;

use super::player::{MovementState, Player};

/// Can a player circle stand at `pos`? Boundary strips are excluded — the
/// field clamp handles them — and destroyed slices are walkable gaps.
pub fn can_move(pos: DVec2, walls: &DestructionSystem) -> bool {
    let radius = config::PLAYER_SIZE / 2.0;
    for wall in walls.walls() {
        if wall.is_boundary {
            continue;
        }
        if !wall.rect.expanded(radius).contains(pos) {
            continue;
        }
        for i in 0..config::WALL_SLICES {
            if !wall.slice_intact(i) {
                continue;
            }
            if wall.slice_rect(i).distance_to(pos) < radius {
                return false;
            }
        }
    }
    true
}

fn movement_state_for(direction: DVec2, input: &InputPayload) -> MovementState {
    if direction == DVec2::ZERO {
        return MovementState::Idle;
    }
    if input.keys.shift {
        MovementState::Running
    } else if input.keys.ctrl {
        MovementState::Sneaking
    } else {
        MovementState::Walking
    }
}

fn speed_for(state: MovementState) -> f64 {
    match state {
        MovementState::Idle | MovementState::Dead => 0.0,
        MovementState::Walking => config::WALK_SPEED,
        MovementState::Running => config::WALK_SPEED * config::RUN_SPEED_MULTIPLIER,
        MovementState::Sneaking => config::WALK_SPEED * config::SNEAK_SPEED_MULTIPLIER,
    }
}

/// Apply one input to a living player: move with slide, face the mouse,
/// clamp to the field.
pub fn resolve_movement(
    player: &mut Player,
    input: &InputPayload,
    dt: f64,
    walls: &DestructionSystem,
) {
    if !player.is_alive() {
        return;
    }

    let mut direction = DVec2::ZERO;
    if input.keys.w {
        direction.y -= 1.0;
    }
    if input.keys.s {
        direction.y += 1.0;
    }
    if input.keys.a {
        direction.x -= 1.0;
    }
    if input.keys.d {
        direction.x += 1.0;
    }
    if direction != DVec2::ZERO {
        direction = direction.normalize();
    }

    let state = movement_state_for(direction, input);
    let velocity = direction * speed_for(state);
    let start = player.position;
    let target = start + velocity * dt;

    let landed = if can_move(target, walls) {
        target
    } else {
        // Slide: try each axis alone, X first
        let x_only = DVec2::new(target.x, start.y);
        let y_only = DVec2::new(start.x, target.y);
        if can_move(x_only, walls) {
            x_only
        } else if can_move(y_only, walls) {
            y_only
        } else {
            start
        }
    };

    let radius = config::PLAYER_SIZE / 2.0;
    player.position = DVec2::new(
        landed.x.clamp(radius, config::GAME_WIDTH - radius),
        landed.y.clamp(radius, config::GAME_HEIGHT - radius),
    );
    player.velocity = if dt > 0.0 {
        (player.position - start) / dt
    } else {
        DVec2::ZERO
    };
    player.movement_state = state;
    player.rotation = (input.mouse.y - player.position.y)
        .atan2(input.mouse.x - player.position.x);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::Team;
    use crate::msg::types::{InputKeys, InputMouse};
    use crate::systems::destruction::{Material, Wall};
    use crate::systems::geom::Rect;

    const DT: f64 = 1.0 / 60.0;

    fn player_at(x: f64, y: f64) -> Player {
        Player::new(1, "p".into(), Team::Red, DVec2::new(x, y))
    }

    fn input(keys: InputKeys, mouse_x: f64, mouse_y: f64) -> InputPayload {
        InputPayload {
            keys,
            mouse: InputMouse {
                x: mouse_x,
                y: mouse_y,
                left: false,
                right: false,
            },
            sequence: 1,
            timestamp: 0.0,
        }
    }

    fn keys(w: bool, a: bool, s: bool, d: bool) -> InputKeys {
        InputKeys {
            w,
            a,
            s,
            d,
            ..InputKeys::default()
        }
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let walls = DestructionSystem::new();
        let mut p = player_at(100.0, 100.0);
        resolve_movement(&mut p, &input(keys(false, false, true, true), 200.0, 100.0), DT, &walls);

        let moved = p.position - DVec2::new(100.0, 100.0);
        let expected = config::WALK_SPEED * DT;
        assert!((moved.length() - expected).abs() < 1e-9);
        assert_eq!(p.movement_state, MovementState::Walking);
    }

    #[test]
    fn speed_tiers_follow_modifier_keys() {
        let walls = DestructionSystem::new();

        let mut runner = player_at(100.0, 100.0);
        let mut k = keys(false, false, false, true);
        k.shift = true;
        resolve_movement(&mut runner, &input(k, 200.0, 100.0), DT, &walls);
        let run_dist = runner.position.x - 100.0;

        let mut sneaker = player_at(100.0, 100.0);
        let mut k = keys(false, false, false, true);
        k.ctrl = true;
        resolve_movement(&mut sneaker, &input(k, 200.0, 100.0), DT, &walls);
        let sneak_dist = sneaker.position.x - 100.0;

        assert!((run_dist - config::WALK_SPEED * config::RUN_SPEED_MULTIPLIER * DT).abs() < 1e-9);
        assert!((sneak_dist - config::WALK_SPEED * config::SNEAK_SPEED_MULTIPLIER * DT).abs() < 1e-9);
        assert_eq!(runner.movement_state, MovementState::Running);
        assert_eq!(sneaker.movement_state, MovementState::Sneaking);
    }

    #[test]
    fn wall_blocks_and_slide_runs_along_it() {
        let mut walls = DestructionSystem::new();
        walls.set_walls(vec![Wall::new(
            "w",
            Rect::new(110.0, 50.0, 10.0, 100.0),
            Material::Concrete,
        )]);

        // Touching the wall, moving diagonally into it: X is blocked,
        // Y slides.
        let mut p = player_at(105.0, 100.0);
        resolve_movement(&mut p, &input(keys(false, false, true, true), 200.0, 100.0), DT, &walls);
        assert!((p.position.x - 105.0).abs() < 1e-9, "x should not advance");
        assert!(p.position.y > 100.0, "y should slide along the wall");
    }

    #[test]
    fn destroyed_slice_is_a_walkable_gap() {
        let mut wall = Wall::new("w", Rect::new(110.0, 50.0, 10.0, 100.0), Material::Concrete);
        let idx = wall.slice_index(DVec2::new(115.0, 100.0));
        wall.slice_health[idx] = 0.0;
        let mut walls = DestructionSystem::new();
        walls.set_walls(vec![wall]);

        // Standing in the gap is legal now
        assert!(can_move(DVec2::new(115.0, 100.0), &walls));
        // But the neighbouring slice still blocks
        assert!(!can_move(DVec2::new(115.0, 75.0), &walls));
    }

    #[test]
    fn position_clamps_to_the_field() {
        let walls = DestructionSystem::new();
        let r = config::PLAYER_SIZE / 2.0;
        let mut p = player_at(r, 100.0);
        resolve_movement(&mut p, &input(keys(false, true, false, false), 0.0, 100.0), 1.0, &walls);
        assert_eq!(p.position.x, r);
    }

    #[test]
    fn rotation_tracks_the_mouse() {
        let walls = DestructionSystem::new();
        let mut p = player_at(100.0, 100.0);
        resolve_movement(&mut p, &input(InputKeys::default(), 100.0, 200.0), DT, &walls);
        assert!((p.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(p.movement_state, MovementState::Idle);
    }

    #[test]
    fn dead_players_do_not_move() {
        let walls = DestructionSystem::new();
        let mut p = player_at(100.0, 100.0);
        p.mark_dead(0.0, 2);
        resolve_movement(&mut p, &input(keys(true, false, false, false), 0.0, 0.0), DT, &walls);
        assert_eq!(p.position, DVec2::new(100.0, 100.0));
        assert_eq!(p.movement_state, MovementState::Dead);
    }
}

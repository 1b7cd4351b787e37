//! Map loading: wall sets and team spawns from a JSON file, with a
//! hard-coded fallback layout when the file is missing or malformed.
//! The four boundary strips are always appended.

use glam::DVec2;
use once_cell::sync::Lazy;
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config;
use crate::game::player::Team;
use crate::systems::destruction::{Material, Wall};
use crate::systems::geom::Rect;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WallDef {
    id: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    material: Material,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpawnDef {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapFile {
    walls: Vec<WallDef>,
    #[serde(default)]
    red_spawns: Vec<SpawnDef>,
    #[serde(default)]
    blue_spawns: Vec<SpawnDef>,
}

#[derive(Debug, Clone)]
pub struct MapData {
    pub walls: Vec<Wall>,
    pub red_spawns: Vec<DVec2>,
    pub blue_spawns: Vec<DVec2>,
}

impl MapData {
    /// Uniform pick from the team's spawn list, or the hard-coded safe
    /// fallback when the map has none.
    pub fn pick_spawn(&self, team: Team, rng: &mut impl Rng) -> DVec2 {
        let (spawns, fallback) = match team {
            Team::Red => (&self.red_spawns, config::RED_SPAWN_FALLBACK),
            Team::Blue => (&self.blue_spawns, config::BLUE_SPAWN_FALLBACK),
        };
        if spawns.is_empty() {
            DVec2::new(fallback.0, fallback.1)
        } else {
            spawns[rng.gen_range(0..spawns.len())]
        }
    }

    /// Map walls plus the four boundary strips, ready for the destruction
    /// system.
    pub fn all_walls(&self) -> Vec<Wall> {
        let mut walls = self.walls.clone();
        walls.extend(boundary_walls());
        walls
    }
}

/// Four thin strips just outside the playfield. They always exist.
pub fn boundary_walls() -> Vec<Wall> {
    let w = config::GAME_WIDTH;
    let h = config::GAME_HEIGHT;
    vec![
        Wall::new_boundary("boundary:top", Rect::new(0.0, -10.0, w, 10.0)),
        Wall::new_boundary("boundary:bottom", Rect::new(0.0, h, w, 10.0)),
        Wall::new_boundary("boundary:left", Rect::new(-10.0, 0.0, 10.0, h)),
        Wall::new_boundary("boundary:right", Rect::new(w, 0.0, 10.0, h)),
    ]
}

static FALLBACK_MAP: Lazy<MapData> = Lazy::new(|| MapData {
    walls: vec![
        Wall::new("mid", Rect::new(235.0, 85.0, 10.0, 100.0), Material::Concrete),
        Wall::new("top-cover", Rect::new(150.0, 40.0, 60.0, 12.0), Material::Wood),
        Wall::new("bottom-cover", Rect::new(270.0, 218.0, 60.0, 12.0), Material::Wood),
        Wall::new("red-glass", Rect::new(110.0, 120.0, 8.0, 50.0), Material::Glass),
        Wall::new("blue-glass", Rect::new(362.0, 100.0, 8.0, 50.0), Material::Glass),
        Wall::new("vault", Rect::new(300.0, 70.0, 50.0, 10.0), Material::Metal),
    ],
    red_spawns: vec![DVec2::new(40.0, 100.0), DVec2::new(40.0, 170.0)],
    blue_spawns: vec![DVec2::new(440.0, 100.0), DVec2::new(440.0, 170.0)],
});

/// Load a map file; any failure falls back to the test layout so the room
/// can always start.
pub fn load_map(path: &str) -> MapData {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<MapFile>(&raw) {
            Ok(file) => {
                let map = MapData {
                    walls: file
                        .walls
                        .into_iter()
                        .map(|d| {
                            Wall::new(d.id, Rect::new(d.x, d.y, d.width, d.height), d.material)
                        })
                        .collect(),
                    red_spawns: file.red_spawns.iter().map(|s| DVec2::new(s.x, s.y)).collect(),
                    blue_spawns: file
                        .blue_spawns
                        .iter()
                        .map(|s| DVec2::new(s.x, s.y))
                        .collect(),
                };
                info!("Map loaded: {} walls from {path}", map.walls.len());
                map
            }
            Err(e) => {
                warn!("Map file {path} is malformed ({e}), using fallback walls");
                FALLBACK_MAP.clone()
            }
        },
        Err(_) => {
            warn!("Map file {path} not found, using fallback walls");
            FALLBACK_MAP.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back() {
        let map = load_map("definitely-not-a-real-map.json");
        assert!(!map.walls.is_empty());
        assert!(!map.red_spawns.is_empty());
    }

    #[test]
    fn all_walls_includes_boundaries() {
        let map = load_map("nope.json");
        let walls = map.all_walls();
        let boundaries = walls.iter().filter(|w| w.is_boundary).count();
        assert_eq!(boundaries, 4);
        assert_eq!(walls.len(), map.walls.len() + 4);
    }

    #[test]
    fn spawn_fallback_when_team_has_no_spawns() {
        let map = MapData {
            walls: Vec::new(),
            red_spawns: Vec::new(),
            blue_spawns: Vec::new(),
        };
        let mut rng = rand::thread_rng();
        assert_eq!(
            map.pick_spawn(Team::Red, &mut rng),
            DVec2::new(config::RED_SPAWN_FALLBACK.0, config::RED_SPAWN_FALLBACK.1)
        );
        assert_eq!(
            map.pick_spawn(Team::Blue, &mut rng),
            DVec2::new(config::BLUE_SPAWN_FALLBACK.0, config::BLUE_SPAWN_FALLBACK.1)
        );
    }

    #[test]
    fn spawn_picks_from_the_list() {
        let map = FALLBACK_MAP.clone();
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let spawn = map.pick_spawn(Team::Red, &mut rng);
            assert!(map.red_spawns.contains(&spawn));
        }
    }
}

use bevy::prelude::*;
use rand::prelude::IndexedRandom;

use crate::messages::{PhaseUpdate, ServerMessage};
use crate::movement::state::{CharacterState, CustomMode, MovementMode};
use crate::movement::walk::FLOOR_HOVER;
use crate::net::send_to_client;
use crate::types::*;

pub const COUNTDOWN_SECONDS: f32 = 3.0;

/// Players may not spawn closer together than this.
const MIN_SPAWN_SEPARATION: f32 = 150.0;

/// Fixed spawn slots on the starting platform, feet at z = 0.
const SPAWN_POINTS: [(f32, f32); 8] = [
    (-400.0, -400.0),
    (-400.0, -200.0),
    (-400.0, 0.0),
    (-400.0, 200.0),
    (-600.0, -400.0),
    (-600.0, -200.0),
    (-600.0, 0.0),
    (-600.0, 200.0),
];

/// Where the match currently stands.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub enum MatchPhase {
    Countdown { remaining: f32 },
    Running,
    Finished { winner: u32 },
}

impl Default for MatchPhase {
    fn default() -> Self {
        MatchPhase::Countdown {
            remaining: COUNTDOWN_SECONDS,
        }
    }
}

impl MatchPhase {
    pub fn to_update(self) -> PhaseUpdate {
        match self {
            MatchPhase::Countdown { remaining } => PhaseUpdate::Countdown {
                seconds_remaining: remaining,
            },
            MatchPhase::Running => PhaseUpdate::Running,
            MatchPhase::Finished { winner } => PhaseUpdate::Finished { winner },
        }
    }
}

/// Pick a free spawn slot, at random among those far enough from everyone
/// already standing around. Falls back to any slot when the field is crowded.
pub fn choose_spawn(occupied: &[Vec3], capsule_half_height: f32) -> Vec3 {
    let mut rng = rand::rng();

    let free: Vec<&(f32, f32)> = SPAWN_POINTS
        .iter()
        .filter(|(x, y)| {
            occupied
                .iter()
                .all(|p| Vec2::new(p.x - x, p.y - y).length() >= MIN_SPAWN_SEPARATION)
        })
        .collect();

    let (x, y) = match free.choose(&mut rng) {
        Some(&&slot) => slot,
        None => *SPAWN_POINTS.choose(&mut rng).unwrap_or(&SPAWN_POINTS[0]),
    };

    Vec3::new(x, y, capsule_half_height + FLOOR_HOVER)
}

/// Advance the pre-match countdown. Characters stay rooted until it expires,
/// then everyone is released into normal walking at once.
pub fn countdown_system(
    mut phase: ResMut<MatchPhase>,
    mut players: Query<(&PlayerId, &mut CharacterState)>,
    connected_clients: Res<ConnectedClients>,
    time: Res<Time>,
) {
    let MatchPhase::Countdown { remaining } = *phase else {
        return;
    };

    let remaining = remaining - time.delta_secs();
    if remaining > 0.0 {
        *phase = MatchPhase::Countdown { remaining };
    } else {
        *phase = MatchPhase::Running;
        for (id, mut state) in players.iter_mut() {
            if state.is_rooted() {
                state.set_movement_mode(MovementMode::Walking, CustomMode::None);
            }
            info!("releasing player {} into the match", id.0);
        }
    }

    let update = ServerMessage::Phase {
        phase: phase.to_update(),
    };
    let ids: Vec<u32> = connected_clients.ids.lock().unwrap().clone();
    for id in ids {
        let _ = send_to_client(id, &connected_clients, &update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_respects_separation() {
        let occupied = vec![Vec3::new(-400.0, -400.0, 91.0)];
        for _ in 0..20 {
            let spawn = choose_spawn(&occupied, 90.0);
            let d = Vec2::new(spawn.x - -400.0, spawn.y - -400.0).length();
            assert!(d >= MIN_SPAWN_SEPARATION, "spawned {d} from occupied slot");
        }
    }

    #[test]
    fn test_spawn_falls_back_when_crowded() {
        // Every slot occupied: we still get a valid point, not a panic
        let occupied: Vec<Vec3> = SPAWN_POINTS
            .iter()
            .map(|(x, y)| Vec3::new(*x, *y, 91.0))
            .collect();
        let spawn = choose_spawn(&occupied, 90.0);
        assert!(SPAWN_POINTS
            .iter()
            .any(|(x, y)| *x == spawn.x && *y == spawn.y));
    }

    #[test]
    fn test_phase_defaults_to_countdown() {
        match MatchPhase::default() {
            MatchPhase::Countdown { remaining } => {
                assert!((remaining - COUNTDOWN_SECONDS).abs() < 1e-6)
            }
            other => panic!("unexpected phase {other:?}"),
        }
    }
}

use bevy::prelude::*;

use crate::match_flow::MatchPhase;
use crate::messages::ServerMessage;
use crate::movement::state::CharacterState;
use crate::movement::world::Aabb;
use crate::net::send_to_client;
use crate::types::*;

/// Reset teleports drop the player in from this far above the checkpoint base.
const RESET_HEIGHT_ABOVE_CHECKPOINT: f32 = 200.0;

/// Ordered course checkpoints. Trigger volumes are ordered top-down by
/// center height, so course layouts can be authored in any order.
#[derive(Resource, Clone, Debug)]
pub struct CheckpointTrack {
    pub volumes: Vec<Aabb>,
}

impl CheckpointTrack {
    pub fn new(mut volumes: Vec<Aabb>) -> Self {
        volumes.sort_by(|a, b| {
            let az = (a.min.z + a.max.z) * 0.5;
            let bz = (b.min.z + b.max.z) * 0.5;
            bz.total_cmp(&az)
        });
        Self { volumes }
    }

    /// The course for the demo level: over the mantle ledge, along the
    /// walkway into the wall-run corridor, finish past it. Each checkpoint
    /// sits lower than the one before.
    pub fn demo_course() -> Self {
        Self::new(vec![
            // Top of the mantle ledge
            Aabb::new(Vec3::new(600.0, -200.0, 150.0), Vec3::new(900.0, 200.0, 400.0)),
            // Corridor entry, at walkway height
            Aabb::new(Vec3::new(-200.0, 1000.0, 150.0), Vec3::new(200.0, 1200.0, 350.0)),
            // Finish beyond the corridor, on the ground
            Aabb::new(Vec3::new(-200.0, 3000.0, 0.0), Vec3::new(200.0, 3300.0, 300.0)),
        ])
    }
}

/// Per-player course progress.
#[derive(Component, Clone, Debug, Default)]
pub struct CheckpointProgress {
    /// Index of the next checkpoint to reach. The one before it, if any, is
    /// where a fall reset puts the player back.
    pub next: usize,
}

/// Where a player who dropped below their next checkpoint gets reset to, if
/// anywhere.
///
/// Dropping below the base of the checkpoint ahead means the route was
/// missed; the player goes back in above the one they last reached. Players
/// who have not reached any checkpoint yet, or have passed the last one, are
/// never reset.
fn fall_reset_target(
    track: &CheckpointTrack,
    progress: &CheckpointProgress,
    position: Vec3,
) -> Option<Vec3> {
    let current = track.volumes.get(progress.next.checked_sub(1)?)?;
    let next = track.volumes.get(progress.next)?;
    if position.z >= next.min.z {
        return None;
    }

    let center = (current.min + current.max) * 0.5;
    Some(Vec3::new(
        center.x,
        center.y,
        current.min.z + RESET_HEIGHT_ABOVE_CHECKPOINT,
    ))
}

/// Advance checkpoint progress, declare a winner, and reset anyone who fell
/// off the course.
pub fn track_checkpoints_system(
    track: Res<CheckpointTrack>,
    mut phase: ResMut<MatchPhase>,
    mut players: Query<(&PlayerId, &mut CharacterState, &mut CheckpointProgress)>,
    connected_clients: Res<ConnectedClients>,
) {
    if *phase != MatchPhase::Running {
        return;
    }

    for (id, mut state, mut progress) in players.iter_mut() {
        if let Some(reset) = fall_reset_target(&track, &progress, state.position) {
            state.on_teleported(reset);
            info!(
                "player {} fell below checkpoint {}, reset to checkpoint {}",
                id.0,
                progress.next,
                progress.next - 1
            );
            continue;
        }

        let Some(volume) = track.volumes.get(progress.next) else {
            continue;
        };
        if !volume.contains(state.position) {
            continue;
        }

        progress.next += 1;
        info!("player {} reached checkpoint {}", id.0, progress.next);

        let reached = ServerMessage::CheckpointReached {
            player_id: id.0,
            checkpoint: progress.next,
        };
        let ids: Vec<u32> = connected_clients.ids.lock().unwrap().clone();
        for client in ids {
            let _ = send_to_client(client, &connected_clients, &reached);
        }

        if progress.next == track.volumes.len() {
            *phase = MatchPhase::Finished { winner: id.0 };
            info!("player {} wins", id.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_orders_top_down() {
        let low = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0));
        let high = Aabb::new(Vec3::new(0.0, 0.0, 500.0), Vec3::new(10.0, 10.0, 510.0));
        let mid = Aabb::new(Vec3::new(0.0, 0.0, 200.0), Vec3::new(10.0, 10.0, 210.0));

        let track = CheckpointTrack::new(vec![low, high, mid]);
        assert_eq!(track.volumes[0].min.z, 500.0);
        assert_eq!(track.volumes[1].min.z, 200.0);
        assert_eq!(track.volumes[2].min.z, 0.0);
    }

    #[test]
    fn test_no_reset_before_first_checkpoint() {
        let track = CheckpointTrack::demo_course();
        let progress = CheckpointProgress::default();
        // Fresh spawns start on the ground, well below every checkpoint
        assert!(fall_reset_target(&track, &progress, Vec3::new(-400.0, -200.0, 91.0)).is_none());
    }

    #[test]
    fn test_fall_below_next_checkpoint_resets_above_current() {
        let track = CheckpointTrack::demo_course();
        // Ledge reached; corridor entry (base z = 150) is next
        let progress = CheckpointProgress { next: 1 };

        // Standing on the ledge top: above the next base, no reset
        assert!(fall_reset_target(&track, &progress, Vec3::new(750.0, 0.0, 241.0)).is_none());

        // Fell back to the ground
        let reset = fall_reset_target(&track, &progress, Vec3::new(750.0, 300.0, 91.0))
            .expect("fall below the next checkpoint must reset");
        assert_eq!(reset, Vec3::new(750.0, 0.0, 350.0));
    }

    #[test]
    fn test_no_reset_past_last_checkpoint() {
        let track = CheckpointTrack::demo_course();
        let progress = CheckpointProgress { next: 3 };
        assert!(fall_reset_target(&track, &progress, Vec3::new(0.0, 3400.0, 91.0)).is_none());
    }
}

//! Client-side mirror of the entities the server broadcasts.
//!
//! The mirror never simulates anything. Every decoded frame is merged in:
//! - the tuple carrying the local session id overwrites the local player
//! - every other player tuple is upserted into the remote players
//! - active projectile tuples are upserted, removed ones are forgotten
//!
//! Remote players missing from a frame are handled by [`RemotePlayerPolicy`].

use log::{debug, trace};
use shared::{BroadcastFrame, PlayerSnapshot, ProjectileUpdate};
use std::collections::{BTreeMap, BTreeSet};

/// What happens to a remote player whose id is missing from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemotePlayerPolicy {
    /// Frames carry every live player, so absence means the player left.
    #[default]
    PruneAbsent,
    /// Remote players stay once seen.
    Retain,
}

/// Display-only copy of one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorEntity {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

impl From<&PlayerSnapshot> for MirrorEntity {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            id: snapshot.id,
            x: snapshot.x,
            y: snapshot.y,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityMirror {
    policy: RemotePlayerPolicy,
    local_id: Option<u32>,
    local_player: Option<MirrorEntity>,
    remote_players: BTreeMap<u32, MirrorEntity>,
    projectiles: BTreeMap<u32, MirrorEntity>,
    connected: bool,
    frames_applied: u64,
}

impl EntityMirror {
    pub fn new(policy: RemotePlayerPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Records the id learned from the welcome line and marks the mirror
    /// connected. The local player becomes active once a frame carries it.
    pub fn set_local_id(&mut self, id: u32) {
        self.local_id = Some(id);
        self.connected = true;

        // A remote entry under our own id would otherwise render twice.
        if let Some(entity) = self.remote_players.remove(&id) {
            self.local_player = Some(entity);
        }
    }

    pub fn set_disconnected(&mut self) {
        self.connected = false;
    }

    /// Merges one decoded frame.
    pub fn apply_frame(&mut self, frame: &BroadcastFrame) {
        let mut seen = BTreeSet::new();

        for snapshot in &frame.players {
            let entity = MirrorEntity::from(snapshot);

            if Some(snapshot.id) == self.local_id {
                self.local_player = Some(entity);
                continue;
            }

            seen.insert(snapshot.id);
            match self.remote_players.get_mut(&snapshot.id) {
                Some(existing) => *existing = entity,
                None => {
                    debug!("Remote player {} appeared", snapshot.id);
                    self.remote_players.insert(snapshot.id, entity);
                }
            }
        }

        if self.policy == RemotePlayerPolicy::PruneAbsent {
            self.remote_players.retain(|id, _| {
                let keep = seen.contains(id);
                if !keep {
                    debug!("Remote player {} left", id);
                }
                keep
            });
        }

        for update in &frame.projectiles {
            match *update {
                ProjectileUpdate::Active { id, x, y } => {
                    self.projectiles.insert(id, MirrorEntity { id, x, y });
                }
                ProjectileUpdate::Removed { id } => {
                    if self.projectiles.remove(&id).is_none() {
                        trace!("Removal for unknown projectile {}", id);
                    }
                }
            }
        }

        self.frames_applied += 1;
    }

    pub fn local_id(&self) -> Option<u32> {
        self.local_id
    }

    /// The local player as last broadcast, once the handshake is done and a
    /// frame has carried it.
    pub fn local_player(&self) -> Option<&MirrorEntity> {
        self.local_id.and(self.local_player.as_ref())
    }

    pub fn remote_player(&self, id: u32) -> Option<&MirrorEntity> {
        self.remote_players.get(&id)
    }

    pub fn remote_players(&self) -> impl Iterator<Item = &MirrorEntity> {
        self.remote_players.values()
    }

    pub fn projectile(&self, id: u32) -> Option<&MirrorEntity> {
        self.projectiles.get(&id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &MirrorEntity> {
        self.projectiles.values()
    }

    pub fn projectile_ids(&self) -> Vec<u32> {
        self.projectiles.keys().copied().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::decode_broadcast;

    fn connected_mirror(policy: RemotePlayerPolicy) -> EntityMirror {
        let mut mirror = EntityMirror::new(policy);
        mirror.set_local_id(0);
        mirror
    }

    #[test]
    fn test_new_mirror_is_empty_and_disconnected() {
        let mirror = EntityMirror::new(RemotePlayerPolicy::default());
        assert!(!mirror.is_connected());
        assert!(mirror.local_player().is_none());
        assert_eq!(mirror.remote_players().count(), 0);
        assert_eq!(mirror.frames_applied(), 0);
    }

    #[test]
    fn test_frame_populates_players_and_projectile() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        let frame = decode_broadcast("0,10,20,1,30,40:5,1,12,18,").unwrap();

        mirror.apply_frame(&frame);

        let local = mirror.local_player().unwrap();
        assert_eq!(local.id, 0);
        assert_approx_eq!(local.x, 10.0);
        assert_approx_eq!(local.y, 20.0);

        let remote = mirror.remote_player(1).unwrap();
        assert_approx_eq!(remote.x, 30.0);
        assert_approx_eq!(remote.y, 40.0);
        assert_eq!(mirror.remote_players().count(), 1);

        let projectile = mirror.projectile(5).unwrap();
        assert_approx_eq!(projectile.x, 12.0);
        assert_approx_eq!(projectile.y, 18.0);
    }

    #[test]
    fn test_removed_projectile_leaves_mirror() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40:5,1,12,18,").unwrap());
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40:5,0,,,").unwrap());

        assert!(mirror.projectile(5).is_none());
        assert!(mirror.projectile_ids().is_empty());
        assert_eq!(mirror.remote_players().count(), 1);
        assert_eq!(mirror.frames_applied(), 2);
    }

    #[test]
    fn test_positions_update_in_place() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40:5,1,12,18,").unwrap());
        mirror.apply_frame(&decode_broadcast("0,11,21,1,31,41:5,1,12,10,").unwrap());

        assert_approx_eq!(mirror.local_player().unwrap().x, 11.0);
        assert_approx_eq!(mirror.remote_player(1).unwrap().y, 41.0);
        assert_approx_eq!(mirror.projectile(5).unwrap().y, 10.0);
        assert_eq!(mirror.projectile_ids(), vec![5]);
    }

    #[test]
    fn test_absent_remote_player_is_pruned() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40,2,50,60:").unwrap());
        mirror.apply_frame(&decode_broadcast("0,10,20,2,50,60:").unwrap());

        assert!(mirror.remote_player(1).is_none());
        assert!(mirror.remote_player(2).is_some());
    }

    #[test]
    fn test_retain_policy_keeps_remote_players() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::Retain);
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40:").unwrap());
        mirror.apply_frame(&decode_broadcast("0,10,20:").unwrap());

        let remote = mirror.remote_player(1).unwrap();
        assert_approx_eq!(remote.x, 30.0);
    }

    #[test]
    fn test_removal_of_unknown_projectile_is_ignored() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,1,2:9,0,,,").unwrap());

        assert!(mirror.projectile_ids().is_empty());
        assert!(mirror.local_player().is_some());
    }

    #[test]
    fn test_frames_before_handshake_are_all_remote() {
        let mut mirror = EntityMirror::new(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,10,20,1,30,40:").unwrap());
        assert!(mirror.local_player().is_none());
        assert_eq!(mirror.remote_players().count(), 2);

        mirror.set_local_id(0);
        assert_approx_eq!(mirror.local_player().unwrap().x, 10.0);
        assert_eq!(mirror.remote_players().count(), 1);
    }

    #[test]
    fn test_disconnect_keeps_last_state() {
        let mut mirror = connected_mirror(RemotePlayerPolicy::PruneAbsent);
        mirror.apply_frame(&decode_broadcast("0,10,20:").unwrap());
        mirror.set_disconnected();

        assert!(!mirror.is_connected());
        assert!(mirror.local_player().is_some());
    }
}

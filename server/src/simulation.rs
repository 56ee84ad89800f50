//! Authoritative simulation of players and projectiles.
//!
//! The [`Simulation`] is owned by the broadcast loop and mutated only through
//! [`Simulation::tick`] and the player lifecycle calls made from that same
//! task. Each tick consumes the latest intent of every session and returns the
//! frame to broadcast.

use log::{debug, info, trace};
use rand::Rng;
use shared::{
    bounds_overlap, check_collision, Bounds, BroadcastFrame, Intent, PlayerState,
    ProjectileState, ProjectileUpdate, ACCELERATION, FIELD_HEIGHT, FIELD_WIDTH, FRICTION,
    PLAYER_HEIGHT, PLAYER_WIDTH, PROJECTILE_SPEED,
};
use std::collections::{BTreeMap, BTreeSet};

/// Attempts made to find a free spawn point before accepting an overlap.
const SPAWN_ATTEMPTS: usize = 16;

/// What happens to a projectile once it has been included in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileRetention {
    /// Broadcast once as active, then announce the removal on the next frame.
    BroadcastOnce,
    /// Keep moving the projectile every tick until it leaves the field.
    UntilOutOfBounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub field_width: f32,
    pub field_height: f32,
    pub acceleration: f32,
    pub friction: f32,
    pub projectile_speed: f32,
    pub retention: ProjectileRetention,
    /// Active projectiles a single player may own at once. `None` is unlimited.
    pub max_projectiles_per_player: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            field_width: FIELD_WIDTH,
            field_height: FIELD_HEIGHT,
            acceleration: ACCELERATION,
            friction: FRICTION,
            projectile_speed: PROJECTILE_SPEED,
            retention: ProjectileRetention::BroadcastOnce,
            max_projectiles_per_player: None,
        }
    }
}

pub struct Simulation {
    config: SimulationConfig,
    pub tick: u32,
    players: BTreeMap<u32, PlayerState>,
    projectiles: Vec<ProjectileState>,
    /// Ids sent as active last frame under `BroadcastOnce`, removed on the next.
    pending_removals: Vec<u32>,
    next_projectile_id: u32,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            tick: 0,
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            pending_removals: Vec::new(),
            next_projectile_id: 0,
        }
    }

    /// Spawns a player at a random free position inside the field.
    pub fn add_player(&mut self, id: u32) -> &PlayerState {
        let max_x = self.config.field_width - PLAYER_WIDTH;
        let max_y = self.config.field_height - PLAYER_HEIGHT;
        let mut rng = rand::thread_rng();

        let mut candidate = PlayerState::new(id, 0.0, 0.0);
        for _ in 0..SPAWN_ATTEMPTS {
            candidate.x = rng.gen_range(0.0..=max_x);
            candidate.y = rng.gen_range(0.0..=max_y);

            let blocked = self
                .players
                .values()
                .any(|other| check_collision(&candidate, other));
            if !blocked {
                break;
            }
        }

        self.add_player_at(id, candidate.x, candidate.y)
    }

    /// Places a player at `(x, y)`, clamped into the field.
    pub fn add_player_at(&mut self, id: u32, x: f32, y: f32) -> &PlayerState {
        let x = x.clamp(0.0, self.config.field_width - PLAYER_WIDTH);
        let y = y.clamp(0.0, self.config.field_height - PLAYER_HEIGHT);
        info!("Player {} spawned at ({:.1}, {:.1})", id, x, y);

        self.players.insert(id, PlayerState::new(id, x, y));
        &self.players[&id]
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!("Player {} despawned", id);
        }
        removed
    }

    /// Makes the player set match `live_ids` exactly, spawning newcomers and
    /// despawning players whose session is gone.
    pub fn sync_players<I>(&mut self, live_ids: I)
    where
        I: IntoIterator<Item = u32>,
    {
        let live: BTreeSet<u32> = live_ids.into_iter().collect();

        let stale: Vec<u32> = self
            .players
            .keys()
            .filter(|id| !live.contains(*id))
            .copied()
            .collect();
        for id in stale {
            self.remove_player(id);
        }

        for id in live {
            if !self.players.contains_key(&id) {
                self.add_player(id);
            }
        }
    }

    pub fn player(&self, id: u32) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn projectiles(&self) -> &[ProjectileState] {
        &self.projectiles
    }

    /// Advances the world by one tick and returns the frame to broadcast.
    ///
    /// Players without an entry in `intents` are treated as idle.
    pub fn tick(&mut self, intents: &BTreeMap<u32, Intent>) -> BroadcastFrame {
        self.tick = self.tick.wrapping_add(1);

        let mut next_projectiles = self.advance_projectiles();
        self.apply_intents(intents, &mut next_projectiles);
        self.dampen_collisions();
        self.integrate_players();

        let frame = self.build_frame(next_projectiles);

        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {} players, {} projectiles in flight",
                self.tick,
                self.players.len(),
                self.projectiles.len()
            );
        }

        frame
    }

    /// Moves every projectile carried over from the previous tick, flagging
    /// the ones that left the field.
    fn advance_projectiles(&mut self) -> Vec<ProjectileState> {
        let (width, height) = (self.config.field_width, self.config.field_height);

        std::mem::take(&mut self.projectiles)
            .into_iter()
            .map(|mut projectile| {
                projectile.advance();
                if projectile.is_out_of_bounds(width, height) {
                    projectile.active = false;
                }
                projectile
            })
            .collect()
    }

    fn apply_intents(
        &mut self,
        intents: &BTreeMap<u32, Intent>,
        projectiles: &mut Vec<ProjectileState>,
    ) {
        let acceleration = self.config.acceleration;

        for (id, player) in self.players.iter_mut() {
            let intent = intents.get(id).copied().unwrap_or_default().clamped();

            player.vel_x += intent.move_x as f32 * acceleration;
            player.vel_y += intent.move_y as f32 * acceleration;

            if !intent.fire {
                continue;
            }

            if let Some(cap) = self.config.max_projectiles_per_player {
                let owned = projectiles
                    .iter()
                    .filter(|p| p.active && p.owner == *id)
                    .count();
                if owned >= cap {
                    trace!("Player {} is at the projectile cap", id);
                    continue;
                }
            }

            let projectile_id = self.next_projectile_id;
            self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
            projectiles.push(ProjectileState::spawn(
                projectile_id,
                player,
                self.config.projectile_speed,
            ));
        }
    }

    /// Halts both players of every pair whose next positions would overlap.
    /// All pairs are tested against this tick's velocities before any player
    /// is halted, so the outcome does not depend on visiting order.
    fn dampen_collisions(&mut self) {
        let predicted: Vec<(u32, Bounds)> = self
            .players
            .values()
            .map(|player| (player.id, player.predicted_bounds()))
            .collect();

        let mut halted = BTreeSet::new();
        for (i, (first, first_bounds)) in predicted.iter().enumerate() {
            for (second, second_bounds) in &predicted[i + 1..] {
                if bounds_overlap(*first_bounds, *second_bounds) {
                    trace!("Players {} and {} would collide", first, second);
                    halted.insert(*first);
                    halted.insert(*second);
                }
            }
        }

        for id in halted {
            if let Some(player) = self.players.get_mut(&id) {
                player.vel_x = 0.0;
                player.vel_y = 0.0;
            }
        }
    }

    fn integrate_players(&mut self) {
        let max_x = self.config.field_width - PLAYER_WIDTH;
        let max_y = self.config.field_height - PLAYER_HEIGHT;
        let friction = self.config.friction;

        for player in self.players.values_mut() {
            player.x += player.vel_x;
            player.y += player.vel_y;

            if player.x < 0.0 {
                player.x = 0.0;
                player.vel_x = 0.0;
            } else if player.x > max_x {
                player.x = max_x;
                player.vel_x = 0.0;
            }

            if player.y < 0.0 {
                player.y = 0.0;
                player.vel_y = 0.0;
            } else if player.y > max_y {
                player.y = max_y;
                player.vel_y = 0.0;
            }

            player.vel_x = apply_friction(player.vel_x, friction);
            player.vel_y = apply_friction(player.vel_y, friction);
        }
    }

    /// Builds the outgoing frame and the projectile set for the next tick
    /// without mutating either collection while it is being walked.
    fn build_frame(&mut self, projectiles: Vec<ProjectileState>) -> BroadcastFrame {
        let mut updates: Vec<ProjectileUpdate> = self
            .pending_removals
            .drain(..)
            .map(|id| ProjectileUpdate::Removed { id })
            .collect();

        let mut retained = Vec::with_capacity(projectiles.len());
        for projectile in projectiles {
            updates.push(projectile.update());
            if !projectile.active {
                continue;
            }

            match self.config.retention {
                ProjectileRetention::BroadcastOnce => self.pending_removals.push(projectile.id),
                ProjectileRetention::UntilOutOfBounds => retained.push(projectile),
            }
        }
        self.projectiles = retained;

        BroadcastFrame {
            players: self.players.values().map(PlayerState::snapshot).collect(),
            projectiles: updates,
        }
    }
}

/// Decelerates towards zero without ever crossing it.
fn apply_friction(velocity: f32, friction: f32) -> f32 {
    if velocity > 0.0 {
        (velocity - friction).max(0.0)
    } else if velocity < 0.0 {
        (velocity + friction).min(0.0)
    } else {
        velocity
    }
}

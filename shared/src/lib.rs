//! Data model shared by the authoritative server and the reconciling client.
//!
//! The server owns [`PlayerState`] and [`ProjectileState`] and advances them on
//! every tick. Only the flattened [`BroadcastFrame`] ever crosses the wire, and
//! the client mirrors it without running any physics of its own.

pub mod protocol;

pub use protocol::{
    decode_broadcast, decode_broadcast_bytes, decode_intent, decode_intent_bytes,
    decode_welcome, encode_broadcast, encode_frame, encode_intent, encode_welcome,
    ProtocolError,
};

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 800.0;
pub const PLAYER_WIDTH: f32 = 60.0;
pub const PLAYER_HEIGHT: f32 = 75.0;
pub const PROJECTILE_WIDTH: f32 = 10.0;
pub const PROJECTILE_HEIGHT: f32 = 10.0;
/// Velocity gained per tick while a movement axis is held.
pub const ACCELERATION: f32 = 0.25;
/// Velocity lost per tick on each axis, never past zero.
pub const FRICTION: f32 = 0.05;
/// Vertical projectile velocity per tick. Negative is up the screen.
pub const PROJECTILE_SPEED: f32 = -8.0;

/// Desired movement and fire signal of one session for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Intent {
    pub move_x: i8,
    pub move_y: i8,
    pub fire: bool,
}

impl Intent {
    /// Builds an intent, clamping both axes into `{-1, 0, 1}`.
    pub fn new(move_x: i32, move_y: i32, fire: bool) -> Self {
        Self {
            move_x: move_x.clamp(-1, 1) as i8,
            move_y: move_y.clamp(-1, 1) as i8,
            fire,
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    /// Returns a copy whose axes are guaranteed to be in `{-1, 0, 1}`.
    pub fn clamped(self) -> Self {
        Self::new(self.move_x as i32, self.move_y as i32, self.fire)
    }
}

/// Axis-aligned box as `(left, top, right, bottom)`.
pub type Bounds = (f32, f32, f32, f32);

/// Canonical state of one player, owned by the server simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl PlayerState {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }

    pub fn get_bounds(&self) -> Bounds {
        (self.x, self.y, self.x + PLAYER_WIDTH, self.y + PLAYER_HEIGHT)
    }

    /// Bounds after one more step at the current velocity.
    pub fn predicted_bounds(&self) -> Bounds {
        let x = self.x + self.vel_x;
        let y = self.y + self.vel_y;
        (x, y, x + PLAYER_WIDTH, y + PLAYER_HEIGHT)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + PLAYER_WIDTH / 2.0, self.y + PLAYER_HEIGHT / 2.0)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
        }
    }
}

/// Strict overlap test; boxes that merely touch do not collide.
pub fn bounds_overlap(a: Bounds, b: Bounds) -> bool {
    let (x1, y1, x2, y2) = a;
    let (x3, y3, x4, y4) = b;

    !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
}

pub fn check_collision(player1: &PlayerState, player2: &PlayerState) -> bool {
    bounds_overlap(player1.get_bounds(), player2.get_bounds())
}

/// Canonical state of one projectile.
///
/// Ids are unique among active projectiles only. Once a projectile has been
/// removed its id may be handed out again.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileState {
    pub id: u32,
    pub owner: u32,
    pub x: f32,
    pub y: f32,
    pub vel_y: f32,
    pub active: bool,
}

impl ProjectileState {
    /// Spawns a projectile centred on the firing player.
    pub fn spawn(id: u32, owner: &PlayerState, vel_y: f32) -> Self {
        let (cx, cy) = owner.center();
        Self {
            id,
            owner: owner.id,
            x: cx - PROJECTILE_WIDTH / 2.0,
            y: cy - PROJECTILE_HEIGHT / 2.0,
            vel_y,
            active: true,
        }
    }

    pub fn advance(&mut self) {
        self.y += self.vel_y;
    }

    /// True once no part of the projectile is inside the field.
    pub fn is_out_of_bounds(&self, field_width: f32, field_height: f32) -> bool {
        self.x + PROJECTILE_WIDTH <= 0.0
            || self.x >= field_width
            || self.y + PROJECTILE_HEIGHT <= 0.0
            || self.y >= field_height
    }

    pub fn update(&self) -> ProjectileUpdate {
        if self.active {
            ProjectileUpdate::Active {
                id: self.id,
                x: self.x,
                y: self.y,
            }
        } else {
            ProjectileUpdate::Removed { id: self.id }
        }
    }
}

/// One player tuple of a broadcast frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// One projectile tuple of a broadcast frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileUpdate {
    Active { id: u32, x: f32, y: f32 },
    Removed { id: u32 },
}

impl ProjectileUpdate {
    pub fn id(&self) -> u32 {
        match self {
            ProjectileUpdate::Active { id, .. } | ProjectileUpdate::Removed { id } => *id,
        }
    }
}

/// Everything the server broadcasts for a single tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BroadcastFrame {
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileUpdate>,
}

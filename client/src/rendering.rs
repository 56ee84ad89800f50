//! macroquad presentation of the entity mirror: ships, projectiles, the
//! connection indicator and the console overlay.

use crate::mirror::{EntityMirror, MirrorEntity};
use macroquad::prelude::*;
use shared::{PLAYER_HEIGHT, PLAYER_WIDTH, PROJECTILE_HEIGHT, PROJECTILE_WIDTH};

const BACKGROUND: Color = Color::new(0.0, 0.0, 0.0, 1.0);
const LOCAL_SHIP: Color = GREEN;
const REMOTE_SHIP: Color = Color::new(1.0, 0.27, 0.27, 1.0);
const PROJECTILE: Color = YELLOW;

/// Draws one frame of the entity mirror. Holds no game state of its own.
pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        Renderer { width, height }
    }

    pub fn render(&mut self, mirror: &EntityMirror, console_visible: bool) {
        clear_background(BACKGROUND);

        for projectile in mirror.projectiles() {
            draw_rectangle(
                projectile.x,
                projectile.y,
                PROJECTILE_WIDTH,
                PROJECTILE_HEIGHT,
                PROJECTILE,
            );
        }

        for remote in mirror.remote_players() {
            self.draw_ship(remote, REMOTE_SHIP);
        }

        if let Some(local) = mirror.local_player() {
            self.draw_ship(local, LOCAL_SHIP);
        }

        self.draw_connection_indicator(mirror);

        if console_visible {
            self.draw_console(mirror);
        }
    }

    fn draw_ship(&mut self, ship: &MirrorEntity, color: Color) {
        draw_rectangle(ship.x, ship.y, PLAYER_WIDTH, PLAYER_HEIGHT, color);
        draw_rectangle_lines(ship.x, ship.y, PLAYER_WIDTH, PLAYER_HEIGHT, 2.0, WHITE);
        draw_text(
            &ship.id.to_string(),
            ship.x + 4.0,
            ship.y + 16.0,
            16.0,
            WHITE,
        );
    }

    fn draw_connection_indicator(&mut self, mirror: &EntityMirror) {
        let color = if mirror.is_connected() { GREEN } else { RED };
        let x = self.width - 50.0;

        draw_rectangle(x, 10.0, 8.0, 8.0, color);
        draw_text("CON", x + 10.0, 18.0, 12.0, WHITE);
    }

    fn draw_console(&mut self, mirror: &EntityMirror) {
        let top = self.height - 60.0;
        draw_rectangle(
            0.0,
            top,
            self.width,
            60.0,
            Color::from_rgba(26, 26, 26, 220),
        );

        let position = match mirror.local_player() {
            Some(player) => format!("Player x: {}, y: {}", player.x as i32, player.y as i32),
            None => "Player not active".to_string(),
        };
        let session = match mirror.local_id() {
            Some(id) => format!("session {}", id),
            None => "no session".to_string(),
        };

        draw_text(&format!("{} ({})", position, session), 10.0, top + 22.0, 18.0, WHITE);
        draw_text(
            &format!("bullets: {:?}", mirror.projectile_ids()),
            10.0,
            top + 44.0,
            18.0,
            WHITE,
        );
    }
}

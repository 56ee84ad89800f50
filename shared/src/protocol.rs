//! Line-oriented text codec for everything that crosses the wire.
//!
//! Three frame kinds exist, each terminated by `\n`:
//! - welcome, server to client once after accept: `id:<session id>`
//! - intent, client to server: `<move_x>,<move_y>,<fire>`
//! - broadcast, server to client every tick:
//!   `<id>,<x>,<y>,...:<id>,<status>,<x>,<y>,...`
//!
//! The broadcast line always contains exactly one `:`. The left segment holds
//! player tuples of three fields, the right segment projectile tuples of four
//! fields where status `1` is active and `0` removed. A removed projectile
//! carries empty coordinates. Non-empty projectile segments end with a
//! terminating comma, and decoding tolerates one on either segment.

use crate::{BroadcastFrame, Intent, PlayerSnapshot, ProjectileUpdate};
use thiserror::Error;

pub const PLAYER_TUPLE_WIDTH: usize = 3;
pub const PROJECTILE_TUPLE_WIDTH: usize = 4;

const SEGMENT_SEPARATOR: char = ':';
const WELCOME_PREFIX: &str = "id:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed intent {0:?}")]
    MalformedIntent(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("{segment} segment has {fields} fields, not a multiple of {width}")]
    MalformedTuple {
        segment: &'static str,
        fields: usize,
        width: usize,
    },
    #[error("malformed field {0:?}")]
    MalformedField(String),
    #[error("malformed welcome {0:?}")]
    MalformedWelcome(String),
}

pub fn encode_intent(intent: &Intent) -> String {
    let intent = intent.clamped();
    format!(
        "{},{},{}\n",
        intent.move_x,
        intent.move_y,
        u8::from(intent.fire)
    )
}

/// Parses an intent line. Any numeric value is accepted and reduced to its
/// sign, so `2.5,-1,1` decodes as `(1, -1, fire)`.
pub fn decode_intent(line: &str) -> Result<Intent, ProtocolError> {
    let line = line.trim();
    let malformed = || ProtocolError::MalformedIntent(line.to_string());

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(malformed());
    }

    let mut values = [0.0f32; 3];
    for (value, field) in values.iter_mut().zip(&fields) {
        *value = field
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(malformed)?;
    }

    Ok(Intent::new(
        axis(values[0]),
        axis(values[1]),
        values[2] != 0.0,
    ))
}

fn axis(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// [`decode_intent`] for a raw line that may not be valid UTF-8.
pub fn decode_intent_bytes(line: &[u8]) -> Result<Intent, ProtocolError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::MalformedIntent(String::from_utf8_lossy(line).into_owned()))?;
    decode_intent(line)
}

pub fn encode_broadcast(players: &[PlayerSnapshot], projectiles: &[ProjectileUpdate]) -> String {
    let player_segment = players
        .iter()
        .map(|p| format!("{},{},{}", p.id, p.x, p.y))
        .collect::<Vec<_>>()
        .join(",");

    let mut projectile_segment = String::new();
    for update in projectiles {
        match update {
            ProjectileUpdate::Active { id, x, y } => {
                projectile_segment.push_str(&format!("{},1,{},{},", id, x, y));
            }
            ProjectileUpdate::Removed { id } => {
                projectile_segment.push_str(&format!("{},0,,,", id));
            }
        }
    }

    format!(
        "{}{}{}\n",
        player_segment, SEGMENT_SEPARATOR, projectile_segment
    )
}

pub fn encode_frame(frame: &BroadcastFrame) -> String {
    encode_broadcast(&frame.players, &frame.projectiles)
}

pub fn decode_broadcast(line: &str) -> Result<BroadcastFrame, ProtocolError> {
    let line = line.trim();
    let (player_part, projectile_part) = line
        .split_once(SEGMENT_SEPARATOR)
        .ok_or_else(|| ProtocolError::MalformedFrame("missing segment separator".to_string()))?;

    if projectile_part.contains(SEGMENT_SEPARATOR) {
        return Err(ProtocolError::MalformedFrame(
            "more than two segments".to_string(),
        ));
    }

    let player_fields = segment_fields(player_part, "player", PLAYER_TUPLE_WIDTH, |_| false)?;
    let players = player_fields
        .chunks(PLAYER_TUPLE_WIDTH)
        .map(|tuple| -> Result<PlayerSnapshot, ProtocolError> {
            Ok(PlayerSnapshot {
                id: parse_id(tuple[0])?,
                x: parse_coordinate(tuple[1])?,
                y: parse_coordinate(tuple[2])?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Only a removed projectile carries empty fields at the end of its tuple.
    let projectile_fields = segment_fields(
        projectile_part,
        "projectile",
        PROJECTILE_TUPLE_WIDTH,
        |tuple| tuple[1] == "0",
    )?;
    let projectiles = projectile_fields
        .chunks(PROJECTILE_TUPLE_WIDTH)
        .map(|tuple| -> Result<ProjectileUpdate, ProtocolError> {
            let id = parse_id(tuple[0])?;
            match tuple[1] {
                "0" => Ok(ProjectileUpdate::Removed { id }),
                "1" => Ok(ProjectileUpdate::Active {
                    id,
                    x: parse_coordinate(tuple[2])?,
                    y: parse_coordinate(tuple[3])?,
                }),
                other => Err(ProtocolError::MalformedField(other.to_string())),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BroadcastFrame {
        players,
        projectiles,
    })
}

/// [`decode_broadcast`] for a raw line that may not be valid UTF-8.
pub fn decode_broadcast_bytes(line: &[u8]) -> Result<BroadcastFrame, ProtocolError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| ProtocolError::MalformedFrame(format!("not UTF-8: {}", e)))?;
    decode_broadcast(line)
}

/// Splits a segment into trimmed fields, dropping a single terminating comma.
///
/// A trailing empty field is ambiguous: it is either the terminator after a
/// short tuple or the last field of a full one. It only counts as data when
/// `empty_tail_allowed` accepts the last tuple; otherwise the segment is
/// reported as one field short.
fn segment_fields<'a>(
    segment: &'a str,
    name: &'static str,
    width: usize,
    empty_tail_allowed: fn(&[&str]) -> bool,
) -> Result<Vec<&'a str>, ProtocolError> {
    let segment = segment.trim();
    if segment.is_empty() || segment == "," {
        return Ok(Vec::new());
    }

    let mut fields: Vec<&str> = segment.split(',').map(str::trim).collect();
    if fields.len() % width != 0 && fields.last() == Some(&"") {
        fields.pop();
    }

    let malformed = |fields: usize| ProtocolError::MalformedTuple {
        segment: name,
        fields,
        width,
    };

    if fields.len() % width != 0 {
        return Err(malformed(fields.len()));
    }

    if fields.last() == Some(&"") && !empty_tail_allowed(&fields[fields.len() - width..]) {
        return Err(malformed(fields.len() - 1));
    }

    Ok(fields)
}

fn parse_id(field: &str) -> Result<u32, ProtocolError> {
    field
        .parse::<u32>()
        .map_err(|_| ProtocolError::MalformedField(field.to_string()))
}

fn parse_coordinate(field: &str) -> Result<f32, ProtocolError> {
    field
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::MalformedField(field.to_string()))
}

pub fn encode_welcome(session_id: u32) -> String {
    format!("{}{}\n", WELCOME_PREFIX, session_id)
}

pub fn decode_welcome(line: &str) -> Result<u32, ProtocolError> {
    let line = line.trim();
    line.strip_prefix(WELCOME_PREFIX)
        .and_then(|id| id.trim().parse::<u32>().ok())
        .ok_or_else(|| ProtocolError::MalformedWelcome(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, x: f32, y: f32) -> PlayerSnapshot {
        PlayerSnapshot { id, x, y }
    }

    #[test]
    fn test_intent_roundtrip_over_whole_domain() {
        for move_x in -1..=1 {
            for move_y in -1..=1 {
                for fire in [false, true] {
                    let intent = Intent::new(move_x, move_y, fire);
                    let decoded = decode_intent(&encode_intent(&intent)).unwrap();
                    assert_eq!(decoded, intent);
                }
            }
        }
    }

    #[test]
    fn test_encode_intent_format() {
        assert_eq!(encode_intent(&Intent::new(-1, 0, true)), "-1,0,1\n");
        assert_eq!(encode_intent(&Intent::idle()), "0,0,0\n");
    }

    #[test]
    fn test_encode_intent_clamps_out_of_domain_values() {
        let raw = Intent {
            move_x: 9,
            move_y: -4,
            fire: false,
        };
        assert_eq!(encode_intent(&raw), "1,-1,0\n");
    }

    #[test]
    fn test_decode_intent_reduces_values_to_sign() {
        let intent = decode_intent("2.5, -0.1, 1\n").unwrap();
        assert_eq!(intent, Intent::new(1, -1, true));
    }

    #[test]
    fn test_decode_intent_rejects_wrong_field_count() {
        for line in ["", "1,0", "1,0,1,0", "\n"] {
            assert!(matches!(
                decode_intent(line),
                Err(ProtocolError::MalformedIntent(_))
            ));
        }
    }

    #[test]
    fn test_decode_intent_rejects_non_numeric_fields() {
        for line in ["a,0,1", "1,,1", "1,0,NaN", "1,0,inf"] {
            assert!(matches!(
                decode_intent(line),
                Err(ProtocolError::MalformedIntent(_))
            ));
        }
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let players = vec![player(0, 10.5, 20.25), player(3, 740.0, 0.0)];
        let projectiles = vec![
            ProjectileUpdate::Active {
                id: 5,
                x: 12.0,
                y: -3.75,
            },
            ProjectileUpdate::Removed { id: 2 },
        ];

        let line = encode_broadcast(&players, &projectiles);
        let frame = decode_broadcast(&line).unwrap();

        assert_eq!(frame.players, players);
        assert_eq!(frame.projectiles, projectiles);
    }

    #[test]
    fn test_broadcast_roundtrip_without_projectiles() {
        let players = vec![player(0, 1.0, 2.0)];
        let line = encode_broadcast(&players, &[]);
        assert_eq!(line, "0,1,2:\n");

        let frame = decode_broadcast(&line).unwrap();
        assert_eq!(frame.players, players);
        assert!(frame.projectiles.is_empty());
    }

    #[test]
    fn test_broadcast_roundtrip_empty_frame() {
        let frame = BroadcastFrame::default();
        let line = encode_frame(&frame);
        assert_eq!(line, ":\n");
        assert_eq!(decode_broadcast(&line).unwrap(), frame);
    }

    #[test]
    fn test_encode_broadcast_wire_format() {
        let players = vec![player(0, 10.0, 20.0), player(1, 30.0, 40.0)];
        let active = vec![ProjectileUpdate::Active {
            id: 5,
            x: 12.0,
            y: 18.0,
        }];
        assert_eq!(
            encode_broadcast(&players, &active),
            "0,10,20,1,30,40:5,1,12,18,\n"
        );

        let removed = vec![ProjectileUpdate::Removed { id: 5 }];
        assert_eq!(
            encode_broadcast(&players, &removed),
            "0,10,20,1,30,40:5,0,,,\n"
        );
    }

    #[test]
    fn test_decode_tolerates_lone_comma_projectile_segment() {
        let frame = decode_broadcast("0,10,20,:,").unwrap();
        assert_eq!(frame.players, vec![player(0, 10.0, 20.0)]);
        assert!(frame.projectiles.is_empty());
    }

    #[test]
    fn test_decode_removed_projectile_without_terminator() {
        let frame = decode_broadcast("0,1,2:5,0,,").unwrap();
        assert_eq!(frame.projectiles, vec![ProjectileUpdate::Removed { id: 5 }]);
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        assert!(matches!(
            decode_broadcast("0,10,20"),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_broadcast(""),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_extra_separator() {
        assert!(matches!(
            decode_broadcast("0,1,2:5,1,3,4,:9"),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_partial_tuples() {
        assert_eq!(
            decode_broadcast("0,10:"),
            Err(ProtocolError::MalformedTuple {
                segment: "player",
                fields: 2,
                width: PLAYER_TUPLE_WIDTH,
            })
        );
        assert_eq!(
            decode_broadcast("0,10,20:5,1,12"),
            Err(ProtocolError::MalformedTuple {
                segment: "projectile",
                fields: 3,
                width: PROJECTILE_TUPLE_WIDTH,
            })
        );
    }

    #[test]
    fn test_decode_rejects_garbled_fields() {
        assert!(matches!(
            decode_broadcast("x,10,20:"),
            Err(ProtocolError::MalformedField(_))
        ));
        assert!(matches!(
            decode_broadcast("0,10,20:5,7,1,1,"),
            Err(ProtocolError::MalformedField(_))
        ));
        assert!(matches!(
            decode_broadcast("0,10,20:5,1,a,3,"),
            Err(ProtocolError::MalformedField(_))
        ));
    }

    #[test]
    fn test_decode_terminated_short_tuples_report_field_count() {
        assert_eq!(
            decode_broadcast("0,1,2,3,4,:"),
            Err(ProtocolError::MalformedTuple {
                segment: "player",
                fields: 5,
                width: PLAYER_TUPLE_WIDTH,
            })
        );
        assert_eq!(
            decode_broadcast("0,1,2:5,1,,,"),
            Err(ProtocolError::MalformedTuple {
                segment: "projectile",
                fields: 3,
                width: PROJECTILE_TUPLE_WIDTH,
            })
        );

        let frame = decode_broadcast("0,1,2:5,1,3,4,6,0,,").unwrap();
        assert_eq!(frame.projectiles[1], ProjectileUpdate::Removed { id: 6 });
    }

    #[test]
    fn test_decode_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            decode_intent_bytes(b"\xff\xfe,0,1\n"),
            Err(ProtocolError::MalformedIntent(_))
        ));
        assert!(matches!(
            decode_broadcast_bytes(b"0,1,2:\xff\n"),
            Err(ProtocolError::MalformedFrame(_))
        ));

        assert_eq!(decode_intent_bytes(b"0,-1,1\n").unwrap(), Intent::new(0, -1, true));
        assert_eq!(
            decode_broadcast_bytes(b"0,10,20:\n").unwrap().players,
            vec![player(0, 10.0, 20.0)]
        );
    }

    #[test]
    fn test_welcome_roundtrip() {
        let line = encode_welcome(42);
        assert_eq!(line, "id:42\n");
        assert_eq!(decode_welcome(&line).unwrap(), 42);
    }

    #[test]
    fn test_decode_welcome_rejects_garbage() {
        for line in ["", "id:", "id:abc", "42", "0,1,2:"] {
            assert!(matches!(
                decode_welcome(line),
                Err(ProtocolError::MalformedWelcome(_))
            ));
        }
    }
}

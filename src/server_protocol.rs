use serde_json::{Map, Value};

use crate::objectives::ObjectivePolicy;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    CreateMatch {
        name: String,
        max_players: Option<i64>,
        max_rounds: Option<i64>,
        win_points: Option<i64>,
        turn_seconds: Option<i64>,
        policy: Option<ObjectivePolicy>,
    },
    JoinMatch {
        match_id: String,
        name: String,
        reconnect_token: Option<String>,
    },
    Ready {
        ready: bool,
    },
    // Piece types stay raw so an unknown name surfaces as a placement error.
    PlacePiece {
        x: i32,
        y: i32,
        piece_type: String,
        rotation: i32,
    },
    PickupPiece {
        x: i32,
        y: i32,
    },
    PassTurn,
    Preview {
        x: i32,
        y: i32,
        piece_type: String,
        rotation: i32,
    },
    Heartbeat,
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "create_match" => {
            let name = object.get("name")?.as_str()?.to_string();
            let policy = match object.get("policy") {
                None => None,
                Some(value) => Some(ObjectivePolicy::parse(value.as_str()?)?),
            };
            Some(ParsedClientMessage::CreateMatch {
                name,
                max_players: parse_optional_i64(object.get("maxPlayers"))?,
                max_rounds: parse_optional_i64(object.get("maxRounds"))?,
                win_points: parse_optional_i64(object.get("winPoints"))?,
                turn_seconds: parse_optional_i64(object.get("turnSeconds"))?,
                policy,
            })
        }
        "join_match" => {
            let match_id = object.get("matchId")?.as_str()?.to_string();
            let name = object.get("name")?.as_str()?.to_string();
            let reconnect_token = match object.get("reconnectToken") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            Some(ParsedClientMessage::JoinMatch {
                match_id,
                name,
                reconnect_token,
            })
        }
        "ready" => {
            let ready = match object.get("ready") {
                None => true,
                Some(value) => value.as_bool()?,
            };
            Some(ParsedClientMessage::Ready { ready })
        }
        "place_piece" => {
            let (x, y) = parse_cell(object)?;
            Some(ParsedClientMessage::PlacePiece {
                x,
                y,
                piece_type: object.get("pieceType")?.as_str()?.to_string(),
                rotation: parse_rotation(object)?,
            })
        }
        "pickup_piece" => {
            let (x, y) = parse_cell(object)?;
            Some(ParsedClientMessage::PickupPiece { x, y })
        }
        "pass_turn" => Some(ParsedClientMessage::PassTurn),
        "preview" => {
            let (x, y) = parse_cell(object)?;
            Some(ParsedClientMessage::Preview {
                x,
                y,
                piece_type: object.get("pieceType")?.as_str()?.to_string(),
                rotation: parse_rotation(object)?,
            })
        }
        "heartbeat" => Some(ParsedClientMessage::Heartbeat),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_cell(object: &Map<String, Value>) -> Option<(i32, i32)> {
    let x = parse_optional_i64(object.get("x"))??;
    let y = parse_optional_i64(object.get("y"))??;
    Some((i32::try_from(x).ok()?, i32::try_from(y).ok()?))
}

fn parse_rotation(object: &Map<String, Value>) -> Option<i32> {
    let rotation = parse_optional_i64(object.get("rotation"))?.unwrap_or(0);
    i32::try_from(rotation).ok()
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}

use crate::types::{Direction, Inventory};

pub const BOARD_SIZE: i32 = 12;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

pub const DEFAULT_MAX_ROUNDS: u32 = 20;
pub const DEFAULT_WIN_POINTS: i32 = 75;
pub const TURN_DURATION_MS: u64 = 60_000;
pub const MAX_MISSED_TURNS: u32 = 3;
pub const TIMEOUT_SWEEP_MS: u64 = 1_000;

pub const OBJECTIVES_PER_PLAYER: usize = 2;

pub const AMPLIFIER_COUNT: usize = 5;
pub const AMPLIFIER_EDGE_MARGIN: i32 = 3;
pub const AMPLIFIER_MAX_ATTEMPTS: u32 = 100;

pub const PROTECTED_CELLS_PER_SOURCE: i32 = 2;

pub const MIRROR_CHAIN_MIN_LEN: usize = 3;
pub const MIRROR_CHAIN_POINTS_PER_LINK: i32 = 5;
pub const CASCADE_RADIUS: i32 = 2;
pub const CASCADE_MIN_CELLS: usize = 10;
pub const CASCADE_BONUS: i32 = 3;

pub const MATCH_CODE_LEN: usize = 6;
pub const MATCH_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const RECONNECT_TOKEN_LEN: usize = 48;
pub const MAX_NAME_LEN: usize = 16;
pub const ARCHIVE_MAX_AGE_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

pub const PLAYER_COLORS: [&str; MAX_PLAYERS] = ["#FF6B6B", "#4ECDC4", "#FFD93D", "#A855F7"];

pub fn starting_inventory() -> Inventory {
    Inventory {
        mirror: 15,
        prism: 8,
        blocker: 10,
        splitter: 6,
    }
}

pub fn beam_step_budget(board_size: i32) -> u32 {
    (board_size.max(0) as u32) * 2
}

pub fn player_color(player_index: usize) -> &'static str {
    PLAYER_COLORS[player_index % PLAYER_COLORS.len()]
}

pub fn get_sources_per_player(player_count: usize) -> usize {
    if player_count >= 4 {
        return 2;
    }
    3
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSlot {
    pub player: usize,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
}

// Every slot sits one cell outside the board and points inward.
pub fn get_source_layout(player_count: usize, board_size: i32) -> Vec<SourceSlot> {
    let mut slots = Vec::new();
    let far = board_size;
    if player_count >= 4 {
        for player in 0..player_count {
            let step = player as i32;
            let column = 1 + 3 * step;
            if player % 2 == 0 {
                slots.push(SourceSlot {
                    player,
                    x: column,
                    y: -1,
                    direction: Direction::Down,
                });
            } else {
                slots.push(SourceSlot {
                    player,
                    x: column,
                    y: far,
                    direction: Direction::Up,
                });
            }
            let row = 1 + 3 * ((step + 1) % 4);
            if player < 2 {
                slots.push(SourceSlot {
                    player,
                    x: -1,
                    y: row,
                    direction: Direction::Right,
                });
            } else {
                slots.push(SourceSlot {
                    player,
                    x: far,
                    y: row,
                    direction: Direction::Left,
                });
            }
        }
        return slots;
    }

    for player in 0..player_count {
        let step = player as i32;
        slots.push(SourceSlot {
            player,
            x: 2 + 4 * step,
            y: -1,
            direction: Direction::Down,
        });
        slots.push(SourceSlot {
            player,
            x: 1 + 4 * step,
            y: far,
            direction: Direction::Up,
        });
        slots.push(SourceSlot {
            player,
            x: -1,
            y: 2 + 4 * step,
            direction: Direction::Right,
        });
    }
    slots
}

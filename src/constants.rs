pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

/// Pixel extent of one grid cell. Sub-cell displacement is measured against
/// this; reaching it snaps an actor to the next discrete cell.
pub const CELL_SIZE: i32 = 32;

pub const PLAYER_SPEED: f32 = 6.0;
pub const GHOST_SPEED: f32 = 5.0;

/// Maximum number of cells a single path search may expand before aborting.
pub const SEARCH_BUDGET: usize = 500;

/// Chance per planning pass that a non-fearful ghost picks a random cell
/// instead of the player's cell. Fearful ghosts always scatter.
pub const SCATTER_CHANCE: f32 = 0.45;

pub const FIRST_RELEASE_DELAY_MS: u64 = 10_000;
pub const RELEASE_INTERVAL_MS: u64 = 8_000;

/// Linear probe steps rightward from the pen anchor when a dead ghost is
/// returned to the pen. Past the bound, the anchor itself is the fallback.
pub const PEN_PROBE_LIMIT: i32 = 4;

pub const POWER_DURATION_MS: u64 = 8_000;
pub const RESPAWN_HOLD_MS: u64 = 2_000;

pub const START_LIVES: i32 = 3;
pub const DOT_SCORE: i32 = 10;
pub const PELLET_SCORE: i32 = 50;
pub const GHOST_SCORE: i32 = 200;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Normal,
    Power,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Cleared,
    OutOfLives,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn manhattan(self, other: Vec2) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub state: PlayerState,
    #[serde(rename = "deltaX")]
    pub delta_x: f32,
    #[serde(rename = "deltaY")]
    pub delta_y: f32,
    #[serde(rename = "powerUntil")]
    pub power_until: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    #[serde(rename = "deltaX")]
    pub delta_x: f32,
    #[serde(rename = "deltaY")]
    pub delta_y: f32,
    pub fearful: bool,
    pub trapped: bool,
    pub dead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Vec2>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MazeInit {
    pub width: i32,
    pub height: i32,
    #[serde(rename = "cellSize")]
    pub cell_size: i32,
    pub tiles: Vec<String>,
    pub dots: Vec<(i32, i32)>,
    #[serde(rename = "powerPellets")]
    pub power_pellets: Vec<(i32, i32)>,
    #[serde(rename = "playerSpawn")]
    pub player_spawn: Vec2,
    #[serde(rename = "releaseCell")]
    pub release_cell: Vec2,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameConfig {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "searchBudget")]
    pub search_budget: usize,
    #[serde(rename = "powerDurationMs")]
    pub power_duration_ms: u64,
    #[serde(rename = "startLives")]
    pub start_lives: i32,
    #[serde(rename = "timeLimitMs")]
    pub time_limit_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    DotEaten {
        x: i32,
        y: i32,
    },
    PelletTaken {
        x: i32,
        y: i32,
    },
    GhostEaten {
        #[serde(rename = "ghostId")]
        ghost_id: String,
    },
    GhostReleased {
        #[serde(rename = "ghostId")]
        ghost_id: String,
    },
    GhostPenned {
        #[serde(rename = "ghostId")]
        ghost_id: String,
    },
    PlayerCaught {
        #[serde(rename = "livesLeft")]
        lives_left: i32,
    },
    GameOver {
        reason: GameOverReason,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "timeLeftMs")]
    pub time_left_ms: Option<u64>,
    pub score: i32,
    pub lives: i32,
    #[serde(rename = "dotsLeft")]
    pub dots_left: usize,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: GameOverReason,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub ticks: u64,
    pub score: i32,
    #[serde(rename = "livesLeft")]
    pub lives_left: i32,
    #[serde(rename = "dotsEaten")]
    pub dots_eaten: i32,
    #[serde(rename = "ghostsEaten")]
    pub ghosts_eaten: i32,
}

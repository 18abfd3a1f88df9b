use crate::constants::{
    CELL_SIZE, DOT_SCORE, FIRST_RELEASE_DELAY_MS, GHOST_SCORE, GHOST_SPEED, PELLET_SCORE,
    PLAYER_SPEED, POWER_DURATION_MS, RESPAWN_HOLD_MS, SEARCH_BUDGET, START_LIVES, TICK_RATE,
};
use crate::ghost::Ghost;
use crate::maze::Maze;
use crate::pathfinder::PathFinder;
use crate::rng::Rng;
use crate::types::{
    Direction, GameConfig, GameOverReason, GameSummary, GhostView, PlayerState, PlayerView,
    RuntimeEvent, Snapshot, Vec2,
};

mod ghost_ai;
mod utils;

use self::utils::offset;

#[derive(Clone, Debug)]
struct PlayerInternal {
    x: i32,
    y: i32,
    dir: Direction,
    desired_dir: Direction,
    delta_x: f32,
    delta_y: f32,
    state: PlayerState,
    power_until: u64,
    spawn: Vec2,
}

#[derive(Clone, Debug, Default)]
pub struct GameEngineOptions {
    pub time_limit_ms: Option<u64>,
    pub debug_paths: bool,
}

/// One game: the maze, the player, all ghosts and the behavior state that
/// drives them. Time is the engine's own accumulated `elapsed_ms`; nothing
/// below the binaries reads the wall clock, so a fixed seed and a fixed
/// input sequence replay identically.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub maze: Maze,

    rng: Rng,
    finder: PathFinder,
    player: PlayerInternal,
    ghosts: Vec<Ghost>,
    events: Vec<RuntimeEvent>,

    score: i32,
    lives: i32,
    dots_eaten: i32,
    ghosts_eaten: i32,

    elapsed_ms: u64,
    tick_counter: u64,
    next_release_at_ms: u64,
    hold_until_ms: u64,
    debug_paths: bool,
    time_limit_ms: Option<u64>,
    ended: bool,
    end_reason: Option<GameOverReason>,
}

impl GameEngine {
    pub fn new(maze: Maze, seed: u32, options: GameEngineOptions) -> Self {
        let spawn = maze.player_spawn();
        let ghosts = maze
            .ghost_starts()
            .iter()
            .enumerate()
            .map(|(idx, start)| {
                Ghost::new(
                    format!("ghost_{}", idx + 1),
                    start.cell,
                    start.trapped,
                    GHOST_SPEED,
                )
            })
            .collect();

        Self {
            maze,
            rng: Rng::new(seed),
            finder: PathFinder::new(SEARCH_BUDGET),
            player: PlayerInternal {
                x: spawn.x,
                y: spawn.y,
                dir: Direction::None,
                desired_dir: Direction::None,
                delta_x: 0.0,
                delta_y: 0.0,
                state: PlayerState::Normal,
                power_until: 0,
                spawn,
            },
            ghosts,
            events: Vec::new(),
            score: 0,
            lives: START_LIVES,
            dots_eaten: 0,
            ghosts_eaten: 0,
            elapsed_ms: 0,
            tick_counter: 0,
            next_release_at_ms: FIRST_RELEASE_DELAY_MS,
            hold_until_ms: 0,
            debug_paths: options.debug_paths,
            time_limit_ms: options.time_limit_ms,
            ended: false,
            end_reason: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn set_desired_dir(&mut self, dir: Direction) {
        self.player.desired_dir = dir;
    }

    pub fn set_debug_paths(&mut self, enabled: bool) {
        self.debug_paths = enabled;
    }

    pub fn config(&self) -> GameConfig {
        GameConfig {
            tick_rate: TICK_RATE,
            search_budget: self.finder.budget(),
            power_duration_ms: POWER_DURATION_MS,
            start_lives: START_LIVES,
            time_limit_ms: self.time_limit_ms,
        }
    }

    pub fn step(&mut self, dt_ms: u64) {
        if self.ended {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let now_ms = self.elapsed_ms;
        if now_ms < self.hold_until_ms {
            return;
        }

        let player_before = (self.player.x, self.player.y);
        let ghost_before: Vec<(i32, i32)> =
            self.ghosts.iter().map(|ghost| (ghost.x, ghost.y)).collect();

        self.update_player(now_ms);
        self.update_ghost_ai(now_ms);
        self.resolve_collisions(now_ms, player_before, &ghost_before);
        self.check_game_over(now_ms);
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.elapsed_ms,
            time_left_ms: self
                .time_limit_ms
                .map(|limit| limit.saturating_sub(self.elapsed_ms)),
            score: self.score,
            lives: self.lives,
            dots_left: self.maze.pickups_left(),
            player: PlayerView {
                x: self.player.x,
                y: self.player.y,
                dir: self.player.dir,
                state: self.player.state,
                delta_x: self.player.delta_x,
                delta_y: self.player.delta_y,
                power_until: self.player.power_until,
            },
            ghosts: self
                .ghosts
                .iter()
                .map(|ghost| GhostView {
                    id: ghost.id.clone(),
                    x: ghost.x,
                    y: ghost.y,
                    dir: ghost.dir,
                    delta_x: ghost.delta_x,
                    delta_y: ghost.delta_y,
                    fearful: ghost.fearful,
                    trapped: ghost.trapped,
                    dead: ghost.dead,
                    path: if ghost.debug_draw_path {
                        ghost.path().map(|path| path.steps().to_vec())
                    } else {
                        None
                    },
                })
                .collect(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.end_reason.unwrap_or(GameOverReason::Timeout),
            duration_ms: self.elapsed_ms,
            ticks: self.tick_counter,
            score: self.score,
            lives_left: self.lives,
            dots_eaten: self.dots_eaten,
            ghosts_eaten: self.ghosts_eaten,
        }
    }

    fn update_player(&mut self, now_ms: u64) {
        if self.player.state == PlayerState::Power && now_ms >= self.player.power_until {
            self.player.state = PlayerState::Normal;
        }

        let dir = self.player.desired_dir;
        if dir == Direction::None {
            self.player.delta_x = 0.0;
            self.player.delta_y = 0.0;
            return;
        }
        let (nx, ny) = offset(self.player.x, self.player.y, dir);
        if !self.maze.is_walkable(nx, ny) {
            self.player.delta_x = 0.0;
            self.player.delta_y = 0.0;
            return;
        }

        self.player.dir = dir;
        let extent = CELL_SIZE as f32;
        match dir {
            Direction::Up | Direction::Down => {
                self.player.delta_x = 0.0;
                if dir == Direction::Up {
                    self.player.delta_y -= PLAYER_SPEED;
                } else {
                    self.player.delta_y += PLAYER_SPEED;
                }
                if self.player.delta_y.abs() >= extent {
                    self.player.delta_y = 0.0;
                    self.player.x = nx;
                    self.player.y = ny;
                    self.apply_pickups(now_ms);
                }
            }
            Direction::Left | Direction::Right => {
                self.player.delta_y = 0.0;
                if dir == Direction::Left {
                    self.player.delta_x -= PLAYER_SPEED;
                } else {
                    self.player.delta_x += PLAYER_SPEED;
                }
                if self.player.delta_x.abs() >= extent {
                    self.player.delta_x = 0.0;
                    self.player.x = nx;
                    self.player.y = ny;
                    self.apply_pickups(now_ms);
                }
            }
            Direction::None => {}
        }
    }

    fn apply_pickups(&mut self, now_ms: u64) {
        let x = self.player.x;
        let y = self.player.y;
        if self.maze.take_dot(x, y) {
            self.score += DOT_SCORE;
            self.dots_eaten += 1;
            self.events.push(RuntimeEvent::DotEaten { x, y });
        }
        if self.maze.take_pellet(x, y) {
            self.score += PELLET_SCORE;
            self.player.state = PlayerState::Power;
            self.player.power_until = now_ms + POWER_DURATION_MS;
            self.events.push(RuntimeEvent::PelletTaken { x, y });
        }
    }

    fn resolve_collisions(
        &mut self,
        now_ms: u64,
        player_before: (i32, i32),
        ghost_before: &[(i32, i32)],
    ) {
        for idx in 0..self.ghosts.len() {
            if self.ghosts[idx].trapped || self.ghosts[idx].dead {
                continue;
            }
            let overlap =
                self.ghosts[idx].x == self.player.x && self.ghosts[idx].y == self.player.y;
            let swapped = ghost_before.get(idx).is_some_and(|&before| {
                player_before == (self.ghosts[idx].x, self.ghosts[idx].y)
                    && before == (self.player.x, self.player.y)
            });
            if !overlap && !swapped {
                continue;
            }

            if self.player.state == PlayerState::Power {
                self.ghosts[idx].dead = true;
                self.score += GHOST_SCORE;
                self.ghosts_eaten += 1;
                self.events.push(RuntimeEvent::GhostEaten {
                    ghost_id: self.ghosts[idx].id.clone(),
                });
            } else {
                self.catch_player(now_ms);
                break;
            }
        }
    }

    fn catch_player(&mut self, now_ms: u64) {
        self.lives -= 1;
        self.events.push(RuntimeEvent::PlayerCaught {
            lives_left: self.lives,
        });
        if self.lives <= 0 {
            self.end(GameOverReason::OutOfLives);
        } else {
            self.soft_reset(now_ms);
        }
    }

    /// Put every actor back on its manifest spawn after a caught player.
    /// Running state (score, eaten pickups, clock) is kept.
    fn soft_reset(&mut self, now_ms: u64) {
        let spawn = self.player.spawn;
        self.player.x = spawn.x;
        self.player.y = spawn.y;
        self.player.dir = Direction::None;
        self.player.desired_dir = Direction::None;
        self.player.delta_x = 0.0;
        self.player.delta_y = 0.0;
        self.player.state = PlayerState::Normal;
        self.player.power_until = 0;

        for ghost in &mut self.ghosts {
            ghost.reset();
        }
        self.next_release_at_ms = now_ms + FIRST_RELEASE_DELAY_MS;
        self.hold_until_ms = now_ms + RESPAWN_HOLD_MS;
    }

    fn check_game_over(&mut self, _now_ms: u64) {
        if self.ended {
            return;
        }
        if self.maze.pickups_left() == 0 {
            self.end(GameOverReason::Cleared);
            return;
        }
        if let Some(limit) = self.time_limit_ms {
            if self.elapsed_ms >= limit {
                self.end(GameOverReason::Timeout);
            }
        }
    }

    fn end(&mut self, reason: GameOverReason) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.end_reason = Some(reason);
        self.events.push(RuntimeEvent::GameOver { reason });
    }
}

use super::*;
use crate::constants::{PEN_PROBE_LIMIT, RELEASE_INTERVAL_MS, SCATTER_CHANCE};
use crate::path::Path;

impl GameEngine {
    /// Behavior pass, once per tick: fear propagation, pen release, dead
    /// ghosts back to the pen, destination planning, motion. Planning runs
    /// against the pre-pass ghost state and the immutable maze; installs and
    /// motion updates are applied afterwards, each phase for every ghost
    /// before the next phase starts.
    pub(super) fn update_ghost_ai(&mut self, now_ms: u64) {
        let fear = self.player.state == PlayerState::Power;

        if now_ms > self.next_release_at_ms {
            if let Some(idx) = self.ghosts.iter().position(|ghost| ghost.trapped) {
                let release = self.maze.release_cell();
                self.ghosts[idx].trapped = false;
                self.ghosts[idx].place(release.x, release.y);
                self.next_release_at_ms = now_ms + RELEASE_INTERVAL_MS;
                self.events.push(RuntimeEvent::GhostReleased {
                    ghost_id: self.ghosts[idx].id.clone(),
                });
            }
        }

        for idx in 0..self.ghosts.len() {
            if self.ghosts[idx].dead {
                let cell = self.find_pen_cell(idx);
                self.ghosts[idx].update_path(None);
                self.ghosts[idx].place(cell.x, cell.y);
                self.ghosts[idx].trapped = true;
                self.ghosts[idx].dead = false;
                self.events.push(RuntimeEvent::GhostPenned {
                    ghost_id: self.ghosts[idx].id.clone(),
                });
            }

            if !self.ghosts[idx].trapped {
                // A false-to-true fear edge abandons the current (likely
                // chase) path so the ghost does not keep closing in.
                if !self.ghosts[idx].fearful && fear {
                    self.ghosts[idx].update_path(None);
                }
                self.ghosts[idx].fearful = fear;
            } else {
                self.ghosts[idx].fearful = false;
            }
        }

        let mut plans: Vec<(usize, Option<Path>)> = Vec::new();
        for idx in 0..self.ghosts.len() {
            if self.ghosts[idx].trapped || !self.ghosts[idx].needs_new_path() {
                continue;
            }
            let mut target = Vec2 {
                x: self.player.x,
                y: self.player.y,
            };
            if self.ghosts[idx].fearful || self.rng.bool(SCATTER_CHANCE) {
                target = Vec2 {
                    x: self.rng.int(0, self.maze.width() - 1),
                    y: self.rng.int(0, self.maze.height() - 1),
                };
            }
            let start = self.ghosts[idx].cell();
            plans.push((idx, self.finder.find_path(&self.maze, start, target)));
        }
        for (idx, path) in plans {
            self.ghosts[idx].update_path(path);
        }

        for ghost in &mut self.ghosts {
            ghost.act(CELL_SIZE);
            ghost.debug_draw_path = self.debug_paths;
        }
    }

    /// First free pen cell probing rightward from the anchor, bounded to
    /// `PEN_PROBE_LIMIT` steps. Free means walkable and not occupied by
    /// another ghost. Falls back to the anchor itself on exhaustion so a
    /// respawning ghost always lands somewhere valid.
    fn find_pen_cell(&self, ghost_idx: usize) -> Vec2 {
        let anchor = self.maze.pen_anchor();
        for probe in 0..=PEN_PROBE_LIMIT {
            let x = anchor.x + probe;
            let y = anchor.y;
            if !self.maze.is_walkable(x, y) {
                continue;
            }
            let occupied = self
                .ghosts
                .iter()
                .enumerate()
                .any(|(idx, ghost)| idx != ghost_idx && ghost.x == x && ghost.y == y);
            if !occupied {
                return Vec2 { x, y };
            }
        }
        anchor
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{
        FIRST_RELEASE_DELAY_MS, GHOST_SPEED, RELEASE_INTERVAL_MS, TICK_MS,
    };
    use crate::engine::{GameEngine, GameEngineOptions};
    use crate::ghost::Ghost;
    use crate::maze::Maze;
    use crate::path::Path;
    use crate::types::{PlayerState, RuntimeEvent, Vec2};

    fn make_engine(seed: u32) -> GameEngine {
        GameEngine::new(Maze::default_level(), seed, GameEngineOptions::default())
    }

    fn trapped_count(engine: &GameEngine) -> usize {
        engine.ghosts.iter().filter(|ghost| ghost.trapped).count()
    }

    #[test]
    fn release_timer_frees_exactly_one_ghost_per_firing() {
        let mut engine = make_engine(1);
        assert_eq!(trapped_count(&engine), 3);

        engine.update_ghost_ai(FIRST_RELEASE_DELAY_MS + 1);
        assert_eq!(trapped_count(&engine), 2);

        // Timer was re-armed; an immediate second pass releases nobody.
        engine.update_ghost_ai(FIRST_RELEASE_DELAY_MS + 2);
        assert_eq!(trapped_count(&engine), 2);

        engine.update_ghost_ai(FIRST_RELEASE_DELAY_MS + RELEASE_INTERVAL_MS + 2);
        assert_eq!(trapped_count(&engine), 1);

        engine.update_ghost_ai(FIRST_RELEASE_DELAY_MS + 2 * RELEASE_INTERVAL_MS + 3);
        assert_eq!(trapped_count(&engine), 0);

        let releases = engine
            .events
            .iter()
            .filter(|event| matches!(event, RuntimeEvent::GhostReleased { .. }))
            .count();
        assert_eq!(releases, 3);
    }

    #[test]
    fn released_ghost_stands_on_the_release_cell() {
        let mut engine = make_engine(2);
        let release = engine.maze.release_cell();
        let first_trapped = engine
            .ghosts
            .iter()
            .position(|ghost| ghost.trapped)
            .expect("default level has trapped ghosts");

        engine.update_ghost_ai(FIRST_RELEASE_DELAY_MS + 1);
        let ghost = &engine.ghosts[first_trapped];
        assert!(!ghost.trapped);
        // One pass cannot cover a full cell, so the discrete cell is still
        // the release cell; any path planned this pass starts there too.
        assert_eq!((ghost.x, ghost.y), (release.x, release.y));
        if let Some(path) = ghost.path() {
            assert_eq!(path.first(), release);
        }
    }

    /// Player sealed into its own chamber, pen sealed as usual: releases
    /// proceed on schedule and no collision can interrupt them.
    fn sealed_player_maze() -> Maze {
        Maze::parse(&[
            "###########",
            "#F.......H#",
            "#...###...#",
            "#..#GGG#..#",
            "#..#####..#",
            "#....#P#..#",
            "###########",
        ])
        .expect("fixture maze is valid")
    }

    #[test]
    fn full_release_schedule_through_stepping() {
        let mut engine = GameEngine::new(sealed_player_maze(), 3, GameEngineOptions::default());
        assert_eq!(trapped_count(&engine), 3);
        let mut releases_total = 0usize;
        let deadline = FIRST_RELEASE_DELAY_MS + 2 * RELEASE_INTERVAL_MS + 1_000;

        while engine.build_snapshot(false).now_ms < deadline {
            engine.step(TICK_MS);
            let snapshot = engine.build_snapshot(true);
            let releases_this_tick = snapshot
                .events
                .iter()
                .filter(|event| matches!(event, RuntimeEvent::GhostReleased { .. }))
                .count();
            assert!(releases_this_tick <= 1, "one release per firing at most");
            releases_total += releases_this_tick;
        }

        assert_eq!(releases_total, 3);
        assert_eq!(trapped_count(&engine), 0);
    }

    #[test]
    fn fear_edge_discards_the_installed_path() {
        let mut engine = make_engine(4);
        let start = engine.ghosts[0].cell();
        engine.ghosts[0].update_path(Some(Path::new(vec![
            start,
            Vec2 {
                x: start.x + 1,
                y: start.y,
            },
        ])));
        assert!(engine.ghosts[0].path().is_some());

        engine.player.state = PlayerState::Power;
        engine.player.power_until = u64::MAX;
        engine.update_ghost_ai(100);

        assert!(engine.ghosts[0].fearful);
        assert!(engine.ghosts[0].path().is_none());
        assert!(engine.ghosts[0].needs_new_path());
    }

    #[test]
    fn trapped_ghosts_never_turn_fearful() {
        let mut engine = make_engine(5);
        engine.player.state = PlayerState::Power;
        engine.player.power_until = u64::MAX;

        engine.update_ghost_ai(100);
        for ghost in &engine.ghosts {
            if ghost.trapped {
                assert!(!ghost.fearful);
                assert!(ghost.path().is_none());
            } else {
                assert!(ghost.fearful);
            }
        }
    }

    #[test]
    fn dead_ghost_is_penned_on_the_first_free_probe_cell() {
        let mut engine = make_engine(6);
        let anchor = engine.maze.pen_anchor();
        // The three pen cells are occupied and the fourth probe step is the
        // pen wall, so the first free cell sits four steps out.
        engine.ghosts[0].dead = true;

        engine.update_ghost_ai(1);
        let ghost = &engine.ghosts[0];
        assert!(ghost.trapped);
        assert!(!ghost.dead);
        assert_eq!((ghost.x, ghost.y), (anchor.x + 4, anchor.y));
        assert!(engine
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::GhostPenned { .. })));
    }

    #[test]
    fn exhausted_pen_probe_falls_back_to_the_anchor() {
        let mut engine = make_engine(7);
        let anchor = engine.maze.pen_anchor();
        engine.ghosts.push(Ghost::new(
            "ghost_5".to_string(),
            Vec2 {
                x: anchor.x + 4,
                y: anchor.y,
            },
            true,
            GHOST_SPEED,
        ));
        engine.ghosts[0].dead = true;

        engine.update_ghost_ai(1);
        let ghost = &engine.ghosts[0];
        assert!(ghost.trapped);
        assert_eq!((ghost.x, ghost.y), (anchor.x, anchor.y));
    }

    #[test]
    fn planning_targets_mix_chase_and_scatter() {
        let mut saw_chase = false;
        let mut saw_scatter = false;
        for seed in 0..200u32 {
            let mut engine = make_engine(seed);
            engine.update_ghost_ai(1);
            let player = Vec2 {
                x: engine.player.x,
                y: engine.player.y,
            };
            if let Some(path) = engine.ghosts[0].path() {
                if path.last() == player {
                    saw_chase = true;
                } else {
                    saw_scatter = true;
                }
            }
            if saw_chase && saw_scatter {
                break;
            }
        }
        assert!(saw_chase);
        assert!(saw_scatter);
    }

    #[test]
    fn fearful_ghosts_never_plan_for_the_player_cell_mid_power() {
        // Scatter can in principle land on the player's cell by chance; over
        // a spread of seeds the overwhelming majority must not.
        let mut chase_hits = 0usize;
        let mut paths_seen = 0usize;
        for seed in 0..100u32 {
            let mut engine = make_engine(seed);
            engine.player.state = PlayerState::Power;
            engine.player.power_until = u64::MAX;
            engine.update_ghost_ai(1);
            let player = Vec2 {
                x: engine.player.x,
                y: engine.player.y,
            };
            if let Some(path) = engine.ghosts[0].path() {
                paths_seen += 1;
                if path.last() == player {
                    chase_hits += 1;
                }
            }
        }
        assert!(paths_seen > 10);
        assert!(chase_hits * 10 < paths_seen);
    }

    #[test]
    fn failed_search_is_retried_on_later_ticks() {
        // The player chamber is unreachable, so every chase plan fails and
        // leaves the ghost pathless for that tick; a later scatter draw on a
        // walkable cell recovers a path through the normal retry loop.
        let mut engine = GameEngine::new(sealed_player_maze(), 8, GameEngineOptions::default());

        let mut saw_missing = false;
        let mut recovered_after_missing = false;
        for tick in 0..300u64 {
            engine.update_ghost_ai(tick + 1);
            if engine.ghosts[0].path().is_none() {
                saw_missing = true;
                assert!(engine.ghosts[0].needs_new_path());
            } else if saw_missing {
                recovered_after_missing = true;
                break;
            }
        }
        assert!(saw_missing);
        assert!(recovered_after_missing);
    }
}

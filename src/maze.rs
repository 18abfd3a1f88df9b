use std::collections::BTreeSet;

use thiserror::Error;

use crate::constants::CELL_SIZE;
use crate::types::{MazeInit, Vec2};

/// Bundled level: pillar maze with a sealed ghost pen in the middle, one
/// free ghost, three penned ghosts, and the release cell above the pen.
pub const DEFAULT_LEVEL: [&str; 15] = [
    "#####################",
    "#o.................o#",
    "#.#.#.#.#.#.#.#.#.#.#",
    "#.........F.........#",
    "#.#.#.#.#.#.#.#.#.#.#",
    "#.........H.........#",
    "#.#.#.#.#####.#.#.#.#",
    "#.......#GGG#.......#",
    "#.#.#.#.#####.#.#.#.#",
    "#...................#",
    "#.#.#.#.#.#.#.#.#.#.#",
    "#.........P.........#",
    "#.#.#.#.#.#.#.#.#.#.#",
    "#o.................o#",
    "#####################",
];

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    #[error("maze has no rows")]
    Empty,
    #[error("row {row} has width {found}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown tile '{glyph}' at ({x}, {y})")]
    UnknownTile { glyph: char, x: i32, y: i32 },
    #[error("maze has no player spawn")]
    MissingPlayerSpawn,
    #[error("maze has no release cell")]
    MissingReleaseCell,
}

#[derive(Clone, Copy, Debug)]
pub struct GhostStart {
    pub cell: Vec2,
    pub trapped: bool,
}

#[derive(Clone, Debug)]
pub struct Maze {
    width: i32,
    height: i32,
    tiles: Vec<String>,
    dots: BTreeSet<(i32, i32)>,
    power_pellets: BTreeSet<(i32, i32)>,
    player_spawn: Vec2,
    ghost_starts: Vec<GhostStart>,
    pen_anchor: Vec2,
    release_cell: Vec2,
}

impl Maze {
    /// Parse a maze from ASCII rows. Glyphs: `#` wall, `.` floor with a dot,
    /// space bare floor, `o` power pellet, `P` player spawn, `H` release
    /// cell, `G` penned ghost spawn, `F` free ghost spawn. The first `P` and
    /// `H` win; extras count as bare floor. The pen anchor is the first `G`
    /// in row-major order (the release cell when there is none).
    pub fn parse(rows: &[&str]) -> Result<Self, MazeError> {
        if rows.is_empty() {
            return Err(MazeError::Empty);
        }
        let expected = rows[0].chars().count();
        if expected == 0 {
            return Err(MazeError::Empty);
        }

        let mut tiles = Vec::with_capacity(rows.len());
        let mut dots = BTreeSet::new();
        let mut power_pellets = BTreeSet::new();
        let mut player_spawn = None;
        let mut release_cell = None;
        let mut ghost_starts = Vec::new();

        for (row_idx, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != expected {
                return Err(MazeError::RaggedRow {
                    row: row_idx,
                    expected,
                    found,
                });
            }
            let y = row_idx as i32;
            let mut normalized = String::with_capacity(expected);
            for (col_idx, glyph) in row.chars().enumerate() {
                let x = col_idx as i32;
                match glyph {
                    '#' => {
                        normalized.push('#');
                        continue;
                    }
                    '.' => {
                        dots.insert((x, y));
                    }
                    ' ' => {}
                    'o' => {
                        power_pellets.insert((x, y));
                    }
                    'P' => {
                        if player_spawn.is_none() {
                            player_spawn = Some(Vec2 { x, y });
                        }
                    }
                    'H' => {
                        if release_cell.is_none() {
                            release_cell = Some(Vec2 { x, y });
                        }
                    }
                    'G' => {
                        ghost_starts.push(GhostStart {
                            cell: Vec2 { x, y },
                            trapped: true,
                        });
                    }
                    'F' => {
                        ghost_starts.push(GhostStart {
                            cell: Vec2 { x, y },
                            trapped: false,
                        });
                    }
                    _ => return Err(MazeError::UnknownTile { glyph, x, y }),
                }
                normalized.push('.');
            }
            tiles.push(normalized);
        }

        let player_spawn = player_spawn.ok_or(MazeError::MissingPlayerSpawn)?;
        let release_cell = release_cell.ok_or(MazeError::MissingReleaseCell)?;
        let pen_anchor = ghost_starts
            .iter()
            .find(|start| start.trapped)
            .map(|start| start.cell)
            .unwrap_or(release_cell);

        Ok(Self {
            width: expected as i32,
            height: rows.len() as i32,
            tiles,
            dots,
            power_pellets,
            player_spawn,
            ghost_starts,
            pen_anchor,
            release_cell,
        })
    }

    pub fn default_level() -> Self {
        Self::parse(&DEFAULT_LEVEL).expect("bundled level is valid")
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        self.tiles
            .get(y as usize)
            .and_then(|row| row.as_bytes().get(x as usize))
            .map(|c| *c == b'.')
            .unwrap_or(false)
    }

    pub fn player_spawn(&self) -> Vec2 {
        self.player_spawn
    }

    pub fn ghost_starts(&self) -> &[GhostStart] {
        &self.ghost_starts
    }

    pub fn pen_anchor(&self) -> Vec2 {
        self.pen_anchor
    }

    pub fn release_cell(&self) -> Vec2 {
        self.release_cell
    }

    /// Remaining dots plus power pellets; zero means the level is cleared.
    pub fn pickups_left(&self) -> usize {
        self.dots.len() + self.power_pellets.len()
    }

    pub fn dots_left(&self) -> usize {
        self.dots.len()
    }

    pub fn take_dot(&mut self, x: i32, y: i32) -> bool {
        self.dots.remove(&(x, y))
    }

    pub fn take_pellet(&mut self, x: i32, y: i32) -> bool {
        self.power_pellets.remove(&(x, y))
    }

    pub fn to_maze_init(&self) -> MazeInit {
        MazeInit {
            width: self.width,
            height: self.height,
            cell_size: CELL_SIZE,
            tiles: self.tiles.clone(),
            dots: self.dots.iter().cloned().collect(),
            power_pellets: self.power_pellets.iter().cloned().collect(),
            player_spawn: self.player_spawn,
            release_cell: self.release_cell,
        }
    }
}

//! Maze-chase game core: budgeted BFS pathfinding for ghost agents, a
//! per-tick sub-cell motion state machine, and the behavior pass that
//! drives chase/scatter/fear and the staggered pen release.

pub mod constants;
pub mod engine;
pub mod ghost;
pub mod maze;
pub mod path;
pub mod pathfinder;
pub mod rng;
pub mod server_protocol;
pub mod types;

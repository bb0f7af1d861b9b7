// 8.0: core game engine. owns both markets, the player book, the crowd and the clock.
// single owner, &mut self commands, no I/O. a tick is the only thing that moves time.

mod config;
mod core;
mod crowd;
mod liquidations;
mod positions;
mod pricing;
mod results;
mod tick;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{CloseResult, CrowdTickResult, EngineError, LiquidationResult, OpenResult, TickResult};
pub use tick::TickDriver;

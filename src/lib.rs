// perps-arena: arcade perpetual futures simulation.
// a synthetic two-asset market driven by a regime-switching price process, scripted news shocks
// and a simulated crowd, with an isolated-margin risk engine for the player.
// all state is owned by one engine and advanced by a fixed-cadence tick. randomness is seedable.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Asset, Side, Price, Quote, Leverage, Timestamp
//   2.x  liquidation.rs: liquidation price formula and predicate
//   3.x  position.rs: isolated position, merge, partial close, quick-close penalty
//   4.x  market.rs: per-asset market state, news reaction state
//   4.1  mark_price.rs: basis decay and mania pump/dump shift
//   4.2  price_process.rs: per-tick regime dispatch
//   5.x  news.rs: headline catalog and impact profiles
//   6.x  schedule.rs: generation-tagged deferred effects
//   7.x  crowd.rs: synthetic counterparties and liquidation rewards
//   8.x  engine/: core engine: commands, pricing, crowd, liquidations, tick
//   9.x  config.rs: game rules and presets
//   10.x account.rs: cash, trade counters, win streak
//   11.x events.rs: state transition events for audit
//   12.x history.rs: transaction log, execution feed, price history

// simulation modules
pub mod crowd;
pub mod engine;
pub mod market;
pub mod mark_price;
pub mod news;
pub mod price_process;
pub mod schedule;

// risk modules
pub mod account;
pub mod liquidation;
pub mod position;
pub mod types;

// bookkeeping and setup
pub mod config;
pub mod events;
pub mod history;

// re exports for convenience
pub use account::*;
pub use config::*;
pub use crowd::*;
pub use engine::*;
pub use events::*;
pub use history::*;
pub use liquidation::*;
pub use mark_price::*;
pub use market::*;
pub use news::*;
pub use position::*;
pub use price_process::{Regime, StepOutcome};
pub use schedule::*;
pub use types::*;

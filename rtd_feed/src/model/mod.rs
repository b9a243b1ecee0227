//! Feed-side models of the simulator.
//!
//! - `topic` — (ticker, field) subscription keys and RTD formula parsing.
//! - `tick` — synthetic prices and their composite wire rendering.
//! - `feed` — background publisher thread and its events.

pub mod feed;
pub mod tick;
pub mod topic;

//! genbridge - host bridge for external code-generation engines
//!
//! genbridge reads one complete payload from standard input, hands it to a
//! generation engine as its configuration, and relays every line the engine
//! emits to standard output in emission order.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐        ┌─────────────────────────────┐
//!  stdin ──▶ │ Input Loader │ ─────▶ │      Bridge Controller      │ ──▶ stdout
//!            └──────────────┘        │  init ─▶ subscribe ─▶ relay │
//!                                    └──────────────┬──────────────┘
//!                                                   │ GenerationEngine
//!                                                   ▼
//!                                    ┌─────────────────────────────┐
//!                                    │ ProcessEngine (child proc.) │
//!                                    └─────────────────────────────┘
//! ```
//!
//! Generators are registered in a TOML file (see [`config`]); any other
//! engine can be plugged in by implementing [`GenerationEngine`].

pub mod bridge;
pub mod config;
pub mod engine;
pub mod input;
pub mod process_engine;
pub mod state;

pub use bridge::{Bridge, BridgeError, Phase, RunReport};
pub use config::{BridgeConfig, GeneratorConfig};
pub use engine::{EngineError, EngineHandle, GenerationEngine, InitError, RawInput};
pub use input::{LoadError, load_input, load_stdin};
pub use process_engine::ProcessEngine;
pub use state::BridgeState;

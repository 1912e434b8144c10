//! V2V Deterministic Simulation Harness
//!
//! Runs the V2V coordinator against a scripted traffic world where every
//! source of non-determinism is controlled:
//! - **Time**: a virtual clock that only moves when the harness ticks
//! - **Physics**: constant-acceleration kinematics in a ground truth oracle
//! - **Randomness**: every stream derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock + seed streams)            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ now()                        │ snapshot()           │
//! │  ┌────▼──────────────┐         ┌─────┴─────┐                │
//! │  │  V2VCoordinator   │◄────────│  Oracle   │                │
//! │  │  (rate-limited)   │  frame  │ (physics) │                │
//! │  └────────┬──────────┘         └───────────┘                │
//! │           │ published state                                 │
//! │  ┌────────▼──────────┐                                      │
//! │  │ InvariantChecker  │                                      │
//! │  └───────────────────┘                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use v2v_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 12)
//!     .with_duration(10.0)
//!     .run(ScenarioId::Intersection);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod invariants;
mod oracle;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{SimEvent, SimExport, SimFrame, ThreatEvent, VehicleFrame};
pub use invariants::InvariantChecker;
pub use oracle::{GroundTruthVehicle, Oracle};
pub use runner::{ScenarioExecution, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use world::{SimConfig, SimWorld};

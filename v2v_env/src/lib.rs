//! V2V Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the V2V coordinator run
//! against a live traffic simulator, a deterministic test harness, or plain
//! unit-test fixtures without changing a line of core logic.
//!
//! # Core Concept
//!
//! The coordinator never reads a clock or a simulator directly:
//! - Time comes from a [`V2VContext`] (`now()`, `sleep()`)
//! - Vehicle kinematics come from a [`WorldSnapshot`] taken right after the
//!   simulation tick advanced
//!
//! # Example
//!
//! ```ignore
//! use v2v_env::{V2VContext, WorldSnapshot};
//!
//! async fn drive<Ctx: V2VContext>(ctx: &Ctx, world: &mut World) {
//!     loop {
//!         world.tick();
//!         let snapshot = world.snapshot();
//!         coordinator.update(&snapshot);
//!         ctx.sleep(Duration::from_millis(50)).await;
//!     }
//! }
//! ```

mod context;
mod snapshot;
mod types;
mod error;
mod tokio_impl;

pub use context::V2VContext;
pub use snapshot::{ActorSnapshot, FrameSnapshot, VehicleControl, WorldSnapshot};
pub use types::{ActorId, VehicleId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;

//! Zone Processing Pipeline
//!
//! ## Architecture
//!
//! ```text
//! SampleSource ──▶ ProcessingLoop ──dispatch──▶ ZoneRegistry
//!                    │   │                          │
//!     save timer ────┘   └──── rollover timer       ├──▶ ZoneActor (zone A) ──▶ ZoneEngine
//!                                                   └──▶ ZoneActor (zone B) ──▶ ZoneEngine
//! ```
//!
//! Each zone has exactly one actor owning its engine. Zones share nothing,
//! so a slow save or a reset on one zone never blocks another.

mod actor;
pub mod processing_loop;
mod registry;
pub mod source;

pub use actor::{ZoneActor, ZoneCommand, ZoneHandle, ZoneStats};
pub use processing_loop::{LoopStats, ProcessingLoop};
pub use registry::ZoneRegistry;

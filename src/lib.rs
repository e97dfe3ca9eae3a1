pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;
pub mod queue;
pub mod registry;

pub use config::QueueConfig;
pub use diagnostics::{DiagnosticSink, Diagnostics, Severity, Verbosity};
pub use engine::{Engine, EngineEvent, EngineEventCallback, EngineMachine, NullEngine, SharedEngine};
pub use error::{Error, ErrorPolicy, Outcome, Result};
pub use model::{EngineState, Loop, MediaType, QueueState, Track};
pub use queue::{QueueController, QueueEvent, QueueEventListener};
pub use registry::EngineRegistry;

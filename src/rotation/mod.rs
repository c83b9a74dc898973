pub mod classify;
pub mod engine;
pub mod job;
pub mod scheduler;
pub mod strategy;

pub use classify::Classifier;
pub use engine::RotationEngine;
pub use job::{JobId, JobState, JobTrigger, RotationJob};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use strategy::{Generator, RotationContext, StrategyRegistry, Verifier};

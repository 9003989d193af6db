//! Step execution engine.
//!
//! A job is a sequence of [`Step`]s. [`ChunkStep`] is the workhorse: it reads
//! items from a [`Source`], converts them with a [`Transform`], and commits
//! them to a [`Sink`] chunk by chunk, tolerating failures up to a skip budget.
//! [`TaskletStep`] runs a single unit of work.

pub mod chunk;
pub mod execution;
pub mod hooks;
pub mod io;
pub mod skip;
pub mod step;
pub mod tasklet;

pub use chunk::{ChunkSettings, ChunkStep};
pub use execution::{RunContext, StepExecution};
pub use hooks::StepHooks;
pub use io::{FnTransform, ListSource, Sink, Source, Transform};
pub use skip::{ErrorClass, SkipPolicy, SkipStage, StepAbort, StepError};
pub use step::{Step, StepRun};
pub use tasklet::{Tasklet, TaskletStep};

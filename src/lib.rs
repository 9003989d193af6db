//! # claimbatch
//!
//! Postgres-backed batch processing engine.
//!
//! Claims bounded batches of pending work items with `FOR UPDATE SKIP LOCKED`,
//! runs them through a chunked, skip-tolerant read → transform → write pipeline,
//! gates every job run on its persisted configuration, and serializes scheduled
//! runs across a fleet with a database-backed lock. Progress and outcomes land in
//! an append-only step log plus one result row per step execution.

pub mod config;
pub mod control;
pub mod db;
pub mod engine;
pub mod error;
pub mod external;
pub mod job;
pub mod jobs;
pub mod model;
pub mod schedule;
pub mod seed;
pub mod store;
pub mod telemetry;

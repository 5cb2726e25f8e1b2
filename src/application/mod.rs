//! Application layer containing the transfer orchestration.
//!
//! `TransferEngine` executes a single transfer against the ledger ports,
//! `WorkerPool` admits and schedules transfers onto a fixed set of Tokio
//! tasks, and `report` assembles per-account read models.

pub mod engine;
pub mod pool;
pub mod report;

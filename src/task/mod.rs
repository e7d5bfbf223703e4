//! Background tasks for subscription reconciliation.

pub mod sweep_task;

pub mod ai;
pub mod calendar;
pub mod channel;
pub mod context;
pub mod orchestrator;
pub mod scheduling;

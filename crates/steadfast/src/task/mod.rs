//! Request lifecycle control
//!
//! Provides:
//! - [`TaskStateController`] owning the live transport task of a request
//! - [`QueueSuspensionDecorator`] holding back new attempts while suspended
//! - [`RetryCancellationDecorator`] unwinding pending retries on cancel
//! - [`DispatchGate`] that attempts wait on before dispatch

pub mod controller;
pub mod decorators;
pub mod gate;

pub use controller::{CancelStrategy, ResumeDataCallback, TaskControl, TaskState, TaskStateController};
pub use decorators::{QueueSuspensionDecorator, RetryCancellationDecorator};
pub use gate::DispatchGate;

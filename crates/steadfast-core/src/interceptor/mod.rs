//! Request adapters, retriers and the ordered chain that composes them.
//!
//! An [`Adapter`] may rewrite an outgoing request before it is dispatched.
//! A [`Retrier`] votes on whether a failed attempt should be retried.
//! An [`Interceptor`] holds ordered lists of both and is itself an adapter
//! and a retrier, so interceptors nest freely.

mod adapter;
mod chain;
mod retrier;

pub use adapter::{Adapter, FnAdapter, adapter_fn};
pub use chain::Interceptor;
pub use retrier::{FnRetrier, Retrier, retrier_fn};

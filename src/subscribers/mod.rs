//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ProgramActor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                       │
//!                                                            ┌──────────┼──────────┐
//!                                                            ▼          ▼          ▼
//!                                                        LogWriter   Persist    Custom ...
//! ```

mod log;
mod subscriber;
mod subscriber_set;

pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

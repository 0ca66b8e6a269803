//! # Function-backed launcher (`LaunchFn`)
//!
//! [`LaunchFn`] wraps a closure `F: Fn(ProgramSpec) -> Fut`, producing a fresh future per
//! launch. Useful for embedding custom launch logic (containers, remote agents, test
//! doubles) without writing a dedicated type.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use procvisor::{Instance, LaunchError, LaunchFn, Launcher, ProgramSpec};
//!
//! let refuse = LaunchFn::arc(|spec: ProgramSpec| async move {
//!     Err::<Box<dyn Instance>, _>(LaunchError::Rejected {
//!         reason: format!("{} is not allowed here", spec.id()),
//!     })
//! });
//! let _launcher: Arc<dyn Launcher> = refuse;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LaunchError;
use crate::launcher::{Instance, Launcher};
use crate::programs::ProgramSpec;

/// Function-backed launcher implementation.
#[derive(Debug)]
pub struct LaunchFn<F> {
    f: F,
}

impl<F> LaunchFn<F> {
    /// Creates a new function-backed launcher.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the launcher and returns it behind an `Arc`.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Launcher for LaunchFn<F>
where
    F: Fn(ProgramSpec) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Instance>, LaunchError>> + Send + 'static,
{
    async fn launch(&self, spec: &ProgramSpec) -> Result<Box<dyn Instance>, LaunchError> {
        (self.f)(spec.clone()).await
    }
}

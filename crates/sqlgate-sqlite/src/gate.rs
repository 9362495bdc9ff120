// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized access to the single database connection.
//!
//! SQLite permits one writer, so the whole backend shares one connection
//! guarded by a one-permit semaphore. There are two ways to take the permit:
//!
//! - [`ConnectionGate::acquire`] for one statement. The permit is released
//!   when the returned guard drops, on success, error, or cancellation alike.
//! - [`ConnectionGate::acquire_scoped`] for a transaction. The guard owns the
//!   permit and can outlive the borrow of the gate, so every statement of the
//!   transaction runs under one acquisition.
//!
//! Waiting is the only suspension point. Acquisition is not FIFO-fair beyond
//! what `tokio::sync::Semaphore` provides; callers may only rely on mutual
//! exclusion.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use sqlgate_core::SqlGateError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};
use tracing::trace;

/// Grants exclusive access to a shared resource, one holder at a time.
#[derive(Debug)]
pub struct ConnectionGate<C> {
    resource: C,
    permits: Arc<Semaphore>,
    acquire_timeout: Option<Duration>,
}

impl<C> ConnectionGate<C> {
    /// Create a gate with a single permit that waits indefinitely.
    pub fn new(resource: C) -> Self {
        Self {
            resource,
            permits: Arc::new(Semaphore::new(1)),
            acquire_timeout: None,
        }
    }

    /// Bound the wait for the permit. `None` waits indefinitely.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Wait for the permit and hold it for the lifetime of the returned guard.
    ///
    /// Cancel-safe: dropping the future before it completes never leaves the
    /// permit taken.
    pub async fn acquire(&self) -> Result<StatementPermit<'_, C>, SqlGateError> {
        let permit = self.wait(self.permits.acquire()).await?;
        trace!("statement permit acquired");
        Ok(StatementPermit {
            _permit: permit,
            resource: &self.resource,
        })
    }

    /// Take the permit if nobody holds it.
    pub fn try_acquire(&self) -> Option<StatementPermit<'_, C>> {
        self.permits.try_acquire().ok().map(|permit| StatementPermit {
            _permit: permit,
            resource: &self.resource,
        })
    }

    /// Wait for the permit and move it into a guard that owns it.
    ///
    /// The wait is cancellable. Once the semaphore hands out the permit there
    /// is no suspension point before the guard owns it, so cancellation lands
    /// either before the permit is taken or after the guard exists and will
    /// release it on drop.
    pub async fn acquire_scoped(self: &Arc<Self>) -> Result<ScopedPermit<C>, SqlGateError> {
        let permit = self.wait(Arc::clone(&self.permits).acquire_owned()).await?;
        let scoped = ScopedPermit {
            gate: Arc::clone(self),
            _permit: permit,
        };
        trace!("scoped permit acquired");
        Ok(scoped)
    }

    /// Returns `true` if the permit is currently free.
    pub fn is_available(&self) -> bool {
        self.permits.available_permits() > 0
    }

    /// Access the resource without taking the permit.
    ///
    /// Only for metadata that never touches the connection (path, open state).
    pub fn get_ref(&self) -> &C {
        &self.resource
    }

    async fn wait<P>(
        &self,
        acquire: impl Future<Output = Result<P, tokio::sync::AcquireError>>,
    ) -> Result<P, SqlGateError> {
        let acquired = match self.acquire_timeout {
            Some(duration) => tokio::time::timeout(duration, acquire)
                .await
                .map_err(|_| SqlGateError::Timeout { duration })?,
            None => acquire.await,
        };
        // The semaphore is never closed while the gate is alive.
        acquired.map_err(|_| SqlGateError::Internal("connection gate closed".into()))
    }
}

/// Permit for a single statement, released on drop.
#[derive(Debug)]
pub struct StatementPermit<'a, C> {
    _permit: SemaphorePermit<'a>,
    resource: &'a C,
}

impl<C> Deref for StatementPermit<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.resource
    }
}

impl<C> Drop for StatementPermit<'_, C> {
    fn drop(&mut self) {
        trace!("statement permit released");
    }
}

/// Permit owned independently of the gate borrow, released exactly once on drop.
#[derive(Debug)]
pub struct ScopedPermit<C> {
    gate: Arc<ConnectionGate<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C> Deref for ScopedPermit<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.gate.resource
    }
}

impl<C> Drop for ScopedPermit<C> {
    fn drop(&mut self) {
        trace!("scoped permit released");
    }
}

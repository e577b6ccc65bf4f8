//! Fixed-size pool of buffer loggers
//!
//! Every instance is built when the pool is created and then recycled: `allocate` hands
//! one out (buffer emptied), `release` puts it back. Callers that find the pool empty
//! wait until an instance is released or their timeout expires.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use super::buffer::BufferLogger;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::redact::RedactionRules;

/// Wait used by `allocate(None)` unless configured otherwise
pub const DEFAULT_ALLOCATE_TIMEOUT: Duration = Duration::from_secs(10);

struct PoolInner {
    available: Mutex<VecDeque<BufferLogger>>,
    /// Wakes threads blocked in `allocate`
    condvar: Condvar,
    /// Wakes tasks suspended in `allocate_async`
    notify: Notify,
    capacity: usize,
    default_timeout: Duration,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, VecDeque<BufferLogger>> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded pool of [`BufferLogger`]s
///
/// Cloning yields another handle onto the same pool.
#[derive(Clone)]
pub struct BufferLoggerPool {
    inner: Arc<PoolInner>,
}

impl BufferLoggerPool {
    /// Build `config.size` buffer loggers sharing `rules`
    pub fn new(config: &PoolConfig, rules: Option<&RedactionRules>) -> Result<Self> {
        Self::with_factory(config.size, config.allocate_timeout(), |_| {
            BufferLogger::new(&config.name, &config.logger, rules)
        })
    }

    /// Build `size` instances with `factory`, called with each instance's index
    ///
    /// If any instance fails, no pool is returned.
    pub fn with_factory<F>(size: usize, default_timeout: Duration, mut factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<BufferLogger>,
    {
        if size == 0 {
            return Err(Error::config("pool size must be at least 1"));
        }

        let mut available = VecDeque::with_capacity(size);
        for index in 0..size {
            let logger = factory(index).map_err(|e| Error::PoolConstruction {
                index,
                source: Box::new(e),
            })?;
            available.push_back(logger);
        }

        tracing::debug!(size, ?default_timeout, "Created buffer logger pool");

        Ok(Self {
            inner: Arc::new(PoolInner {
                available: Mutex::new(available),
                condvar: Condvar::new(),
                notify: Notify::new(),
                capacity: size,
                default_timeout,
            }),
        })
    }

    /// Number of instances the pool was built with
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Instances currently waiting to be allocated
    pub fn available(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    /// Take an instance without waiting
    pub fn try_allocate(&self) -> Option<BufferLogger> {
        let logger = self.inner.lock().pop_front()?;
        logger.reset();
        Some(logger)
    }

    /// Take an instance, blocking the thread for at most `timeout`
    ///
    /// `None` uses the pool's default timeout. The returned instance's buffer is empty.
    pub fn allocate(&self, timeout: Option<Duration>) -> Result<BufferLogger> {
        let timeout = timeout.unwrap_or(self.inner.default_timeout);
        let deadline = Instant::now().checked_add(timeout);
        let mut available = self.inner.lock();

        loop {
            if let Some(logger) = available.pop_front() {
                drop(available);
                logger.reset();
                return Ok(logger);
            }

            available = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(?timeout, "Timed out waiting for buffer logger");
                        return Err(Error::AllocationTimeout { timeout });
                    }
                    self.inner
                        .condvar
                        .wait_timeout(available, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .inner
                    .condvar
                    .wait(available)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Take an instance, suspending the task for at most `timeout`
    pub async fn allocate_async(&self, timeout: Option<Duration>) -> Result<BufferLogger> {
        let timeout = timeout.unwrap_or(self.inner.default_timeout);
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking so a release in between is not missed
            notified.as_mut().enable();

            if let Some(logger) = self.try_allocate() {
                return Ok(logger);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        tracing::warn!(?timeout, "Timed out waiting for buffer logger");
                        return Err(Error::AllocationTimeout { timeout });
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Return an instance to the pool
    ///
    /// Never blocks and does not reset the buffer; the next allocation does.
    pub fn release(&self, logger: BufferLogger) {
        let mut available = self.inner.lock();
        available.push_back(logger);
        if available.len() > self.inner.capacity {
            tracing::warn!(
                available = available.len(),
                capacity = self.inner.capacity,
                "Buffer logger pool holds more instances than it created"
            );
        }
        drop(available);

        self.inner.condvar.notify_one();
        self.inner.notify.notify_one();
    }

    /// Allocate an instance that returns itself to the pool when dropped
    pub fn lease(&self, timeout: Option<Duration>) -> Result<PooledBufferLogger> {
        let logger = self.allocate(timeout)?;
        Ok(PooledBufferLogger::new(logger, self.clone()))
    }

    /// Async form of [`lease`](Self::lease)
    pub async fn lease_async(&self, timeout: Option<Duration>) -> Result<PooledBufferLogger> {
        let logger = self.allocate_async(timeout).await?;
        Ok(PooledBufferLogger::new(logger, self.clone()))
    }
}

impl fmt::Debug for BufferLoggerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferLoggerPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("default_timeout", &self.default_timeout())
            .finish()
    }
}

/// A leased buffer logger, released back to its pool on drop
pub struct PooledBufferLogger {
    /// `Some` for the guard's whole life; only `detach` (which consumes the guard) and
    /// `drop` take it
    logger: Option<BufferLogger>,
    pool: BufferLoggerPool,
}

impl PooledBufferLogger {
    fn new(logger: BufferLogger, pool: BufferLoggerPool) -> Self {
        Self {
            logger: Some(logger),
            pool,
        }
    }

    /// Keep the instance instead of returning it on drop
    ///
    /// The caller becomes responsible for calling [`BufferLoggerPool::release`].
    pub fn detach(mut self) -> BufferLogger {
        self.logger.take().expect("lease holds its logger until dropped")
    }
}

impl Deref for PooledBufferLogger {
    type Target = BufferLogger;

    fn deref(&self) -> &Self::Target {
        self.logger.as_ref().expect("lease holds its logger until dropped")
    }
}

impl DerefMut for PooledBufferLogger {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.logger.as_mut().expect("lease holds its logger until dropped")
    }
}

impl Drop for PooledBufferLogger {
    fn drop(&mut self) {
        if let Some(logger) = self.logger.take() {
            self.pool.release(logger);
        }
    }
}

impl fmt::Debug for PooledBufferLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBufferLogger")
            .field("logger", &self.logger)
            .finish()
    }
}

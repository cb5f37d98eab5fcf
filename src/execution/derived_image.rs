//! Scoped ownership of images built during a verification case.
//!
//! A `DerivedImage` is created before the build step and must be released
//! once the case finishes. Release issues exactly one delete for the tag.
//! If the guard is dropped unreleased (panic, cancelled future) the delete
//! is issued from `Drop` instead.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::DockerError;
use crate::execution::engine::ContainerEngine;

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i128 = 116_444_736_000_000_000;

/// Last file time handed out by `unique_file_time`.
static LAST_FILE_TIME: AtomicU64 = AtomicU64::new(0);

/// Current time as a Windows file time (100ns ticks since 1601-01-01 UTC).
pub fn file_time_now() -> u64 {
    let now = Utc::now();
    let ticks = i128::from(now.timestamp()) * 10_000_000
        + i128::from(now.timestamp_subsec_nanos() / 100)
        + FILETIME_UNIX_OFFSET;
    u64::try_from(ticks).unwrap_or(0)
}

/// A file time strictly greater than any previously returned in this process.
pub fn unique_file_time() -> u64 {
    loop {
        let last = LAST_FILE_TIME.load(Ordering::Relaxed);
        let next = file_time_now().max(last + 1);
        if LAST_FILE_TIME
            .compare_exchange(last, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return next;
        }
    }
}

/// Process-unique image id, e.g. `dotnetapp-131598230123456789`.
pub fn unique_image_id(prefix: &str) -> String {
    format!("{prefix}-{}", unique_file_time())
}

/// An image tag owned by one verification case.
pub struct DerivedImage<'a, E: ContainerEngine + ?Sized> {
    engine: &'a E,
    tag: String,
    released: bool,
}

impl<'a, E: ContainerEngine + ?Sized> DerivedImage<'a, E> {
    /// Takes ownership of `tag`; the image is deleted when the guard is released.
    pub fn new(engine: &'a E, tag: impl Into<String>) -> Self {
        Self {
            engine,
            tag: tag.into(),
            released: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Deletes the image. Consumes the guard so the delete is issued once.
    pub async fn release(mut self) -> Result<(), DockerError> {
        self.released = true;
        debug!(image = %self.tag, "Deleting derived image");
        self.engine.delete_image(&self.tag).await
    }
}

impl<E: ContainerEngine + ?Sized> Drop for DerivedImage<'_, E> {
    fn drop(&mut self) {
        if !self.released {
            warn!(image = %self.tag, "Derived image dropped without release, deleting in background");
            self.engine.delete_image_detached(&self.tag);
        }
    }
}

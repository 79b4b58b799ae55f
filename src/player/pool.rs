use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

use super::resource::{PlaybackContext, PlaybackResource};
use crate::config::EvictionPolicy;
use crate::models::ContentId;

/// Bounded set of playback resources keyed by content id.
///
/// Owned by whoever owns the feed; dropping the pool releases every resource
/// in it. Evicted resources are retired after the pool lock is dropped, so
/// handles still held elsewhere cannot restart them.
pub struct ResourcePool {
    context: PlaybackContext,
    capacity: NonZeroUsize,
    eviction: EvictionPolicy,
    entries: Mutex<LruCache<ContentId, PlaybackResource>>,
}

impl ResourcePool {
    /// Pool sized and ordered by the playback settings of `context`
    pub fn new(context: PlaybackContext) -> Self {
        let capacity = NonZeroUsize::new(context.config.pool_capacity).unwrap_or(NonZeroUsize::MIN);
        let eviction = context.config.eviction;

        info!(
            "Creating resource pool with capacity {} ({:?})",
            capacity, eviction
        );

        Self {
            context,
            capacity,
            eviction,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<ContentId, PlaybackResource>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The pooled resource for `content_id`, creating an unconfigured one on a miss
    pub fn resource(&self, content_id: &ContentId) -> PlaybackResource {
        let (resource, evicted) = {
            let mut entries = self.entries();

            let existing = match self.eviction {
                EvictionPolicy::OldestInserted => entries.peek(content_id).cloned(),
                EvictionPolicy::LeastRecentlyUsed => entries.get(content_id).cloned(),
            };
            if let Some(resource) = existing {
                trace!("Pool hit for {}", content_id);
                return resource;
            }

            let resource = PlaybackResource::new(content_id.clone(), self.context.clone());
            let evicted = entries.push(content_id.clone(), resource.clone());
            debug!(
                "Pooled new resource for {} ({}/{})",
                content_id,
                entries.len(),
                self.capacity
            );
            (resource, evicted)
        };

        if let Some((evicted_id, evicted)) = evicted {
            info!("Evicting {} from resource pool", evicted_id);
            evicted.retire();
        }

        resource
    }

    /// Release and forget `content_id`; false if it was not pooled
    pub fn release(&self, content_id: &ContentId) -> bool {
        let removed = self.entries().pop(content_id);

        match removed {
            Some(resource) => {
                debug!("Releasing {} from resource pool", content_id);
                resource.retire();
                true
            }
            None => false,
        }
    }

    /// Release every pooled resource and empty the pool
    pub fn drain_all(&self) -> usize {
        let drained: Vec<PlaybackResource> = {
            let mut entries = self.entries();
            let mut drained = Vec::with_capacity(entries.len());
            while let Some((_, resource)) = entries.pop_lru() {
                drained.push(resource);
            }
            drained
        };

        if !drained.is_empty() {
            info!("Draining {} pooled resources", drained.len());
        }
        for resource in &drained {
            resource.retire();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Membership test that never changes eviction order
    pub fn contains(&self, content_id: &ContentId) -> bool {
        self.entries().contains(content_id)
    }

    /// Pooled ids, next eviction candidate first
    pub fn ids(&self) -> Vec<ContentId> {
        self.entries().iter().rev().map(|(id, _)| id.clone()).collect()
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        self.drain_all();
    }
}

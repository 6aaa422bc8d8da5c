//! Outstanding requests keyed by tag.
//!
//! A `Request` binds a tag to the identity that should receive the
//! eventual response. The tracker owns the `TagSpace`, so expiry is pure
//! tag TTL: an expired request is one whose tag could be reallocated.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::tags::TagSpace;
use crate::error::TagError;
use crate::protocol::NO_TAG;

/// One outstanding request.
#[derive(Debug, Clone)]
pub struct Request {
    pub tag: u8,
    /// Who receives the response; `None` means broadcast.
    pub owner: Option<String>,
    pub created: Instant,
    pub ttl: Duration,
    proceed: Arc<AtomicBool>,
}

impl Request {
    fn new(tag: u8, owner: Option<String>, created: Instant, ttl: Duration) -> Self {
        Self {
            tag,
            owner,
            created,
            ttl,
            proceed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Whether a worker holding this request may emit its next step.
    pub fn may_proceed(&self) -> bool {
        self.proceed.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.proceed.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        self.proceed.store(true, Ordering::Release);
    }

    /// Owner to address a response to, or `None` to broadcast.
    pub fn recipient_at(&self, now: Instant) -> Option<&str> {
        if self.is_expired_at(now) {
            None
        } else {
            self.owner.as_deref()
        }
    }
}

/// Tag allocator plus the request bound to each live tag.
#[derive(Debug, Default)]
pub struct RequestTracker {
    tags: TagSpace,
    requests: HashMap<u8, Request>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, owner: Option<&str>, ttl: Duration) -> Result<Request, TagError> {
        self.add_at(owner, ttl, Instant::now())
    }

    pub fn add_at(
        &mut self,
        owner: Option<&str>,
        ttl: Duration,
        now: Instant,
    ) -> Result<Request, TagError> {
        let tag = self.tags.create_at(ttl, now)?;
        Ok(self.bind(tag, owner.map(str::to_owned), now, ttl))
    }

    /// Allocate a request that owns a tag-set.
    pub fn add_set(&mut self, owner: Option<&str>, ttl: Duration) -> Result<Request, TagError> {
        self.add_set_at(owner, ttl, Instant::now())
    }

    pub fn add_set_at(
        &mut self,
        owner: Option<&str>,
        ttl: Duration,
        now: Instant,
    ) -> Result<Request, TagError> {
        let tag = self.tags.create_set_at(ttl, now)?;
        Ok(self.bind(tag, owner.map(str::to_owned), now, ttl))
    }

    /// Allocate a member of the set owned by `set`, inheriting its owner
    /// identity. The first member is the set request itself.
    pub fn add_in_set(&mut self, set: u8) -> Result<Request, TagError> {
        self.add_in_set_at(set, Instant::now())
    }

    pub fn add_in_set_at(&mut self, set: u8, now: Instant) -> Result<Request, TagError> {
        let tag = self.tags.create_in_set_at(set, now)?;
        let owner = self.requests.get(&set).and_then(|r| r.owner.clone());
        if tag == set {
            if let Some(existing) = self.requests.get(&set) {
                return Ok(existing.clone());
            }
        }
        let ttl = self.tags.ttl(tag).unwrap_or_default();
        Ok(self.bind(tag, owner, now, ttl))
    }

    fn bind(&mut self, tag: u8, owner: Option<String>, now: Instant, ttl: Duration) -> Request {
        let request = Request::new(tag, owner, now, ttl);
        self.requests.insert(tag, request.clone());
        request
    }

    /// Look up a live request. Expired requests are purged first.
    pub fn get(&mut self, tag: u8) -> Option<Request> {
        self.get_at(tag, Instant::now())
    }

    pub fn get_at(&mut self, tag: u8, now: Instant) -> Option<Request> {
        self.sweep_at(now);
        self.requests.get(&tag).cloned()
    }

    /// Release `tag` and return the request that was bound to it.
    ///
    /// Releasing the last member of a tag-set also releases the set
    /// owner. The returned request may have expired; callers decide
    /// whether to address its owner or broadcast.
    pub fn release(&mut self, tag: u8) -> Option<Request> {
        self.release_at(tag, Instant::now())
    }

    pub fn release_at(&mut self, tag: u8, now: Instant) -> Option<Request> {
        if tag == NO_TAG {
            return None;
        }
        let request = self.requests.get(&tag).cloned();
        let owner = self.tags.release_at(tag, now);

        if owner != tag {
            self.requests.remove(&tag);
            self.complete_set(owner, now);
        } else if self.tags.is_set(tag) {
            self.complete_set(tag, now);
        } else {
            self.requests.remove(&tag);
        }
        request
    }

    fn complete_set(&mut self, owner: u8, now: Instant) {
        if self.tags.set_len(owner) == Some(0) {
            self.tags.release_at(owner, now);
            if !self.tags.is_set(owner) {
                self.requests.remove(&owner);
                log::debug!("RequestTracker: tag set {} complete", owner);
            }
        }
    }

    /// Purge expired tags and their requests. Returns how many requests
    /// were dropped.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&mut self, now: Instant) -> usize {
        self.tags.purge_expired_at(now);
        let before = self.requests.len();
        let tags = &self.tags;
        self.requests.retain(|tag, _| tags.contains_at(*tag, now));
        before - self.requests.len()
    }

    /// Close the proceed gate on `tag`. Returns false if unknown.
    pub fn pause(&self, tag: u8) -> bool {
        self.requests.get(&tag).map(Request::pause).is_some()
    }

    /// Open the proceed gate on `tag`. Returns false if unknown.
    pub fn resume(&self, tag: u8) -> bool {
        self.requests.get(&tag).map(Request::resume).is_some()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn tags(&self) -> &TagSpace {
        &self.tags
    }

    /// Drop every request and free every tag.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.tags = TagSpace::new();
    }
}

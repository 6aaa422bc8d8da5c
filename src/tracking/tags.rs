//! Single-byte correlation tags with TTL expiry and tag-sets.
//!
//! Tags live in `1..=255`; `0` means "no tag". Allocation is a linear
//! scan for the first slot that is free or whose TTL has lapsed. A
//! tag-set is an owner tag holding an ordered list of member tags; the
//! owner itself is handed out as the first member so a one-step set
//! costs a single tag.
//!
//! Every time-dependent operation has an `_at(now)` form so callers
//! (and tests) can supply the clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::TagError;
use crate::protocol::NO_TAG;

/// Number of usable tags.
pub const TAG_COUNT: usize = 255;

/// Floor applied to the TTL of set members minted after the first.
pub const MIN_MEMBER_TTL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
struct Slot {
    created: Instant,
    ttl: Duration,
}

impl Slot {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) > self.ttl
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.created))
    }
}

/// Allocator for the 255-entry tag pool.
#[derive(Debug)]
pub struct TagSpace {
    slots: [Option<Slot>; TAG_COUNT + 1],
    /// Set owner → members, in creation order.
    sets: HashMap<u8, Vec<u8>>,
    /// Member → owner.
    members: HashMap<u8, u8>,
}

impl Default for TagSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl TagSpace {
    pub fn new() -> Self {
        Self {
            slots: [None; TAG_COUNT + 1],
            sets: HashMap::new(),
            members: HashMap::new(),
        }
    }

    // ── Allocation ────────────────────────────────────────────

    pub fn create(&mut self, ttl: Duration) -> Result<u8, TagError> {
        self.create_at(ttl, Instant::now())
    }

    pub fn create_at(&mut self, ttl: Duration, now: Instant) -> Result<u8, TagError> {
        for tag in 1..=TAG_COUNT as u8 {
            match self.slots[tag as usize] {
                None => {}
                Some(slot) if slot.is_expired_at(now) => self.forget(tag, now),
                Some(_) => continue,
            }
            self.slots[tag as usize] = Some(Slot { created: now, ttl });
            return Ok(tag);
        }
        log::warn!("TagSpace: exhausted ({} tags in use)", TAG_COUNT);
        Err(TagError::TagSpaceExhausted)
    }

    pub fn create_set(&mut self, ttl: Duration) -> Result<u8, TagError> {
        self.create_set_at(ttl, Instant::now())
    }

    pub fn create_set_at(&mut self, ttl: Duration, now: Instant) -> Result<u8, TagError> {
        let owner = self.create_at(ttl, now)?;
        self.sets.insert(owner, Vec::new());
        Ok(owner)
    }

    pub fn create_in_set(&mut self, owner: u8) -> Result<u8, TagError> {
        self.create_in_set_at(owner, Instant::now())
    }

    /// Add a member to the set owned by `owner`.
    ///
    /// The first member of an empty set is the owner tag itself. Later
    /// members get `max(MIN_MEMBER_TTL, owner remaining)`.
    pub fn create_in_set_at(&mut self, owner: u8, now: Instant) -> Result<u8, TagError> {
        let Some(members) = self.sets.get(&owner) else {
            return Err(TagError::UnknownSet(owner));
        };
        let remaining = match self.slots[owner as usize] {
            Some(slot) if !slot.is_expired_at(now) => slot.remaining_at(now),
            _ => return Err(TagError::SetExpired(owner)),
        };

        if members.is_empty() {
            self.add_member(owner, owner);
            return Ok(owner);
        }

        let tag = self.create_at(remaining.max(MIN_MEMBER_TTL), now)?;
        self.add_member(owner, tag);
        Ok(tag)
    }

    fn add_member(&mut self, owner: u8, tag: u8) {
        if let Some(members) = self.sets.get_mut(&owner) {
            members.push(tag);
        }
        self.members.insert(tag, owner);
    }

    // ── Release ───────────────────────────────────────────────

    pub fn release(&mut self, tag: u8) -> u8 {
        self.release_at(tag, Instant::now())
    }

    /// Release `tag` and return the tag callers should track next.
    ///
    /// - a set member is removed from its set; the owner is returned
    /// - a set owner is removed only once its set is empty or expired;
    ///   the owner is returned either way
    /// - any other tag is freed and returned
    pub fn release_at(&mut self, tag: u8, now: Instant) -> u8 {
        if tag == NO_TAG {
            return NO_TAG;
        }

        if let Some(owner) = self.members.remove(&tag) {
            if let Some(members) = self.sets.get_mut(&owner) {
                members.retain(|m| *m != tag);
            }
            if owner != tag {
                self.slots[tag as usize] = None;
            }
            return owner;
        }

        if let Some(members) = self.sets.get(&tag) {
            let expired = self.slots[tag as usize].is_none_or(|s| s.is_expired_at(now));
            if members.is_empty() || expired {
                self.forget(tag, now);
                self.slots[tag as usize] = None;
            }
            return tag;
        }

        self.slots[tag as usize] = None;
        tag
    }

    /// Free every expired tag. Returns the tags that were freed.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<u8> {
        let mut purged = Vec::new();
        for tag in 1..=TAG_COUNT as u8 {
            if self.slots[tag as usize].is_some_and(|s| s.is_expired_at(now)) {
                self.forget(tag, now);
                self.slots[tag as usize] = None;
                purged.push(tag);
            }
        }
        purged
    }

    /// Drop all set bookkeeping for `tag`. Expired members of an owner
    /// are freed with it; live members stay allocated as plain tags
    /// until their own TTL lapses.
    fn forget(&mut self, tag: u8, now: Instant) {
        if let Some(members) = self.sets.remove(&tag) {
            for member in members {
                self.members.remove(&member);
                let expired = self.slots[member as usize].is_none_or(|s| s.is_expired_at(now));
                if member != tag && expired {
                    self.slots[member as usize] = None;
                }
            }
        }
        if let Some(owner) = self.members.remove(&tag) {
            if let Some(members) = self.sets.get_mut(&owner) {
                members.retain(|m| *m != tag);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Number of live (allocated, unexpired) tags.
    pub fn used(&self) -> usize {
        self.used_at(Instant::now())
    }

    pub fn used_at(&self, now: Instant) -> usize {
        self.slots[1..]
            .iter()
            .filter(|s| s.is_some_and(|s| !s.is_expired_at(now)))
            .count()
    }

    pub fn available(&self) -> usize {
        TAG_COUNT - self.used()
    }

    pub fn available_at(&self, now: Instant) -> usize {
        TAG_COUNT - self.used_at(now)
    }

    /// True if `tag` is allocated and unexpired.
    pub fn contains_at(&self, tag: u8, now: Instant) -> bool {
        tag != NO_TAG
            && self.slots[tag as usize].is_some_and(|s| !s.is_expired_at(now))
    }

    /// Time left before `tag` may be reused, `None` if it is free.
    pub fn remaining_at(&self, tag: u8, now: Instant) -> Option<Duration> {
        if tag == NO_TAG {
            return None;
        }
        self.slots[tag as usize].map(|s| s.remaining_at(now))
    }

    pub fn ttl(&self, tag: u8) -> Option<Duration> {
        if tag == NO_TAG {
            return None;
        }
        self.slots[tag as usize].map(|s| s.ttl)
    }

    pub fn is_set(&self, tag: u8) -> bool {
        self.sets.contains_key(&tag)
    }

    /// Member count of the set owned by `owner`.
    pub fn set_len(&self, owner: u8) -> Option<usize> {
        self.sets.get(&owner).map(Vec::len)
    }

    pub fn owner_of(&self, tag: u8) -> Option<u8> {
        self.members.get(&tag).copied()
    }
}

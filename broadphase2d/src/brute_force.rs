// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reference O(n²) index: no acceleration structure, just a flat
//! arena of AABBs tested pairwise.

use indexmap::IndexSet;

use crate::error::{BroadphaseError, Result};
use crate::geom::{Aabb, Ray, Vec2};
use crate::traits::{AabbProducer, AcceptAll, Broadphase, BroadphaseFilter, Pair, ProxyId};

struct Entry<T> {
    object: T,
    aabb: Aabb,
}

/// The simplest possible index: every `insert`/`update` is O(1), and
/// every `detect` is O(n²). Useful as a correctness oracle for the
/// other two indices and for scenes small enough that a spatial
/// structure would be pure overhead.
///
/// Unlike [`crate::sap::SweepAndPrune`] and
/// [`crate::dynamic_tree::DynamicAabbTree`], this index has no notion of
/// AABB expansion: every stored box is exactly the producer's tight box,
/// so there is no `E: AabbExpansionMethod<T>` parameter to configure.
pub struct BruteForceBroadphase<T, P, F = AcceptAll>
where
    P: AabbProducer<T>,
    F: BroadphaseFilter<T>,
{
    slots: Vec<Option<Entry<T>>>,
    /// Current generation of each slot, bumped on removal so a handle
    /// from before a slot was freed can never alias the object that
    /// later reused it. Lives outside `slots` so it survives the `None`
    /// left by `remove`.
    generations: Vec<u32>,
    free_list: Vec<u32>,
    producer: P,
    filter: F,
    updated: IndexSet<ProxyId>,
    tracking_enabled: bool,
}

/// Initial arena capacity reserved by `with_capacity`-less constructors.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

impl<T, P> BruteForceBroadphase<T, P, AcceptAll>
where
    P: AabbProducer<T>,
{
    /// Build an index with no pair filtering.
    pub fn new(producer: P) -> Self {
        Self::with_capacity(producer, DEFAULT_INITIAL_CAPACITY)
    }

    /// Like [`Self::new`], reserving room for `capacity` objects up
    /// front.
    pub fn with_capacity(producer: P, capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            producer,
            filter: AcceptAll,
            updated: IndexSet::new(),
            tracking_enabled: true,
        }
    }
}

impl<T, P, F> BruteForceBroadphase<T, P, F>
where
    P: AabbProducer<T>,
    F: BroadphaseFilter<T>,
{
    /// Build an index with an explicit filtering strategy.
    pub fn with_filter(producer: P, filter: F) -> Self {
        Self {
            slots: Vec::with_capacity(DEFAULT_INITIAL_CAPACITY),
            generations: Vec::with_capacity(DEFAULT_INITIAL_CAPACITY),
            free_list: Vec::new(),
            producer,
            filter,
            updated: IndexSet::new(),
            tracking_enabled: true,
        }
    }

    fn entry(&self, id: ProxyId) -> Option<&Entry<T>> {
        if self.generations.get(id.slot as usize).copied() != Some(id.generation) {
            return None;
        }
        self.slots.get(id.slot as usize).and_then(|e| e.as_ref())
    }

    fn require(&self, id: ProxyId) -> Result<&Entry<T>> {
        self.entry(id)
            .ok_or_else(|| BroadphaseError::NoSuchElement(format!("{id:?} is not live")))
    }
}

impl<T, P, F> Broadphase<T> for BruteForceBroadphase<T, P, F>
where
    P: AabbProducer<T>,
    F: BroadphaseFilter<T>,
{
    fn insert(&mut self, object: T) -> Result<ProxyId> {
        let aabb = self.producer.aabb(&object);
        if !aabb.is_finite() {
            return Err(BroadphaseError::InvalidArgument(format!(
                "producer yielded a non-finite AABB: {aabb}"
            )));
        }
        let entry = Entry { object, aabb };
        let id = if let Some(slot) = self.free_list.pop() {
            self.slots[slot as usize] = Some(entry);
            ProxyId::new(slot, self.generations[slot as usize])
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Some(entry));
            self.generations.push(0);
            ProxyId::new(slot, 0)
        };
        if self.tracking_enabled {
            self.updated.insert(id);
        }
        Ok(id)
    }

    fn update(&mut self, id: ProxyId) -> Result<bool> {
        let (changed, next) = {
            let entry = self.require(id)?;
            let next = self.producer.aabb(&entry.object);
            if !next.is_finite() {
                return Err(BroadphaseError::InvalidArgument(format!(
                    "producer yielded a non-finite AABB: {next}"
                )));
            }
            (!aabb_eq(next, entry.aabb), next)
        };
        if changed {
            if let Some(slot) = self.slots.get_mut(id.slot as usize).and_then(Option::as_mut) {
                slot.aabb = next;
            }
            if self.tracking_enabled {
                self.updated.insert(id);
            }
        }
        Ok(changed)
    }

    fn remove(&mut self, id: ProxyId) -> Result<T> {
        self.require(id)?;
        let entry = self.slots[id.slot as usize]
            .take()
            .expect("presence checked by require");
        self.generations[id.slot as usize] = self.generations[id.slot as usize].wrapping_add(1);
        self.free_list.push(id.slot);
        self.updated.shift_remove(&id);
        Ok(entry.object)
    }

    fn contains(&self, id: ProxyId) -> bool {
        self.entry(id).is_some()
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|e| e.is_some()).count()
    }

    fn get_aabb(&self, id: ProxyId) -> Option<Aabb> {
        self.entry(id).map(|e| e.aabb)
    }

    fn get(&self, id: ProxyId) -> Option<&T> {
        self.entry(id).map(|e| &e.object)
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.generations.clear();
        self.free_list.clear();
        self.updated.clear();
    }

    fn shift(&mut self, delta: Vec2) {
        for slot in self.slots.iter_mut().flatten() {
            slot.aabb = slot.aabb.translate(delta);
        }
    }

    fn optimize(&mut self) -> Result<()> {
        Err(BroadphaseError::UnsupportedOperation(
            "BruteForceBroadphase has no internal structure to optimize".into(),
        ))
    }

    fn updated(&self) -> Vec<ProxyId> {
        self.updated.iter().copied().collect()
    }

    fn clear_updates(&mut self) {
        self.updated.clear();
    }

    fn is_update_tracking_supported(&self) -> bool {
        // Every detect() here is already a full O(n^2) scan; there is no
        // cheaper "only the changed half" path to support.
        false
    }

    fn is_update_tracking_enabled(&self) -> bool {
        false
    }

    fn set_update_tracking_enabled(&mut self, _enabled: bool) -> Result<()> {
        Err(BroadphaseError::UnsupportedOperation(
            "BruteForceBroadphase does not support update tracking".into(),
        ))
    }

    fn set_updated(&mut self, _id: ProxyId) -> Result<()> {
        Err(BroadphaseError::UnsupportedOperation(
            "BruteForceBroadphase does not support update tracking".into(),
        ))
    }

    fn is_updated(&self, id: ProxyId) -> bool {
        // Tracking is unsupported, so every live object counts as updated.
        self.contains(id)
    }

    fn detect_pair(&self, a: &T, b: &T) -> bool {
        self.producer.aabb(a).overlaps(&self.producer.aabb(b)) && self.filter.allow_pair(a, b)
    }

    fn detect(&self) -> Box<dyn Iterator<Item = Pair> + '_> {
        let live: Vec<(ProxyId, &Entry<T>)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| {
                e.as_ref()
                    .map(|e| (ProxyId::new(slot as u32, self.generations[slot]), e))
            })
            .collect();
        let mut pairs = Vec::new();
        for i in 0..live.len() {
            let (ida, ea) = live[i];
            for &(idb, eb) in &live[i + 1..] {
                if ea.aabb.overlaps(&eb.aabb) && self.filter.allow_pair(&ea.object, &eb.object) {
                    pairs.push(Pair::new(ida, idb));
                }
            }
        }
        Box::new(pairs.into_iter())
    }

    fn detect_changed(&self) -> Box<dyn Iterator<Item = Pair> + '_> {
        // Brute force tracks no notion of "only the changed half of the
        // scene": every detect() is already a full scan.
        self.detect()
    }

    fn detect_aabb(&self, aabb: Aabb) -> Box<dyn Iterator<Item = ProxyId> + '_> {
        Box::new(self.slots.iter().enumerate().filter_map(move |(slot, e)| {
            let e = e.as_ref()?;
            if e.aabb.overlaps(&aabb) && self.filter.allow_single(&e.object) {
                Some(ProxyId::new(slot as u32, self.generations[slot]))
            } else {
                None
            }
        }))
    }

    fn raycast(&self, ray: Ray, length: f64) -> Box<dyn Iterator<Item = ProxyId> + '_> {
        Box::new(self.slots.iter().enumerate().filter_map(move |(slot, e)| {
            let e = e.as_ref()?;
            if crate::geom::ray_aabb_slab(&ray, length, &e.aabb) && self.filter.allow_single(&e.object)
            {
                Some(ProxyId::new(slot as u32, self.generations[slot]))
            } else {
                None
            }
        }))
    }
}

fn aabb_eq(a: Aabb, b: Aabb) -> bool {
    a.min_x == b.min_x && a.min_y == b.min_y && a.max_x == b.max_x && a.max_y == b.max_y
}

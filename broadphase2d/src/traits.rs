// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared contracts implemented by all three indices, and the capability
//! trait that makes them interchangeable.

use crate::error::Result;
use crate::geom::{Aabb, Ray, Vec2};
use std::fmt;

/// An opaque, generation-checked handle to an object stored in an index.
///
/// Every index in this crate hands these out from `insert` and accepts
/// them back from `update`/`remove`/`get_aabb`. A handle from one index
/// instance is never valid in another.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl ProxyId {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }
}

impl fmt::Debug for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyId({}#{})", self.slot, self.generation)
    }
}

/// An unordered pair of proxies reported by [`Broadphase::detect`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Pair {
    /// The smaller of the two proxies by slot, for stable ordering.
    pub first: ProxyId,
    /// The larger of the two proxies by slot.
    pub second: ProxyId,
}

impl Pair {
    /// Build a pair, normalizing order so `(a, b)` and `(b, a)` compare
    /// equal.
    pub fn new(a: ProxyId, b: ProxyId) -> Self {
        if a.slot <= b.slot {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }
}

/// Computes the tight (unexpanded) world-space AABB for an object.
///
/// Indices call this once on `insert` and again whenever the caller
/// reports that an object moved, via `update`.
pub trait AabbProducer<T> {
    /// Compute the current tight AABB for `object`.
    fn aabb(&self, object: &T) -> Aabb;
}

/// Decides how much slack to add around a tight AABB before it is stored.
///
/// Expansion trades rebuild frequency for stored-box looseness: a larger
/// margin means fewer `update`s trigger a change to the stored box (the
/// tight box can move within the fat one without any write), at the cost
/// of coarser overlap tests and a more conservative `detect`.
pub trait AabbExpansionMethod<T> {
    /// Compute the box actually stored in the index for `object`, given
    /// its tight AABB and (for methods that extrapolate motion) its
    /// previous stored box, if any.
    fn expand(&self, tight: Aabb, previous: Option<Aabb>, object: &T) -> Aabb;
}

/// Stores no slack: the stored box is exactly the tight box.
///
/// Every `update` therefore writes a new stored box, which is the right
/// trade-off for objects that move rarely or whose exact bounds matter
/// more than amortized update cost.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoExpansion;

impl<T> AabbExpansionMethod<T> for NoExpansion {
    fn expand(&self, tight: Aabb, _previous: Option<Aabb>, _object: &T) -> Aabb {
        tight
    }
}

/// Default expansion margin in world units, used by [`FixedMargin::default`].
pub const DEFAULT_EXPANSION_MARGIN: f64 = 0.2;

/// How much a stored (fat) AABB is allowed to shrink, relative to a
/// freshly re-expanded tight AABB's perimeter, before a move forces a
/// reinsertion rather than just a box update in place.
///
/// Shared tuning constant for [`crate::sap::SweepAndPrune`] and
/// [`crate::dynamic_tree::DynamicAabbTree`]; [`crate::brute_force::BruteForceBroadphase`]
/// has no stored-box reinsertion cost to amortize and ignores it.
pub const AABB_REDUCTION_RATIO: f64 = 2.0;

/// Fattens the tight AABB by a fixed margin on every side.
#[derive(Copy, Clone, Debug)]
pub struct FixedMargin {
    /// Distance added to every side of the tight AABB.
    pub margin: f64,
}

impl FixedMargin {
    /// Build a fixed-margin expansion method. `margin` must be finite and
    /// non-negative; callers that need to validate this at construction
    /// time should prefer the indices' own constructors, which surface
    /// [`crate::error::BroadphaseError::InvalidArgument`] instead of
    /// silently clamping.
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }
}

impl Default for FixedMargin {
    fn default() -> Self {
        Self::new(DEFAULT_EXPANSION_MARGIN)
    }
}

impl<T> AabbExpansionMethod<T> for FixedMargin {
    fn expand(&self, tight: Aabb, _previous: Option<Aabb>, _object: &T) -> Aabb {
        Aabb::new(
            tight.min_x - self.margin,
            tight.min_y - self.margin,
            tight.max_x + self.margin,
            tight.max_y + self.margin,
        )
    }
}

/// Narrows a broad-phase result set with application-level knowledge
/// (collision layers/masks, "don't report a body against itself", etc).
///
/// All three indices apply the filter identically: it is consulted once
/// per candidate pair or candidate proxy, after the geometric test has
/// already passed, never in place of it.
pub trait BroadphaseFilter<T> {
    /// Whether a candidate pair found by `detect` should be reported.
    fn allow_pair(&self, a: &T, b: &T) -> bool;

    /// Whether a candidate found by `detect_aabb`/`raycast` should be
    /// reported. The default accepts everything; override for queries
    /// that need one-sided filtering (e.g. a raycast that should ignore
    /// the casting body).
    fn allow_single(&self, _object: &T) -> bool {
        true
    }
}

/// Accepts every pair and every single candidate.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAll;

impl<T> BroadphaseFilter<T> for AcceptAll {
    fn allow_pair(&self, _a: &T, _b: &T) -> bool {
        true
    }
}

/// The capability interface shared by [`crate::brute_force::BruteForceBroadphase`],
/// [`crate::sap::SweepAndPrune`], and [`crate::dynamic_tree::DynamicAabbTree`].
///
/// Generic code that only needs broad-phase queries — not the specific
/// performance characteristics of one index — should be written against
/// this trait so the backing index can be swapped without touching call
/// sites.
pub trait Broadphase<T> {
    /// Insert a new object, computing and storing its AABB via the
    /// index's configured [`AabbProducer`] and [`AabbExpansionMethod`].
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::InvalidArgument`] if the
    /// produced (or expanded) AABB contains a `NaN` or infinite
    /// coordinate.
    fn insert(&mut self, object: T) -> Result<ProxyId>;

    /// Recompute an object's AABB and update the index's stored box for
    /// it if the move pushed the tight box outside the stored (possibly
    /// expanded) one. Returns `true` if the stored box changed.
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::NoSuchElement`] if `id` is not a
    /// live handle in this index. [`crate::error::BroadphaseError::InvalidArgument`]
    /// under the same condition as [`Broadphase::insert`].
    fn update(&mut self, id: ProxyId) -> Result<bool>;

    /// Remove an object from the index. Returns the removed object.
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::NoSuchElement`] if `id` is not a
    /// live handle in this index.
    fn remove(&mut self, id: ProxyId) -> Result<T>;

    /// Whether `id` currently identifies a live object.
    fn contains(&self, id: ProxyId) -> bool;

    /// Number of live objects.
    fn len(&self) -> usize;

    /// Whether the index holds no objects.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored (possibly expanded) AABB for `id`, if live.
    fn get_aabb(&self, id: ProxyId) -> Option<Aabb>;

    /// A borrow of the stored object for `id`, if live.
    fn get(&self, id: ProxyId) -> Option<&T>;

    /// Remove every object from the index.
    fn clear(&mut self);

    /// Translate the index's world frame by `delta`, shifting every
    /// stored AABB without recomputing objects' tight boxes. Used when
    /// the whole scene is panned and no individual object actually moved
    /// relative to the others.
    fn shift(&mut self, delta: Vec2);

    /// Opportunistically improve the index's internal structure (e.g.
    /// rebalance a tree) without changing any stored AABB or object.
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::UnsupportedOperation`] for
    /// indices with no notion of rebalancing.
    fn optimize(&mut self) -> Result<()>;

    /// The handles written to since the index was built or since the
    /// last [`Broadphase::clear_updates`] call, in the order they were
    /// first touched.
    fn updated(&self) -> Vec<ProxyId>;

    /// Reset the update-tracking set without otherwise changing the
    /// index.
    fn clear_updates(&mut self);

    /// Whether this index can track updates at all.
    /// [`crate::brute_force::BruteForceBroadphase`] returns `false`:
    /// every `detect` there is already a full scan, so there is nothing
    /// to track.
    fn is_update_tracking_supported(&self) -> bool;

    /// Whether update tracking is currently switched on. Always `false`
    /// wherever [`Broadphase::is_update_tracking_supported`] is `false`.
    fn is_update_tracking_enabled(&self) -> bool;

    /// Switch update tracking on or off. Both directions clear the
    /// `updated` set first: disabling discards whatever had
    /// accumulated, and re-enabling starts accumulation fresh rather
    /// than picking back up where it left off.
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::UnsupportedOperation`] wherever
    /// [`Broadphase::is_update_tracking_supported`] is `false`.
    fn set_update_tracking_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Mark `id` as updated, as if [`Broadphase::update`] had just
    /// written a new stored box for it, without recomputing or
    /// otherwise changing that box. A no-op while tracking is disabled.
    ///
    /// # Errors
    /// [`crate::error::BroadphaseError::NoSuchElement`] if `id` is not a
    /// live handle in this index.
    fn set_updated(&mut self, id: ProxyId) -> Result<()>;

    /// Whether `id` is in the updated set. `true` unconditionally while
    /// tracking is disabled (including on indices that never support
    /// it), so callers that don't care about tracking can call this
    /// without checking [`Broadphase::is_update_tracking_enabled`]
    /// first. `false` for a handle that isn't currently live.
    fn is_updated(&self, id: ProxyId) -> bool;

    /// Whether `a` and `b`'s tight AABBs — as the index's configured
    /// [`AabbProducer`] computes them right now — overlap and the
    /// configured [`BroadphaseFilter`] admits the pair. Pure: touches
    /// neither object's stored AABB nor the `updated` set, and works
    /// equally for objects this index has never seen.
    fn detect_pair(&self, a: &T, b: &T) -> bool;

    /// Whether two independently-supplied AABBs overlap, bypassing the
    /// index and its producer entirely. The free function a caller
    /// reaches for when they already have both AABBs in hand (e.g. from
    /// their own shape-under-transform computation) and only need the
    /// geometric test, not index membership.
    fn detect_aabb_pair(&self, a: Aabb, b: Aabb) -> bool {
        a.overlaps(&b)
    }

    /// All candidate pairs of stored AABBs that currently overlap,
    /// filtered through the index's configured [`BroadphaseFilter`].
    ///
    /// The returned iterator is lazy and resumable: dropping it midway
    /// leaves the index untouched, and each `next()` call does no more
    /// work than producing a single pair requires.
    fn detect(&self) -> Box<dyn Iterator<Item = Pair> + '_>;

    /// A subset of what [`Broadphase::detect`] would report, restricted
    /// to pairs touching at least one handle [`Broadphase::is_updated`]
    /// currently reports `true` for.
    ///
    /// While tracking is disabled (including on indices that never
    /// support it), every live handle counts as updated, so this
    /// returns the same set [`Broadphase::detect`] would.
    fn detect_changed(&self) -> Box<dyn Iterator<Item = Pair> + '_>;

    /// Every live proxy whose stored AABB overlaps `aabb`.
    fn detect_aabb(&self, aabb: Aabb) -> Box<dyn Iterator<Item = ProxyId> + '_>;

    /// Every live proxy whose stored AABB the ray passes through within
    /// `length` (see [`crate::geom::ray_aabb_slab`] for the exact
    /// semantics of a non-positive `length`).
    fn raycast(&self, ray: Ray, length: f64) -> Box<dyn Iterator<Item = ProxyId> + '_>;
}

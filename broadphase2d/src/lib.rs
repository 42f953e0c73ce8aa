// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Broadphase2D: a generic 2D broad-phase collision index.
//!
//! Broadphase2D is a reusable building block for finding candidate
//! overlaps among a moving set of bodies, before any narrow-phase
//! exact-intersection test runs.
//!
//! - Insert, update, and remove AABBs with user payloads.
//! - Query by overlapping AABB, or by ray.
//! - Detect every currently-overlapping pair of stored boxes.
//!
//! It is generic over the object type `T` and does not depend on any
//! geometry crate; `AabbProducer<T>` is how callers plug in their own
//! notion of "where is this object right now."
//!
//! Three indices share one capability trait ([`Broadphase`]) so the
//! backing strategy can be swapped without touching call sites:
//!
//! - [`brute_force::BruteForceBroadphase`] — no acceleration structure,
//!   O(n²) `detect`. A correctness oracle for the other two.
//! - [`sap::SweepAndPrune`] — proxies kept in axis-sorted order;
//!   `detect` sweeps the order looking for overlaps.
//! - [`dynamic_tree::DynamicAabbTree`] — a self-balancing binary AABB
//!   tree with a perimeter-based insertion heuristic; `detect`,
//!   `detect_aabb`, and `raycast` are tree descents.
//!
//! # Example
//!
//! ```rust
//! use broadphase2d::{Aabb, AabbProducer, BruteForceBroadphase, Broadphase};
//!
//! struct Ball { x: f64, y: f64, radius: f64 }
//!
//! struct BallAabb;
//! impl AabbProducer<Ball> for BallAabb {
//!     fn aabb(&self, ball: &Ball) -> Aabb {
//!         Aabb::new(ball.x - ball.radius, ball.y - ball.radius,
//!                   ball.x + ball.radius, ball.y + ball.radius)
//!     }
//! }
//!
//! let mut bp = BruteForceBroadphase::new(BallAabb);
//! let a = bp.insert(Ball { x: 0.0, y: 0.0, radius: 1.0 })?;
//! let b = bp.insert(Ball { x: 1.0, y: 0.0, radius: 1.0 })?;
//! let pairs: Vec<_> = bp.detect().collect();
//! assert_eq!(pairs.len(), 1);
//! assert!(pairs[0].first == a || pairs[0].first == b);
//! ```
//!
//! ## Choosing an index
//!
//! - `BruteForceBroadphase`: simplest and smallest, linear scans. Good
//!   for very small scenes or as a correctness baseline to test the
//!   other two against.
//! - `SweepAndPrune`: great when motion is coherent frame-to-frame (the
//!   common case in a physics step) since the sorted order rarely needs
//!   large rearrangement.
//! - `DynamicAabbTree`: best general-purpose choice for irregular
//!   distributions and frequent point/AABB/ray queries; `optimize` lets
//!   you pay down tree quality at a time of your choosing.
//!
//! ### Float semantics
//!
//! All geometry in this crate is `f64`. `insert`/`update` reject AABBs
//! containing `NaN` or infinite coordinates with
//! [`BroadphaseError::InvalidArgument`].
//!
//! ### Update tracking
//!
//! Every index remembers which handles [`Broadphase::insert`]/
//! [`Broadphase::update`] have touched since the last
//! [`Broadphase::clear_updates`] call. [`Broadphase::detect`] always
//! reports every overlapping pair; [`Broadphase::detect_changed`] narrows
//! that to pairs with at least one touched endpoint, useful for a physics
//! step that only wants to re-examine what moved this frame.
//!
//! Tracking can be switched off with
//! [`Broadphase::set_update_tracking_enabled`] for callers that always
//! want the full `detect` result from `detect_changed` without paying
//! to maintain the tracked set; both directions of the switch clear
//! whatever had accumulated, and [`Broadphase::is_updated`] reports
//! `true` unconditionally while tracking is off.

#![forbid(unsafe_code)]

pub mod brute_force;
pub mod dynamic_tree;
pub mod error;
pub mod geom;
pub mod sap;
pub mod traits;

pub use brute_force::BruteForceBroadphase;
pub use dynamic_tree::DynamicAabbTree;
pub use error::{BroadphaseError, Result};
pub use geom::{ray_aabb_slab, Aabb, Ray, Vec2};
pub use sap::SweepAndPrune;
pub use traits::{
    AabbExpansionMethod, AabbProducer, AcceptAll, Broadphase, BroadphaseFilter, FixedMargin,
    NoExpansion, Pair, ProxyId, AABB_REDUCTION_RATIO, DEFAULT_EXPANSION_MARGIN,
};

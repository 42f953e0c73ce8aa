// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The three-variant error model shared by every index in this crate.

use thiserror::Error;

/// Errors raised by broad-phase operations.
///
/// Every operation that can fail raises exactly one of these three kinds;
/// operations that cannot fail (queries over an empty index, duplicate
/// `remove`, etc.) return a plain value instead of `Result`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BroadphaseError {
    /// An argument violated a documented precondition (e.g. a degenerate
    /// or NaN-containing AABB passed to `insert`, a zero-length margin
    /// passed to a constructor that requires a positive one).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not supported by this index (e.g. `optimize` on
    /// an index whose structure has no notion of rebalancing).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An iterator was advanced past the point where it had any further
    /// elements to produce, or a lookup by handle found no such element.
    #[error("no such element: {0}")]
    NoSuchElement(String),
}

/// Convenience alias for fallible broad-phase operations.
pub type Result<T> = std::result::Result<T, BroadphaseError>;

//! Grow-only concurrent containers built on immutable snapshot buffers.
//!
//! The crate provides three containers that can be shared between threads by reference:
//!
//!  - [`Queue`], a multi-producer multi-consumer FIFO queue over a ring of slots.
//!  - [`HashMap`], an open-addressing hash map whose lookups and iteration work on a snapshot
//!    of the table.
//!  - [`Vector`], an array that can be appended to, read and overwritten from many threads.
//!
//! # Snapshots
//!
//! Every container keeps its elements in a fixed-capacity buffer that is published through an
//! atomically replaceable, reference-counted pointer. Growth never resizes a buffer in place:
//! it allocates a larger one, copies the live elements across, and publishes it. Readers that
//! loaded the old buffer keep using it for as long as they hold it, so a [`Cursor`] or [`Iter`]
//! over a [`HashMap`] sees the table as it was when the cursor was created, and is never
//! invalidated by a concurrent rehash.
//!
//! # Growth
//!
//! [`Queue`] and [`HashMap`] coordinate growth with a [`GrowthBarrier`]. Mutations run in a
//! *shared section*, any number at a time; growth runs in an *exclusive section* that waits for
//! every shared section to leave and keeps new ones out until the new buffer is published. Only
//! one thread grows at a time. A thread that asked to grow while another growth was running
//! simply re-checks the freshly published buffer.
//!
//! [`Vector`] grows without a barrier: the first thread to *seal* the current buffer copies it,
//! and writers that land in a sealed buffer repeat their write against the replacement.
//!
//! # Logging
//!
//! Growth events are reported through [`tracing`] at `debug` level; barrier hand-offs at
//! `trace` level. Install any `tracing` subscriber to see them.
//!
//! # Elements
//!
//! Map entries and array elements are handed out as `Arc`s. They stay valid after the element
//! is erased, overwritten, or its buffer is replaced. Queue elements are moved out by
//! [`Queue::pop`].
//!
//! # Examples
//!
//! ```
//! use ratchet::{HashMap, Queue, Vector};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(Queue::new());
//! let map = Arc::new(HashMap::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let queue = Arc::clone(&queue);
//!         let map = Arc::clone(&map);
//!         thread::spawn(move || {
//!             for i in 0..25 {
//!                 queue.push(t * 25 + i);
//!                 map.insert(t * 25 + i, t);
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! assert_eq!(queue.len(), 100);
//! assert_eq!(map.len(), 100);
//!
//! let v: Vector<_> = (0..3).collect();
//! v.push_back(3);
//! assert_eq!(*v.get(3).unwrap(), 3);
//! ```
#![deny(
    missing_docs,
    missing_debug_implementations,
    unreachable_pub,
    rustdoc::broken_intra_doc_links
)]
#![warn(rust_2018_idioms)]

mod barrier;
mod error;
mod holder;
mod iter;
mod map;
mod queue;
mod vector;

#[cfg(feature = "rayon")]
mod rayon_impls;

#[cfg(feature = "serde")]
mod serde_impls;

pub use barrier::{GrowthBarrier, SharedSection, DEFAULT_SPIN_DELAY};
pub use error::{Error, Result};
pub use iter::{Cursor, Iter};
pub use map::{Entry, HashMap};
pub use queue::Queue;
pub use vector::Vector;

/// Default hasher for [`HashMap`].
pub type DefaultHashBuilder = ahash::RandomState;

/// Capacity of a container created without one.
pub const DEFAULT_CAPACITY: usize = 10;

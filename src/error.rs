use thiserror::Error;

/// Errors reported by the containers in this crate.
///
/// Every variant describes a caller-side contract violation. Growth never fails with an error:
/// an allocation failure aborts the operation that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// An index was at or beyond the logical length of a [`Vector`](crate::Vector).
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The index that was requested.
        index: usize,
        /// The length observed when the request was checked.
        len: usize,
    },

    /// The index has been claimed by a concurrent `push_back` whose value has not landed yet.
    #[error("index {index} has been claimed but not yet written")]
    Vacant {
        /// The index that was requested.
        index: usize,
    },

    /// The key is not present in the [`HashMap`](crate::HashMap).
    #[error("key not found")]
    KeyNotFound,

    /// [`Queue::pop`](crate::Queue::pop) was called while no committed value was available.
    #[error("queue is empty")]
    QueueEmpty,
}

/// A `Result` whose error type is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

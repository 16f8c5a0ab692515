use thiserror::Error as ThisError;

/// Errors reported by read-only map accessors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The requested key is not present in the map.
    ///
    /// Removal of an absent key is a silent no-op and never produces this
    /// error; it is reserved for accessors that must report absence instead
    /// of returning a sentinel value.
    #[error("key not found")]
    KeyNotFound,
}

//! The unified error handling system for the session core.

// 1. Core Types
pub use classify::{Classification, Classify, ErrorKind, RETRYABLE_STATUS_CODES};
pub use types::ClientError;

/// A unified `Result` type for the entire crate.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ClientError>;

// 2. Module declarations
pub mod classify;
pub mod macros;
pub mod types;

// 3. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<ClientError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(ClientError::Context {
                context: context().to_string(),
                source: Box::new(error.into()),
            }),
        }
    }
}

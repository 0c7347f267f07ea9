//! HTTP surface for the program engine.
//!
//! Handlers are thin: parse the request, call `ProgramService`, wrap the
//! result in an [`envelope::Envelope`]. Every failure renders through
//! [`error::AppError`].

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod router;

pub use envelope::{Envelope, Pagination};
pub use error::AppError;
pub use router::build_router;

//! Structured cancellation utilities.
//!
//! [`CancellationToken`] is threaded from the caller of
//! [`Pipeline::run`](crate::pipeline::Pipeline::run) into every worker and,
//! as a child token, into every processing attempt.

mod token;

pub use token::CancellationToken;

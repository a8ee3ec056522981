//! Transport backends.
//!
//! The SSH backend drives a real remote console through russh. Tests use the
//! scripted console in [`crate::mock`] instead.

#[cfg(feature = "ssh")]
pub mod ssh;

//! Background tasks.
//!
//! Each submodule owns work that runs outside the request path. Tasks accept
//! a [`tokio_util::sync::CancellationToken`] so they can be stopped on
//! request or at shutdown.

pub mod import_jobs;

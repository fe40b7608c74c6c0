//! Worker-side SDK for paintdry modules.
//!
//! Implement [`WorkerModule`] for the module's domain logic and call
//! [`harness::run`] from `main`; the harness speaks the file-queue and pipe
//! transports and the `example` self-documentation mode.

pub mod error;
pub mod example;
pub mod harness;
pub mod module;

pub use error::{Result, WorkerError};
pub use example::{EXAMPLE_MODULE, ExampleModule};
pub use harness::{Invocation, handle_files, handle_pipe, run, run_example};
pub use module::{WorkerModule, handle_request};

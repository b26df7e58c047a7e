// src/process/mod.rs

//! Process supervision layer.
//!
//! - [`handle`] owns [`ProcessHandle`]: spawn, line retrieval, kill/terminate
//!   and reap-once waiting for one external command.
//! - [`reader`] is the per-process task that drains stdout and stderr into a
//!   single ordered stream.
//! - [`sink`] provides the injectable [`LineSink`] used for echo and run-loop
//!   output.
//! - [`command`] describes what to run ([`CommandSpec`]).
//! - [`registry`] tracks every live process of a run so an interrupt can
//!   kill them all.

pub mod command;
pub mod handle;
mod reader;
pub mod registry;
pub mod sink;

pub use command::CommandSpec;
pub use handle::{LineRead, ProcessHandle, ProcessOptions, ProcessState, UNKNOWN_EXIT_CODE};
pub use registry::ProcessRegistry;
pub use sink::{CaptureSink, CapturedLine, ConsoleSink, LineSink};

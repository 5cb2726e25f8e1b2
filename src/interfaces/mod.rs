//! Outer adapters: file formats the CLI reads and writes.

pub mod csv;

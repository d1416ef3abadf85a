//! Core data models for the batch conversion service.
//!
//! A batch owns its conversion results; options describe how each staged
//! upload is transformed. Responses serialize as camelCase JSON via `serde`.

pub mod batch;
pub mod options;

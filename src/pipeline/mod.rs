//! Pipeline stages for resume analysis.
//!
//! Each submodule implements one step or one piece of data shared between
//! steps; the orchestrator in [`crate::analyze`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ (upload, OCR) ──▶ feedback ──▶ (persist)
//! (path/URL) (pdfium)   (PNG)                        (JSON)
//! ```
//!
//! 1. [`input`]: load a local path or URL and check it is a PDF
//! 2. [`render`]: rasterise page 1 at 4×; runs in `spawn_blocking`
//! 3. [`encode`]: PNG-encode the bitmap, base64-wrap it for vision calls
//! 4. [`feedback`]: normalise the feedback response and parse its JSON
//! 5. [`postprocess`]: deterministic cleanup of model output
//! 6. [`state`]: observable states and their status texts

pub mod encode;
pub mod feedback;
pub mod input;
pub mod postprocess;
pub mod render;
pub mod state;

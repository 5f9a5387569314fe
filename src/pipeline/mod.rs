//! Pipeline stages for PDF-table-to-workbook extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different rendering backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ extract ──▶ normalize ──▶ assemble
//! (pdfium)  (base64)   (backend)   (repair       (xlsx
//!                       call)       cascade)      workbook)
//! ```
//!
//! 1. [`render`]:    rasterise selected pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 2. [`encode`]:    PNG/JPEG-encode and base64-wrap each page image
//! 3. [`extract`]:   one backend call per page, producing a `PageOutcome`;
//!    the only stage with network I/O
//! 4. [`normalize`]: turn the raw response text into a `TableResult`
//!    through the repair cascade; total, never fails
//! 5. [`assemble`]:  merge ordered outcomes into one multi-sheet workbook

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod normalize;
pub mod render;

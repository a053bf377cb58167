//! Powerplay OCR
//!
//! Turns screenshots of the Elite Dangerous Powerplay information panel
//! into validated records, writes them as tab-separated batch files, and
//! checks successive batches of the same weekly cycle for implausible
//! score changes.

pub mod batch;
pub mod capture;
pub mod config;
pub mod logging;
pub mod ocr;
pub mod parser;
pub mod paths;
pub mod pipeline;
pub mod record;
pub mod validation;

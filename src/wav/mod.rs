//! WAV container output
//!
//! Samples are spooled to a scratch file while capture runs; once the data
//! length is known the destination is written as header plus data.

pub mod header;
pub mod spool;

pub use header::{WavHeader, HEADER_LEN};
pub use spool::{finalize_wav, SampleSpool};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::header::{WavHeader, HEADER_LEN};
use crate::audio::CaptureFormat;

/// Scratch file accumulating raw interleaved samples during capture
///
/// Appends are sequential and unmodified. The file is removed when the
/// spool is finalized or dropped, whichever happens first.
pub struct SampleSpool {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl SampleSpool {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        debug!("Sample spool created: {}", path.display());

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn append(&mut self, span: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sample spool already closed"))?;
        writer.write_all(span)?;
        self.bytes_written += span.len() as u64;
        Ok(())
    }

    /// Flush the spool and write `destination` as a WAV file holding its
    /// samples. The spool file is gone afterwards, on success or failure.
    pub fn finalize_into(mut self, destination: &Path, format: &CaptureFormat) -> io::Result<u64> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        finalize_wav(&self.path, destination, format)
    }
}

impl Drop for SampleSpool {
    fn drop(&mut self) {
        self.writer.take();
        remove_scratch(&self.path);
    }
}

fn remove_scratch(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed sample spool {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove sample spool {}: {}", path.display(), e),
    }
}

/// Write `destination` as a canonical WAV: the 44-byte header followed by a
/// byte-for-byte copy of `samples_path`. Returns the data length in bytes.
///
/// `samples_path` is deleted before returning, whether or not the write
/// succeeded.
pub fn finalize_wav(
    samples_path: &Path,
    destination: &Path,
    format: &CaptureFormat,
) -> io::Result<u64> {
    let result = write_wav(samples_path, destination, format);
    remove_scratch(samples_path);
    result
}

fn write_wav(samples_path: &Path, destination: &Path, format: &CaptureFormat) -> io::Result<u64> {
    let mut samples = File::open(samples_path)?;
    let data_len = samples.metadata()?.len();

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = BufWriter::new(File::create(destination)?);
    out.write_all(&WavHeader::new(format, data_len).to_bytes())?;
    let copied = io::copy(&mut samples, &mut out)?;
    if copied != data_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("sample spool changed while copying ({} of {} bytes)", copied, data_len),
        ));
    }

    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    info!(
        "WAV written: {} ({} data bytes, {} total)",
        destination.display(),
        data_len,
        data_len + HEADER_LEN as u64
    );

    Ok(data_len)
}

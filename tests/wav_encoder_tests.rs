// Integration tests for WAV output
//
// These tests verify that spooled samples become a canonical WAV file that
// standard readers accept, and that scratch files never outlive a finalize.

use anyhow::Result;
use hound::WavReader;
use std::fs;
use tempfile::TempDir;
use wavrec::wav::{finalize_wav, SampleSpool};
use wavrec::{CaptureFormat, ChannelConfig, SampleEncoding, WavHeader, HEADER_LEN};

fn pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[test]
fn test_spooled_16bit_samples_read_back_with_hound() -> Result<()> {
    let dir = TempDir::new()?;
    let format = CaptureFormat::new(44100, ChannelConfig::Stereo, SampleEncoding::Pcm16Bit);
    let samples = [0i16, 1000, -1000, i16::MAX, i16::MIN, 42];

    let mut spool = SampleSpool::create(dir.path().join("scratch").join("take.lpcm"))?;
    let spool_path = spool.path().to_path_buf();
    spool.append(&pcm16(&samples[..4]))?;
    spool.append(&pcm16(&samples[4..]))?;
    assert_eq!(spool.bytes_written(), 12);

    let destination = dir.path().join("out").join("take.wav");
    let data_len = spool.finalize_into(&destination, &format)?;
    assert_eq!(data_len, 12);
    assert!(!spool_path.exists(), "Spool should be deleted after finalize");

    let mut reader = WavReader::open(&destination)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 16);

    let read: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(read, samples);

    Ok(())
}

#[test]
fn test_8bit_output_is_unsigned() -> Result<()> {
    let dir = TempDir::new()?;
    let format = CaptureFormat::new(8000, ChannelConfig::Mono, SampleEncoding::Pcm8Bit);

    let mut spool = SampleSpool::create(dir.path().join("eight.lpcm"))?;
    spool.append(&[0, 128, 255])?;
    let destination = dir.path().join("eight.wav");
    spool.finalize_into(&destination, &format)?;

    let bytes = fs::read(&destination)?;
    assert_eq!(bytes.len(), HEADER_LEN + 3);
    assert_eq!(&bytes[HEADER_LEN..], &[0, 128, 255]);

    // hound maps unsigned 8-bit to signed
    let mut reader = WavReader::open(&destination)?;
    assert_eq!(reader.spec().bits_per_sample, 8);
    let read: Vec<i8> = reader.samples::<i8>().collect::<Result<_, _>>()?;
    assert_eq!(read, vec![-128, 0, 127]);

    Ok(())
}

#[test]
fn test_empty_recording_has_valid_header() -> Result<()> {
    let dir = TempDir::new()?;
    let format = CaptureFormat::new(16000, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);

    let spool = SampleSpool::create(dir.path().join("empty.lpcm"))?;
    let destination = dir.path().join("empty.wav");
    assert_eq!(spool.finalize_into(&destination, &format)?, 0);

    let bytes = fs::read(&destination)?;
    assert_eq!(bytes.len(), HEADER_LEN);
    let header = WavHeader::parse(&bytes).expect("Valid header");
    assert_eq!(header.data_len, 0);
    assert_eq!(header.riff_len(), 36);

    let reader = WavReader::open(&destination)?;
    assert_eq!(reader.len(), 0);

    Ok(())
}

#[test]
fn test_dropped_spool_removes_scratch_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("abandoned.lpcm");

    let mut spool = SampleSpool::create(&path)?;
    spool.append(&[1, 2, 3, 4])?;
    assert!(path.exists());

    drop(spool);
    assert!(!path.exists());

    Ok(())
}

#[test]
fn test_failed_finalize_still_deletes_scratch_file() -> Result<()> {
    let dir = TempDir::new()?;
    let format = CaptureFormat::new(8000, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);

    let samples_path = dir.path().join("orphan.lpcm");
    fs::write(&samples_path, pcm16(&[1, 2, 3]))?;

    // A regular file where the destination's directory should be
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"")?;
    let destination = blocker.join("out.wav");

    let result = finalize_wav(&samples_path, &destination, &format);
    assert!(result.is_err());
    assert!(!samples_path.exists(), "Scratch file must not outlive finalize");
    assert!(!destination.exists());

    Ok(())
}

#[test]
fn test_finalize_overwrites_existing_destination() -> Result<()> {
    let dir = TempDir::new()?;
    let format = CaptureFormat::new(8000, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);
    let destination = dir.path().join("again.wav");
    fs::write(&destination, vec![0xFFu8; 4096])?;

    let samples_path = dir.path().join("again.lpcm");
    fs::write(&samples_path, pcm16(&[7, 8]))?;
    assert_eq!(finalize_wav(&samples_path, &destination, &format)?, 4);

    let bytes = fs::read(&destination)?;
    assert_eq!(bytes.len(), HEADER_LEN + 4);
    assert_eq!(&bytes[40..44], &4u32.to_le_bytes());

    Ok(())
}

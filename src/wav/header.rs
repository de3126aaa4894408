//! Canonical 44-byte WAV header (RIFF, `fmt `, `data`)
//!
//! All fields are little-endian with fixed widths. Values too large for a
//! field keep their low-order bytes, so a data length beyond 4 GiB wraps
//! instead of failing.

use crate::audio::CaptureFormat;

pub const HEADER_LEN: usize = 44;

/// Size of the `fmt ` sub-chunk body for PCM
const FMT_CHUNK_LEN: u32 = 16;
/// WAVE_FORMAT_PCM
const AUDIO_FORMAT_PCM: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub num_channels: u16,
    /// Bytes per sample per channel
    pub byte_depth: u16,
    /// Length of the sample data in bytes
    pub data_len: u64,
}

impl WavHeader {
    pub fn new(format: &CaptureFormat, data_len: u64) -> Self {
        Self {
            sample_rate: format.sample_rate,
            num_channels: format.num_channels(),
            byte_depth: format.byte_depth(),
            data_len,
        }
    }

    pub fn byte_rate(&self) -> u32 {
        (self.sample_rate as u64 * self.num_channels as u64 * self.byte_depth as u64) as u32
    }

    pub fn block_align(&self) -> u16 {
        self.num_channels.wrapping_mul(self.byte_depth)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.byte_depth.wrapping_mul(8)
    }

    /// RIFF chunk size: whole file less the `RIFF` tag and this field
    pub fn riff_len(&self) -> u32 {
        self.data_len.wrapping_add(HEADER_LEN as u64 - 8) as u32
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.riff_len().to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header[20..22].copy_from_slice(&AUDIO_FORMAT_PCM.to_le_bytes());
        header[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample().to_le_bytes());

        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&(self.data_len as u32).to_le_bytes());

        header
    }

    /// Decode a canonical header. Returns `None` unless the tags, the PCM
    /// format code and the `fmt ` size are exactly as written by `to_bytes`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        if &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
            || u32_at(16) != FMT_CHUNK_LEN
            || u16_at(20) != AUDIO_FORMAT_PCM
        {
            return None;
        }

        Some(Self {
            sample_rate: u32_at(24),
            num_channels: u16_at(22),
            byte_depth: u16_at(34) / 8,
            data_len: u32_at(40) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ChannelConfig, SampleEncoding};

    fn le32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn le16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_layout_mono_16bit() {
        let format = CaptureFormat::new(44100, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);
        let bytes = WavHeader::new(&format, 88200).to_bytes();

        let expected: [u8; 44] = [
            b'R', b'I', b'F', b'F', 0xAC, 0x58, 0x01, 0x00, // 88236
            b'W', b'A', b'V', b'E', b'f', b'm', b't', b' ', //
            16, 0, 0, 0, 1, 0, 1, 0, // fmt size, PCM, mono
            0x44, 0xAC, 0x00, 0x00, // 44100
            0x88, 0x58, 0x01, 0x00, // 88200 bytes/s
            2, 0, 16, 0, // block align, bits
            b'd', b'a', b't', b'a', 0x88, 0x58, 0x01, 0x00, // 88200
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_header_fields_across_formats() {
        let rates = [1u32, 8000, 11025, 22050, 44100, 48000, 96000, 192000, u32::MAX];
        let lengths = [
            0u64,
            1,
            4410,
            88200,
            u32::MAX as u64 - 36,
            u32::MAX as u64 - 35,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            1 << 40,
        ];

        for &rate in &rates {
            for channels in [ChannelConfig::Mono, ChannelConfig::Stereo] {
                for encoding in [SampleEncoding::Pcm8Bit, SampleEncoding::Pcm16Bit] {
                    for &len in &lengths {
                        let format = CaptureFormat::new(rate, channels, encoding);
                        let b = WavHeader::new(&format, len).to_bytes();
                        let nc = channels.count() as u64;
                        let bd = encoding.byte_depth() as u64;

                        assert_eq!(&b[0..4], b"RIFF");
                        assert_eq!(le32(&b, 4), (len + 36) as u32);
                        assert_eq!(&b[8..12], b"WAVE");
                        assert_eq!(&b[12..16], b"fmt ");
                        assert_eq!(le32(&b, 16), 16);
                        assert_eq!(le16(&b, 20), 1);
                        assert_eq!(le16(&b, 22) as u64, nc);
                        assert_eq!(le32(&b, 24), rate);
                        assert_eq!(le32(&b, 28), (rate as u64 * nc * bd) as u32);
                        assert_eq!(le16(&b, 32) as u64, nc * bd);
                        assert_eq!(le16(&b, 34) as u64, bd * 8);
                        assert_eq!(&b[36..40], b"data");
                        assert_eq!(le32(&b, 40), len as u32);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sizes_wrap_past_four_gib() {
        let format = CaptureFormat::new(48000, ChannelConfig::Stereo, SampleEncoding::Pcm16Bit);

        let header = WavHeader::new(&format, u32::MAX as u64 - 35);
        assert_eq!(header.riff_len(), 0);

        let header = WavHeader::new(&format, u32::MAX as u64 + 11);
        let bytes = header.to_bytes();
        assert_eq!(le32(&bytes, 40), 10);
        assert_eq!(le32(&bytes, 4), 46);
    }

    #[test]
    fn test_parse_reads_back_fields() {
        let format = CaptureFormat::new(22050, ChannelConfig::Stereo, SampleEncoding::Pcm8Bit);
        let header = WavHeader::new(&format, 12345);
        assert_eq!(WavHeader::parse(&header.to_bytes()), Some(header));
    }

    #[test]
    fn test_parse_rejects_foreign_headers() {
        let format = CaptureFormat::new(22050, ChannelConfig::Mono, SampleEncoding::Pcm16Bit);
        let good = WavHeader::new(&format, 100).to_bytes();

        assert_eq!(WavHeader::parse(&good[..40]), None);

        let mut bad = good;
        bad[0..4].copy_from_slice(b"RIFX");
        assert_eq!(WavHeader::parse(&bad), None);

        let mut bad = good;
        bad[20] = 3; // IEEE float
        assert_eq!(WavHeader::parse(&bad), None);
    }
}

//! Frame processing between the capture device and the sample spool
//!
//! Drops the start-of-stream transient and enforces the sample budget of a
//! recording, truncating the final frame to exactly what is left of it.

/// Non-empty reads discarded at stream start (the driver's "click")
pub const WARM_UP_READS: u32 = 2;

/// Result of processing one device read
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessedFrame<'a> {
    /// Nothing to persist: an empty read or a warm-up read
    Skipped,
    /// Bytes to persist, already truncated to the sample budget
    Accepted {
        span: &'a [u8],
        samples: u64,
        /// The budget is now used up; the recording must stop
        budget_reached: bool,
    },
}

#[derive(Debug)]
pub struct FrameProcessor {
    /// Bytes per sample-time slice (channels × byte depth)
    block_align: usize,
    max_samples: u64,
    samples_processed: u64,
    reads_seen: u32,
}

impl FrameProcessor {
    pub fn new(block_align: usize, max_samples: u64) -> Self {
        Self {
            block_align: block_align.max(1),
            max_samples,
            samples_processed: 0,
            reads_seen: 0,
        }
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    pub fn max_samples(&self) -> u64 {
        self.max_samples
    }

    pub fn is_exhausted(&self) -> bool {
        self.samples_processed >= self.max_samples
    }

    /// Process the bytes of one read. Trailing bytes that do not form a
    /// whole sample-time slice are dropped.
    pub fn process<'a>(&mut self, frame: &'a [u8]) -> ProcessedFrame<'a> {
        if frame.is_empty() {
            return ProcessedFrame::Skipped;
        }

        self.reads_seen = self.reads_seen.saturating_add(1);
        if self.reads_seen <= WARM_UP_READS {
            return ProcessedFrame::Skipped;
        }

        let mut samples = (frame.len() / self.block_align) as u64;
        let mut budget_reached = false;
        if self.samples_processed + samples >= self.max_samples {
            samples = self.max_samples - self.samples_processed;
            budget_reached = true;
        }

        self.samples_processed += samples;

        ProcessedFrame::Accepted {
            span: &frame[..samples as usize * self.block_align],
            samples,
            budget_reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted_len(frame: ProcessedFrame<'_>) -> Option<usize> {
        match frame {
            ProcessedFrame::Accepted { span, .. } => Some(span.len()),
            ProcessedFrame::Skipped => None,
        }
    }

    #[test]
    fn test_first_two_reads_discarded() {
        let mut processor = FrameProcessor::new(2, 1_000_000);
        let loud = vec![0x7f; 64];

        assert_eq!(processor.process(&loud), ProcessedFrame::Skipped);
        assert_eq!(processor.process(&loud), ProcessedFrame::Skipped);
        assert_eq!(accepted_len(processor.process(&loud)), Some(64));
        assert_eq!(processor.samples_processed(), 32);
    }

    #[test]
    fn test_empty_reads_do_not_count_toward_warm_up() {
        let mut processor = FrameProcessor::new(2, 1_000_000);
        let frame = vec![1u8; 8];

        assert_eq!(processor.process(&[]), ProcessedFrame::Skipped);
        assert_eq!(processor.process(&frame), ProcessedFrame::Skipped);
        assert_eq!(processor.process(&[]), ProcessedFrame::Skipped);
        assert_eq!(processor.process(&frame), ProcessedFrame::Skipped);
        assert_eq!(accepted_len(processor.process(&frame)), Some(8));
    }

    #[test]
    fn test_final_frame_truncated_to_budget() {
        // Stereo 16-bit: 4 bytes per slice, budget of 10 slices
        let mut processor = FrameProcessor::new(4, 10);
        let frame = vec![0u8; 16]; // 4 slices per read

        processor.process(&frame);
        processor.process(&frame);

        assert_eq!(accepted_len(processor.process(&frame)), Some(16));
        assert_eq!(accepted_len(processor.process(&frame)), Some(16));

        match processor.process(&frame) {
            ProcessedFrame::Accepted {
                span,
                samples,
                budget_reached,
            } => {
                assert_eq!(samples, 2);
                assert_eq!(span.len(), 8);
                assert!(budget_reached);
            }
            ProcessedFrame::Skipped => panic!("frame should be accepted"),
        }

        assert_eq!(processor.samples_processed(), 10);
        assert!(processor.is_exhausted());
    }

    #[test]
    fn test_exact_fill_reports_budget_reached() {
        let mut processor = FrameProcessor::new(1, 8);
        let frame = vec![0u8; 8];
        processor.process(&frame);
        processor.process(&frame);

        match processor.process(&frame) {
            ProcessedFrame::Accepted {
                samples,
                budget_reached,
                ..
            } => {
                assert_eq!(samples, 8);
                assert!(budget_reached);
            }
            ProcessedFrame::Skipped => panic!("frame should be accepted"),
        }
    }

    #[test]
    fn test_partial_slice_bytes_dropped() {
        let mut processor = FrameProcessor::new(4, 1000);
        let frame = vec![0u8; 10];
        processor.process(&frame);
        processor.process(&frame);

        assert_eq!(accepted_len(processor.process(&frame)), Some(8));
        assert_eq!(processor.samples_processed(), 2);
    }

    #[test]
    fn test_zero_budget_is_exhausted_immediately() {
        let processor = FrameProcessor::new(2, 0);
        assert!(processor.is_exhausted());
    }
}

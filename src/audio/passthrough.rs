//! Realtime channel mapping
//!
//! Everything here runs inside backend audio callbacks: no allocation, no
//! locks, no logging. Buffers are interleaved frames; the ring between the
//! two callbacks carries `f32`.

use ringbuf::traits::{Consumer, Observer, Producer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Copy one block from an `in_channels` layout into an `out_channels` layout.
///
/// - equal counts: identity copy
/// - fewer inputs: copy into the leading output channels, zero the rest
/// - more inputs: keep the leading `out_channels` input channels
///
/// Frames the input does not cover are zeroed. A zero channel count on
/// either side silences the output instead of failing.
pub fn map_channels(input: &[f32], in_channels: usize, output: &mut [f32], out_channels: usize) {
    if in_channels == 0 || out_channels == 0 {
        output.fill(0.0);
        return;
    }

    let out_frames = output.len() / out_channels;
    let frames = out_frames.min(input.len() / in_channels);

    if in_channels == out_channels {
        let n = frames * out_channels;
        output[..n].copy_from_slice(&input[..n]);
    } else {
        let copied = in_channels.min(out_channels);
        for (src, dst) in input
            .chunks_exact(in_channels)
            .zip(output.chunks_exact_mut(out_channels))
            .take(frames)
        {
            dst[..copied].copy_from_slice(&src[..copied]);
            dst[copied..].fill(0.0);
        }
    }

    output[frames * out_channels..].fill(0.0);
}

/// Non-fatal stream diagnostics, updated from the audio threads
#[derive(Debug, Default)]
pub struct StreamCounters {
    pub underruns: AtomicU64,
    pub overruns: AtomicU64,
    pub backend_errors: AtomicU64,
}

impl StreamCounters {
    pub fn snapshot(&self) -> StreamDiagnostics {
        StreamDiagnostics {
            underruns: self.underruns.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamDiagnostics {
    pub underruns: u64,
    pub overruns: u64,
    pub backend_errors: u64,
}

impl StreamDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.underruns == 0 && self.overruns == 0 && self.backend_errors == 0
    }
}

/// Sample formats the bridge accepts from devices. The ring always carries
/// `f32`; conversion happens at the ring edge, one sample at a time.
pub trait StreamSample: Copy + Send + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl StreamSample for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

const I16_SCALE: f32 = 32768.0;

impl StreamSample for i16 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / I16_SCALE
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        (value * I16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

/// Capture side of the bridge: pushes whole input frames into the ring.
pub struct CaptureHalf<P> {
    producer: P,
    channels: usize,
    counters: Arc<StreamCounters>,
}

impl<P: Producer<Item = f32>> CaptureHalf<P> {
    pub fn new(producer: P, channels: usize, counters: Arc<StreamCounters>) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            counters,
        }
    }

    /// Called with each captured block
    pub fn push<S: StreamSample>(&mut self, data: &[S]) {
        let room = self.producer.vacant_len() / self.channels * self.channels;
        let n = room.min(data.len() / self.channels * self.channels);
        self.producer
            .push_iter(data[..n].iter().map(|sample| sample.to_f32()));
        if n < data.len() {
            self.counters.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Render side of the bridge: pulls input frames and maps them to the
/// output layout using preallocated scratch space.
pub struct RenderHalf<C> {
    consumer: C,
    scratch: Vec<f32>,
    mapped: Vec<f32>,
    in_channels: usize,
    out_channels: usize,
    counters: Arc<StreamCounters>,
}

impl<C: Consumer<Item = f32>> RenderHalf<C> {
    /// `max_frames` sizes the scratch buffers; larger callbacks are rendered
    /// in several passes.
    pub fn new(
        consumer: C,
        in_channels: usize,
        out_channels: usize,
        max_frames: usize,
        counters: Arc<StreamCounters>,
    ) -> Self {
        let in_channels = in_channels.max(1);
        let max_frames = max_frames.max(1);
        Self {
            consumer,
            scratch: vec![0.0; max_frames * in_channels],
            mapped: vec![0.0; max_frames * out_channels],
            in_channels,
            out_channels,
            counters,
        }
    }

    /// Called with each output block
    pub fn render<S: StreamSample>(&mut self, output: &mut [S]) {
        if self.out_channels == 0 {
            output.fill(S::from_f32(0.0));
            return;
        }

        let scratch_frames = self.scratch.len() / self.in_channels;
        let mut starved = false;

        for out_chunk in output.chunks_mut(scratch_frames * self.out_channels) {
            let frames = out_chunk.len() / self.out_channels;
            let wanted = frames * self.in_channels;
            let input = &mut self.scratch[..wanted];
            let got = self.consumer.pop_slice(input);
            if got < wanted {
                input[got..].fill(0.0);
                starved = true;
            }

            let mapped = &mut self.mapped[..out_chunk.len()];
            map_channels(input, self.in_channels, mapped, self.out_channels);
            for (dst, &src) in out_chunk.iter_mut().zip(mapped.iter()) {
                *dst = S::from_f32(src);
            }
        }

        if starved {
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ringbuf::traits::Split;
    use ringbuf::HeapRb;

    fn interleaved(frames: usize, channels: usize) -> Vec<f32> {
        (0..frames * channels).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn test_equal_channels_identity() {
        let input = interleaved(4, 2);
        let mut output = vec![9.0; 8];
        map_channels(&input, 2, &mut output, 2);
        assert_eq!(output, input);
    }

    #[test]
    fn test_mono_to_stereo_zero_pads() {
        let input = vec![0.5, -0.5, 0.25];
        let mut output = vec![9.0; 6];
        map_channels(&input, 1, &mut output, 2);
        assert_eq!(output, vec![0.5, 0.0, -0.5, 0.0, 0.25, 0.0]);
    }

    #[test]
    fn test_quad_to_stereo_truncates() {
        let input = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut output = vec![0.0; 4];
        map_channels(&input, 4, &mut output, 2);
        assert_eq!(output, vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zero_channels_silences() {
        let mut output = vec![1.0; 4];
        map_channels(&[1.0, 2.0], 0, &mut output, 2);
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn test_short_input_zero_fills_tail() {
        let input = vec![1.0, 2.0];
        let mut output = vec![9.0; 6];
        map_channels(&input, 2, &mut output, 2);
        assert_eq!(output, vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn prop_mapping_matches_reference(
            in_ch in 1usize..9,
            out_ch in 1usize..9,
            frames in 0usize..64,
            seed in any::<u32>(),
        ) {
            let input: Vec<f32> = (0..frames * in_ch)
                .map(|i| ((i as u32).wrapping_mul(seed | 1) % 1000) as f32 / 1000.0)
                .collect();
            let mut output = vec![f32::NAN; frames * out_ch];
            map_channels(&input, in_ch, &mut output, out_ch);

            for f in 0..frames {
                for c in 0..out_ch {
                    let expected = if c < in_ch { input[f * in_ch + c] } else { 0.0 };
                    prop_assert_eq!(output[f * out_ch + c], expected);
                }
            }
        }
    }

    #[test]
    fn test_bridge_moves_frames_and_maps() {
        let counters = Arc::new(StreamCounters::default());
        let (producer, consumer) = HeapRb::<f32>::new(64).split();
        let mut capture = CaptureHalf::new(producer, 1, counters.clone());
        let mut render = RenderHalf::new(consumer, 1, 2, 4, counters.clone());

        capture.push(&[0.1, 0.2, 0.3, 0.4]);
        let mut output = vec![9.0; 8];
        render.render(&mut output);

        assert_eq!(output, vec![0.1, 0.0, 0.2, 0.0, 0.3, 0.0, 0.4, 0.0]);
        assert!(counters.snapshot().is_clean());
    }

    #[test]
    fn test_render_larger_than_scratch() {
        let counters = Arc::new(StreamCounters::default());
        let (producer, consumer) = HeapRb::<f32>::new(64).split();
        let mut capture = CaptureHalf::new(producer, 2, counters.clone());
        let mut render = RenderHalf::new(consumer, 2, 2, 2, counters.clone());

        let input = interleaved(6, 2);
        capture.push(&input);
        let mut output = vec![0.0; 12];
        render.render(&mut output);

        assert_eq!(output, input);
        assert_eq!(counters.snapshot().underruns, 0);
    }

    #[test]
    fn test_underrun_counted_and_silenced() {
        let counters = Arc::new(StreamCounters::default());
        let (_producer, consumer) = HeapRb::<f32>::new(16).split();
        let mut render = RenderHalf::new(consumer, 2, 2, 8, counters.clone());

        let mut output = vec![1.0; 8];
        render.render(&mut output);

        assert_eq!(output, vec![0.0; 8]);
        assert_eq!(counters.snapshot().underruns, 1);
    }

    #[test]
    fn test_overrun_keeps_whole_frames() {
        let counters = Arc::new(StreamCounters::default());
        let (producer, consumer) = HeapRb::<f32>::new(5).split();
        let mut capture = CaptureHalf::new(producer, 2, counters.clone());

        capture.push(&interleaved(4, 2));

        assert_eq!(consumer.occupied_len(), 4);
        assert_eq!(counters.snapshot().overruns, 1);
    }

    #[test]
    fn test_i16_capture_converts_at_ring_edge() {
        let counters = Arc::new(StreamCounters::default());
        let (producer, mut consumer) = HeapRb::<f32>::new(16).split();
        let mut capture = CaptureHalf::new(producer, 2, counters.clone());

        capture.push(&[i16::MIN, 0, 16384, -16384]);

        let mut ring = [0.0f32; 4];
        assert_eq!(consumer.pop_slice(&mut ring), 4);
        assert_eq!(ring, [-1.0, 0.0, 0.5, -0.5]);
        assert!(counters.snapshot().is_clean());
    }

    #[test]
    fn test_i16_render_maps_and_clamps() {
        let counters = Arc::new(StreamCounters::default());
        let (mut producer, consumer) = HeapRb::<f32>::new(16).split();
        let mut render = RenderHalf::new(consumer, 1, 2, 4, counters.clone());

        producer.push_slice(&[0.5, 2.0, -2.0]);
        let mut output = [7i16; 8];
        render.render(&mut output);

        assert_eq!(output, [16384, 0, i16::MAX, 0, i16::MIN, 0, 0, 0]);
        assert_eq!(counters.snapshot().underruns, 1);
    }

    #[test]
    fn test_i16_to_f32_bridge() {
        let counters = Arc::new(StreamCounters::default());
        let (producer, consumer) = HeapRb::<f32>::new(32).split();
        let mut capture = CaptureHalf::new(producer, 1, counters.clone());
        let mut render = RenderHalf::new(consumer, 1, 1, 4, counters.clone());

        capture.push(&[8192i16, -8192, 0, 32767]);
        let mut output = [0.0f32; 4];
        render.render(&mut output);

        assert_eq!(&output[..3], &[0.25, -0.25, 0.0]);
        assert!((output[3] - 1.0).abs() < 1e-4);
    }
}

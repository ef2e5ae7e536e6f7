//! Audio backend seam and the CPAL implementation
//!
//! CPAL streams are not `Send`, so each duplex stream lives on its own
//! thread that builds the input/output pair, parks until asked to stop, then
//! tears the pair down and reports diagnostics on join.

use super::device::{DeviceDescriptor, DeviceId};
use super::passthrough::{
    CaptureHalf, RenderHalf, StreamCounters, StreamDiagnostics, StreamSample,
};
use crate::error::SessionError;
use crate::settings::MAX_BLOCKSIZE;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use crossbeam_channel::{bounded, Sender};
use log::{debug, info, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Ring capacity in blocks of input
const RING_BLOCKS: usize = 8;

/// Output callbacks may ask for more than one block; scratch covers this many.
const SCRATCH_BLOCKS: usize = 4;

/// Parameters of one duplex stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub input_device: DeviceId,
    pub output_device: DeviceId,
    pub sample_rate: u32,
    pub block_size: u32,
}

/// Platform audio access used by the session
pub trait AudioBackend: Send + Sync {
    /// Raw enumeration, unfiltered
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, String>;

    /// Open and start a duplex stream
    fn open_duplex(&self, config: &StreamConfig) -> Result<Box<dyn DuplexStream>, SessionError>;
}

/// A running duplex stream. Dropping it also stops it.
pub trait DuplexStream: Send {
    /// Stop and release the stream
    fn close(self: Box<Self>) -> Result<StreamDiagnostics, SessionError>;
}

/// Backend on the default CPAL host
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn max_channels<I>(configs: Result<I, cpal::SupportedStreamConfigsError>) -> u16
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    configs
        .map(|iter| iter.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

impl AudioBackend for CpalBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, String> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| format!("Failed to list devices: {}", e))?;

        Ok(devices
            .enumerate()
            .map(|(id, device)| DeviceDescriptor {
                id,
                name: device.name().unwrap_or_default(),
                max_input_channels: max_channels(device.supported_input_configs()),
                max_output_channels: max_channels(device.supported_output_configs()),
            })
            .collect())
    }

    fn open_duplex(&self, config: &StreamConfig) -> Result<Box<dyn DuplexStream>, SessionError> {
        let config = *config;
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("micpass-stream".to_string())
            .spawn(move || {
                let counters = Arc::new(StreamCounters::default());
                let streams = match build_streams(&config, counters.clone()) {
                    Ok(streams) => {
                        let _ = ready_tx.send(Ok(()));
                        streams
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(StreamDiagnostics::default());
                    }
                };

                // Park until stop() or the handle is dropped
                let _ = stop_rx.recv();

                let (input, output) = streams;
                let mut close_errors = Vec::new();
                if let Err(e) = output.pause() {
                    close_errors.push(format!("output: {}", e));
                }
                if let Err(e) = input.pause() {
                    close_errors.push(format!("input: {}", e));
                }
                drop(output);
                drop(input);

                if close_errors.is_empty() {
                    Ok(counters.snapshot())
                } else {
                    Err(close_errors.join(", "))
                }
            })
            .map_err(|e| SessionError::StreamOpenFailed(format!("Failed to spawn stream thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    "Opened duplex stream {} -> {} at {}Hz, block {}",
                    config.input_device, config.output_device, config.sample_rate, config.block_size
                );
                Ok(Box::new(CpalDuplexStream {
                    stop_tx: Some(stop_tx),
                    thread: Some(handle),
                }))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(SessionError::StreamOpenFailed(e))
            }
            Err(_) => {
                let _ = handle.join();
                Err(SessionError::StreamOpenFailed(
                    "Stream thread exited during setup".to_string(),
                ))
            }
        }
    }
}

/// Build and start the input/output pair. Runs on the stream thread.
fn build_streams(
    config: &StreamConfig,
    counters: Arc<StreamCounters>,
) -> Result<(cpal::Stream, cpal::Stream), String> {
    if config.block_size == 0 || config.block_size > MAX_BLOCKSIZE {
        return Err(format!(
            "Block size {} is outside 1..={}",
            config.block_size, MAX_BLOCKSIZE
        ));
    }

    let host = cpal::default_host();
    let devices: Vec<cpal::Device> = host
        .devices()
        .map_err(|e| format!("Failed to list devices: {}", e))?
        .collect();

    let input = devices
        .get(config.input_device)
        .ok_or_else(|| format!("Input device {} not found", config.input_device))?;
    let output = devices
        .get(config.output_device)
        .ok_or_else(|| format!("Output device {} not found", config.output_device))?;

    let input_default = input
        .default_input_config()
        .map_err(|e| format!("Input device has no usable config: {}", e))?;
    let output_default = output
        .default_output_config()
        .map_err(|e| format!("Output device has no usable config: {}", e))?;
    let in_channels = input_default.channels();
    let out_channels = output_default.channels();

    debug!(
        "Bridging {} input channels ({:?}) to {} output channels ({:?})",
        in_channels,
        input_default.sample_format(),
        out_channels,
        output_default.sample_format()
    );

    let sample_rate = cpal::SampleRate(config.sample_rate);
    let buffer_size = cpal::BufferSize::Fixed(config.block_size);
    let input_config = cpal::StreamConfig {
        channels: in_channels,
        sample_rate,
        buffer_size,
    };
    let output_config = cpal::StreamConfig {
        channels: out_channels,
        sample_rate,
        buffer_size,
    };

    let block = config.block_size as usize;
    let in_ch = in_channels as usize;
    let (mut producer, consumer) = HeapRb::<f32>::new(block * in_ch * RING_BLOCKS).split();

    // One block of silence so the first output callback is not starved
    for _ in 0..block * in_ch {
        let _ = producer.try_push(0.0);
    }

    let capture = CaptureHalf::new(producer, in_ch, counters.clone());
    let render = RenderHalf::new(
        consumer,
        in_ch,
        out_channels as usize,
        block * SCRATCH_BLOCKS,
        counters.clone(),
    );

    let input_stream = match input_default.sample_format() {
        SampleFormat::I16 => {
            build_input::<i16, _>(input, &input_config, capture, counters.clone())?
        }
        SampleFormat::F32 => {
            build_input::<f32, _>(input, &input_config, capture, counters.clone())?
        }
        format => return Err(format!("Unsupported input sample format {:?}", format)),
    };
    let output_stream = match output_default.sample_format() {
        SampleFormat::I16 => build_output::<i16, _>(output, &output_config, render, counters)?,
        SampleFormat::F32 => build_output::<f32, _>(output, &output_config, render, counters)?,
        format => return Err(format!("Unsupported output sample format {:?}", format)),
    };

    input_stream
        .play()
        .map_err(|e| format!("Failed to start input stream: {}", e))?;
    output_stream
        .play()
        .map_err(|e| format!("Failed to start output stream: {}", e))?;

    Ok((input_stream, output_stream))
}

fn build_input<S, P>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut capture: CaptureHalf<P>,
    counters: Arc<StreamCounters>,
) -> Result<cpal::Stream, String>
where
    S: SizedSample + StreamSample,
    P: Producer<Item = f32> + Send + 'static,
{
    device
        .build_input_stream(
            config,
            move |data: &[S], _: &cpal::InputCallbackInfo| capture.push(data),
            move |err| {
                counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Input stream status: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build input stream: {}", e))
}

fn build_output<S, C>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut render: RenderHalf<C>,
    counters: Arc<StreamCounters>,
) -> Result<cpal::Stream, String>
where
    S: SizedSample + StreamSample,
    C: Consumer<Item = f32> + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| render.render(data),
            move |err| {
                counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Output stream status: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build output stream: {}", e))
}

/// Handle to a stream owned by its thread
struct CpalDuplexStream {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<StreamDiagnostics, String>>>,
}

impl CpalDuplexStream {
    fn shutdown(&mut self) -> Result<StreamDiagnostics, SessionError> {
        if let Some(sender) = self.stop_tx.take() {
            let _ = sender.send(());
        }

        let Some(handle) = self.thread.take() else {
            return Ok(StreamDiagnostics::default());
        };

        match handle.join() {
            Ok(result) => result.map_err(SessionError::StreamCloseFailed),
            Err(_) => Err(SessionError::StreamCloseFailed(
                "stream thread panicked".to_string(),
            )),
        }
    }
}

impl DuplexStream for CpalDuplexStream {
    fn close(mut self: Box<Self>) -> Result<StreamDiagnostics, SessionError> {
        self.shutdown()
    }
}

impl Drop for CpalDuplexStream {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}

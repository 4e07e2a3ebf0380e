//! Audio output using cpal
//!
//! [`AudioSink`] is the blocking PCM write contract the playback core relies
//! on: `write` accepts canonical interleaved 16-bit stereo 44.1kHz frames and
//! returns only after the device has consumed them, so playback is paced by
//! real audio duration.
//!
//! [`CpalSink`] implements it on top of a cpal output stream fed through a
//! lock-free ringbuf. The cpal `Stream` is not `Send`, so it lives on its own
//! thread for the lifetime of the sink.

use crate::audio::types::{AudioBuffer, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval while waiting for the device to drain the ring buffer
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// A write that makes no progress for this long is reported as a sink failure
const STALL_TIMEOUT: Duration = Duration::from_secs(3);

/// Blocking PCM output.
pub trait AudioSink: Send {
    /// Write canonical PCM, blocking until the device has accepted all of it
    fn write(&mut self, buffer: &AudioBuffer) -> Result<()>;

    /// Human-readable device name for logs
    fn name(&self) -> String {
        "audio sink".to_string()
    }
}

/// cpal-backed sink.
pub struct CpalSink {
    producer: HeapProd<i16>,
    error_flag: Arc<AtomicBool>,
    device_name: String,
    /// Dropping the sender stops the stream thread
    shutdown_tx: Option<mpsc::Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::Sink(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open an output device (None = default device) and start its stream.
    ///
    /// `buffer_ms` sizes the ring buffer between `write` and the device callback.
    pub fn open(device_name: Option<String>, buffer_ms: u32) -> Result<Self> {
        let capacity = (CANONICAL_SAMPLE_RATE as usize * buffer_ms.max(20) as usize / 1000)
            * CANONICAL_CHANNELS as usize;
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();

        let error_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_error_flag = Arc::clone(&error_flag);
        let stream_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match Self::start_stream(device_name, consumer, thread_error_flag) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until the sink is dropped; the stream must stay on this thread
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause stream on shutdown: {}", e);
                }
                debug!("Audio output thread exiting");
            })
            .map_err(|e| Error::Sink(format!("Failed to spawn audio thread: {}", e)))?;

        let device_name = ready_rx
            .recv()
            .map_err(|_| Error::Sink("Audio thread exited during startup".to_string()))??;

        info!("Audio output ready on {}", device_name);

        Ok(Self {
            producer,
            error_flag,
            device_name,
            shutdown_tx: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
        })
    }

    fn start_stream(
        device_name: Option<String>,
        consumer: HeapCons<i16>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<(cpal::Stream, String)> {
        let device = Self::select_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (config, sample_format) = Self::select_config(&device)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, consumer, error_flag)?,
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, consumer, error_flag)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, consumer, error_flag)?,
            other => {
                return Err(Error::Sink(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Sink(format!("Failed to start stream: {}", e)))?;

        Ok((stream, name))
    }

    /// Requested device by name, falling back to the default device
    fn select_device(device_name: Option<String>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::Sink(format!("Failed to enumerate devices: {}", e)))?;
            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name.as_str())) {
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        host.default_output_device()
            .ok_or_else(|| Error::Sink("No default output device found".to_string()))
    }

    /// A 44.1kHz configuration, preferring stereo i16, then stereo f32
    fn select_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Sink(format!("Failed to get device configs: {}", e)))?
            .filter(|c| {
                c.min_sample_rate().0 <= CANONICAL_SAMPLE_RATE
                    && c.max_sample_rate().0 >= CANONICAL_SAMPLE_RATE
            })
            .collect();

        let rank = |c: &cpal::SupportedStreamConfigRange| {
            let channel_rank = if c.channels() == CANONICAL_CHANNELS { 0 } else { 1 };
            let format_rank = match c.sample_format() {
                SampleFormat::I16 => 0,
                SampleFormat::F32 => 1,
                SampleFormat::U16 => 2,
                _ => 9,
            };
            channel_rank * 10 + format_rank
        };

        let best = supported
            .into_iter()
            .filter(|c| rank(c) % 10 != 9)
            .min_by_key(rank)
            .ok_or_else(|| Error::Sink("Device does not support 44100 Hz output".to_string()))?;

        let sample_format = best.sample_format();
        let config = best.with_sample_rate(cpal::SampleRate(CANONICAL_SAMPLE_RATE)).config();
        Ok((config, sample_format))
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut consumer: HeapCons<i16>,
        error_flag: Arc<AtomicBool>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        let channels = config.channels as usize;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        // Only consume whole stereo frames
                        let (left, right) = if consumer.occupied_len() >= 2 {
                            (
                                consumer.try_pop().unwrap_or(0),
                                consumer.try_pop().unwrap_or(0),
                            )
                        } else {
                            (0, 0)
                        };

                        match frame.len() {
                            1 => frame[0] = T::from_sample(((left as i32 + right as i32) / 2) as i16),
                            _ => {
                                frame[0] = T::from_sample(left);
                                frame[1] = T::from_sample(right);
                                for extra in frame.iter_mut().skip(2) {
                                    *extra = T::EQUILIBRIUM;
                                }
                            }
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Sink(format!("Failed to build stream: {}", e)))
    }

    fn check_error(&self) -> Result<()> {
        if self.error_flag.swap(false, Ordering::SeqCst) {
            return Err(Error::Sink(format!("Stream error on {}", self.device_name)));
        }
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, buffer: &AudioBuffer) -> Result<()> {
        self.check_error()?;

        let mut remaining = buffer.samples();
        let mut last_progress = Instant::now();

        while !remaining.is_empty() {
            // Push whole frames only so the callback never splits a frame
            let room = self.producer.vacant_len() & !1;
            let chunk = room.min(remaining.len());
            let pushed = if chunk > 0 {
                self.producer.push_slice(&remaining[..chunk])
            } else {
                0
            };

            if pushed > 0 {
                remaining = &remaining[pushed..];
                last_progress = Instant::now();
            } else {
                self.check_error()?;
                if last_progress.elapsed() > STALL_TIMEOUT {
                    return Err(Error::Sink("Audio device stopped consuming samples".to_string()));
                }
                thread::sleep(DRAIN_POLL);
            }
        }

        // Block until the device has taken everything we queued
        let mut occupied = self.producer.occupied_len();
        while occupied > 0 {
            self.check_error()?;
            thread::sleep(DRAIN_POLL);
            let now = self.producer.occupied_len();
            if now < occupied {
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(Error::Sink("Audio device stopped consuming samples".to_string()));
            }
            occupied = now;
        }

        Ok(())
    }

    fn name(&self) -> String {
        self.device_name.clone()
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

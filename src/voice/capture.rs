//! Audio capture from microphone

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::wav::SAMPLE_RATE;
use crate::{Error, Result};

/// Captures 16kHz mono audio from the default input device
///
/// The device callback only appends to the shared buffer. Dropping the
/// stream in [`AudioCapture::stop`] ends the callback before the buffer is
/// taken.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.sample_format() == cpal::SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no 16kHz mono input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the captured samples, leaving the buffer empty
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Record from the microphone until a line is read from stdin
///
/// Blocks the calling thread; run it on a blocking task.
///
/// # Errors
///
/// Returns error if the device fails or stdin cannot be read
pub fn record_until_enter() -> Result<Vec<f32>> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line);
    capture.stop();
    read?;

    let samples = capture.take_buffer();
    tracing::info!(
        seconds = super::wav::duration_secs(samples.len(), SAMPLE_RATE),
        "recording finished"
    );
    Ok(samples)
}

/// Record from the microphone for a fixed duration
///
/// # Errors
///
/// Returns error if the device fails
pub fn record_for(duration: std::time::Duration) -> Result<Vec<f32>> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;
    std::thread::sleep(duration);
    capture.stop();
    Ok(capture.take_buffer())
}

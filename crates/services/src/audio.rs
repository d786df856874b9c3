//! Microphone capture via cpal.
//!
//! Captures at the device's native rate and downsamples to 16kHz mono for
//! the recognizer. Capture blocks the calling worker thread for the clip
//! duration, which enforces the one-capture-at-a-time rule.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

pub struct MicrophoneCapture {
    device: cpal::Device,
    stream_config: StreamConfig,
}

impl MicrophoneCapture {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device"))?;

        let default_config = device
            .default_input_config()
            .map_err(|e| anyhow!("no default input config: {e}"))?;

        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "input device {:?}: {}Hz, {} channels",
            device.name().unwrap_or_else(|_| "<unknown>".into()),
            stream_config.sample_rate.0,
            stream_config.channels
        );

        Ok(Self {
            device,
            stream_config,
        })
    }

    /// Record one clip and return it as 16kHz mono PCM16 samples. Blocks
    /// the calling thread for the full duration.
    pub fn capture_clip(&self, duration: Duration) -> Result<Vec<i16>> {
        let native_rate = self.stream_config.sample_rate.0;
        let channels = self.stream_config.channels;
        let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let stream = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = if channels > 1 {
                        to_mono(data, channels)
                    } else {
                        data.to_vec()
                    };
                    sink.lock().extend_from_slice(&mono);
                },
                |err| tracing::warn!("input stream error: {err}"),
                None,
            )
            .map_err(|e| anyhow!("cannot open input stream: {e}"))?;

        stream
            .play()
            .map_err(|e| anyhow!("cannot start input stream: {e}"))?;
        std::thread::sleep(duration);
        drop(stream);

        let raw = std::mem::take(&mut *buffer.lock());
        let resampled = if native_rate != TARGET_SAMPLE_RATE {
            downsample(&raw, native_rate, TARGET_SAMPLE_RATE)
        } else {
            raw
        };
        Ok(resampled
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect())
    }
}

/// Average interleaved channels into mono.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Nearest-sample decimation. Good enough for speech; no filtering.
fn downsample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as f64 * ratio) as usize;
            samples[src.min(samples.len() - 1)]
        })
        .collect()
}

/// Minimal PCM16 mono WAV container around raw samples.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

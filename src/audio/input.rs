use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};

use super::fft::{rms_level, SpectrumAnalyzer};
use super::{Spectrum, DEFAULT_BINS};

/// Live microphone capture feeding one level reading and one spectrum per frame.
///
/// The cpal callback mixes to mono and ships blocks over a channel; `poll`
/// drains whatever arrived since the last frame on the caller's thread.
pub struct MicInput {
    #[allow(dead_code)]
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    analyzer: SpectrumAnalyzer,
    history: Vec<f32>,
    level: f32,
    sample_rate: f32,
}

impl MicInput {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        let config = device
            .default_input_config()
            .context("Failed to get default input config")?;

        info!("Using input device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));
        info!("Input config: {:?}", config);

        let sample_rate = config.sample_rate().0 as f32;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();
        let (sender, receiver) = crossbeam_channel::unbounded();

        let stream = match sample_format {
            SampleFormat::F32 => Self::create_input_stream::<f32>(&device, &stream_config, sender)?,
            SampleFormat::I16 => Self::create_input_stream::<i16>(&device, &stream_config, sender)?,
            SampleFormat::U16 => Self::create_input_stream::<u16>(&device, &stream_config, sender)?,
            other => return Err(anyhow!("Unsupported input sample format: {:?}", other)),
        };
        stream.play().context("Failed to start input stream")?;

        Ok(Self {
            stream,
            receiver,
            analyzer: SpectrumAnalyzer::new(sample_rate, DEFAULT_BINS),
            history: Vec::new(),
            level: 0.0,
            sample_rate,
        })
    }

    fn create_input_stream<T>(device: &Device, config: &StreamConfig, sender: Sender<Vec<f32>>) -> Result<Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = config.channels as usize;
        info!("Creating input stream with {} channels at {} Hz", channels, config.sample_rate.0);

        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if sender.send(mix_to_mono(data, channels)).is_err() {
                    warn!("Failed to send audio data");
                }
            },
            |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Drain captured audio and return this frame's `(level, spectrum)`.
    ///
    /// When nothing new arrived the previous level is repeated.
    pub fn poll(&mut self) -> (f32, Spectrum) {
        let mut fresh = Vec::new();
        while let Ok(block) = self.receiver.try_recv() {
            fresh.extend(block);
        }

        if !fresh.is_empty() {
            self.level = rms_level(&fresh).clamp(0.0, 1.0);
            self.history.extend(fresh);
            let keep = self.analyzer.fft_size();
            if self.history.len() > keep {
                let excess = self.history.len() - keep;
                self.history.drain(..excess);
            }
        }

        (self.level, self.analyzer.analyze(&self.history))
    }
}

/// Convert an interleaved block of any supported sample type to mono `f32`.
fn mix_to_mono<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_to_mono_converts_integer_formats() {
        let stereo_i16 = mix_to_mono(&[i16::MIN, 0, 0, 0], 2);
        assert_eq!(stereo_i16.len(), 2);
        assert!((stereo_i16[0] + 0.5).abs() < 1e-6);
        assert_eq!(stereo_i16[1], 0.0);

        let mono_u16 = mix_to_mono(&[32768u16, u16::MAX], 1);
        assert!(mono_u16[0].abs() < 1e-6);
        assert!(mono_u16[1] > 0.99);
    }

    #[test]
    fn test_mix_to_mono_averages_float_channels() {
        let mono = mix_to_mono(&[0.2f32, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);

        assert_eq!(mix_to_mono(&[0.25f32, -0.25], 1), vec![0.25, -0.25]);
    }
}

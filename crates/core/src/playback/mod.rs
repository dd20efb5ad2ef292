//! Wall-clock playback driver. Feeds decoded PCM into an analysis node at
//! real-time pace and optionally monitors it through the default output
//! device, mirroring the rule that file playback is always audible while
//! live capture never is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::source::{AnalyzerHandle, AudioBuffer};
use crate::{OverlayError, Result};

/// Output seam for monitored playback. The production implementation is
/// [`CpalAudioSink`]; tests and headless export substitute [`NullSink`].
pub trait AudioSink {
    fn start(&mut self, buffer: Arc<AudioBuffer>) -> Result<()>;
    fn stop(&mut self);
}

/// Sink that discards audio. Used when no output device is wanted.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn start(&mut self, _buffer: Arc<AudioBuffer>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Monitored playback over the default cpal output device.
#[derive(Default)]
pub struct CpalAudioSink {
    stream: Option<cpal::Stream>,
}

impl AudioSink for CpalAudioSink {
    fn start(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(OverlayError::InvalidInput("no output device available"))?;
        let config = device
            .default_output_config()
            .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(OverlayError::InvalidInput(
                "output device does not accept f32 samples",
            ));
        }
        let out_channels = config.channels() as usize;
        let out_rate = config.sample_rate().0 as f64;
        let mono = buffer.mono_samples();
        let src_rate = buffer.sample_rate as f64;
        let position = Mutex::new(0.0f64);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut cursor = match position.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    let step = src_rate / out_rate;
                    for frame in data.chunks_mut(out_channels) {
                        let index = *cursor as usize;
                        let sample = mono.get(index).copied().unwrap_or(0.0);
                        for slot in frame.iter_mut() {
                            *slot = sample;
                        }
                        *cursor += step;
                    }
                },
                |err| tracing::warn!(%err, "playback stream error"),
                None,
            )
            .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?;
        stream
            .play()
            .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }
}

/// Drives decoded PCM into an analyzer at wall-clock pace on a background
/// thread. The analysis feed is independent of the monitor sink, so a missing
/// output device never stalls the visualization.
pub struct BufferPlayback {
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BufferPlayback {
    pub fn spawn(buffer: Arc<AudioBuffer>, analyzer: AnalyzerHandle) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let finished = Arc::new(AtomicBool::new(false));
        let run_flag = Arc::clone(&running);
        let done_flag = Arc::clone(&finished);

        let thread = std::thread::spawn(move || {
            let mono = buffer.mono_samples();
            let sample_rate = buffer.sample_rate.max(1) as f64;
            let start = Instant::now();
            let mut pushed = 0usize;
            while run_flag.load(Ordering::SeqCst) && pushed < mono.len() {
                let target = ((start.elapsed().as_secs_f64() * sample_rate) as usize)
                    .min(mono.len());
                if target > pushed {
                    if analyzer.push_samples(&mono[pushed..target]).is_err() {
                        break;
                    }
                    pushed = target;
                }
                std::thread::sleep(Duration::from_millis(8));
            }
            done_flag.store(true, Ordering::SeqCst);
        });

        Self {
            running,
            finished,
            thread: Some(thread),
        }
    }

    /// True while the driver still has samples left to feed.
    pub fn is_playing(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for BufferPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MediaSource, SignalSourceAdapter, FFT_SIZE};

    fn short_tone() -> AudioBuffer {
        let samples: Vec<f32> = (0..1600)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 8000.0).sin())
            .collect();
        AudioBuffer {
            samples,
            channels: 1,
            sample_rate: 8000,
        }
    }

    #[test]
    fn playback_feeds_the_analyzer_and_finishes() {
        let mut adapter = SignalSourceAdapter::new();
        let media = MediaSource::new(short_tone());
        let analyzer = adapter.connect_playback(&media);

        let mut playback = BufferPlayback::spawn(Arc::clone(media.buffer()), analyzer.clone());
        // 0.2 seconds of audio; allow generous slack.
        for _ in 0..100 {
            if !playback.is_playing() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!playback.is_playing());
        playback.stop();

        let mut time = Vec::new();
        analyzer.pull_time_domain_data(&mut time).unwrap();
        assert_eq!(time.len(), FFT_SIZE);
        assert!(time.iter().any(|&v| v != 128));
    }

    #[test]
    fn stop_interrupts_a_long_buffer() {
        let long = AudioBuffer {
            samples: vec![0.25; 8000 * 30],
            channels: 1,
            sample_rate: 8000,
        };
        let mut adapter = SignalSourceAdapter::new();
        let media = MediaSource::new(long);
        let analyzer = adapter.connect_playback(&media);

        let mut playback = BufferPlayback::spawn(Arc::clone(media.buffer()), analyzer);
        std::thread::sleep(Duration::from_millis(30));
        playback.stop();
        // The driver thread has exited even though samples remained.
        assert!(playback.thread.is_none());
    }
}

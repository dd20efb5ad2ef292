use crate::config::{SENSITIVITY_RANGE, SMOOTHNESS_RANGE};

/// Fixed attack coefficient. Rising values are always tracked quickly so that
/// sudden loudness is visible immediately; only the decay is tunable.
pub const ATTACK_ALPHA: f32 = 0.45;

/// Historical default lengths used for placeholder frames when no analyzer is
/// connected. They match a 256-point analysis window.
pub const DEFAULT_FREQUENCY_LEN: usize = 128;
pub const DEFAULT_TIME_DOMAIN_LEN: usize = 256;

/// Neutral midpoint of the time-domain byte range.
pub const TIME_DOMAIN_CENTER: f32 = 128.0;

/// Stabilized per-frame analysis data handed to the renderers. Produced once
/// per render tick and read-only from there on.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Smoothed frequency-domain magnitudes, one byte per bin.
    pub frequency: Vec<u8>,
    /// Smoothed time-domain samples, centered at 128.
    pub time_domain: Vec<u8>,
    /// Mean of the smoothed spectrum divided by 255, clamped to [0, 1].
    pub average_amplitude: f32,
}

impl AudioFrame {
    /// Well-formed neutral frame returned when no source is connected.
    pub fn placeholder() -> Self {
        Self {
            frequency: vec![0; DEFAULT_FREQUENCY_LEN],
            time_domain: vec![TIME_DOMAIN_CENTER as u8; DEFAULT_TIME_DOMAIN_LEN],
            average_amplitude: 0.0,
        }
    }
}

/// Converts raw analyzer bytes into perceptually stable, sensitivity-scaled
/// arrays using asymmetric exponential smoothing: fast attack, slow release.
///
/// Symmetric smoothing either looks jittery at low smoothness or sluggish to
/// loud transients at high smoothness. Splitting attack and release lets the
/// smoothness control mean "how gently it settles" while onsets stay sharp.
#[derive(Debug)]
pub struct SmoothingEngine {
    sensitivity: f32,
    smoothness: f32,
    frequency_state: Vec<f32>,
    time_domain_state: Vec<f32>,
}

impl SmoothingEngine {
    pub fn new(sensitivity: f32, smoothness: f32) -> Self {
        let mut engine = Self {
            sensitivity: 1.0,
            smoothness: 0.7,
            frequency_state: Vec::new(),
            time_domain_state: Vec::new(),
        };
        engine.set_sensitivity(sensitivity);
        engine.set_smoothness(smoothness);
        engine
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn smoothness(&self) -> f32 {
        self.smoothness
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1);
    }

    pub fn set_smoothness(&mut self, smoothness: f32) {
        self.smoothness = smoothness.clamp(SMOOTHNESS_RANGE.0, SMOOTHNESS_RANGE.1);
    }

    /// Decay coefficient for falling values. Monotonically decreasing in the
    /// smoothness control: low smoothness snaps back, high smoothness settles
    /// slowly. Always below [`ATTACK_ALPHA`].
    pub fn release_alpha(&self) -> f32 {
        0.03 + (1.0 - self.smoothness) * 0.25
    }

    /// Drops accumulated smoothing state, e.g. when the source disconnects.
    pub fn reset(&mut self) {
        self.frequency_state.clear();
        self.time_domain_state.clear();
    }

    /// Produces one stabilized frame from the raw analyzer arrays. The
    /// average amplitude is derived from the already-smoothed spectrum so
    /// amplitude-driven effects never jitter independently of it.
    pub fn frame(&mut self, raw_frequency: &[u8], raw_time_domain: &[u8]) -> AudioFrame {
        let frequency = self.smooth_frequency(raw_frequency);
        let time_domain = self.smooth_time_domain(raw_time_domain);
        let average_amplitude = average_amplitude(&frequency);
        AudioFrame {
            frequency,
            time_domain,
            average_amplitude,
        }
    }

    /// Smooths frequency magnitudes. Raw values are scaled by sensitivity and
    /// clamped to the byte range before the attack/release step.
    pub fn smooth_frequency(&mut self, raw: &[u8]) -> Vec<u8> {
        let sensitivity = self.sensitivity;
        let release_alpha = self.release_alpha();
        Self::smooth_into(
            &mut self.frequency_state,
            release_alpha,
            raw,
            |value| (value * sensitivity).clamp(0.0, 255.0),
        )
    }

    /// Smooths time-domain samples. Sensitivity scales the deviation from the
    /// 128 center so silence stays centered regardless of gain.
    pub fn smooth_time_domain(&mut self, raw: &[u8]) -> Vec<u8> {
        let sensitivity = self.sensitivity;
        let release_alpha = self.release_alpha();
        Self::smooth_into(
            &mut self.time_domain_state,
            release_alpha,
            raw,
            |value| {
                ((value - TIME_DOMAIN_CENTER) * sensitivity + TIME_DOMAIN_CENTER).clamp(0.0, 255.0)
            },
        )
    }

    fn smooth_into(
        state: &mut Vec<f32>,
        release_alpha: f32,
        raw: &[u8],
        scale: impl Fn(f32) -> f32,
    ) -> Vec<u8> {
        if state.len() != raw.len() {
            // Source just connected or the bin count changed.
            state.clear();
            state.resize(raw.len(), 0.0);
        }

        let mut out = Vec::with_capacity(raw.len());
        for (previous, &raw_value) in state.iter_mut().zip(raw) {
            let scaled = scale(raw_value as f32);
            let alpha = if scaled > *previous {
                ATTACK_ALPHA
            } else {
                release_alpha
            };
            *previous = *previous * (1.0 - alpha) + scaled * alpha;
            out.push(previous.clamp(0.0, 255.0).round() as u8);
        }
        out
    }
}

impl Default for SmoothingEngine {
    fn default() -> Self {
        Self::new(2.0, 0.7)
    }
}

/// Mean of the smoothed spectrum normalised to [0, 1].
pub fn average_amplitude(smoothed_frequency: &[u8]) -> f32 {
    if smoothed_frequency.is_empty() {
        return 0.0;
    }
    let sum: u32 = smoothed_frequency.iter().map(|&v| v as u32).sum();
    (sum as f32 / smoothed_frequency.len() as f32 / 255.0).clamp(0.0, 1.0)
}

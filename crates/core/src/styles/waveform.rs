//! Waveform family: the energetic line, the bezier-smoothed gentle variant,
//! and the time-driven flowing wave.

use std::f32::consts::PI;

use tiny_skia::{Pixmap, Transform};

use super::{
    linear_gradient, polyline, round_stroke, shader_paint, smooth_polyline, solid_paint, stop,
    VisualConfig,
};
use crate::smoothing::TIME_DOMAIN_CENTER;

pub(super) fn draw_waveform(pixmap: &mut Pixmap, time_domain: &[u8], config: &VisualConfig) {
    if time_domain.is_empty() {
        return;
    }
    let scaled_height = config.height * config.size;
    let left = config.center_x - config.width / 2.0;
    let slice_width = config.width / time_domain.len() as f32;

    let points: Vec<(f32, f32)> = time_domain
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let v = (value as f32 - TIME_DOMAIN_CENTER) / TIME_DOMAIN_CENTER;
            (left + i as f32 * slice_width, config.center_y + v * scaled_height / 2.0)
        })
        .collect();

    let Some(path) = polyline(&points) else { return };

    let gradient = linear_gradient(
        (left, config.center_y),
        (config.center_x + config.width / 2.0, config.center_y),
        vec![
            stop(0.0, config.secondary_color, 1.0),
            stop(0.5, config.color, 1.0),
            stop(1.0, config.secondary_color, 1.0),
        ],
        config.color,
    );

    // Wide low-alpha pass underneath stands in for the canvas glow.
    let glow = solid_paint(config.color, 0.3);
    pixmap.stroke_path(
        &path,
        &glow,
        &round_stroke(12.0 * config.size),
        Transform::identity(),
        None,
    );
    pixmap.stroke_path(
        &path,
        &shader_paint(gradient),
        &round_stroke(4.0 * config.size),
        Transform::identity(),
        None,
    );

    // Mirrored wave at reduced opacity.
    let mirrored: Vec<(f32, f32)> = points
        .iter()
        .map(|&(x, y)| (x, 2.0 * config.center_y - y))
        .collect();
    if let Some(mirror_path) = polyline(&mirrored) {
        pixmap.stroke_path(
            &mirror_path,
            &solid_paint(config.color, 0.3),
            &round_stroke(4.0 * config.size),
            Transform::identity(),
            None,
        );
    }
}

pub(super) fn draw_waveform_gentle(pixmap: &mut Pixmap, time_domain: &[u8], config: &VisualConfig) {
    const SAMPLE_RATE: usize = 4;
    let num_points = time_domain.len() / SAMPLE_RATE;
    if num_points < 3 {
        return;
    }

    let scaled_height = config.height * config.size;
    let left = config.center_x - config.width / 2.0;
    let points: Vec<(f32, f32)> = (0..num_points)
        .map(|i| {
            let v = (time_domain[i * SAMPLE_RATE] as f32 - TIME_DOMAIN_CENTER) / TIME_DOMAIN_CENTER;
            (
                left + (i as f32 / num_points as f32) * config.width,
                config.center_y + v * scaled_height / 2.0,
            )
        })
        .collect();

    let Some(path) = smooth_polyline(&points) else { return };

    let gradient = linear_gradient(
        (left, config.center_y),
        (config.center_x + config.width / 2.0, config.center_y),
        vec![
            stop(0.0, config.color, 0.0),
            stop(0.2, config.color, 0.5),
            stop(0.5, config.color, 1.0),
            stop(0.8, config.color, 0.5),
            stop(1.0, config.color, 0.0),
        ],
        config.color,
    );

    pixmap.stroke_path(
        &path,
        &solid_paint(config.color, 0.25),
        &round_stroke(9.0 * config.size),
        Transform::identity(),
        None,
    );
    pixmap.stroke_path(
        &path,
        &shader_paint(gradient),
        &round_stroke(3.0 * config.size),
        Transform::identity(),
        None,
    );

    // Soft reflection below the center line.
    let reflection: Vec<(f32, f32)> = points
        .iter()
        .map(|&(x, y)| (x, config.center_y + (config.center_y - y) * 0.3))
        .collect();
    if let Some(reflection_path) = smooth_polyline(&reflection) {
        pixmap.stroke_path(
            &reflection_path,
            &solid_paint(config.secondary_color, 0.15),
            &round_stroke(3.0 * config.size),
            Transform::identity(),
            None,
        );
    }
}

pub(super) fn draw_flowing_wave(
    pixmap: &mut Pixmap,
    time_domain: &[u8],
    config: &VisualConfig,
    seconds: f64,
) {
    if time_domain.is_empty() {
        return;
    }
    let time = (seconds / 2.0) as f32;

    let deviation: f32 = time_domain
        .iter()
        .map(|&v| (v as f32 - TIME_DOMAIN_CENTER).abs())
        .sum::<f32>()
        / time_domain.len() as f32;
    let avg_amplitude = deviation / TIME_DOMAIN_CENTER;

    let base_amplitude = config.height * 0.4 * config.size;
    let amplitude = base_amplitude * (0.15 + avg_amplitude * 0.85);
    let left = config.center_x - config.width / 2.0;

    for wave in 0..3u32 {
        let wave_offset = wave as f32 * 0.5;
        let wave_alpha = 1.0 - wave as f32 * 0.3;
        let color = if wave % 2 == 0 {
            config.color
        } else {
            config.secondary_color
        };

        let mut points = Vec::new();
        let mut x = 0.0f32;
        while x <= config.width {
            let progress = x / config.width;
            let y = config.center_y
                + (progress * PI * 3.0 + time + wave_offset).sin()
                    * amplitude
                    * (0.5 + avg_amplitude * 0.5)
                + (progress * PI * 5.0 + time * 1.3 + wave_offset).sin() * amplitude * 0.3;
            points.push((left + x, y));
            x += 5.0;
        }

        if let Some(path) = polyline(&points) {
            let gradient = linear_gradient(
                (left, config.center_y),
                (left + config.width, config.center_y),
                vec![
                    stop(0.0, color, 0.0),
                    stop(0.3, color, 0.7 * wave_alpha),
                    stop(0.7, color, 0.7 * wave_alpha),
                    stop(1.0, color, 0.0),
                ],
                color,
            );
            pixmap.stroke_path(
                &path,
                &shader_paint(gradient),
                &round_stroke((3.0 - wave as f32 * 0.5) * config.size),
                Transform::identity(),
                None,
            );
        }
    }
}

//! Frequency-bar family: the classic mirrored bars and the neighbour-averaged
//! smooth variant with edge fading.

use tiny_skia::{FillRule, Pixmap, Transform};

use super::{linear_gradient, polyline, round_stroke, rounded_rect, shader_paint, stop, VisualConfig};

pub(super) fn draw_frequency_bars(pixmap: &mut Pixmap, frequency: &[u8], config: &VisualConfig) {
    if frequency.is_empty() {
        return;
    }
    const BAR_COUNT: usize = 64;
    let slot_width = config.width / BAR_COUNT as f32;
    let bar_width = slot_width * 0.7;
    let max_height = config.height * config.size;
    let left = config.center_x - config.width / 2.0;
    let step = (frequency.len() / BAR_COUNT).max(1);

    for i in 0..BAR_COUNT {
        let Some(&value) = frequency.get(i * step) else { break };
        let normalized = value as f32 / 255.0;
        let bar_height = (normalized * max_height).max(4.0);
        let x = left + i as f32 * slot_width;
        let y = config.center_y - bar_height / 2.0;

        let gradient = linear_gradient(
            (x, y + bar_height),
            (x, y),
            vec![
                stop(0.0, config.secondary_color, 1.0),
                stop(1.0, config.color, 1.0),
            ],
            config.color,
        );
        if let Some(path) = rounded_rect(x, y, bar_width, bar_height, 4.0) {
            pixmap.fill_path(
                &path,
                &shader_paint(gradient),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }

        // Faded reflection under the center line.
        let mirror_height = bar_height / 2.0;
        let mirror = linear_gradient(
            (x, config.center_y),
            (x, config.center_y + mirror_height),
            vec![stop(0.0, config.color, 0.4), stop(1.0, config.color, 0.0)],
            config.color,
        );
        if let Some(path) = rounded_rect(x, config.center_y, bar_width, mirror_height, 4.0) {
            pixmap.fill_path(
                &path,
                &shader_paint(mirror),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}

pub(super) fn draw_bars_smooth(pixmap: &mut Pixmap, frequency: &[u8], config: &VisualConfig) {
    if frequency.is_empty() {
        return;
    }
    const BAR_COUNT: usize = 32;
    let total_width = config.width * 0.7;
    let slot_width = total_width / BAR_COUNT as f32;
    let bar_width = slot_width * 0.6;
    let max_height = config.height * config.size;
    let left = config.center_x - total_width / 2.0;
    let step = (frequency.len() / BAR_COUNT).max(1);

    for i in 0..BAR_COUNT {
        // Average a small neighbourhood of bins so adjacent bars move together.
        let mut sum = 0.0f32;
        let mut count = 0u32;
        for offset in -2i32..=2 {
            let bin = i as i32 + offset;
            if bin < 0 {
                continue;
            }
            if let Some(&value) = frequency.get(bin as usize * step) {
                sum += value as f32;
                count += 1;
            }
        }
        if count == 0 {
            continue;
        }
        let normalized = sum / count as f32 / 255.0;
        let eased = normalized.powf(0.9);
        let bar_height = (eased * max_height).max(4.0);

        let edge_fade = (i.min(BAR_COUNT - 1 - i) as f32 / 8.0).min(1.0);
        let alpha = (edge_fade + 0.3).min(1.0);

        let x = left + i as f32 * slot_width;
        let y = config.center_y - bar_height / 2.0;
        let gradient = linear_gradient(
            (x, y + bar_height),
            (x, y),
            vec![
                stop(0.0, config.secondary_color, alpha * 0.39),
                stop(0.5, config.color, alpha * 0.78),
                stop(1.0, config.color, alpha * 0.59),
            ],
            config.color,
        );
        if let Some(path) = rounded_rect(x, y, bar_width, bar_height, bar_width / 2.0) {
            pixmap.fill_path(
                &path,
                &shader_paint(gradient),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    // Thin glow line along the baseline ties the bars together.
    let baseline = vec![(left, config.center_y), (left + total_width, config.center_y)];
    if let Some(path) = polyline(&baseline) {
        let gradient = linear_gradient(
            (left, config.center_y),
            (left + total_width, config.center_y),
            vec![
                stop(0.0, config.color, 0.0),
                stop(0.3, config.color, 0.19),
                stop(0.5, config.color, 0.31),
                stop(0.7, config.color, 0.19),
                stop(1.0, config.color, 0.0),
            ],
            config.color,
        );
        pixmap.stroke_path(
            &path,
            &shader_paint(gradient),
            &round_stroke(1.0),
            Transform::identity(),
            None,
        );
    }
}

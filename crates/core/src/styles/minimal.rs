//! Minimal family: concentric pulse rings, the calm breathing orb, the
//! floating dot and the single pulse line.

use std::f32::consts::PI;

use tiny_skia::{Pixmap, Transform};

use super::{
    fill_circle, linear_gradient, polyline, radial_gradient, rgba, round_stroke, shader_paint,
    solid_paint, stop, stroke_circle, VisualConfig,
};
use crate::config::Color;

const WHITE: Color = Color::new(0xff, 0xff, 0xff);

pub(super) fn draw_minimal_pulse(
    pixmap: &mut Pixmap,
    amplitude: f32,
    config: &VisualConfig,
    seconds: f64,
) {
    let base_radius = 80.0 * config.size;
    let pulse = amplitude * 30.0 * config.size;
    let (cx, cy) = (config.center_x, config.center_y);

    // (radius offset, alpha, pulse multiplier)
    const RINGS: [(f32, f32, f32); 4] = [
        (0.0, 0.8, 1.0),
        (30.0, 0.5, 0.7),
        (60.0, 0.3, 0.5),
        (90.0, 0.15, 0.3),
    ];
    for (index, &(offset, alpha, multiplier)) in RINGS.iter().enumerate() {
        let radius = base_radius + offset + pulse * multiplier;
        let color = if index % 2 == 0 {
            config.color
        } else {
            config.secondary_color
        };

        let glow = radial_gradient(
            (cx, cy),
            (radius - 10.0).max(0.0),
            radius + 20.0,
            vec![
                (0.0, rgba(color, alpha * 0.39)),
                (1.0, rgba(color, 0.0)),
            ],
            color,
        );
        fill_circle(pixmap, cx, cy, radius + 20.0, &shader_paint(glow));
        stroke_circle(
            pixmap,
            cx,
            cy,
            radius,
            &solid_paint(color, alpha),
            &round_stroke(3.0 * config.size),
        );
    }

    // Bright center dot with a specular highlight.
    let core = base_radius * 0.3 + amplitude * 20.0 * config.size;
    let gradient = radial_gradient(
        (cx, cy),
        0.0,
        core,
        vec![
            (0.0, rgba(WHITE, 1.0)),
            (0.3, rgba(config.color, 1.0)),
            (1.0, rgba(config.secondary_color, 1.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, core, &shader_paint(gradient));
    fill_circle(
        pixmap,
        cx - core * 0.3,
        cy - core * 0.3,
        core * 0.2,
        &solid_paint(WHITE, 0.3),
    );

    // Slow orbiting particles around the outermost ring.
    let time = seconds as f32;
    let orbit = base_radius + 100.0;
    const PARTICLES: usize = 12;
    for i in 0..PARTICLES {
        let angle = i as f32 / PARTICLES as f32 * PI * 2.0 + time * 0.5;
        let distance = orbit + (time + i as f32).sin() * 30.0 * amplitude;
        let (sin, cos) = angle.sin_cos();
        fill_circle(
            pixmap,
            cx + cos * distance,
            cy + sin * distance,
            (3.0 + amplitude * 5.0) * config.size,
            &solid_paint(config.color, 0.5),
        );
    }
}

pub(super) fn draw_minimal_calm(
    pixmap: &mut Pixmap,
    amplitude: f32,
    config: &VisualConfig,
    seconds: f64,
) {
    let time = (seconds / 2.0) as f32;
    let base_radius = 60.0 * config.size;
    let breathe = time.sin() * 0.1 + 1.0;
    let pulse = base_radius * breathe + amplitude * 40.0 * config.size;
    let (cx, cy) = (config.center_x, config.center_y);

    let halo = radial_gradient(
        (cx, cy),
        pulse,
        pulse * 2.5,
        vec![
            (0.0, rgba(config.color, 0.082)),
            (0.5, rgba(config.color, 0.031)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, pulse * 2.5, &shader_paint(halo));

    stroke_circle(
        pixmap,
        cx,
        cy,
        pulse + 30.0 * config.size,
        &solid_paint(config.color, 0.31),
        &round_stroke(2.0 * config.size),
    );

    let body = radial_gradient(
        (cx, cy),
        0.0,
        pulse,
        vec![
            (0.0, rgba(WHITE, 0.19)),
            (0.3, rgba(config.color, 0.375)),
            (1.0, rgba(config.secondary_color, 0.25)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, pulse, &shader_paint(body));
    stroke_circle(
        pixmap,
        cx,
        cy,
        pulse,
        &solid_paint(config.color, 0.25),
        &round_stroke(1.0),
    );
}

pub(super) fn draw_floating_dot(
    pixmap: &mut Pixmap,
    amplitude: f32,
    config: &VisualConfig,
    seconds: f64,
) {
    let time = (seconds / 1.5) as f32;
    let float_x = (time * 0.7).sin() * 10.0 * config.size;
    let float_y = time.cos() * 8.0 * config.size;
    let cx = config.center_x + float_x;
    let cy = config.center_y + float_y;
    let dot = 25.0 * config.size + amplitude * 40.0 * config.size;

    let halo = radial_gradient(
        (cx, cy),
        dot,
        dot * 4.0,
        vec![
            (0.0, rgba(config.color, 0.125)),
            (0.4, rgba(config.color, 0.031)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, dot * 4.0, &shader_paint(halo));

    let body = radial_gradient(
        (cx, cy),
        0.0,
        dot,
        vec![
            (0.0, rgba(WHITE, 1.0)),
            (0.4, rgba(config.color, 1.0)),
            (1.0, rgba(config.secondary_color, 1.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, dot, &shader_paint(body));
}

pub(super) fn draw_line_pulse(pixmap: &mut Pixmap, amplitude: f32, config: &VisualConfig) {
    let line_width = config.width * 0.5;
    let pulse_width = line_width * (0.15 + amplitude * 0.85);
    let (cx, cy) = (config.center_x, config.center_y);
    let start = (cx - pulse_width / 2.0, cy);
    let end = (cx + pulse_width / 2.0, cy);

    let Some(path) = polyline(&[start, end]) else { return };

    pixmap.stroke_path(
        &path,
        &solid_paint(config.color, 0.3),
        &round_stroke(9.0 * config.size),
        Transform::identity(),
        None,
    );

    let gradient = linear_gradient(
        start,
        end,
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
        &shader_paint(gradient),
        &round_stroke(3.0 * config.size),
        Transform::identity(),
        None,
    );

    // Endpoint dots grow with loudness.
    let dot = 4.0 * config.size + amplitude * 10.0 * config.size;
    fill_circle(pixmap, start.0, start.1, dot, &solid_paint(config.color, 1.0));
    fill_circle(pixmap, end.0, end.1, dot, &solid_paint(config.secondary_color, 1.0));
}

//! Circular family: the spoked ring, the breathing circle, orbital ellipses
//! and expanding ripples.

use std::f32::consts::PI;

use tiny_skia::{PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform};

use super::{
    fill_circle, radial_gradient, rgba, round_stroke, shader_paint, solid_paint, stop,
    stroke_circle, linear_gradient, VisualConfig,
};
use crate::config::Color;

const WHITE: Color = Color::new(0xff, 0xff, 0xff);

pub(super) fn draw_circular(
    pixmap: &mut Pixmap,
    frequency: &[u8],
    amplitude: f32,
    config: &VisualConfig,
) {
    if frequency.is_empty() {
        return;
    }
    let base_radius = 150.0 * config.size;
    let max_bar = 100.0 * config.size;
    let pulse_radius = base_radius * (0.8 + amplitude * 0.4);
    let (cx, cy) = (config.center_x, config.center_y);

    // Outer glow halo.
    let halo = radial_gradient(
        (cx, cy),
        pulse_radius * 0.5,
        pulse_radius * 1.5,
        vec![
            (0.0, rgba(config.color, 0.25)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, pulse_radius * 1.5, &shader_paint(halo));

    // Filled inner disc.
    let disc = radial_gradient(
        (cx, cy),
        0.0,
        pulse_radius,
        vec![
            (0.0, rgba(config.color, 0.375)),
            (0.7, rgba(config.secondary_color, 0.25)),
            (1.0, rgba(config.color, 0.5)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, pulse_radius, &shader_paint(disc));

    // Frequency spokes around the ring.
    const SPOKES: usize = 180;
    let spoke_base = base_radius + 20.0;
    let step = frequency.len() as f32 / SPOKES as f32;
    let stroke = round_stroke(3.0 * config.size);
    for i in 0..SPOKES {
        let bin = ((i as f32 * step) as usize).min(frequency.len() - 1);
        let value = frequency[bin] as f32 / 255.0;
        let bar = value * max_bar + 5.0;
        let angle = i as f32 / SPOKES as f32 * PI * 2.0;
        let (sin, cos) = angle.sin_cos();
        let inner = (cx + cos * spoke_base, cy + sin * spoke_base);
        let outer = (cx + cos * (spoke_base + bar), cy + sin * (spoke_base + bar));

        let gradient = linear_gradient(
            inner,
            outer,
            vec![
                stop(0.0, config.color, 1.0),
                stop(1.0, config.secondary_color, 1.0),
            ],
            config.color,
        );
        let mut builder = PathBuilder::new();
        builder.move_to(inner.0, inner.1);
        builder.line_to(outer.0, outer.1);
        if let Some(path) = builder.finish() {
            pixmap.stroke_path(
                &path,
                &shader_paint(gradient),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    // Dashed guide ring outside the spokes.
    let dashed = Stroke {
        width: 2.0,
        dash: StrokeDash::new(vec![10.0, 20.0], 0.0),
        ..Stroke::default()
    };
    stroke_circle(
        pixmap,
        cx,
        cy,
        base_radius + max_bar + 30.0,
        &solid_paint(config.color, 0.376),
        &dashed,
    );
}

pub(super) fn draw_circular_breathe(pixmap: &mut Pixmap, amplitude: f32, config: &VisualConfig) {
    let radius = 120.0 * config.size + amplitude * 55.0 * config.size;
    let (cx, cy) = (config.center_x, config.center_y);

    let halo = radial_gradient(
        (cx, cy),
        radius * 0.5,
        radius * 2.0,
        vec![
            (0.0, rgba(config.color, 0.125)),
            (0.5, rgba(config.color, 0.0625)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, radius * 2.0, &shader_paint(halo));

    let body = radial_gradient(
        (cx, cy),
        0.0,
        radius,
        vec![
            (0.0, rgba(config.color, 0.25)),
            (0.7, rgba(config.secondary_color, 0.19)),
            (1.0, rgba(config.color, 0.31)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, radius, &shader_paint(body));

    stroke_circle(
        pixmap,
        cx,
        cy,
        radius,
        &solid_paint(config.color, 0.375),
        &round_stroke(2.0 * config.size),
    );

    // Faint concentric rings inside the body.
    for ring in 1..=3u32 {
        let ring_radius = radius * (0.3 + ring as f32 * 0.2);
        let alpha = (30.0 - ring as f32 * 8.0) / 255.0;
        stroke_circle(
            pixmap,
            cx,
            cy,
            ring_radius,
            &solid_paint(config.color, alpha),
            &round_stroke(1.0),
        );
    }
}

pub(super) fn draw_orbital_rings(
    pixmap: &mut Pixmap,
    amplitude: f32,
    config: &VisualConfig,
    seconds: f64,
) {
    let time = (seconds / 3.0) as f32;
    let base_radius = 100.0 * config.size;
    let (cx, cy) = (config.center_x, config.center_y);

    let glow = radial_gradient(
        (cx, cy),
        0.0,
        base_radius * 0.5,
        vec![
            (0.0, rgba(config.color, 0.375)),
            (0.5, rgba(config.secondary_color, 0.19)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, base_radius * 0.5, &shader_paint(glow));

    // (radius factor, angular speed, stroke width, alpha)
    const RINGS: [(f32, f32, f32, f32); 3] = [
        (0.8, 1.0, 2.0, 0.6),
        (1.1, -0.7, 1.5, 0.4),
        (1.4, 0.5, 1.0, 0.25),
    ];
    for (index, &(factor, speed, width, alpha)) in RINGS.iter().enumerate() {
        let expanded = base_radius * factor + amplitude * 50.0 * config.size;
        let rotation_degrees = time * speed * 180.0 / PI;
        let color = if index % 2 == 0 {
            config.color
        } else {
            config.secondary_color
        };

        let Some(rect) = Rect::from_xywh(
            cx - expanded,
            cy - expanded * 0.4,
            expanded * 2.0,
            expanded * 0.8,
        ) else {
            continue;
        };
        let mut builder = PathBuilder::new();
        builder.push_oval(rect);
        if let Some(path) = builder.finish() {
            pixmap.stroke_path(
                &path,
                &solid_paint(color, alpha),
                &round_stroke(width * config.size),
                Transform::from_rotate_at(rotation_degrees, cx, cy),
                None,
            );
        }
    }

    let dot_radius = 8.0 * config.size + amplitude * 35.0 * config.size;
    let dot = radial_gradient(
        (cx, cy),
        0.0,
        dot_radius,
        vec![
            (0.0, rgba(WHITE, 1.0)),
            (0.3, rgba(config.color, 1.0)),
            (1.0, rgba(config.secondary_color, 0.5)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, dot_radius, &shader_paint(dot));
}

pub(super) fn draw_soft_ripples(
    pixmap: &mut Pixmap,
    amplitude: f32,
    config: &VisualConfig,
    seconds: f64,
) {
    let time = seconds as f32;
    let max_radius = 180.0 * config.size;
    let (cx, cy) = (config.center_x, config.center_y);

    const RIPPLES: usize = 5;
    for i in 0..RIPPLES {
        let progress = (time * 0.3 + i as f32 / RIPPLES as f32).fract();
        let radius = progress * max_radius;
        let alpha = (1.0 - progress) * 0.5;
        if alpha <= 0.05 {
            continue;
        }
        let color = if i % 2 == 0 {
            config.color
        } else {
            config.secondary_color
        };
        stroke_circle(
            pixmap,
            cx,
            cy,
            radius + amplitude * 50.0,
            &solid_paint(color, alpha),
            &round_stroke((2.0 + amplitude * 8.0) * config.size * (1.0 - progress * 0.5)),
        );
    }

    let core = 30.0 * config.size + amplitude * 50.0 * config.size;
    let gradient = radial_gradient(
        (cx, cy),
        0.0,
        core,
        vec![
            (0.0, rgba(config.color, 0.5)),
            (0.6, rgba(config.secondary_color, 0.25)),
            (1.0, rgba(config.color, 0.0)),
        ],
        config.color,
    );
    fill_circle(pixmap, cx, cy, core, &shader_paint(gradient));
}

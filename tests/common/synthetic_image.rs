use maskforge::{Mask, PixelBuffer};

/// Single-colour RGB image.
pub fn solid_rgb(width: usize, height: usize, color: [u8; 3]) -> PixelBuffer {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    PixelBuffer::filled(width, height, &color).expect("valid solid image")
}

/// Black/white checkerboard with square cells of `cell` pixels.
pub fn checkerboard_rgb(width: usize, height: usize, cell: usize) -> PixelBuffer {
    assert!(cell > 0, "cell size must be positive");

    let mut samples = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let v = if ((x / cell) + (y / cell)) & 1 == 0 { 0u8 } else { 255u8 };
            samples.extend_from_slice(&[v, v, v]);
        }
    }
    PixelBuffer::new(width, height, 3, samples).expect("valid checkerboard")
}

/// Diagonal colour ramp, so every tolerance step selects a little more.
pub fn diagonal_ramp(width: usize, height: usize) -> PixelBuffer {
    let mut samples = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let t = (x + y) * 255 / (width + height - 2).max(1);
            samples.extend_from_slice(&[t as u8, (255 - t) as u8, 96]);
        }
    }
    PixelBuffer::new(width, height, 3, samples).expect("valid ramp")
}

/// Uniform border colour with a centred square object of side `object`.
pub fn framed_object(size: usize, object: usize) -> PixelBuffer {
    let start = (size - object) / 2;
    let inside = start..start + object;
    let mut samples = Vec::with_capacity(size * size * 3);
    for y in 0..size {
        for x in 0..size {
            if inside.contains(&x) && inside.contains(&y) {
                samples.extend_from_slice(&[240, 220, 60]);
            } else {
                samples.extend_from_slice(&[40, 90, 40]);
            }
        }
    }
    PixelBuffer::new(size, size, 3, samples).expect("valid framed image")
}

/// Textured RGB noise from a fixed linear congruential sequence.
pub fn noise_rgb(width: usize, height: usize, seed: u32) -> PixelBuffer {
    let mut state = seed;
    let samples = (0..width * height * 3)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect();
    PixelBuffer::new(width, height, 3, samples).expect("valid noise image")
}

/// Mask selecting an axis-aligned block.
pub fn block_mask(width: usize, height: usize, x0: usize, y0: usize, w: usize, h: usize) -> Mask {
    let mut mask = Mask::new(width, height);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            mask.set(x, y, 255);
        }
    }
    mask
}

/// Mask selecting a disc of `radius` around `(cx, cy)`.
pub fn disc_mask(width: usize, height: usize, cx: f32, cy: f32, radius: f32) -> Mask {
    let mut mask = Mask::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            if dx * dx + dy * dy <= radius * radius {
                mask.set(x, y, 255);
            }
        }
    }
    mask
}

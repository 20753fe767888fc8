//! Greyscale conversion and dithering.
//!
//! The encoder wants every channel thresholded to {0, 255}; these passes
//! get an arbitrary RGB frame into that shape. Dither output is replicated
//! across all three channels so the downstream colour index stays
//! consistent.

use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreyscaleMode {
    None,
    Red,
    Green,
    Blue,
    Mean,
    Luminance,
}

impl GreyscaleMode {
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            1 => GreyscaleMode::Red,
            2 => GreyscaleMode::Green,
            3 => GreyscaleMode::Blue,
            4 => GreyscaleMode::Mean,
            5 => GreyscaleMode::Luminance,
            _ => GreyscaleMode::None,
        }
    }
}

pub fn to_greyscale(image: &mut RgbImage, mode: GreyscaleMode) {
    if mode == GreyscaleMode::None {
        return;
    }
    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0;
        let grey = match mode {
            GreyscaleMode::None => unreachable!(),
            GreyscaleMode::Red => r,
            GreyscaleMode::Green => g,
            GreyscaleMode::Blue => b,
            GreyscaleMode::Mean => ((u16::from(r) + u16::from(g) + u16::from(b)) / 3) as u8,
            GreyscaleMode::Luminance => {
                (0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)) as u8
            }
        };
        pixel.0 = [grey; 3];
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMode {
    Threshold,
    FloydSteinberg,
    Ordered2x2,
    Ordered3x3,
}

impl DitherMode {
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            1 => DitherMode::FloydSteinberg,
            2 => DitherMode::Ordered2x2,
            3 => DitherMode::Ordered3x3,
            _ => DitherMode::Threshold,
        }
    }
}

pub fn dither(image: &mut RgbImage, mode: DitherMode, threshold: u8) {
    match mode {
        DitherMode::Threshold => threshold_channels(image, threshold),
        DitherMode::FloydSteinberg => floyd_steinberg(image),
        DitherMode::Ordered2x2 => ordered(image, 5, &[&[1, 3], &[4, 2]]),
        DitherMode::Ordered3x3 => ordered(image, 10, &[&[1, 8, 4], &[7, 6, 3], &[5, 2, 9]]),
    }
}

/// Plain thresholding, per channel. The only mode that keeps colour.
fn threshold_channels(image: &mut RgbImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        for channel in &mut pixel.0 {
            *channel = if *channel >= threshold { 255 } else { 0 };
        }
    }
}

/// Error-diffusion dither on the grey channel, 7/16 right, 3/16 down-left,
/// 5/16 down, 1/16 down-right. The cut point is fixed at mid-grey.
fn floyd_steinberg(image: &mut RgbImage) {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);

    let mut grey: Vec<i16> = image.pixels().map(|p| i16::from(p.0[0])).collect();

    fn diffuse(grey: &mut [i16], i: usize, error: i16, num: i16) {
        grey[i] = (grey[i] + error * num / 16).clamp(0, 255);
    }

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let value = grey[i];
            let out: i16 = if value >= 128 { 255 } else { 0 };
            grey[i] = out;
            let error = value - out;

            if x + 1 < width {
                diffuse(&mut grey, i + 1, error, 7);
            }
            if y + 1 < height {
                if x > 0 {
                    diffuse(&mut grey, i + width - 1, error, 3);
                }
                diffuse(&mut grey, i + width, error, 5);
                if x + 1 < width {
                    diffuse(&mut grey, i + width + 1, error, 1);
                }
            }
        }
    }

    for (pixel, &value) in image.pixels_mut().zip(&grey) {
        pixel.0 = [value as u8; 3];
    }
}

/// Ordered dither: quantise the grey to `levels` steps and cut against a
/// tiled threshold matrix.
fn ordered(image: &mut RgbImage, levels: u16, matrix: &[&[u16]]) {
    let n = matrix.len();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let step = u16::from(pixel.0[0]) * levels / 256;
        let cut = matrix[y as usize % n][x as usize % n];
        let out = if step >= cut { 255 } else { 0 };
        pixel.0 = [out; 3];
    }
}

//! Color helpers.
//!
//! Load percentages are turned into colors by walking a slice of the visible spectrum,
//! using the usual piecewise wavelength approximation.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::Rng;

/// Default gamma applied to every channel intensity.
pub const DEFAULT_GAMMA: f64 = 0.8;

/// Shortest visible wavelength in nanometers.
pub const MIN_WAVELENGTH: f64 = 380.;

/// Longest visible wavelength in nanometers.
pub const MAX_WAVELENGTH: f64 = 750.;

/// Offsets restricting the spectrum to 510..=670nm, green to red.
const GREEN_OFFSET: f64 = 130.;
const RED_OFFSET: f64 = 80.;

/// RGB color.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Color which does not match the `0xRRGGBB` format.
#[derive(PartialEq, Eq, Debug)]
pub struct ParseRgbError(String);

impl Display for ParseRgbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "color '{}' does not match format 0xRRGGBB", self.0)
    }
}

impl std::error::Error for ParseRgbError {}

impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Rgb, Self::Err> {
        let chars = match s.strip_prefix("0x") {
            Some(chars) if chars.len() == 6 => chars,
            _ => return Err(ParseRgbError(s.into())),
        };

        match u32::from_str_radix(chars, 16) {
            Ok(mut color) => {
                let b = (color & 0xff) as u8;
                color >>= 8;
                let g = (color & 0xff) as u8;
                color >>= 8;
                let r = color as u8;
                Ok(Rgb { r, g, b })
            },
            Err(_) => Err(ParseRgbError(s.into())),
        }
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Approximate the color of visible light.
///
/// Wavelengths outside of 380..=750nm are black.
pub fn wavelength_to_rgb(wavelength: f64, gamma: f64) -> Rgb {
    let w = wavelength;

    let (r, g, b) = if (380.0..=440.0).contains(&w) {
        // Fade out towards the ultraviolet edge.
        let attenuation = 0.3 + 0.7 * (w - 380.) / (440. - 380.);
        ((-(w - 440.) / (440. - 380.) * attenuation).powf(gamma), 0., attenuation.powf(gamma))
    } else if (440.0..=490.0).contains(&w) {
        (0., ((w - 440.) / (490. - 440.)).powf(gamma), 1.)
    } else if (490.0..=510.0).contains(&w) {
        (0., 1., (-(w - 510.) / (510. - 490.)).powf(gamma))
    } else if (510.0..=580.0).contains(&w) {
        (((w - 510.) / (580. - 510.)).powf(gamma), 1., 0.)
    } else if (580.0..=645.0).contains(&w) {
        (1., (-(w - 645.) / (645. - 580.)).powf(gamma), 0.)
    } else if (645.0..=750.0).contains(&w) {
        // Fade out towards the infrared edge.
        let attenuation = 0.3 + 0.7 * (750. - w) / (750. - 645.);
        (attenuation.powf(gamma), 0., 0.)
    } else {
        (0., 0., 0.)
    };

    Rgb { r: channel(r), g: channel(g), b: channel(b) }
}

/// Map a percentage onto a slice of the visible spectrum.
///
/// The offsets shrink the spectrum from its short and long end respectively.
pub fn percentage_to_visible_wavelength_rgb(
    percentage: f64,
    begin_offset: f64,
    end_offset: f64,
) -> Rgb {
    let percentage = percentage.max(0.).min(100.);

    let begin = MIN_WAVELENGTH + begin_offset;
    let end = MAX_WAVELENGTH - end_offset;
    let wavelength = begin + (end - begin) * percentage / 100.;

    wavelength_to_rgb(wavelength, DEFAULT_GAMMA)
}

/// Green for low percentages, red for high ones.
pub fn green_to_red_percentage(percentage: f64) -> Rgb {
    percentage_to_visible_wavelength_rgb(percentage, GREEN_OFFSET, RED_OFFSET)
}

/// Random color drawn from `rng`.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    Rgb { r: rng.gen(), g: rng.gen(), b: rng.gen() }
}

/// Scale an intensity in 0..=1 to a color channel.
#[inline]
fn channel(intensity: f64) -> u8 {
    (intensity.max(0.).min(1.) * 255.) as u8
}

//! Lightbar command buffers.
//!
//! The protocol was reverse engineered from USB captures, it has no length fields so
//! every byte offset matters. Filler bytes of unknown meaning are kept verbatim.

use bytes::{BufMut, Bytes, BytesMut};

use crate::color::Rgb;
use crate::error::Error;

/// Highest addressable LED index.
pub const MAX_LED_INDEX: u8 = 31;

/// Number of LEDs written by full frames.
pub const LED_COUNT: u8 = 31;

/// Length of a single encoded LED, without its index byte.
pub const LED_ENTRY_LEN: usize = 11;

/// Header starting every LED frame.
const FRAME_HEADER: [u8; 4] = [0x0e, 0x00, 0x1e, 0x00];

/// Control byte for brightness commands.
const BRIGHTNESS_CONTROL: u8 = 0x0c;

/// Buffer applying the previous command.
const COMMIT: [u8; 3] = [0x0d, 0x00, 0x02];

/// HID report type carried in the control transfer's value field.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ReportType {
    /// Short commands like brightness and commit.
    Short,
    /// LED frames.
    Frame,
}

impl ReportType {
    pub const fn value(self) -> u16 {
        match self {
            Self::Short => 0x0200,
            Self::Frame => 0x0300,
        }
    }
}

/// State of a single LED.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct LedEntry {
    pub index: u8,
    pub color: Rgb,
    pub enabled: bool,
}

impl LedEntry {
    pub const fn new(index: u8, color: Rgb) -> Self {
        Self { index, color, enabled: true }
    }

    pub const fn off(index: u8) -> Self {
        Self { index, color: Rgb::new(0, 0, 0), enabled: false }
    }
}

/// Convert an LED's state to the lightbar format.
pub fn encode_led(color: Rgb, enabled: bool) -> [u8; LED_ENTRY_LEN] {
    let mut entry = [0; LED_ENTRY_LEN];

    entry[0] = color.r;
    entry[1] = color.g;
    entry[2] = color.b;

    // Bytes 3..8 are padding.

    entry[8] = enabled as u8;
    entry[9] = 0x01;
    entry[10] = 0x00;

    entry
}

/// Build a frame updating the given LEDs in order.
///
/// Frames do not need to cover every LED.
pub fn encode_frame(entries: &[LedEntry]) -> Result<Bytes, Error> {
    if entries.len() > MAX_LED_INDEX as usize + 1 {
        return Err(Error::FrameTooLong(entries.len()));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER.len() + entries.len() * (LED_ENTRY_LEN + 1));
    buf.put_slice(&FRAME_HEADER);

    for entry in entries {
        if entry.index > MAX_LED_INDEX {
            return Err(Error::InvalidLedIndex(entry.index));
        }

        buf.put_slice(&encode_led(entry.color, entry.enabled));
        buf.put_u8(entry.index);
    }

    Ok(buf.freeze())
}

/// Build a command setting the overall brightness.
pub fn encode_brightness(level: u8) -> Bytes {
    // The second byte is always zero.
    Bytes::copy_from_slice(&[BRIGHTNESS_CONTROL, 0x00, level])
}

/// Build the command applying a previous write.
pub fn encode_commit() -> Bytes {
    Bytes::from_static(&COMMIT)
}

/// One entry for each LED of the lightbar, all in the same color.
pub fn fill(color: Rgb) -> Vec<LedEntry> {
    (0..LED_COUNT).map(|index| LedEntry::new(index, color)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_entry_layout() {
        let color = Rgb::new(0x10, 0x20, 0x30);
        assert_eq!(encode_led(color, true), [0x10, 0x20, 0x30, 0, 0, 0, 0, 0, 0x01, 0x01, 0x00]);
        assert_eq!(encode_led(color, false)[8], 0x00);
    }

    #[test]
    fn frame_layout() {
        let entries = [
            LedEntry::new(3, Rgb::new(1, 2, 3)),
            LedEntry::off(0),
            LedEntry::new(MAX_LED_INDEX, Rgb::new(0xff, 0xff, 0xff)),
        ];

        let frame = encode_frame(&entries).unwrap();

        assert_eq!(frame.len(), 4 + 12 * entries.len());
        assert_eq!(&frame[..4], &[0x0e, 0x00, 0x1e, 0x00]);

        for (group, entry) in frame[4..].chunks(LED_ENTRY_LEN + 1).zip(&entries) {
            assert_eq!(group[..LED_ENTRY_LEN], encode_led(entry.color, entry.enabled));
            assert_eq!(group[LED_ENTRY_LEN], entry.index);
        }
    }

    #[test]
    fn empty_frame_is_header() {
        assert_eq!(&encode_frame(&[]).unwrap()[..], &FRAME_HEADER);
    }

    #[test]
    fn frame_rejects_unknown_led() {
        let entries = [LedEntry::new(MAX_LED_INDEX + 1, Rgb::default())];
        assert!(matches!(encode_frame(&entries), Err(Error::InvalidLedIndex(32))));

        let entries = vec![LedEntry::off(0); 33];
        assert!(matches!(encode_frame(&entries), Err(Error::FrameTooLong(33))));
    }

    #[test]
    fn brightness_bytes() {
        assert_eq!(&encode_brightness(0)[..], &[0x0c, 0x00, 0x00]);
        assert_eq!(&encode_brightness(255)[..], &[0x0c, 0x00, 0xff]);
    }

    #[test]
    fn commit_bytes() {
        assert_eq!(&encode_commit()[..], &[0x0d, 0x00, 0x02]);
    }

    #[test]
    fn fill_covers_every_led() {
        let entries = fill(Rgb::new(1, 1, 1));
        assert_eq!(entries.len(), LED_COUNT as usize);
        assert!(entries.iter().enumerate().all(|(i, entry)| entry.index as usize == i));
    }

    #[test]
    fn report_type_values() {
        assert_eq!(ReportType::Short.value(), 0x0200);
        assert_eq!(ReportType::Frame.value(), 0x0300);
    }
}

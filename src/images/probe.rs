//! Intrinsic dimensions from the leading bytes of an image.
//!
//! Only headers are parsed; nothing is decoded.

use super::types::ImageFormat;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Sniffs the format from magic bytes and reads width/height.
pub fn probe(bytes: &[u8]) -> Option<Dimensions> {
    if bytes.starts_with(PNG_SIGNATURE) {
        return png(bytes);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return gif(bytes);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return webp(bytes);
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return jpeg(bytes);
    }
    None
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([b[0], b[1]])))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 3)?;
    Some(u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
}

fn png(bytes: &[u8]) -> Option<Dimensions> {
    // IHDR is always the first chunk
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some(Dimensions {
        width: be_u32(bytes, 16)?,
        height: be_u32(bytes, 20)?,
        format: ImageFormat::Png,
    })
}

fn gif(bytes: &[u8]) -> Option<Dimensions> {
    Some(Dimensions {
        width: le_u16(bytes, 6)?,
        height: le_u16(bytes, 8)?,
        format: ImageFormat::Gif,
    })
}

fn webp(bytes: &[u8]) -> Option<Dimensions> {
    let (width, height) = match bytes.get(12..16)? {
        b"VP8 " => {
            // Lossy: frame tag, start code, then 14-bit dimensions
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            (le_u16(bytes, 26)? & 0x3FFF, le_u16(bytes, 28)? & 0x3FFF)
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let b = bytes.get(21..25)?;
            let (b0, b1, b2, b3) = (u32::from(b[0]), u32::from(b[1]), u32::from(b[2]), u32::from(b[3]));
            let width = 1 + (((b1 & 0x3F) << 8) | b0);
            let height = 1 + (((b3 & 0x0F) << 10) | (b2 << 2) | ((b1 & 0xC0) >> 6));
            (width, height)
        }
        b"VP8X" => (1 + le_u24(bytes, 24)?, 1 + le_u24(bytes, 27)?),
        _ => return None,
    };
    Some(Dimensions {
        width,
        height,
        format: ImageFormat::Webp,
    })
}

fn jpeg(bytes: &[u8]) -> Option<Dimensions> {
    let mut i = 2;
    loop {
        while *bytes.get(i)? != 0xFF {
            i += 1;
        }
        while *bytes.get(i)? == 0xFF {
            i += 1;
        }
        let marker = *bytes.get(i)?;
        i += 1;

        // Standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            continue;
        }

        let length = be_u16(bytes, i)? as usize;
        let is_frame = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            return Some(Dimensions {
                height: be_u16(bytes, i + 3)?,
                width: be_u16(bytes, i + 5)?,
                format: ImageFormat::Jpeg,
            });
        }
        if length < 2 {
            return None;
        }
        i += length;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal headers for tests elsewhere in the crate.

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = super::PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
        bytes
    }

    pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 segment to skip over
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        // SOF0
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_dimensions() {
        let dims = probe(&fixtures::png(1600, 900)).unwrap();
        assert_eq!((dims.width, dims.height, dims.format), (1600, 900, ImageFormat::Png));
    }

    #[test]
    fn jpeg_dimensions_after_app_segment() {
        let dims = probe(&fixtures::jpeg(1200, 675)).unwrap();
        assert_eq!((dims.width, dims.height, dims.format), (1200, 675, ImageFormat::Jpeg));
    }

    #[test]
    fn gif_dimensions() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&320u16.to_le_bytes());
        bytes.extend_from_slice(&240u16.to_le_bytes());
        let dims = probe(&bytes).unwrap();
        assert_eq!((dims.width, dims.height), (320, 240));
    }

    #[test]
    fn webp_extended_dimensions() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBPVP8X");
        bytes.extend_from_slice(&[10, 0, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        // 1024x768 stored minus one as 24-bit little endian
        bytes.extend_from_slice(&[0xFF, 0x03, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0x02, 0x00]);
        let dims = probe(&bytes).unwrap();
        assert_eq!((dims.width, dims.height, dims.format), (1024, 768, ImageFormat::Webp));
    }

    #[test]
    fn webp_lossless_dimensions() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBPVP8L");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.push(0x2F);
        // width-1 = 399 (14 bits), height-1 = 299 (14 bits)
        let packed: u32 = 399 | (299 << 14);
        bytes.extend_from_slice(&packed.to_le_bytes());
        let dims = probe(&bytes).unwrap();
        assert_eq!((dims.width, dims.height), (400, 300));
    }

    #[test]
    fn truncated_and_unknown_inputs() {
        assert!(probe(&[]).is_none());
        assert!(probe(b"<svg xmlns").is_none());
        assert!(probe(&fixtures::jpeg(100, 100)[..12]).is_none());
        assert!(probe(&fixtures::png(10, 10)[..18]).is_none());
    }
}

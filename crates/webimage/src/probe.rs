//! # Environment Probes
//!
//! Seams between the engine and its host environment: network
//! reachability and payload validity. Both are pluggable; the defaults
//! match what an application loading web images wants.

/// Reports whether the host currently has network reachability. Consulted
/// by the downloader before any request is issued.
pub trait ConnectivityProbe: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Probe for hosts without a reachability signal; every request is
/// attempted and transport errors do the talking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Decides whether a byte payload is a usable image. Applied to freshly
/// downloaded payloads and to cache hits before they are served.
pub trait ImageValidator: Send + Sync {
    fn is_valid_image(&self, data: &[u8]) -> bool;
}

/// A decoded image no larger than this pixel count is treated as a
/// degenerate placeholder rather than real content.
const DEGENERATE_PIXELS: u32 = 8 * 8;

/// Default validator: the payload must decode into an image larger than a
/// degenerate placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodedImageValidator;

impl ImageValidator for DecodedImageValidator {
    fn is_valid_image(&self, data: &[u8]) -> bool {
        use image::GenericImageView as _;

        match image::load_from_memory(data) {
            Ok(img) => img.width().saturating_mul(img.height()) > DEGENERATE_PIXELS,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn real_image_is_valid() {
        let validator = DecodedImageValidator;
        assert!(validator.is_valid_image(&png_bytes(16, 16)));
    }

    #[test]
    fn degenerate_image_is_rejected() {
        let validator = DecodedImageValidator;
        assert!(!validator.is_valid_image(&png_bytes(8, 8)));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let validator = DecodedImageValidator;
        assert!(!validator.is_valid_image(b"<html>404 Not Found</html>"));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let validator = DecodedImageValidator;
        assert!(!validator.is_valid_image(&[]));
    }
}

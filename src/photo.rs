use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::io::Cursor;

/// Decoded input image plus the original encoded bytes. The bytes are kept
/// around so the overlay SVG can embed the untouched original as its base
/// layer instead of a re-encoded copy.
#[derive(Clone, Debug)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub pixels: RgbaImage,
}

impl Photo {
    pub fn decode(bytes: Vec<u8>) -> Result<Photo> {
        let mime = sniff_image_mime(&bytes)
            .ok_or_else(|| anyhow!("payload is not a recognized image format"))?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("could not decode {} payload", mime))?;
        Ok(Photo {
            bytes,
            mime,
            pixels: decoded.to_rgba8(),
        })
    }

    pub fn from_pixels(pixels: RgbaImage) -> Result<Photo> {
        let bytes = encode_png(&pixels)?;
        Ok(Photo {
            bytes,
            mime: "image/png".to_string(),
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

pub fn sniff_image_mime(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    let mime = kind.mime_type();
    if mime.starts_with("image/") {
        Some(mime.to_string())
    } else {
        None
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode png")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_roundtrips_png_bytes() {
        let pixels = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]));
        let bytes = encode_png(&pixels).expect("encode");
        let photo = Photo::decode(bytes).expect("decode");
        assert_eq!(photo.mime, "image/png");
        assert_eq!(photo.width(), 4);
        assert_eq!(photo.height(), 3);
        assert_eq!(photo.pixels.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn decode_rejects_non_image_bytes() {
        let err = Photo::decode(b"plain text, not pixels".to_vec()).unwrap_err();
        assert!(err.to_string().contains("not a recognized image format"));
    }

    #[test]
    fn sniff_ignores_non_image_formats() {
        // %PDF magic is a known type but not an image.
        assert_eq!(sniff_image_mime(b"%PDF-1.4 ..."), None);
    }
}

//! Image payload validation and data-URL handling

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

pub const VALID_QUALITIES: &[&str] = &["auto", "quality", "portrait", "product", "speed"];
pub const VALID_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Image data is empty")]
    Empty,

    #[error("Image data must be a data URL (data:image/...;base64,...)")]
    MalformedDataUrl,

    #[error("Data URL does not contain an image media type")]
    NotAnImage,

    #[error("Image data is not valid base64")]
    InvalidBase64,

    #[error("Invalid quality '{0}'")]
    InvalidQuality(String),

    #[error("Invalid format '{0}'")]
    InvalidFormat(String),
}

/// Decode an image payload to raw bytes. Accepts either a
/// `data:image/...;base64,` URL or a bare base64 string; older SDK
/// clients send the latter.
pub fn decode_image_data(data: &str) -> Result<Vec<u8>, PayloadError> {
    if data.is_empty() {
        return Err(PayloadError::Empty);
    }
    let body = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, body) =
                rest.split_once(',').ok_or(PayloadError::MalformedDataUrl)?;
            if !header.contains("image/") {
                return Err(PayloadError::NotAnImage);
            }
            body
        }
        None => data,
    };
    BASE64.decode(body).map_err(|_| PayloadError::InvalidBase64)
}

/// Validate without keeping the decoded bytes.
pub fn validate_image_data(data: &str) -> Result<(), PayloadError> {
    decode_image_data(data).map(|_| ())
}

/// Encode raw bytes into the data-URL form the worker protocol uses.
pub fn encode_image_data(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}

pub fn validate_quality(quality: &str) -> Result<(), PayloadError> {
    if VALID_QUALITIES.contains(&quality) {
        Ok(())
    } else {
        Err(PayloadError::InvalidQuality(quality.to_string()))
    }
}

pub fn validate_format(format: &str) -> Result<(), PayloadError> {
    if VALID_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(PayloadError::InvalidFormat(format.to_string()))
    }
}

/// MIME type to serve a processed image as.
pub fn content_type_for_format(format: &str) -> &'static str {
    match format {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_round_trips_encoded_bytes() {
        let bytes = b"\x89PNG\r\n\x1a\nfake image bytes";
        let encoded = encode_image_data(bytes);
        assert_eq!(decode_image_data(&encoded).unwrap(), bytes);
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(decode_image_data(""), Err(PayloadError::Empty));
    }

    #[test]
    fn accepts_bare_base64_without_data_url() {
        assert_eq!(
            decode_image_data("aGVsbG8gd29ybGQ=").unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn rejects_bare_string_that_is_not_base64() {
        assert_eq!(
            decode_image_data("@@not-base64@@"),
            Err(PayloadError::InvalidBase64)
        );
    }

    #[test]
    fn rejects_data_url_without_comma() {
        assert_eq!(
            decode_image_data("data:image/png;base64"),
            Err(PayloadError::MalformedDataUrl)
        );
    }

    #[test]
    fn rejects_non_image_media_type() {
        assert_eq!(
            decode_image_data("data:text/plain;base64,aGVsbG8="),
            Err(PayloadError::NotAnImage)
        );
    }

    #[test]
    fn rejects_invalid_base64_body() {
        assert_eq!(
            decode_image_data("data:image/png;base64,@@not-base64@@"),
            Err(PayloadError::InvalidBase64)
        );
    }

    #[test]
    fn quality_presets() {
        for q in VALID_QUALITIES {
            assert!(validate_quality(q).is_ok());
        }
        assert_eq!(
            validate_quality("ultra"),
            Err(PayloadError::InvalidQuality("ultra".to_string()))
        );
    }

    #[test]
    fn output_formats() {
        for f in VALID_FORMATS {
            assert!(validate_format(f).is_ok());
        }
        assert_eq!(
            validate_format("tiff"),
            Err(PayloadError::InvalidFormat("tiff".to_string()))
        );
    }

    #[test]
    fn content_types_cover_all_formats() {
        assert_eq!(content_type_for_format("jpg"), "image/jpeg");
        assert_eq!(content_type_for_format("jpeg"), "image/jpeg");
        assert_eq!(content_type_for_format("webp"), "image/webp");
        assert_eq!(content_type_for_format("gif"), "image/gif");
        assert_eq!(content_type_for_format("png"), "image/png");
    }
}

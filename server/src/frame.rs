use std::fmt;
use std::sync::Arc;

use image::DynamicImage;

/// Upper bound for one encoded frame. Well above the expected 15-25KB so
/// only runaway input is rejected.
pub const MAX_FRAME_BYTES: usize = 1_000_000;

/// An encoded frame as it arrived on the producer socket.
#[derive(Clone)]
pub enum RawFrame {
    /// Text frame: base64 JPEG with a data-URI prefix.
    DataUri(String),
    /// Binary frame: raw JPEG bytes.
    Jpeg(Vec<u8>),
}

impl RawFrame {
    pub fn len(&self) -> usize {
        match self {
            RawFrame::DataUri(text) => text.len(),
            RawFrame::Jpeg(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RawFrame::DataUri(text) => write!(f, "RawFrame::DataUri({} bytes)", text.len()),
            RawFrame::Jpeg(bytes) => write!(f, "RawFrame::Jpeg({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug)]
pub enum FrameDecodeError {
    Oversized { bytes: usize },
    /// A data-URI text frame without a base64 payload after the comma.
    MissingBase64Payload,
    Base64(base64::DecodeError),
    Image(image::ImageError),
}

impl fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameDecodeError::Oversized { bytes } => {
                write!(f, "frame of {} bytes exceeds the {} byte limit", bytes, MAX_FRAME_BYTES)
            }
            FrameDecodeError::MissingBase64Payload => {
                write!(f, "data-URI frame has no base64 payload")
            }
            FrameDecodeError::Base64(err) => write!(f, "invalid base64 payload: {}", err),
            FrameDecodeError::Image(err) => write!(f, "invalid image data: {}", err),
        }
    }
}

/// A frame decoded for analysis, paired with the data-URI form that gets
/// re-displayed to observers.
pub struct DecodedFrame {
    pub image: DynamicImage,
    pub data_uri: Arc<String>,
}

pub fn decode(raw: &RawFrame) -> Result<DecodedFrame, FrameDecodeError> {
    if raw.len() > MAX_FRAME_BYTES {
        return Err(FrameDecodeError::Oversized { bytes: raw.len() });
    }
    match raw {
        RawFrame::DataUri(text) => {
            let payload = text
                .splitn(2, ',')
                .nth(1)
                .ok_or(FrameDecodeError::MissingBase64Payload)?;
            let bytes = base64::decode(payload).map_err(FrameDecodeError::Base64)?;
            let image = image::load_from_memory(&bytes).map_err(FrameDecodeError::Image)?;
            Ok(DecodedFrame {
                image,
                data_uri: Arc::new(text.clone()),
            })
        }
        RawFrame::Jpeg(bytes) => {
            let image = image::load_from_memory(bytes).map_err(FrameDecodeError::Image)?;
            let data_uri = format!("data:image/jpeg;base64,{}", base64::encode(bytes));
            Ok(DecodedFrame {
                image,
                data_uri: Arc::new(data_uri),
            })
        }
    }
}

//! Display protocol messages
//!
//! Open and Data payloads are serialized [`MemoryIndexedIo`] containers whose
//! root holds one persisted object per field.

use bytes::Bytes;

use crate::data::{Box2i, CompoundMap, Data};
use crate::indexed_io::MemoryIndexedIo;

use super::codec::{exception_payload, exception_text};
use super::{MessageType, Result};

/// Open payload entry holding the full image window
pub const DISPLAY_WINDOW_ENTRY: &str = "displayWindow";
/// Open payload entry holding the window pixels are sent for
pub const DATA_WINDOW_ENTRY: &str = "dataWindow";
/// Open payload entry holding the ordered channel names
pub const CHANNEL_NAMES_ENTRY: &str = "channelNames";
/// Open payload entry holding driver parameters
pub const PARAMETERS_ENTRY: &str = "parameters";
/// Data payload entry holding the region
pub const BOX_ENTRY: &str = "box";
/// Data payload entry holding the interleaved pixels
pub const DATA_ENTRY: &str = "data";

/// Everything a display driver is created from
#[derive(Debug, Clone, PartialEq)]
pub struct OpenParameters {
    /// Full image window
    pub display_window: Box2i,
    /// Window pixels are sent for
    pub data_window: Box2i,
    /// Ordered channel names
    pub channel_names: Vec<String>,
    /// Driver parameters
    pub parameters: CompoundMap,
}

impl OpenParameters {
    /// Serialize into a container buffer
    pub fn encode(&self) -> Result<Bytes> {
        let mut io = MemoryIndexedIo::new();
        Data::from(self.display_window).save(&mut io, DISPLAY_WINDOW_ENTRY)?;
        Data::from(self.data_window).save(&mut io, DATA_WINDOW_ENTRY)?;
        Data::from(self.channel_names.clone()).save(&mut io, CHANNEL_NAMES_ENTRY)?;
        Data::from(self.parameters.clone()).save(&mut io, PARAMETERS_ENTRY)?;
        Ok(io.to_bytes())
    }

    /// Deserialize from a container buffer
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut io = MemoryIndexedIo::from_bytes(payload)?;
        Ok(Self {
            display_window: Data::load(&mut io, DISPLAY_WINDOW_ENTRY)?.into_value()?,
            data_window: Data::load(&mut io, DATA_WINDOW_ENTRY)?.into_value()?,
            channel_names: Data::load(&mut io, CHANNEL_NAMES_ENTRY)?.into_value()?,
            parameters: Data::load(&mut io, PARAMETERS_ENTRY)?.into_value()?,
        })
    }

    /// String parameter, if present with that type
    #[must_use]
    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Data::as_str)
    }
}

/// One pixel region of an open image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Inclusive region inside the data window
    pub region: Box2i,
    /// Pixels in scan-line order, channels interleaved
    pub data: Vec<f32>,
}

impl ImageData {
    /// Serialize into a container buffer
    pub fn encode(&self) -> Result<Bytes> {
        let mut io = MemoryIndexedIo::new();
        Data::from(self.region).save(&mut io, BOX_ENTRY)?;
        Data::from(self.data.clone()).save(&mut io, DATA_ENTRY)?;
        Ok(io.to_bytes())
    }

    /// Deserialize from a container buffer
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut io = MemoryIndexedIo::from_bytes(payload)?;
        Ok(Self {
            region: Data::load(&mut io, BOX_ENTRY)?.into_value()?,
            data: Data::load(&mut io, DATA_ENTRY)?.into_value()?,
        })
    }
}

/// Client-to-server display protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Open an image
    Open(OpenParameters),
    /// Send a pixel region
    Data(ImageData),
    /// Finish the image
    Close,
    /// Report a failure
    Exception(String),
}

impl Message {
    /// Wire type of the message
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Open(_) => MessageType::Open,
            Self::Data(_) => MessageType::Data,
            Self::Close => MessageType::Close,
            Self::Exception(_) => MessageType::Exception,
        }
    }

    /// Serialize the payload
    pub fn encode_payload(&self) -> Result<Bytes> {
        match self {
            Self::Open(open) => open.encode(),
            Self::Data(data) => data.encode(),
            Self::Close => Ok(Bytes::new()),
            Self::Exception(text) => Ok(Bytes::from(exception_payload(text))),
        }
    }

    /// Deserialize a payload of the given type
    pub fn decode(msg_type: MessageType, payload: &[u8]) -> Result<Self> {
        Ok(match msg_type {
            MessageType::Open => Self::Open(OpenParameters::decode(payload)?),
            MessageType::Data => Self::Data(ImageData::decode(payload)?),
            MessageType::Close => Self::Close,
            MessageType::Exception => Self::Exception(exception_text(payload)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataError;
    use crate::indexed_io::IndexedIoError;
    use crate::protocol::Error;

    fn open_parameters() -> OpenParameters {
        let mut parameters = CompoundMap::new();
        parameters.insert("remoteDisplayType".into(), Data::from("ImageDisplayDriver"));
        parameters.insert("handle".into(), Data::from("beauty"));
        OpenParameters {
            display_window: Box2i::from_coords(0, 0, 639, 479),
            data_window: Box2i::from_coords(10, 10, 99, 99),
            channel_names: vec!["R".into(), "G".into(), "B".into()],
            parameters,
        }
    }

    #[test]
    fn test_open_roundtrip() {
        let open = open_parameters();
        let decoded = OpenParameters::decode(&open.encode().unwrap()).unwrap();
        assert_eq!(decoded, open);
        assert_eq!(decoded.string_parameter("handle"), Some("beauty"));
        assert_eq!(decoded.string_parameter("missing"), None);
    }

    #[test]
    fn test_data_roundtrip() {
        let message = Message::Data(ImageData {
            region: Box2i::from_coords(0, 0, 63, 63),
            data: (0..4096).map(|i| i as f32).collect(),
        });
        let payload = message.encode_payload().unwrap();
        assert_eq!(Message::decode(MessageType::Data, &payload).unwrap(), message);
    }

    #[test]
    fn test_close_and_exception_payloads() {
        assert!(Message::Close.encode_payload().unwrap().is_empty());

        let payload = Message::Exception("boom".into()).encode_payload().unwrap();
        assert_eq!(payload.as_ref(), b"boom\0");
        assert_eq!(
            Message::decode(MessageType::Exception, &payload).unwrap(),
            Message::Exception("boom".into())
        );
    }

    #[test]
    fn test_open_with_wrong_field_type() {
        let mut io = MemoryIndexedIo::new();
        Data::from("not a box").save(&mut io, DISPLAY_WINDOW_ENTRY).unwrap();
        let err = OpenParameters::decode(&io.to_bytes()).unwrap_err();
        assert!(matches!(err, Error::Data(DataError::TypeMismatch { .. })));
        assert!(err.is_application());
    }

    #[test]
    fn test_garbage_payload() {
        let err = ImageData::decode(b"definitely not a container").unwrap_err();
        assert!(matches!(err, Error::IndexedIo(IndexedIoError::InvalidMagic { .. })));
    }

    #[test]
    fn test_missing_field() {
        let mut io = MemoryIndexedIo::new();
        Data::from(Box2i::from_coords(0, 0, 1, 1)).save(&mut io, BOX_ENTRY).unwrap();
        assert!(ImageData::decode(&io.to_bytes()).is_err());
    }
}

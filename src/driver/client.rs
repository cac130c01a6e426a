//! Display driver forwarding an image to a remote display server

use std::io::{BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use tracing::{debug, warn};

use super::{DisplayDriver, DriverError, DriverFactory, Result, invalid_parameter};
use crate::DEFAULT_PORT;
use crate::data::{Box2i, Data};
use crate::protocol::codec::{self, blocking};
use crate::protocol::{
    DEFAULT_MAX_PAYLOAD_SIZE, Error, ImageData, Message, MessageType, OpenParameters,
};

/// Factory name of [`ClientDisplayDriver`]
pub const CLIENT_DRIVER_TYPE: &str = "ClientDisplayDriver";

/// Open parameter naming the remote host
pub const HOST_PARAMETER: &str = "displayHost";

/// Open parameter naming the remote port, as a string or an integer
pub const PORT_PARAMETER: &str = "displayPort";

const DEFAULT_HOST: &str = "localhost";

/// Driver that opens the same image on a remote server and streams every
/// region to it.
///
/// The connection uses blocking `std` sockets.
#[derive(Debug)]
pub struct ClientDisplayDriver {
    stream: BufWriter<TcpStream>,
    scan_line_order_only: bool,
    closed: bool,
}

impl ClientDisplayDriver {
    /// Connect to the server named by the [`HOST_PARAMETER`] and
    /// [`PORT_PARAMETER`] parameters of `open` and open the image there
    pub fn new(open: &OpenParameters) -> Result<Self> {
        let host = match open.parameters.get(HOST_PARAMETER) {
            None => DEFAULT_HOST,
            Some(value) => value
                .as_str()
                .ok_or_else(|| invalid_parameter(HOST_PARAMETER, "expected a string"))?,
        };
        let port = open
            .parameters
            .get(PORT_PARAMETER)
            .map_or(Ok(DEFAULT_PORT), parse_port)?;
        Self::connect((host, port), open)
    }

    /// Connect to `addr` and open the image described by `open`
    pub fn connect(addr: impl ToSocketAddrs, open: &OpenParameters) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected to display server");

        let mut reader = stream.try_clone()?;
        let mut writer = BufWriter::new(stream);
        blocking::write_frame(&mut writer, MessageType::Open, &open.encode()?)?;

        let reply = blocking::read_frame(&mut reader, DEFAULT_MAX_PAYLOAD_SIZE)?;
        let scan_line_order_only = match reply {
            (MessageType::Open, payload) => codec::decode_open_reply(&payload)?,
            (msg_type, payload) => return Err(unexpected_reply(msg_type, &payload)),
        };

        Ok(Self {
            stream: writer,
            scan_line_order_only,
            closed: false,
        })
    }

    /// Register under [`CLIENT_DRIVER_TYPE`]
    pub fn register(factory: &mut DriverFactory) {
        factory.register(CLIENT_DRIVER_TYPE, |open| Ok(Box::new(Self::new(open)?)));
    }
}

fn parse_port(value: &Data) -> Result<u16> {
    let port = match value {
        Data::String(text) => text.readable().trim().parse::<u16>().ok(),
        Data::Int(number) => u16::try_from(*number.readable()).ok(),
        Data::UInt(number) => u16::try_from(*number.readable()).ok(),
        _ => None,
    };
    port.ok_or_else(|| invalid_parameter(PORT_PARAMETER, format!("not a port: {value:?}")))
}

fn unexpected_reply(msg_type: MessageType, payload: &[u8]) -> DriverError {
    match msg_type {
        MessageType::Exception => Error::Remote(codec::exception_text(payload)).into(),
        found => Error::UnexpectedMessage {
            found,
            reason: "not a reply",
        }
        .into(),
    }
}

impl DisplayDriver for ClientDisplayDriver {
    fn scan_line_order_only(&self) -> bool {
        self.scan_line_order_only
    }

    fn image_data(&mut self, region: &Box2i, data: &[f32]) -> Result<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        let payload = Message::Data(ImageData {
            region: *region,
            data: data.to_vec(),
        })
        .encode_payload()?;
        blocking::write_frame(&mut self.stream, MessageType::Data, &payload)?;
        Ok(())
    }

    fn image_close(&mut self) -> Result<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.closed = true;
        blocking::write_frame(&mut self.stream, MessageType::Close, &[])?;

        let mut reader = self.stream.get_ref();
        match blocking::read_frame(&mut reader, DEFAULT_MAX_PAYLOAD_SIZE)? {
            (MessageType::Close, _) => Ok(()),
            (msg_type, payload) => Err(unexpected_reply(msg_type, &payload)),
        }
    }
}

impl Drop for ClientDisplayDriver {
    fn drop(&mut self) {
        if !self.closed {
            warn!("client display driver dropped before close");
        }
        if let Err(err) = self.stream.flush() {
            debug!(error = %err, "flush on drop failed");
        }
    }
}

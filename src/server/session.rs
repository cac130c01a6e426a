//! Per-connection display protocol state machine.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::driver::{DisplayDriver, DriverFactory};
use crate::protocol::codec::{self, close_reply, exception_payload, open_reply};
use crate::protocol::metrics::Metrics;
use crate::protocol::{Error, Header, ImageData, MessageType, OpenParameters, Result};

/// Settings shared by every session of one server.
#[derive(Debug, Clone)]
pub(crate) struct SessionContext {
    pub(crate) factory: Arc<DriverFactory>,
    pub(crate) max_payload_size: usize,
}

/// Where the session goes after handling one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitHeader,
    AwaitOpenPayload(Header),
    AwaitDataPayload(Header),
    Closed,
}

/// One client connection.
///
/// Data and Close are only accepted once Open has created a driver. Once
/// closed the session performs no further I/O on the stream.
pub(crate) struct Session<S> {
    id: Uuid,
    peer: Option<SocketAddr>,
    stream: S,
    context: SessionContext,
    driver: Option<Box<dyn DisplayDriver>>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(stream: S, peer: Option<SocketAddr>, context: SessionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            stream,
            context,
            driver: None,
        }
    }

    /// Serve the connection until it closes.
    pub(crate) async fn run(mut self) {
        let span = info_span!("session", id = %self.id, peer = ?self.peer);
        async move {
            let _active = ActiveSession::enter();
            debug!("session started");

            let mut state = State::AwaitHeader;
            while state != State::Closed {
                state = match state {
                    State::AwaitHeader => self.read_header().await,
                    State::AwaitOpenPayload(header) => self.open(&header).await,
                    State::AwaitDataPayload(header) => self.data(&header).await,
                    State::Closed => State::Closed,
                };
            }

            if let Err(err) = self.stream.shutdown().await {
                debug!(error = %err, "shutdown after close failed");
            }
            debug!("session closed");
        }
        .instrument(span)
        .await;
    }

    async fn read_header(&mut self) -> State {
        let header = match codec::read_header(&mut self.stream).await {
            Ok(header) => header,
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("peer disconnected");
                return State::Closed;
            }
            Err(err) => return self.fail(err).await,
        };

        let msg_type = match header.validate() {
            Ok(msg_type) => msg_type,
            Err(err) => {
                warn!(header = ?header.to_bytes(), "invalid header");
                return self.fail(err).await;
            }
        };

        match msg_type {
            MessageType::Open if self.driver.is_some() => {
                self.fail(unexpected(msg_type, "image already open")).await
            }
            MessageType::Open => State::AwaitOpenPayload(header),
            MessageType::Data => State::AwaitDataPayload(header),
            MessageType::Close => self.close().await,
            MessageType::Exception => {
                self.fail(unexpected(msg_type, "clients do not send exceptions"))
                    .await
            }
        }
    }

    async fn open(&mut self, header: &Header) -> State {
        let payload = match self.read_payload(MessageType::Open, header).await {
            Ok(payload) => payload,
            Err(err) => return self.fail(err).await,
        };

        let scan_line_order_only = match self.create_driver(&payload) {
            Ok(scan_line_order_only) => scan_line_order_only,
            Err(err) => return self.fail(err).await,
        };

        match self.send(&open_reply(scan_line_order_only)).await {
            Ok(()) => State::AwaitHeader,
            Err(err) => self.fail(err).await,
        }
    }

    fn create_driver(&mut self, payload: &[u8]) -> Result<bool> {
        let open = OpenParameters::decode(payload)?;
        let driver = self.context.factory.create(&open)?;
        let scan_line_order_only = driver.scan_line_order_only();
        debug!(
            channels = ?open.channel_names,
            data_window = ?open.data_window,
            scan_line_order_only,
            "display driver opened"
        );
        self.driver = Some(driver);
        Ok(scan_line_order_only)
    }

    async fn data(&mut self, header: &Header) -> State {
        // payload is always drained; closing with unread bytes resets the peer
        let payload = match self.read_payload(MessageType::Data, header).await {
            Ok(payload) => payload,
            Err(err) => return self.fail(err).await,
        };

        let Some(driver) = self.driver.as_mut() else {
            return self
                .fail(unexpected(MessageType::Data, "no image open"))
                .await;
        };

        let result = ImageData::decode(&payload).and_then(|image| {
            driver
                .image_data(&image.region, &image.data)
                .map_err(Error::from)
        });

        match result {
            Ok(()) => State::AwaitHeader,
            Err(err) => self.fail(err).await,
        }
    }

    async fn close(&mut self) -> State {
        Metrics::record_received(MessageType::Close, 0);

        let Some(mut driver) = self.driver.take() else {
            return self
                .fail(unexpected(MessageType::Close, "no image open"))
                .await;
        };

        if let Err(err) = driver.image_close() {
            return self.fail(err.into()).await;
        }

        if let Err(err) = self.send(&close_reply()).await {
            return self.fail(err).await;
        }
        debug!("image closed");
        State::Closed
    }

    async fn read_payload(&mut self, msg_type: MessageType, header: &Header) -> Result<BytesMut> {
        let payload =
            codec::read_payload(&mut self.stream, header, self.context.max_payload_size).await?;
        Metrics::record_received(msg_type, payload.len());
        Ok(payload)
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Metrics::record_sent();
        Ok(())
    }

    /// Log `err` and close; application failures are reported to the peer
    /// first.
    async fn fail(&mut self, err: Error) -> State {
        if err.is_application() {
            Metrics::record_application_error();
            error!(error = %err, "display driver failure");
            let payload = exception_payload(&err.to_string());
            let frame = codec::encode_frame(MessageType::Exception, &payload);
            let sent = match frame {
                Ok(frame) => self.send(&frame).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                debug!(error = %err, "could not report exception");
            }
        } else {
            Metrics::record_protocol_error();
            error!(error = %err, "protocol error");
        }
        State::Closed
    }
}

/// Counts the session as active until dropped, including on unwind.
struct ActiveSession;

impl ActiveSession {
    fn enter() -> Self {
        Metrics::record_session_open();
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        Metrics::record_session_close();
    }
}

fn unexpected(found: MessageType, reason: &'static str) -> Error {
    Error::UnexpectedMessage { found, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Box2i, CompoundMap, Data};
    use crate::driver::{DRIVER_TYPE_PARAMETER, DriverError, IMAGE_DRIVER_TYPE, ImageStore};
    use crate::protocol::codec::exception_text;
    use crate::protocol::Message;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn context(store: &ImageStore) -> SessionContext {
        let mut factory = DriverFactory::new();
        store.register_driver(&mut factory);
        factory.register("Failing", |_| {
            Err(DriverError::InvalidFormat("refusing to open".into()))
        });
        factory.register("FailingClose", |_| Ok(Box::new(FailingClose)));
        factory.set_default(IMAGE_DRIVER_TYPE);
        SessionContext {
            factory: Arc::new(factory),
            max_payload_size: 1 << 20,
        }
    }

    struct FailingClose;

    impl DisplayDriver for FailingClose {
        fn scan_line_order_only(&self) -> bool {
            true
        }

        fn image_data(&mut self, _region: &Box2i, _data: &[f32]) -> crate::driver::Result<()> {
            Ok(())
        }

        fn image_close(&mut self) -> crate::driver::Result<()> {
            Err(DriverError::InvalidFormat("disk full".into()))
        }
    }

    fn spawn_session(store: &ImageStore) -> DuplexStream {
        let (client, server) = tokio::io::duplex(1 << 16);
        tokio::spawn(Session::new(server, None, context(store)).run());
        client
    }

    fn open_message(driver: Option<&str>) -> Message {
        let mut parameters = CompoundMap::new();
        parameters.insert("handle".into(), Data::from("test"));
        if let Some(driver) = driver {
            parameters.insert(DRIVER_TYPE_PARAMETER.into(), Data::from(driver));
        }
        Message::Open(OpenParameters {
            display_window: Box2i::from_coords(0, 0, 1, 1),
            data_window: Box2i::from_coords(0, 0, 1, 1),
            channel_names: vec!["Y".into()],
            parameters,
        })
    }

    fn data_message(values: Vec<f32>) -> Message {
        Message::Data(ImageData {
            region: Box2i::from_coords(0, 0, 1, 1),
            data: values,
        })
    }

    async fn send(client: &mut DuplexStream, message: &Message) {
        let payload = message.encode_payload().unwrap();
        codec::write_frame(client, message.message_type(), &payload)
            .await
            .unwrap();
    }

    async fn read_frame(client: &mut DuplexStream) -> (MessageType, Vec<u8>) {
        let header = codec::read_header(client).await.unwrap();
        let msg_type = header.validate().unwrap();
        let payload = codec::read_payload(client, &header, 1 << 20).await.unwrap();
        (msg_type, payload.to_vec())
    }

    async fn read_to_end(client: &mut DuplexStream) -> Vec<u8> {
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        rest
    }

    #[tokio::test]
    async fn test_open_data_close() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(None)).await;
        assert_eq!(read_frame(&mut client).await, (MessageType::Open, vec![0]));

        send(&mut client, &data_message(vec![1.0, 2.0, 3.0, 4.0])).await;
        send(&mut client, &Message::Close).await;
        assert_eq!(read_frame(&mut client).await, (MessageType::Close, vec![]));
        assert!(read_to_end(&mut client).await.is_empty());

        let image = store.get("test").unwrap();
        assert_eq!(image.pixel("Y", 1, 1), Some(4.0));
    }

    #[tokio::test]
    async fn test_invalid_header_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        client.write_all(&[0x43, 1, 1, 0, 0, 0, 0]).await.unwrap();
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_version_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        client.write_all(&[0x42, 2, 1, 0, 0, 0, 0]).await.unwrap();
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_message_type_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        client.write_all(&[0x42, 1, 9, 0, 0, 0, 0]).await.unwrap();
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_exception_from_client_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(None)).await;
        read_frame(&mut client).await;
        send(&mut client, &Message::Exception("client gave up".into())).await;
        assert!(read_to_end(&mut client).await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_close_failure_sends_exception() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(Some("FailingClose"))).await;
        assert_eq!(read_frame(&mut client).await, (MessageType::Open, vec![1]));

        send(&mut client, &Message::Close).await;
        let (msg_type, payload) = read_frame(&mut client).await;
        assert_eq!(msg_type, MessageType::Exception);
        assert_eq!(exception_text(&payload), "invalid image format: disk full");
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_data_window_sends_exception() {
        for data_window in [
            Box2i::from_coords(0, 0, i32::MAX - 1, i32::MAX - 1),
            Box2i::from_coords(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
            Box2i::from_coords(0, 0, 99_999, 99_999),
        ] {
            let store = ImageStore::new();
            let (mut client, server) = tokio::io::duplex(1 << 16);
            let session = tokio::spawn(Session::new(server, None, context(&store)).run());

            let Message::Open(mut open) = open_message(None) else {
                unreachable!()
            };
            open.data_window = data_window;
            send(&mut client, &Message::Open(open)).await;

            let (msg_type, payload) = read_frame(&mut client).await;
            assert_eq!(msg_type, MessageType::Exception);
            assert!(exception_text(&payload).contains("too large"));
            assert!(read_to_end(&mut client).await.is_empty());
            session.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_data_before_open_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &data_message(vec![0.0; 4])).await;
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_close_before_open_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &Message::Close).await;
        assert!(read_to_end(&mut client).await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_on_open_sends_exception() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(Some("Failing"))).await;
        let (msg_type, payload) = read_frame(&mut client).await;
        assert_eq!(msg_type, MessageType::Exception);
        assert_eq!(payload.last(), Some(&0));
        assert!(exception_text(&payload).contains("refusing to open"));
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_driver_sends_exception() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(Some("NoSuchDriver"))).await;
        let (msg_type, payload) = read_frame(&mut client).await;
        assert_eq!(msg_type, MessageType::Exception);
        assert!(exception_text(&payload).contains("NoSuchDriver"));
    }

    #[tokio::test]
    async fn test_bad_region_sends_exception() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(None)).await;
        read_frame(&mut client).await;

        send(&mut client, &data_message(vec![0.0; 3])).await;
        let (msg_type, payload) = read_frame(&mut client).await;
        assert_eq!(msg_type, MessageType::Exception);
        assert!(exception_text(&payload).contains("expected 4 values"));
        assert!(read_to_end(&mut client).await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_open_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        send(&mut client, &open_message(None)).await;
        read_frame(&mut client).await;
        send(&mut client, &open_message(None)).await;
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_payload_closes_silently() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        let header = Header::new(MessageType::Open, 2 << 20);
        client.write_all(&header.to_bytes()).await.unwrap();
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_open_payload_sends_exception() {
        let store = ImageStore::new();
        let mut client = spawn_session(&store);

        let payload = b"not a container";
        codec::write_frame(&mut client, MessageType::Open, payload)
            .await
            .unwrap();
        let (msg_type, _) = read_frame(&mut client).await;
        assert_eq!(msg_type, MessageType::Exception);
    }

    #[tokio::test]
    async fn test_peer_hangup_mid_header() {
        let store = ImageStore::new();
        let (mut client, server) = tokio::io::duplex(64);
        let session = tokio::spawn(Session::new(server, None, context(&store)).run());

        client.write_all(&[0x42, 1]).await.unwrap();
        drop(client);
        session.await.unwrap();
    }
}

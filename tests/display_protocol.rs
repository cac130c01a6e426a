use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use displaywire::data::{Box2i, CompoundMap, Data};
use displaywire::driver::{
    self, ClientDisplayDriver, DRIVER_TYPE_PARAMETER, DisplayDriver, DriverError, DriverFactory,
    IMAGE_DRIVER_TYPE, ImageStore,
};
use displaywire::protocol::codec::{self, blocking};
use displaywire::protocol::{
    HEADER_SIZE, Header, ImageData, Message, MessageType, OpenParameters,
};
use displaywire::{DisplayDriverServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(10);
const RECORDING_DRIVER: &str = "Recording";

#[derive(Debug, Default, Clone)]
struct Recorder {
    regions: Arc<Mutex<Vec<(Box2i, usize)>>>,
    closed: Arc<Mutex<bool>>,
}

struct RecordingDriver(Recorder);

impl DisplayDriver for RecordingDriver {
    fn scan_line_order_only(&self) -> bool {
        true
    }

    fn image_data(&mut self, region: &Box2i, data: &[f32]) -> driver::Result<()> {
        self.0.regions.lock().unwrap().push((*region, data.len()));
        Ok(())
    }

    fn image_close(&mut self) -> driver::Result<()> {
        *self.0.closed.lock().unwrap() = true;
        Ok(())
    }
}

fn start_server(recorder: &Recorder, store: &ImageStore) -> DisplayDriverServer {
    let recorder = recorder.clone();
    let mut factory = DriverFactory::new().with_driver(RECORDING_DRIVER, move |_| {
        Ok(Box::new(RecordingDriver(recorder.clone())))
    });
    store.register_driver(&mut factory);

    let config = ServerConfig {
        bind_address: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        default_driver: Some(RECORDING_DRIVER.to_string()),
        ..ServerConfig::default()
    };
    DisplayDriverServer::new(config, factory).unwrap()
}

fn connect(server: &DisplayDriverServer) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(TIMEOUT)).unwrap();
    stream
}

fn send(stream: &mut TcpStream, message: &Message) {
    let payload = message.encode_payload().unwrap();
    blocking::write_frame(stream, message.message_type(), &payload).unwrap();
}

fn read_to_end(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    rest
}

fn square(size: i32) -> Box2i {
    Box2i::from_coords(0, 0, size - 1, size - 1)
}

fn open_rgb(parameters: CompoundMap) -> OpenParameters {
    OpenParameters {
        display_window: square(64),
        data_window: square(64),
        channel_names: vec!["R".into(), "G".into(), "B".into()],
        parameters,
    }
}

#[test]
fn open_data_close_session() {
    let recorder = Recorder::default();
    let store = ImageStore::new();
    let server = start_server(&recorder, &store);
    let mut stream = connect(&server);

    send(&mut stream, &Message::Open(open_rgb(CompoundMap::new())));
    let mut reply = [0u8; HEADER_SIZE + 1];
    stream.read_exact(&mut reply).unwrap();
    assert_eq!(reply, codec::open_reply(true));
    assert_eq!(&reply[..HEADER_SIZE], &Header::new(MessageType::Open, 1).to_bytes());

    send(
        &mut stream,
        &Message::Data(ImageData {
            region: square(64),
            data: vec![0.5; 4096],
        }),
    );

    send(&mut stream, &Message::Close);
    let mut reply = [0u8; HEADER_SIZE];
    stream.read_exact(&mut reply).unwrap();
    assert_eq!(reply, Header::new(MessageType::Close, 0).to_bytes());
    assert!(read_to_end(&mut stream).is_empty());

    assert_eq!(*recorder.regions.lock().unwrap(), vec![(square(64), 4096)]);
    assert!(*recorder.closed.lock().unwrap());
}

#[test]
fn malformed_magic_gets_no_reply() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);

    let mut frame = Header::new(MessageType::Open, 0).to_bytes();
    frame[0] = 0x24;
    stream.write_all(&frame).unwrap();
    assert!(read_to_end(&mut stream).is_empty());
}

#[test]
fn wrong_version_or_type_gets_no_reply() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());

    for frame in [[0x42, 2, 1, 0, 0, 0, 0], [0x42, 1, 9, 0, 0, 0, 0]] {
        let mut stream = connect(&server);
        stream.write_all(&frame).unwrap();
        assert!(read_to_end(&mut stream).is_empty(), "{frame:?}");
    }
}

#[test]
fn oversized_data_window_reports_exception() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);

    let mut parameters = CompoundMap::new();
    parameters.insert(DRIVER_TYPE_PARAMETER.into(), Data::from(IMAGE_DRIVER_TYPE));
    let mut open = open_rgb(parameters);
    open.data_window = Box2i::from_coords(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
    send(&mut stream, &Message::Open(open));

    let (msg_type, payload) = blocking::read_frame(&mut stream, 1 << 20).unwrap();
    assert_eq!(msg_type, MessageType::Exception);
    assert!(codec::exception_text(&payload).contains("too large"));
    assert!(read_to_end(&mut stream).is_empty());

    // the server keeps serving afterwards
    let mut next = connect(&server);
    send(&mut next, &Message::Open(open_rgb(CompoundMap::new())));
    let (msg_type, _) = blocking::read_frame(&mut next, 16).unwrap();
    assert_eq!(msg_type, MessageType::Open);
}

#[test]
fn data_before_open_gets_no_reply() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);

    send(
        &mut stream,
        &Message::Data(ImageData {
            region: square(2),
            data: vec![0.0; 4],
        }),
    );
    assert!(read_to_end(&mut stream).is_empty());
    assert!(recorder.regions.lock().unwrap().is_empty());
}

#[test]
fn close_before_open_gets_no_reply() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);

    send(&mut stream, &Message::Close);
    assert!(read_to_end(&mut stream).is_empty());
    assert!(!*recorder.closed.lock().unwrap());
}

#[test]
fn unknown_driver_type_reports_exception() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);

    let mut parameters = CompoundMap::new();
    parameters.insert(DRIVER_TYPE_PARAMETER.into(), Data::from("Framebuffer"));
    send(&mut stream, &Message::Open(open_rgb(parameters)));

    let (msg_type, payload) = blocking::read_frame(&mut stream, 1 << 20).unwrap();
    assert_eq!(msg_type, MessageType::Exception);
    assert_eq!(payload.last(), Some(&0));
    assert_eq!(
        codec::exception_text(&payload),
        "unknown display driver type: Framebuffer"
    );
    assert!(read_to_end(&mut stream).is_empty());
}

#[test]
fn sessions_are_independent() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());

    let mut first = connect(&server);
    let mut second = connect(&server);
    send(&mut first, &Message::Open(open_rgb(CompoundMap::new())));
    send(&mut second, &Message::Open(open_rgb(CompoundMap::new())));

    for stream in [&mut first, &mut second] {
        let (msg_type, payload) = blocking::read_frame(stream, 16).unwrap();
        assert_eq!(msg_type, MessageType::Open);
        assert_eq!(payload, vec![1]);
    }

    // a protocol error on one connection leaves the other open
    first.write_all(&[0u8; HEADER_SIZE]).unwrap();
    assert!(read_to_end(&mut first).is_empty());

    send(&mut second, &Message::Close);
    let (msg_type, _) = blocking::read_frame(&mut second, 16).unwrap();
    assert_eq!(msg_type, MessageType::Close);
}

#[test]
fn client_driver_streams_image_into_store() {
    let recorder = Recorder::default();
    let store = ImageStore::new();
    let server = start_server(&recorder, &store);

    let mut parameters = CompoundMap::new();
    parameters.insert(DRIVER_TYPE_PARAMETER.into(), Data::from(IMAGE_DRIVER_TYPE));
    parameters.insert("handle".into(), Data::from("beauty"));
    parameters.insert("displayHost".into(), Data::from("127.0.0.1"));
    parameters.insert("displayPort".into(), Data::from(server.port().to_string()));
    let open = OpenParameters {
        display_window: square(4),
        data_window: Box2i::from_coords(0, 0, 3, 1),
        channel_names: vec!["Y".into()],
        parameters,
    };

    let mut client = ClientDisplayDriver::new(&open).unwrap();
    assert!(!client.scan_line_order_only());
    for y in 0..2 {
        let line: Vec<f32> = (0..4).map(|x| (y * 4 + x) as f32).collect();
        client
            .image_data(&Box2i::from_coords(0, y, 3, y), &line)
            .unwrap();
    }
    client.image_close().unwrap();

    let image = store.get("beauty").unwrap();
    assert_eq!(image.pixel("Y", 3, 1), Some(7.0));
    assert_eq!(image.channel("Y").unwrap().len(), 8);
    assert!(recorder.regions.lock().unwrap().is_empty());
}

#[test]
fn client_driver_surfaces_remote_exception() {
    let recorder = Recorder::default();
    let store = ImageStore::new();
    let server = start_server(&recorder, &store);

    let mut parameters = CompoundMap::new();
    parameters.insert(DRIVER_TYPE_PARAMETER.into(), Data::from(IMAGE_DRIVER_TYPE));
    let open = OpenParameters {
        display_window: square(4),
        data_window: square(4),
        channel_names: Vec::new(),
        parameters,
    };

    let err = ClientDisplayDriver::connect(server.local_addr(), &open).unwrap_err();
    assert!(matches!(err, DriverError::Protocol(_)));
    assert_eq!(err.to_string(), "remote exception: invalid image format: no channels");
}

#[test]
fn dropping_server_waits_for_session() {
    let recorder = Recorder::default();
    let server = start_server(&recorder, &ImageStore::new());
    let mut stream = connect(&server);
    send(&mut stream, &Message::Open(open_rgb(CompoundMap::new())));
    let (msg_type, _) = blocking::read_frame(&mut stream, 16).unwrap();
    assert_eq!(msg_type, MessageType::Open);

    let dropper = std::thread::spawn(move || drop(server));
    send(&mut stream, &Message::Close);
    let (msg_type, _) = blocking::read_frame(&mut stream, 16).unwrap();
    assert_eq!(msg_type, MessageType::Close);
    dropper.join().unwrap();
    assert!(*recorder.closed.lock().unwrap());
}

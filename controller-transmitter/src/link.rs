use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use shared_definitions::{ControlEvent, FrameAccumulator};

const READ_BUFFER_SIZE: usize = 1024;

/// Operator end of the control link.
pub struct LinkClient {
    stream: TcpStream,
}

impl LinkClient {
    /// Connects and announces itself with CONNECTED.
    pub fn connect(address: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        let mut client = LinkClient { stream };
        client.send(&ControlEvent::Connected)?;
        Ok(client)
    }

    pub fn send(&mut self, event: &ControlEvent) -> io::Result<()> {
        self.stream.write_all(event.to_frame().as_bytes())
    }

    /// Second handle on the same connection for the receiving side.
    pub fn reader(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }
}

/// Hands every valid event the vehicle sends to `on_event` until the
/// connection closes. Invalid frames are logged and skipped.
pub fn read_events<R: Read>(mut reader: R, mut on_event: impl FnMut(ControlEvent)) -> io::Result<()> {
    let mut accumulator = FrameAccumulator::default();
    let mut buffer = [0_u8; READ_BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        for frame in accumulator.push(&buffer[..read]) {
            match frame.and_then(|frame| ControlEvent::from_frame(&frame)) {
                Ok(event) => on_event(event),
                Err(err) => log::warn!("Ignoring frame from vehicle: {}", err),
            }
        }
    }
}

pub fn print_vehicle_event(event: ControlEvent) {
    match event {
        ControlEvent::Telemetry(record) => println!("{:>10} {}", record.name, record.value),
        ControlEvent::Connected => log::info!("Vehicle acknowledged the connection"),
        other => log::warn!("Unexpected {} from vehicle", other.tag()),
    }
}

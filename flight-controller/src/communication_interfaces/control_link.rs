use std::{
    io::{self, Read, Write},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use shared_definitions::{
    framing::EMPTY_PAYLOAD, ControlEvent, EventTag, FrameAccumulator, ProtocolError, RawFrame,
};

use crate::{config::LinkConfig, shared_core_values::AppContext, util::error::AppError};

const READ_POLL_INTERVAL: Duration = Duration::from_millis(200);
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Write half of the current operator connection, shared with the
/// telemetry reporter. Empty while nobody is connected.
#[derive(Default)]
pub struct LinkWriter {
    stream: Mutex<Option<TcpStream>>,
}

impl LinkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, stream: TcpStream) {
        *self.stream.lock().unwrap_or_else(PoisonError::into_inner) = Some(stream);
    }

    fn detach(&self) {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_connected(&self) -> bool {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns false when there was no connection to send on. A failed or
    /// timed out write drops the connection handle, the receiver notices the
    /// reset on its own.
    pub fn send(&self, event: &ControlEvent) -> Result<bool, AppError> {
        let mut stream_lock = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stream) = stream_lock.as_mut() else {
            return Ok(false);
        };
        if let Err(err) = stream.write_all(event.to_frame().as_bytes()) {
            stream_lock.take();
            return Err(err.into());
        }
        Ok(true)
    }
}

/// Reads frames from `reader` until it closes, handing each complete frame to
/// `dispatch` in arrival order. Frames that fail to parse or dispatch are
/// logged and dropped, the connection stays up. A peer that sends nothing for
/// `idle_timeout` counts as gone.
pub fn serve_stream<R: Read>(
    mut reader: R,
    config: &LinkConfig,
    should_stop: impl Fn() -> bool,
    dispatch: &mut impl FnMut(&RawFrame) -> Result<(), ProtocolError>,
) -> io::Result<()> {
    let mut accumulator = FrameAccumulator::new(config.max_pending_bytes);
    let mut buffer = vec![0_u8; config.read_buffer_size];
    let mut last_received = Instant::now();

    while !should_stop() {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                if last_received.elapsed() >= config.idle_timeout {
                    log::warn!(
                        "Nothing received for {:?}, dropping the connection",
                        config.idle_timeout
                    );
                    return Ok(());
                }
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::ConnectionReset => return Ok(()),
            Err(err) => return Err(err),
        };
        last_received = Instant::now();

        for result in accumulator.push(&buffer[..read]) {
            match result {
                Ok(frame) => {
                    if let Err(err) = dispatch(&frame) {
                        log::warn!("Rejected {} frame: {}", frame.event, err);
                    }
                }
                Err(err) => log::warn!("Dropping malformed input: {}", err),
            }
        }
    }
    Ok(())
}

pub fn bind(config: &LinkConfig) -> Result<TcpListener, AppError> {
    let listener = TcpListener::bind(config.bind_address())?;
    log::info!("Control link listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Connects to the server once so a blocked `accept` returns and the
/// shutdown flag gets checked.
pub fn wake_listener(mut address: SocketAddr) {
    if address.ip().is_unspecified() {
        address.set_ip(Ipv4Addr::LOCALHOST.into());
    }
    if let Err(err) = TcpStream::connect_timeout(&address, ACCEPT_RETRY_DELAY) {
        log::debug!("Could not wake control link listener: {}", err);
    }
}

/// Accepts one operator at a time. When a connection ends the server goes
/// back to accepting, it only returns on shutdown.
pub struct ControlLinkServer<'a> {
    listener: TcpListener,
    config: LinkConfig,
    context: &'a AppContext,
    writer: &'a LinkWriter,
}

impl<'a> ControlLinkServer<'a> {
    pub fn new(
        listener: TcpListener,
        config: &LinkConfig,
        context: &'a AppContext,
        writer: &'a LinkWriter,
    ) -> Self {
        ControlLinkServer {
            listener,
            config: config.clone(),
            context,
            writer,
        }
    }

    pub fn run(
        &self,
        mut dispatch: impl FnMut(&RawFrame) -> Result<(), ProtocolError>,
    ) -> Result<(), AppError> {
        loop {
            let accepted = self.listener.accept();
            if self.context.flags.is_shutting_down() {
                break;
            }
            match accepted {
                Ok((stream, peer)) => {
                    log::info!("Operator connected from {}", peer);
                    if let Err(err) = self.serve_connection(stream, &mut dispatch) {
                        log::warn!("Connection with {} failed: {}", peer, err);
                    }
                    self.writer.detach();
                    log::info!("Connection with {} closed, listening again", peer);
                }
                Err(err) => {
                    log::warn!("Accept failed: {}", err);
                    thread::sleep(ACCEPT_RETRY_DELAY);
                }
            }
        }
        log::info!("Control link stopped");
        Ok(())
    }

    fn serve_connection(
        &self,
        stream: TcpStream,
        dispatch: &mut impl FnMut(&RawFrame) -> Result<(), ProtocolError>,
    ) -> Result<(), AppError> {
        stream.set_read_timeout(Some(READ_POLL_INTERVAL.min(self.config.idle_timeout)))?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        stream.set_nodelay(true)?;
        self.writer.attach(stream.try_clone()?);
        self.writer.send(&ControlEvent::Connected)?;

        let connected = RawFrame {
            event: EventTag::Connected.to_string(),
            payload: EMPTY_PAYLOAD.to_string(),
        };
        if let Err(err) = dispatch(&connected) {
            log::warn!("Rejected CONNECTED: {}", err);
        }

        serve_stream(
            &stream,
            &self.config,
            || self.context.flags.is_shutting_down(),
            dispatch,
        )?;
        Ok(())
    }
}

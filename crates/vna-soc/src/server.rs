// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-client TCP server: accept loop, command dispatch, start/pause/stop sequences.
//!
//! Serves exactly one client for its lifetime; a typed sentinel returned from
//! the dispatcher unwinds the accept loop on `stop_server` rather than being
//! treated as an error. Blocking `std::net` plus one producer `std::thread`
//! is favoured here over an async runtime for the transport loop.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use vna_protocol::{Command, BYTES_PER_POINT, POINTS_PER_PACKET, RESPONSE_ERR, RESPONSE_OK, TCP_PORT};

use crate::dma::DmaChannel;
use crate::error::Error;
use crate::mmio_adapter::RegisterFile;
use crate::pl::PlInterface;
use crate::queue::{Point, PointQueue, GET_TIMEOUT};
use crate::sysinfo::cpu_temp;

/// Why `serve_client` returned.
enum Outcome {
    /// The client closed its end of the connection.
    ClientClosed,
    /// The client sent `!`; the server must tear itself down.
    StopRequested,
}

/// Owns the PL hardware resource and the bounded point queue, and serves exactly one
/// TCP client for its lifetime.
pub struct Server<R: RegisterFile, D: DmaChannel> {
    pl: Arc<Mutex<PlInterface<R, D>>>,
    queue: Arc<PointQueue>,
    port: u16,
}

impl<R, D> Server<R, D>
where
    R: RegisterFile + 'static,
    D: DmaChannel + 'static,
{
    /// Builds a server around an already-constructed PL interface.
    pub fn new(pl: PlInterface<R, D>, port: u16) -> Self {
        Self {
            pl: Arc::new(Mutex::new(pl)),
            queue: Arc::new(PointQueue::new()),
            port,
        }
    }

    /// Builds a server listening on the wire protocol's default port.
    pub fn with_default_port(pl: PlInterface<R, D>) -> Self {
        Self::new(pl, TCP_PORT)
    }

    /// Runs the accept/dispatch loop until the client disconnects or sends `!`.
    ///
    /// Spawns the DMA producer thread for the duration of the call and always tears it
    /// down before returning, even on error — mirroring `stop_server`'s unconditional
    /// `exit` / `pause_dma` / join / PL-disable sequence.
    pub fn run(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))?;
        log::info!("[server] listening on port {}", self.port);

        let producer_pl = self.pl.clone();
        let producer_queue = self.queue.clone();
        let producer = thread::spawn(move || {
            producer_queue.keep_fetching(|| producer_pl.lock().get_data());
        });

        let result = self.accept_loop(&listener);

        self.queue.request_exit();
        self.queue.resume_fetch(); // wake the producer if it is parked waiting on fetch
        if producer.join().is_err() {
            log::error!("[server] producer thread panicked");
        }
        if let Err(e) = self.pl.lock().set_enabled(false) {
            log::warn!("[server] failed to disable PL during shutdown: {e}");
        }
        log::info!("[server] stopped");
        result
    }

    fn accept_loop(&self, listener: &TcpListener) -> Result<(), Error> {
        let (stream, addr) = listener.accept()?;
        log::info!("[server] client connected: {addr}");
        match self.serve_client(stream)? {
            Outcome::ClientClosed => log::info!("[server] client disconnected"),
            Outcome::StopRequested => log::info!("[server] stop requested by client"),
        }
        Ok(())
    }

    fn serve_client(&self, stream: TcpStream) -> Result<Outcome, Error> {
        stream.set_nodelay(true).ok();
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        loop {
            let mut header = [0u8; 1];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(Outcome::ClientClosed)
                }
                Err(e) => return Err(e.into()),
            }
            if let Some(stop) = self.dispatch(header[0], &mut reader, &mut writer)? {
                return Ok(stop);
            }
        }
    }

    fn dispatch(
        &self,
        byte: u8,
        reader: &mut BufReader<TcpStream>,
        writer: &mut TcpStream,
    ) -> Result<Option<Outcome>, Error> {
        let Some(cmd) = Command::from_byte(byte) else {
            log::warn!("[server] unknown command byte {byte:#x}");
            writer.write_all(&[RESPONSE_ERR])?;
            return Ok(None);
        };

        match cmd {
            Command::StopServer => {
                writer.write_all(&[RESPONSE_OK])?;
                return Ok(Some(Outcome::StopRequested));
            }
            Command::Data => self.handle_get_data(writer)?,
            Command::QueueSize => writer.write_all(&self.queue.size_be_bytes())?,
            Command::CpuTemp => writer.write_all(&cpu_temp().to_be_bytes())?,
            Command::RunPl => {
                let arg = read_decimal_argument(reader)?;
                let result = if arg != 0 { self.start_dma() } else { self.pause_dma() };
                respond(writer, result)?;
            }
            _ if cmd.is_mmio_config() => {
                let arg = read_decimal_argument(reader)?;
                let result = self
                    .pl
                    .lock()
                    .mmio()
                    .write(cmd, arg as f64)
                    .map_err(Error::from);
                respond(writer, result)?;
            }
            _ => unreachable!("every Command variant is handled above"),
        }
        Ok(None)
    }

    /// `request-data`: drains up to `POINTS_PER_PACKET` points into one binary packet.
    ///
    /// Blocks in `GET_TIMEOUT` slices; flushes a short packet as soon as it has at least
    /// one point and the queue goes quiet, and replies `?` if nothing was ever collected
    /// and the producer reports itself paused. Never blocks forever.
    fn handle_get_data(&self, writer: &mut TcpStream) -> Result<(), Error> {
        let mut packet = Vec::with_capacity(POINTS_PER_PACKET * BYTES_PER_POINT);
        let mut points_packed = 0usize;
        loop {
            match self.queue.get(GET_TIMEOUT) {
                Ok(point) => {
                    append_point(&mut packet, point);
                    points_packed += 1;
                    if points_packed == POINTS_PER_PACKET {
                        break;
                    }
                }
                Err(_timed_out) => {
                    if points_packed > 0 {
                        break;
                    }
                    if self.queue.is_paused() {
                        writer.write_all(&[RESPONSE_ERR])?;
                        return Ok(());
                    }
                    // Queue is empty but still actively fetching: keep waiting.
                }
            }
        }
        writer.write_all(&packet)?;
        Ok(())
    }

    /// `run-PL 1`: verify configuration, pause, flush, enable, resume.
    ///
    /// Order is load-bearing: enabling the PL before flushing would let a stale sample
    /// from the previous sweep land in the fresh one.
    fn start_dma(&self) -> Result<(), Error> {
        self.pl.lock().verify_config()?;
        self.queue.request_pause();
        self.queue.wait_until_paused();
        self.queue.flush();
        self.pl.lock().set_enabled(true)?;
        self.queue.resume_fetch();
        Ok(())
    }

    /// `run-PL 0`: pause the producer, then disable the PL.
    fn pause_dma(&self) -> Result<(), Error> {
        self.queue.request_pause();
        self.queue.wait_until_paused();
        self.pl.lock().set_enabled(false)?;
        Ok(())
    }
}

fn append_point(packet: &mut Vec<u8>, point: Point) {
    packet.extend_from_slice(&point.0.to_be_bytes());
    packet.extend_from_slice(&point.1.to_be_bytes());
    packet.extend_from_slice(&point.2.to_be_bytes());
    packet.extend_from_slice(&point.3.to_be_bytes());
}

fn read_decimal_argument(reader: &mut BufReader<TcpStream>) -> Result<i64, Error> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    let text = std::str::from_utf8(&line).unwrap_or("").trim();
    text.parse::<i64>()
        .map_err(|_| Error::MalformedArgument(text.to_string()))
}

fn respond(writer: &mut TcpStream, result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Ok(()) => Ok(writer.write_all(&[RESPONSE_OK])?),
        Err(e) => {
            log::warn!("[server] command failed: {e}");
            Ok(writer.write_all(&[RESPONSE_ERR])?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::SimDmaChannel;
    use crate::mmio_adapter::SimRegisterFile;
    use std::io::Write as _;
    use std::net::TcpStream as StdTcpStream;

    fn spawn_server() -> (u16, thread::JoinHandle<Result<(), Error>>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let pl = PlInterface::new(SimRegisterFile::new(), SimDmaChannel::new());
        let server = Server::new(pl, port);
        let handle = thread::spawn(move || server.run());
        // Give the listener a moment to bind before the test connects.
        thread::sleep(std::time::Duration::from_millis(50));
        (port, handle)
    }

    #[test]
    fn stop_command_tears_down_the_server() {
        let (port, handle) = spawn_server();
        let mut conn = StdTcpStream::connect(("127.0.0.1", port)).unwrap();
        conn.write_all(b"!").unwrap();
        let mut resp = [0u8; 1];
        conn.read_exact(&mut resp).unwrap();
        assert_eq!(resp[0], RESPONSE_OK);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn queue_size_is_two_bytes_big_endian() {
        let (port, handle) = spawn_server();
        let mut conn = StdTcpStream::connect(("127.0.0.1", port)).unwrap();
        conn.write_all(b"q").unwrap();
        let mut resp = [0u8; 2];
        conn.read_exact(&mut resp).unwrap();
        assert_eq!(u16::from_be_bytes(resp), 0);
        conn.write_all(b"!").unwrap();
        let mut stop_resp = [0u8; 1];
        conn.read_exact(&mut stop_resp).unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn config_write_then_run_pl_then_data_round_trips() {
        let (port, handle) = spawn_server();
        let mut conn = StdTcpStream::connect(("127.0.0.1", port)).unwrap();

        for (byte, value) in [(b'a', 2), (b'p', 1000), (b'g', 100), (b't', 10)] {
            conn.write_all(&[byte]).unwrap();
            conn.write_all(format!("{value}\n").as_bytes()).unwrap();
            let mut resp = [0u8; 1];
            conn.read_exact(&mut resp).unwrap();
            assert_eq!(resp[0], RESPONSE_OK, "command {byte} failed");
        }

        conn.write_all(b"r").unwrap();
        conn.write_all(b"1\n").unwrap();
        let mut resp = [0u8; 1];
        conn.read_exact(&mut resp).unwrap();
        assert_eq!(resp[0], RESPONSE_OK);

        conn.write_all(b"d").unwrap();
        let mut packet = vec![0u8; BYTES_PER_POINT];
        conn.read_exact(&mut packet).unwrap();
        let sample = f64::from_be_bytes(packet[0..8].try_into().unwrap());
        assert!(sample.is_finite());

        conn.write_all(b"!").unwrap();
        let mut stop_resp = [0u8; 1];
        conn.read_exact(&mut stop_resp).unwrap();
        handle.join().unwrap().unwrap();
    }
}

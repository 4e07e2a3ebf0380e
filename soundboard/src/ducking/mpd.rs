//! MPD client
//!
//! Minimal client for the MPD line protocol: the server greets with
//! `OK MPD <version>`, every command is one line, and every response is a
//! list of `key: value` lines terminated by `OK` or `ACK [...] message`.
//!
//! The connection is opened lazily, re-opened once when a command finds it
//! broken, and kept warm by a `mpd-keepalive` thread that pings it (MPD drops
//! idle clients).

use super::{BackgroundPlayer, PlayerState, PlayerStatus};
use crate::error::{Error, Result};
use soundboard_common::config::MpdConfig;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Server reply to one command
enum Reply {
    Ok(Vec<(String, String)>),
    /// `ACK` line sent by the server
    Ack(String),
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    fn open(addr: &str, password: Option<&str>, timeout: Duration) -> io::Result<Self> {
        let socket_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", addr)))?;

        let stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };

        let banner = conn.read_line()?;
        if !banner.starts_with("OK MPD") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected greeting: {}", banner),
            ));
        }
        debug!("Connected to {} ({})", addr, banner);

        if let Some(password) = password {
            match conn.command(&format!("password {}", quote(password)))? {
                Reply::Ok(_) => {}
                Reply::Ack(message) => {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, message));
                }
            }
        }

        Ok(conn)
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    fn command(&mut self, command: &str) -> io::Result<Reply> {
        debug!("mpd <- {}", command);
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut pairs = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "OK" {
                return Ok(Reply::Ok(pairs));
            }
            if line.starts_with("ACK") {
                return Ok(Reply::Ack(line));
            }
            if let Some((key, value)) = line.split_once(": ") {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }
}

/// Quote an argument for the MPD protocol
fn quote(arg: &str) -> String {
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn parse_status(pairs: &[(String, String)]) -> PlayerStatus {
    let mut status = PlayerStatus {
        state: PlayerState::Stop,
        volume: None,
    };

    for (key, value) in pairs {
        match key.as_str() {
            "state" => {
                status.state = match value.as_str() {
                    "play" => PlayerState::Play,
                    "pause" => PlayerState::Pause,
                    _ => PlayerState::Stop,
                }
            }
            // -1 means MPD has no mixer
            "volume" => status.volume = value.parse::<i32>().ok().and_then(|v| u8::try_from(v).ok()),
            _ => {}
        }
    }

    status
}

struct Shared {
    addr: String,
    password: Option<String>,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connect(&self) -> io::Result<Connection> {
        Connection::open(&self.addr, self.password.as_deref(), self.timeout)
    }

    fn unreachable(&self, e: io::Error) -> Error {
        Error::Connectivity(format!("MPD at {} unreachable: {}", self.addr, e))
    }

    /// Run a command, reconnecting and retrying once if an existing
    /// connection turned out to be broken.
    ///
    /// A failed connect is not retried; callers hold the playback lock.
    fn run(&self, command: &str) -> Result<Vec<(String, String)>> {
        let mut guard = self.lock();

        let reused = guard.is_some();
        if !reused {
            *guard = Some(self.connect().map_err(|e| self.unreachable(e))?);
        }

        let reply = match Self::exchange(&mut guard, command) {
            Err(e) if reused => {
                debug!("MPD connection broken ({}), reconnecting", e);
                *guard = Some(self.connect().map_err(|e| self.unreachable(e))?);
                Self::exchange(&mut guard, command)
            }
            other => other,
        };

        match reply.map_err(|e| self.unreachable(e))? {
            Reply::Ok(pairs) => Ok(pairs),
            Reply::Ack(message) => Err(Error::Connectivity(format!(
                "MPD rejected '{}': {}",
                command, message
            ))),
        }
    }

    /// Send one command on the open connection; an I/O failure drops it
    fn exchange(slot: &mut Option<Connection>, command: &str) -> io::Result<Reply> {
        let conn = slot
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no connection"))?;
        let result = conn.command(command);
        if result.is_err() {
            *slot = None;
        }
        result
    }

    /// Ping an open connection; a failed ping drops it
    fn ping(&self) {
        let mut guard = self.lock();
        if let Some(conn) = guard.as_mut() {
            match conn.command("ping") {
                Ok(Reply::Ok(_)) => {}
                Ok(Reply::Ack(message)) => debug!("MPD ping rejected: {}", message),
                Err(e) => {
                    debug!("MPD keep-alive failed, dropping connection: {}", e);
                    *guard = None;
                }
            }
        }
    }
}

/// [`BackgroundPlayer`] backed by an MPD server
pub struct MpdClient {
    shared: Arc<Shared>,
}

impl MpdClient {
    pub fn new(config: &MpdConfig) -> Result<Self> {
        let interval = config.keepalive_interval();
        Self::with_options(
            format!("{}:{}", config.host, config.port),
            config.password.clone(),
            config.timeout(),
            (!interval.is_zero()).then_some(interval),
        )
    }

    /// Create a client; `keepalive` of None disables the ping thread
    pub fn with_options(
        addr: String,
        password: Option<String>,
        timeout: Duration,
        keepalive: Option<Duration>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            addr,
            password,
            timeout,
            connection: Mutex::new(None),
        });

        if let Some(interval) = keepalive {
            let weak = Arc::downgrade(&shared);
            thread::Builder::new()
                .name("mpd-keepalive".to_string())
                .spawn(move || keepalive_loop(weak, interval))
                .map_err(|e| Error::Internal(format!("Failed to spawn keep-alive thread: {}", e)))?;
        }

        info!("MPD client configured for {}", shared.addr);
        Ok(Self { shared })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().is_some()
    }
}

fn keepalive_loop(shared: Weak<Shared>, interval: Duration) {
    debug!("MPD keep-alive started");
    loop {
        thread::sleep(interval);
        // Exits once the client is gone
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.ping();
    }
    debug!("MPD keep-alive stopped");
}

impl BackgroundPlayer for MpdClient {
    fn status(&self) -> Result<PlayerStatus> {
        let pairs = self.shared.run("status")?;
        Ok(parse_status(&pairs))
    }

    fn set_volume(&self, volume: u8) -> Result<()> {
        self.shared.run(&format!("setvol {}", volume.min(100)))?;
        Ok(())
    }

    fn toggle_pause(&self) -> Result<()> {
        self.shared.run("pause")?;
        Ok(())
    }
}

impl Drop for MpdClient {
    fn drop(&mut self) {
        if let Some(mut conn) = self.shared.lock().take() {
            if let Err(e) = conn.writer.write_all(b"close\n") {
                warn!("Failed to close MPD connection: {}", e);
            }
        }
    }
}

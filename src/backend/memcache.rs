//! Minimal memcached client: `set` over the text protocol

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{BackendError, KvStore};

/// memcached refuses keys longer than this
const MAX_KEY_LENGTH: usize = 250;
const MAX_IDLE_CONNECTIONS: usize = 4;

type Connection = BufReader<TcpStream>;

/// One memcached server. Cheap to share behind an `Arc`.
///
/// Each `set` checks a connection out of the idle pool (dialing a fresh one
/// when the pool is empty) so concurrent workers never share a socket.
/// Connections that saw an error are dropped instead of returned.
#[derive(Debug)]
pub struct MemcacheClient {
    address: String,
    socket_addr: SocketAddr,
    io_timeout: Duration,
    idle: Mutex<Vec<Connection>>,
}

impl MemcacheClient {
    /// Resolve `address` and open the first connection
    pub fn connect(address: &str, io_timeout: Duration) -> Result<Self, BackendError> {
        let socket_addr = address
            .to_socket_addrs()
            .map_err(|source| BackendError::Resolve {
                address: address.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| BackendError::NoAddress(address.to_string()))?;

        let client = Self {
            address: address.to_string(),
            socket_addr,
            io_timeout,
            idle: Mutex::new(Vec::with_capacity(MAX_IDLE_CONNECTIONS)),
        };
        let first = client.dial()?;
        client.checkin(first);
        Ok(client)
    }

    fn dial(&self) -> Result<Connection, BackendError> {
        let connect_err = |source| BackendError::Connect {
            address: self.address.clone(),
            source,
        };
        let stream =
            TcpStream::connect_timeout(&self.socket_addr, self.io_timeout).map_err(connect_err)?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .map_err(connect_err)?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        Ok(BufReader::new(stream))
    }

    fn idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        // A panic while holding the lock cannot leave the Vec half-updated
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn checkout(&self) -> Result<Connection, BackendError> {
        let pooled = self.idle().pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => self.dial(),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }

    fn io_error(&self, source: std::io::Error) -> BackendError {
        BackendError::Io {
            address: self.address.clone(),
            source,
        }
    }

    fn roundtrip(&self, conn: &mut Connection, request: &[u8]) -> Result<String, BackendError> {
        let stream = conn.get_mut();
        stream.write_all(request).map_err(|e| self.io_error(e))?;
        stream.flush().map_err(|e| self.io_error(e))?;

        let mut reply = String::new();
        let read = conn.read_line(&mut reply).map_err(|e| self.io_error(e))?;
        if read == 0 {
            return Err(self.io_error(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(reply.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl KvStore for MemcacheClient {
    fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        validate_key(key)?;

        let mut request = Vec::with_capacity(key.len() + value.len() + 32);
        request.extend_from_slice(format!("set {} 0 0 {}\r\n", key, value.len()).as_bytes());
        request.extend_from_slice(value);
        request.extend_from_slice(b"\r\n");

        let mut conn = self.checkout()?;
        let reply = self.roundtrip(&mut conn, &request)?;
        if reply == "STORED" {
            self.checkin(conn);
            Ok(())
        } else {
            Err(BackendError::Rejected {
                address: self.address.clone(),
                reply,
            })
        }
    }

    fn address(&self) -> &str {
        &self.address
    }
}

fn validate_key(key: &str) -> Result<(), BackendError> {
    let legal = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key.bytes().all(|b| b > b' ' && b != 0x7f);
    if legal {
        Ok(())
    } else {
        Err(BackendError::MalformedKey(key.to_string()))
    }
}

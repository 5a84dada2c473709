use crate::command;
use crate::error::{HoardError, HoardResult};
use crate::pool::Pool;
use crate::store::Store;
use crate::wire::{self, Parsed};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

/// Bytes pulled off the socket in one read burst.
pub const READ_CHUNK_BYTES : usize = 64 * 1024;

/// Byte buffer with append-at-tail, consume-at-head semantics. The head
/// advances without shifting; the backing storage is compacted once the
/// dead prefix outgrows the live payload.
pub struct Buf {
   pub data  : Vec<u8>,
   pub start : usize,
}

impl Buf {
   pub fn new() -> Buf {
      Buf { data: Vec::new(), start: 0 }
   }

   pub fn len(&self) -> usize {
      self.data.len() - self.start
   }

   pub fn is_empty(&self) -> bool {
      self.start == self.data.len()
   }

   pub fn as_slice(&self) -> &[u8] {
      &self.data[self.start..]
   }

   pub fn extend(&mut self, bytes: &[u8]) {
      self.data.extend_from_slice(bytes);
   }

   pub fn consume(&mut self, used: usize) {
      self.start += used;
      debug_assert!(self.start <= self.data.len());
      if self.is_empty() {
         self.data.clear();
         self.start = 0;
      } else if self.start > 4096 && self.start * 2 > self.data.len() {
         self.data.drain(..self.start);
         self.start = 0;
      }
   }
}

/// Per-connection socket state. The `want_*` flags are derived from the
/// buffer state after every step and drive the next readiness set.
pub struct Conn {
   pub stream         : TcpStream,
   pub want_read      : bool,
   pub want_write     : bool,
   pub want_close     : bool,
   pub incoming       : Buf,
   pub outgoing       : Buf,
   pub last_active_ms : u64,
}

impl Conn {
   pub fn new(stream: TcpStream, now_ms: u64) -> Conn {
      Conn {
         stream         : stream,
         want_read      : true,
         want_write     : false,
         want_close     : false,
         incoming       : Buf::new(),
         outgoing       : Buf::new(),
         last_active_ms : now_ms,
      }
   }
}

/// One read burst: pull bytes, run every complete pipelined request, and
/// queue the framed replies. Flips to write interest once replies are
/// pending, with one optimistic flush.
///
/// Returns the number of bytes moved in either direction, so the caller
/// can tell real traffic from a spurious wakeup. Framing violations and
/// hard socket failures come back as errors; the caller closes the
/// connection on those.
pub fn handle_read(conn: &mut Conn, store: &mut Store, pool: &Pool, now_us: u64) -> HoardResult<usize> {
   let mut chunk = [0u8; READ_CHUNK_BYTES];
   let received = match conn.stream.read(&mut chunk) {
      Ok(0) => {
         if !conn.incoming.is_empty() {
            return Err(HoardError::Protocol("eof inside a partial request"));
         }
         conn.want_close = true;
         return Ok(0);
      }
      Ok(received) => received,
      Err(ref err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
      Err(ref err) if err.kind() == ErrorKind::Interrupted => return Ok(0),
      Err(err) => return Err(err.into()),
   };
   conn.incoming.extend(&chunk[..received]);

   loop {
      match wire::parse_request(conn.incoming.as_slice()) {
         Parsed::Pending => break,
         Parsed::Malformed => return Err(HoardError::Protocol("malformed request frame")),
         Parsed::Request { args, consumed } => {
            let reply = command::dispatch(&args, store, pool, now_us);
            wire::append_response(&mut conn.outgoing.data, &reply);
            conn.incoming.consume(consumed);
         }
      }
   }

   let mut flushed = 0;
   if !conn.outgoing.is_empty() {
      conn.want_read = false;
      conn.want_write = true;
      flushed = handle_write(conn)?;
   }
   Ok(received + flushed)
}

/// One write burst, returning the bytes drained. Interest flips back to
/// reading once the reply buffer empties.
pub fn handle_write(conn: &mut Conn) -> HoardResult<usize> {
   if conn.outgoing.is_empty() {
      conn.want_write = false;
      conn.want_read = true;
      return Ok(0);
   }

   match conn.stream.write(conn.outgoing.as_slice()) {
      Ok(written) => {
         conn.outgoing.consume(written);
         if conn.outgoing.is_empty() {
            conn.want_write = false;
            conn.want_read = true;
         }
         Ok(written)
      }
      Err(ref err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
      Err(ref err) if err.kind() == ErrorKind::Interrupted => Ok(0),
      Err(err) => Err(err.into()),
   }
}

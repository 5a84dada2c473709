#[cfg(test)]
mod tests;
mod conn;
mod idle;

use crate::error::HoardResult;
use crate::pool::{Pool, WORKER_COUNT};
use crate::store::Store;
use conn::Conn;
use idle::IdleQueue;
use log::{debug, info, warn};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::os::unix::io::AsRawFd;
use std::time::Instant;

/// Connections with no activity for this long are destroyed.
pub const IDLE_TIMEOUT_MS : u64 = 5000;

/// The server: one listener, one poll(2)-driven event loop, and the
/// keyspace it guards. All command execution happens on the loop thread;
/// the worker pool only ever receives fully detached values.
pub struct Server {
   listener : TcpListener,
   conns    : Vec<Option<Conn>>,
   idle     : IdleQueue,
   store    : Store,
   pool     : Pool,
   start    : Instant,
}

impl Server {
   pub fn new<A: ToSocketAddrs>(addr: A) -> HoardResult<Server> {
      let listener = TcpListener::bind(addr)?;
      listener.set_nonblocking(true)?;
      info!("listening on {}", listener.local_addr()?);

      Ok(Server {
         listener : listener,
         conns    : Vec::new(),
         idle     : IdleQueue::new(),
         store    : Store::new(),
         pool     : Pool::new(WORKER_COUNT),
         start    : Instant::now(),
      })
   }

   pub fn local_addr(&self) -> HoardResult<SocketAddr> {
      Ok(self.listener.local_addr()?)
   }

   /// Runs the event loop until a fatal error. Per-connection failures
   /// only ever cost that connection; listener hiccups are logged and
   /// survived.
   pub fn run(&mut self) -> HoardResult<()> {
      loop {
         self.tick()?;
      }
   }

   /// One loop iteration: reap closing connections, wait for readiness or
   /// the nearest deadline, drain I/O, then run the idle and TTL timers
   /// against a single clock sample.
   fn tick(&mut self) -> HoardResult<()> {
      for slot in 0..self.conns.len() {
         if self.conns[slot].as_ref().map_or(false, |conn| conn.want_close) {
            self.destroy(slot as u32);
         }
      }

      let mut pfds: Vec<libc::pollfd> = Vec::with_capacity(self.conns.len() + 1);
      pfds.push(libc::pollfd {
         fd      : self.listener.as_raw_fd(),
         events  : libc::POLLIN,
         revents : 0,
      });
      let mut owners: Vec<u32> = Vec::with_capacity(self.conns.len());
      for (slot, entry) in self.conns.iter().enumerate() {
         if let Some(conn) = entry {
            let mut events: libc::c_short = 0;
            if conn.want_read {
               events |= libc::POLLIN;
            }
            if conn.want_write {
               events |= libc::POLLOUT;
            }
            pfds.push(libc::pollfd {
               fd      : conn.stream.as_raw_fd(),
               events  : events,
               revents : 0,
            });
            owners.push(slot as u32);
         }
      }

      let timeout = self.next_timeout_ms(self.now_ms());
      let ready = unsafe { libc::poll(pfds.as_mut_ptr(), pfds.len() as libc::nfds_t, timeout) };
      if ready < 0 {
         let err = io::Error::last_os_error();
         if err.kind() == ErrorKind::Interrupted {
            return Ok(());
         }
         return Err(err.into());
      }

      let now_ms = self.now_ms();
      let now_us = now_ms * 1000;

      if pfds[0].revents != 0 {
         self.accept_ready(now_ms);
      }

      for (index, pfd) in pfds.iter().enumerate().skip(1) {
         if pfd.revents == 0 {
            continue;
         }
         let slot = owners[index - 1];
         let Server { ref mut conns, ref mut idle, ref mut store, ref pool, .. } = *self;
         let conn = conns[slot as usize].as_mut().unwrap();

         let mut processed = 0;
         if pfd.revents & libc::POLLIN != 0 {
            match conn::handle_read(conn, store, pool, now_us) {
               Ok(count) => processed += count,
               Err(err) => {
                  debug!("dropping connection on slot {}: {}", slot, err);
                  conn.want_close = true;
               }
            }
         }
         if pfd.revents & libc::POLLOUT != 0 && !conn.want_close {
            match conn::handle_write(conn) {
               Ok(count) => processed += count,
               Err(err) => {
                  debug!("dropping connection on slot {}: {}", slot, err);
                  conn.want_close = true;
               }
            }
         }
         if pfd.revents & libc::POLLERR != 0 {
            conn.want_close = true;
         }

         // A wakeup that moved no bytes is not activity; only real
         // traffic keeps a connection off the idle reaper.
         if processed > 0 {
            conn.last_active_ms = now_ms;
            idle.touch(slot);
         }
      }

      self.process_timers(now_ms, now_us);
      Ok(())
   }

   fn accept_ready(&mut self, now_ms: u64) {
      loop {
         match self.listener.accept() {
            Ok((stream, peer)) => {
               if let Err(err) = stream.set_nonblocking(true) {
                  warn!("failed to set {} non-blocking: {}", peer, err);
                  continue;
               }
               let slot = self.alloc_slot();
               debug!("accepted {} on slot {}", peer, slot);
               self.conns[slot as usize] = Some(Conn::new(stream, now_ms));
               self.idle.push_tail(slot);
            }
            Err(ref err) if err.kind() == ErrorKind::WouldBlock => break,
            Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
               warn!("accept failed: {}", err);
               break;
            }
         }
      }
   }

   fn process_timers(&mut self, now_ms: u64, now_us: u64) {
      while let Some(slot) = self.idle.head() {
         let last_active = self.conns[slot as usize].as_ref().unwrap().last_active_ms;
         if now_ms.saturating_sub(last_active) < IDLE_TIMEOUT_MS {
            break;
         }
         debug!("idle timeout on slot {}", slot);
         self.destroy(slot);
      }

      self.store.evict_expired(now_us, &self.pool);
   }

   /// Milliseconds until the nearest idle or TTL deadline; −1 blocks
   /// indefinitely when neither queue holds one.
   fn next_timeout_ms(&self, now_ms: u64) -> libc::c_int {
      let idle_deadline = self.idle.head().map(|slot| {
         self.conns[slot as usize].as_ref().unwrap().last_active_ms + IDLE_TIMEOUT_MS
      });
      let ttl_deadline = self.store.next_expiry_us().map(|deadline_us| deadline_us.div_ceil(1000));

      let deadline = match (idle_deadline, ttl_deadline) {
         (None, None) => return -1,
         (Some(idle), None) => idle,
         (None, Some(ttl)) => ttl,
         (Some(idle), Some(ttl)) => idle.min(ttl),
      };
      deadline.saturating_sub(now_ms).min(i32::MAX as u64) as libc::c_int
   }

   fn destroy(&mut self, slot: u32) {
      self.idle.unlink(slot);
      if let Some(conn) = self.conns[slot as usize].take() {
         debug!("closing connection on slot {} (fd {})", slot, conn.stream.as_raw_fd());
      }
   }

   fn alloc_slot(&mut self) -> u32 {
      for (slot, entry) in self.conns.iter().enumerate() {
         if entry.is_none() {
            return slot as u32;
         }
      }
      self.conns.push(None);
      (self.conns.len() - 1) as u32
   }

   fn now_ms(&self) -> u64 {
      self.start.elapsed().as_millis() as u64
   }
}

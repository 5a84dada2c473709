use crate::heap::{Heap, SlotRef};
use crate::pool::Pool;
use crate::table::Table;
use crate::zset::ZSet;
use log::debug;
use std::cell::Cell;
use std::rc::Rc;

#[cfg(test)]
mod tests;

/// Expirations processed per event-loop tick, at most.
pub const EXPIRE_BATCH : usize = 2000;
/// Sorted sets larger than this are torn down off-thread.
pub const LARGE_SET_LEN : usize = 1000;

/// Value cell of the keyspace. The TTL slot handle is shared with the
/// deadline heap: it always holds the index of this entry's heap item, or
/// is absent when the entry carries no TTL.
pub struct Entry {
   pub data : Data,
   pub ttl  : Option<SlotRef>,
}

pub enum Data {
   Str(Vec<u8>),
   Zset(Box<ZSet>),
}

impl Entry {
   pub fn str(bytes: Vec<u8>) -> Entry {
      Entry { data: Data::Str(bytes), ttl: None }
   }

   pub fn zset(zset: ZSet) -> Entry {
      Entry { data: Data::Zset(Box::new(zset)), ttl: None }
   }
}

/// The keyspace: the main map plus the deadline heap that schedules key
/// expiry. All access happens on the event-loop thread.
pub struct Store {
   pub map  : Table<Entry>,
   pub heap : Heap,
}

impl Store {
   pub fn new() -> Store {
      Store { map: Table::new(), heap: Heap::new() }
   }

   /// Unlinks a key and its heap item, if it has one. The caller decides
   /// how to dispose of the value.
   pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
      let entry = self.map.remove(key)?;
      if let Some(ref slot) = entry.ttl {
         self.heap.remove(slot.get());
      }
      Some(entry)
   }

   /// Applies a TTL to a key: negative clears any deadline, non-negative
   /// schedules `now + ttl_ms`. Returns false when the key is absent.
   pub fn set_ttl(&mut self, key: &[u8], ttl_ms: i64, now_us: u64) -> bool {
      let Store { ref mut map, ref mut heap } = *self;
      let entry = match map.get_mut(key) {
         Some(entry) => entry,
         None => return false,
      };

      if ttl_ms < 0 {
         if let Some(slot) = entry.ttl.take() {
            heap.remove(slot.get());
         }
         return true;
      }

      let deadline_us = now_us + (ttl_ms as u64) * 1000;
      match entry.ttl {
         Some(ref slot) => heap.set_deadline(slot.get(), deadline_us),
         None => {
            let slot: SlotRef = Rc::new(Cell::new(0));
            heap.push(deadline_us, slot.clone(), key.to_vec());
            entry.ttl = Some(slot);
         }
      }
      true
   }

   /// Remaining TTL in milliseconds: −2 when the key is absent, −1 when it
   /// carries no deadline, otherwise the time left (never negative).
   pub fn ttl_ms(&mut self, key: &[u8], now_us: u64) -> i64 {
      let Store { ref mut map, ref heap } = *self;
      match map.get_mut(key) {
         None => -2,
         Some(entry) => match entry.ttl {
            None => -1,
            Some(ref slot) => {
               let deadline_us = heap.deadline(slot.get());
               if deadline_us <= now_us {
                  0
               } else {
                  ((deadline_us - now_us) / 1000) as i64
               }
            }
         },
      }
   }

   pub fn next_expiry_us(&self) -> Option<u64> {
      self.heap.next_deadline()
   }

   /// Pops due deadlines and removes their keys, at most `EXPIRE_BATCH`
   /// per call so a flood of expiries cannot stall the loop.
   pub fn evict_expired(&mut self, now_us: u64, pool: &Pool) -> usize {
      let mut evicted = 0;
      while evicted < EXPIRE_BATCH {
         match self.heap.next_deadline() {
            Some(deadline_us) if deadline_us <= now_us => {
               let item = self.heap.remove(0);
               // The heap item was just unlinked, so the plain map removal
               // is the right one here; Store::remove would chase the
               // now-stale slot handle.
               if let Some(entry) = self.map.remove(&item.key) {
                  dispose(entry.data, pool);
               }
               evicted += 1;
            }
            _ => break,
         }
      }
      if evicted > 0 {
         debug!("expired {} keys", evicted);
      }
      evicted
   }
}

/// Destroys a detached value. Large sorted sets go to the worker pool so
/// the event loop never pays for a big teardown.
pub fn dispose(data: Data, pool: &Pool) {
   if let Data::Zset(zset) = data {
      if zset.len() > LARGE_SET_LEN {
         pool.enqueue(Box::new(move || drop(zset)));
      }
   }
}

pub const NONE : u32 = u32::MAX;

/// Last-activity order over connection slots: oldest at the head, most
/// recently active at the tail. Links are index arrays parallel to the
/// connection table, so membership moves and unlinks are O(1).
///
/// Slots are only ever appended at the tail with a monotonic clock, which
/// keeps activity timestamps non-decreasing from head to tail.
pub struct IdleQueue {
   prev : Vec<u32>,
   next : Vec<u32>,
   head : u32,
   tail : u32,
}

impl IdleQueue {
   pub fn new() -> IdleQueue {
      IdleQueue { prev: Vec::new(), next: Vec::new(), head: NONE, tail: NONE }
   }

   pub fn head(&self) -> Option<u32> {
      if self.head == NONE { None } else { Some(self.head) }
   }

   pub fn push_tail(&mut self, slot: u32) {
      self.reserve(slot);
      self.prev[slot as usize] = self.tail;
      self.next[slot as usize] = NONE;
      match self.tail {
         NONE => self.head = slot,
         tail => self.next[tail as usize] = slot,
      }
      self.tail = slot;
   }

   pub fn unlink(&mut self, slot: u32) {
      let prev = self.prev[slot as usize];
      let next = self.next[slot as usize];
      match prev {
         NONE => self.head = next,
         prev => self.next[prev as usize] = next,
      }
      match next {
         NONE => self.tail = prev,
         next => self.prev[next as usize] = prev,
      }
      self.prev[slot as usize] = NONE;
      self.next[slot as usize] = NONE;
   }

   /// Moves a linked slot to the tail; called on every burst of activity.
   pub fn touch(&mut self, slot: u32) {
      self.unlink(slot);
      self.push_tail(slot);
   }

   fn reserve(&mut self, slot: u32) {
      let needed = slot as usize + 1;
      if self.prev.len() < needed {
         self.prev.resize(needed, NONE);
         self.next.resize(needed, NONE);
      }
   }
}

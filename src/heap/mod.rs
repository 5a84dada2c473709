use std::cell::Cell;
use std::rc::Rc;


/// Shared slot handle. The entry that owns a deadline holds one end; the
/// heap item holds the other and keeps it pointed at the item's current
/// array index, so the owner can reach its item in O(1) at any time.
pub type SlotRef = Rc<Cell<usize>>;

/// One scheduled deadline.
pub struct Item {
   pub deadline_us : u64,
   pub slot        : SlotRef,
   pub key         : Vec<u8>,
}

/// Array-backed binary min-heap on `deadline_us`.
///
/// Every move of an item also rewrites its slot handle, maintaining the
/// invariant that `items[i].slot` holds `i` for all occupied positions.
pub struct Heap {
   items : Vec<Item>,
}

impl Heap {
   pub fn new() -> Heap {
      Heap { items: Vec::new() }
   }

   pub fn len(&self) -> usize {
      self.items.len()
   }

   pub fn is_empty(&self) -> bool {
      self.items.is_empty()
   }

   pub fn deadline(&self, index: usize) -> u64 {
      self.items[index].deadline_us
   }

   /// Deadline of the next item due, if any.
   pub fn next_deadline(&self) -> Option<u64> {
      self.items.first().map(|item| item.deadline_us)
   }

   pub fn push(&mut self, deadline_us: u64, slot: SlotRef, key: Vec<u8>) {
      slot.set(self.items.len());
      self.items.push(Item { deadline_us: deadline_us, slot: slot, key: key });
      self.sift_up(self.items.len() - 1);
   }

   /// Rewrites one item's deadline and restores heap order from its slot.
   pub fn set_deadline(&mut self, index: usize, deadline_us: u64) {
      self.items[index].deadline_us = deadline_us;
      self.update(index);
   }

   /// Removes the item at `index` by swapping in the last element, then
   /// re-sifting whatever landed there.
   pub fn remove(&mut self, index: usize) -> Item {
      let item = self.items.swap_remove(index);
      if index < self.items.len() {
         self.items[index].slot.set(index);
         self.update(index);
      }
      item
   }

   /// Sifts up or down depending on which neighbour is violated. A no-op
   /// when the item is already in order.
   fn update(&mut self, index: usize) {
      if index > 0 && self.items[(index - 1) / 2].deadline_us > self.items[index].deadline_us {
         self.sift_up(index);
      } else {
         self.sift_down(index);
      }
   }

   fn sift_up(&mut self, mut index: usize) {
      while index > 0 {
         let parent = (index - 1) / 2;
         if self.items[parent].deadline_us <= self.items[index].deadline_us {
            break;
         }
         self.swap_slots(parent, index);
         index = parent;
      }
   }

   fn sift_down(&mut self, mut index: usize) {
      loop {
         let left = index * 2 + 1;
         if left >= self.items.len() {
            break;
         }
         let right = left + 1;
         let mut smallest = left;
         if right < self.items.len() && self.items[right].deadline_us < self.items[left].deadline_us {
            smallest = right;
         }
         if self.items[index].deadline_us <= self.items[smallest].deadline_us {
            break;
         }
         self.swap_slots(index, smallest);
         index = smallest;
      }
   }

   fn swap_slots(&mut self, a: usize, b: usize) {
      self.items.swap(a, b);
      self.items[a].slot.set(a);
      self.items[b].slot.set(b);
   }
}

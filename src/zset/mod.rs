use crate::table::Table;
use crate::tree::{self, Tree};
use std::cmp::Ordering;


/// One member's ordering key: ascending score, ties broken by ascending
/// byte order of the name.
pub struct Pair {
   pub score : f64,
   pub name  : Vec<u8>,
}

/// Weighted set with dual indexing.
///
/// Members live in an ordered tree keyed by (score, name); a hash table
/// maps each name to its tree slot for O(1) point lookups. Exactly one
/// tree slot exists per member and it appears in both indexes. The slot
/// index is stable across score rewrites, which keeps the hash side valid
/// without rewriting it.
pub struct ZSet {
   by_name  : Table<u32>,
   by_score : Tree<Pair>,
}

impl ZSet {
   pub fn new() -> ZSet {
      ZSet { by_name: Table::new(), by_score: Tree::new() }
   }

   pub fn len(&self) -> usize {
      self.by_score.len()
   }

   /// Adds a member or rewrites its score. Returns whether the member was
   /// newly added.
   pub fn insert(&mut self, name: &[u8], score: f64) -> bool {
      match self.by_name.get_mut(name).map(|slot| *slot) {
         Some(slot) => {
            if self.by_score.get(slot).score != score {
               self.by_score.detach(slot);
               self.by_score.get_mut(slot).score = score;
               self.by_score.reinsert_with(slot, pair_less);
            }
            false
         }
         None => {
            let pair = Pair { score: score, name: name.to_vec() };
            let slot = self.by_score.insert_with(pair, pair_less);
            self.by_name.insert(name.to_vec(), slot);
            true
         }
      }
   }

   pub fn score(&mut self, name: &[u8]) -> Option<f64> {
      let slot = *self.by_name.get_mut(name)?;
      Some(self.by_score.get(slot).score)
   }

   /// Detaches a member from both indexes. Returns whether it existed.
   pub fn remove(&mut self, name: &[u8]) -> bool {
      match self.by_name.remove(name) {
         Some(slot) => {
            self.by_score.remove(slot);
            true
         }
         None => false,
      }
   }

   /// Smallest member whose (score, name) is greater than or equal to the
   /// argument, or NIL.
   pub fn seek_ge(&self, score: f64, name: &[u8]) -> u32 {
      self.by_score.lower_bound(|pair| {
         match pair.score.total_cmp(&score) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => pair.name[..] >= *name,
         }
      })
   }

   /// Walks `offset` positions through the score order from `slot`.
   pub fn offset(&self, slot: u32, offset: i64) -> u32 {
      if slot == tree::NIL {
         return tree::NIL;
      }
      self.by_score.offset(slot, offset)
   }

   pub fn pair(&self, slot: u32) -> &Pair {
      self.by_score.get(slot)
   }
}

fn pair_less(a: &Pair, b: &Pair) -> bool {
   a.score.total_cmp(&b.score).then_with(|| a.name.cmp(&b.name)) == Ordering::Less
}

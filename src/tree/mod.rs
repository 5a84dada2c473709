
/// Sentinel index standing in for a missing link.
pub const NIL : u32 = u32::MAX;

/// Arena-backed AVL tree with order statistics.
///
/// Nodes live in a slab and are addressed by `u32` index; an index stays
/// valid for as long as the node is allocated, even across detach and
/// reinsert, which lets a second structure hold long-lived references to
/// tree members. Every node tracks its subtree height (balancing) and its
/// subtree size (rank walks).
///
/// The tree never compares elements on its own: ordering closures are
/// supplied at the call site, so the element type needs no `Ord` bound.
pub struct Tree<T> {
   nodes : Vec<Node<T>>,
   free  : Vec<u32>,
   root  : u32,
}

struct Node<T> {
   parent : u32,
   left   : u32,
   right  : u32,
   height : u32,
   count  : u32,
   data   : Option<T>,
}

impl<T> Tree<T> {
   pub fn new() -> Tree<T> {
      Tree { nodes: Vec::new(), free: Vec::new(), root: NIL }
   }

   pub fn len(&self) -> usize {
      self.count(self.root) as usize
   }

   pub fn is_empty(&self) -> bool {
      self.root == NIL
   }

   pub fn get(&self, index: u32) -> &T {
      self.nodes[index as usize].data.as_ref().unwrap()
   }

   /// Mutable element access. Only safe ordering-wise while the node is
   /// detached; attached nodes must keep their position key unchanged.
   pub fn get_mut(&mut self, index: u32) -> &mut T {
      self.nodes[index as usize].data.as_mut().unwrap()
   }

   /// Allocates a slot for `data` and attaches it where `less` says it
   /// belongs. Returns the slot index.
   pub fn insert_with<F>(&mut self, data: T, less: F) -> u32
      where F: Fn(&T, &T) -> bool
   {
      let index = self.alloc(data);
      self.attach(index, less);
      index
   }

   /// Attaches a previously detached slot at the position `less` dictates
   /// for its (possibly rewritten) element.
   pub fn reinsert_with<F>(&mut self, index: u32, less: F)
      where F: Fn(&T, &T) -> bool
   {
      self.attach(index, less);
   }

   /// Unlinks a node from the tree but keeps its slot (and element)
   /// allocated, so the index survives a score rewrite.
   pub fn detach(&mut self, index: u32) {
      let (left, right) = (self.nodes[index as usize].left, self.nodes[index as usize].right);
      if left == NIL || right == NIL {
         self.detach_simple(index);
      } else {
         // Two children: splice out the in-order successor, then let it
         // take over this node's links. Elements never move between
         // slots, so outside indexes stay valid.
         let mut successor = right;
         while self.nodes[successor as usize].left != NIL {
            successor = self.nodes[successor as usize].left;
         }
         self.detach_simple(successor);
         self.transplant(index, successor);
      }
      self.reset_links(index);
   }

   /// Detaches a node and frees its slot, returning the element.
   pub fn remove(&mut self, index: u32) -> T {
      self.detach(index);
      self.free.push(index);
      self.nodes[index as usize].data.take().unwrap()
   }

   /// Smallest element for which `above` holds, assuming `above` is false
   /// on a prefix of the in-order sequence and true on the rest.
   pub fn lower_bound<F>(&self, above: F) -> u32
      where F: Fn(&T) -> bool
   {
      let mut best = NIL;
      let mut cursor = self.root;
      while cursor != NIL {
         if above(self.get(cursor)) {
            best = cursor;
            cursor = self.nodes[cursor as usize].left;
         } else {
            cursor = self.nodes[cursor as usize].right;
         }
      }
      best
   }

   /// Walks `offset` positions through the in-order sequence, in either
   /// direction, using the subtree counts. O(log N) regardless of the
   /// distance. NIL when the walk leaves the sequence.
   pub fn offset(&self, start: u32, offset: i64) -> u32 {
      let mut position = 0i64;
      let mut cursor = start;
      while cursor != NIL && position != offset {
         let node = &self.nodes[cursor as usize];
         if position < offset && position + self.count(node.right) as i64 >= offset {
            // Target is inside the right subtree.
            cursor = node.right;
            position += self.count(self.nodes[cursor as usize].left) as i64 + 1;
         } else if position > offset && position - (self.count(node.left) as i64) <= offset {
            // Target is inside the left subtree.
            cursor = node.left;
            position -= self.count(self.nodes[cursor as usize].right) as i64 + 1;
         } else {
            let parent = node.parent;
            if parent == NIL {
               return NIL;
            }
            if self.nodes[parent as usize].right == cursor {
               position -= self.count(node.left) as i64 + 1;
            } else {
               position += self.count(node.right) as i64 + 1;
            }
            cursor = parent;
         }
      }
      cursor
   }

   /// Leftmost node of the whole tree.
   pub fn first(&self) -> u32 {
      let mut cursor = self.root;
      if cursor == NIL {
         return NIL;
      }
      while self.nodes[cursor as usize].left != NIL {
         cursor = self.nodes[cursor as usize].left;
      }
      cursor
   }

   fn alloc(&mut self, data: T) -> u32 {
      match self.free.pop() {
         Some(index) => {
            let node = &mut self.nodes[index as usize];
            node.data = Some(data);
            index
         }
         None => {
            self.nodes.push(Node {
               parent : NIL,
               left   : NIL,
               right  : NIL,
               height : 1,
               count  : 1,
               data   : Some(data),
            });
            (self.nodes.len() - 1) as u32
         }
      }
   }

   fn attach<F>(&mut self, index: u32, less: F)
      where F: Fn(&T, &T) -> bool
   {
      self.reset_links(index);
      if self.root == NIL {
         self.root = index;
         return;
      }

      let mut cursor = self.root;
      loop {
         let go_left = less(self.get(index), self.get(cursor));
         let next = if go_left {
            self.nodes[cursor as usize].left
         } else {
            self.nodes[cursor as usize].right
         };
         if next == NIL {
            if go_left {
               self.nodes[cursor as usize].left = index;
            } else {
               self.nodes[cursor as usize].right = index;
            }
            self.nodes[index as usize].parent = cursor;
            self.fix(cursor);
            return;
         }
         cursor = next;
      }
   }

   /// Unlinks a node with at most one child.
   fn detach_simple(&mut self, index: u32) {
      let node_left = self.nodes[index as usize].left;
      let node_right = self.nodes[index as usize].right;
      debug_assert!(node_left == NIL || node_right == NIL);

      let child = if node_left != NIL { node_left } else { node_right };
      let parent = self.nodes[index as usize].parent;

      if child != NIL {
         self.nodes[child as usize].parent = parent;
      }
      if parent == NIL {
         self.root = child;
         return;
      }
      if self.nodes[parent as usize].left == index {
         self.nodes[parent as usize].left = child;
      } else {
         self.nodes[parent as usize].right = child;
      }
      self.fix(parent);
   }

   /// Moves `successor` into the tree position `index` occupies. Reads the
   /// links after the successor has already been spliced out, so the
   /// rebalancing done by that splice is taken into account.
   fn transplant(&mut self, index: u32, successor: u32) {
      let (parent, left, right, height, count) = {
         let node = &self.nodes[index as usize];
         (node.parent, node.left, node.right, node.height, node.count)
      };

      {
         let node = &mut self.nodes[successor as usize];
         node.parent = parent;
         node.left = left;
         node.right = right;
         node.height = height;
         node.count = count;
      }
      if left != NIL {
         self.nodes[left as usize].parent = successor;
      }
      if right != NIL {
         self.nodes[right as usize].parent = successor;
      }
      if parent == NIL {
         self.root = successor;
      } else if self.nodes[parent as usize].left == index {
         self.nodes[parent as usize].left = successor;
      } else {
         self.nodes[parent as usize].right = successor;
      }
   }

   /// Restores heights and counts from `index` up to the root, rotating
   /// wherever the balance rule is violated.
   fn fix(&mut self, index: u32) {
      let mut cursor = index;
      loop {
         let parent = self.nodes[cursor as usize].parent;
         let was_left = parent != NIL && self.nodes[parent as usize].left == cursor;

         self.refresh(cursor);
         let left_height = self.height(self.nodes[cursor as usize].left);
         let right_height = self.height(self.nodes[cursor as usize].right);

         let mut top = cursor;
         if left_height == right_height + 2 {
            top = self.fix_left(cursor);
         } else if right_height == left_height + 2 {
            top = self.fix_right(cursor);
         }

         if parent == NIL {
            self.root = top;
            return;
         }
         if was_left {
            self.nodes[parent as usize].left = top;
         } else {
            self.nodes[parent as usize].right = top;
         }
         cursor = parent;
      }
   }

   /// Left subtree is two levels taller; restores balance with one or two
   /// rotations and returns the new subtree root.
   fn fix_left(&mut self, index: u32) -> u32 {
      let left = self.nodes[index as usize].left;
      if self.height(self.nodes[left as usize].left) < self.height(self.nodes[left as usize].right) {
         let rotated = self.rot_left(left);
         self.nodes[index as usize].left = rotated;
      }
      self.rot_right(index)
   }

   fn fix_right(&mut self, index: u32) -> u32 {
      let right = self.nodes[index as usize].right;
      if self.height(self.nodes[right as usize].right) < self.height(self.nodes[right as usize].left) {
         let rotated = self.rot_right(right);
         self.nodes[index as usize].right = rotated;
      }
      self.rot_left(index)
   }

   fn rot_left(&mut self, index: u32) -> u32 {
      let parent = self.nodes[index as usize].parent;
      let pivot = self.nodes[index as usize].right;
      let inner = self.nodes[pivot as usize].left;

      self.nodes[index as usize].right = inner;
      if inner != NIL {
         self.nodes[inner as usize].parent = index;
      }
      self.nodes[pivot as usize].parent = parent;
      self.nodes[pivot as usize].left = index;
      self.nodes[index as usize].parent = pivot;

      self.refresh(index);
      self.refresh(pivot);
      pivot
   }

   fn rot_right(&mut self, index: u32) -> u32 {
      let parent = self.nodes[index as usize].parent;
      let pivot = self.nodes[index as usize].left;
      let inner = self.nodes[pivot as usize].right;

      self.nodes[index as usize].left = inner;
      if inner != NIL {
         self.nodes[inner as usize].parent = index;
      }
      self.nodes[pivot as usize].parent = parent;
      self.nodes[pivot as usize].right = index;
      self.nodes[index as usize].parent = pivot;

      self.refresh(index);
      self.refresh(pivot);
      pivot
   }

   fn refresh(&mut self, index: u32) {
      let left = self.nodes[index as usize].left;
      let right = self.nodes[index as usize].right;
      let height = 1 + self.height(left).max(self.height(right));
      let count = 1 + self.count(left) + self.count(right);
      let node = &mut self.nodes[index as usize];
      node.height = height;
      node.count = count;
   }

   fn reset_links(&mut self, index: u32) {
      let node = &mut self.nodes[index as usize];
      node.parent = NIL;
      node.left = NIL;
      node.right = NIL;
      node.height = 1;
      node.count = 1;
   }

   fn height(&self, index: u32) -> u32 {
      if index == NIL { 0 } else { self.nodes[index as usize].height }
   }

   fn count(&self, index: u32) -> u32 {
      if index == NIL { 0 } else { self.nodes[index as usize].count }
   }
}

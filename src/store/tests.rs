use super::*;

fn store_with(key: &[u8]) -> Store {
   let mut store = Store::new();
   store.map.insert(key.to_vec(), Entry::str(b"value".to_vec()));
   store
}

#[test]
fn ttl_reporting_distinguishes_absent_and_persistent() {
   let mut store = store_with(b"key");
   assert_eq!(store.ttl_ms(b"missing", 0), -2);
   assert_eq!(store.ttl_ms(b"key", 0), -1);

   assert!(store.set_ttl(b"key", 1000, 0));
   let remaining = store.ttl_ms(b"key", 250_000);
   assert_eq!(remaining, 750);
}

#[test]
fn setting_a_ttl_twice_leaves_one_heap_item() {
   let mut store = store_with(b"key");
   assert!(store.set_ttl(b"key", 500, 0));
   assert!(store.set_ttl(b"key", 500, 0));
   assert_eq!(store.heap.len(), 1);
   assert_eq!(store.next_expiry_us(), Some(500_000));
}

#[test]
fn negative_ttl_clears_the_deadline() {
   let mut store = store_with(b"key");
   store.set_ttl(b"key", 500, 0);
   assert!(store.set_ttl(b"key", -1, 0));
   assert!(store.heap.is_empty());
   assert_eq!(store.ttl_ms(b"key", 0), -1);
}

#[test]
fn ttl_on_a_missing_key_is_refused() {
   let mut store = Store::new();
   assert!(!store.set_ttl(b"ghost", 100, 0));
   assert!(store.heap.is_empty());
}

#[test]
fn expired_keys_are_evicted_in_deadline_order() {
   let pool = Pool::new(1);
   let mut store = Store::new();
   for (key, ttl) in [(b"a", 100i64), (b"b", 50), (b"c", 900)] {
      store.map.insert(key.to_vec(), Entry::str(Vec::new()));
      store.set_ttl(key, ttl, 0);
   }

   assert_eq!(store.evict_expired(200_000, &pool), 2);
   assert!(store.map.get_mut(b"a").is_none());
   assert!(store.map.get_mut(b"b").is_none());
   assert!(store.map.get_mut(b"c").is_some());
   assert_eq!(store.heap.len(), 1);
}

#[test]
fn eviction_respects_the_batch_limit() {
   let pool = Pool::new(1);
   let mut store = Store::new();
   for index in 0..(EXPIRE_BATCH + 10) {
      let key = format!("key:{}", index).into_bytes();
      store.map.insert(key.clone(), Entry::str(Vec::new()));
      store.set_ttl(&key, 1, 0);
   }

   assert_eq!(store.evict_expired(10_000, &pool), EXPIRE_BATCH);
   assert_eq!(store.evict_expired(10_000, &pool), 10);
   assert!(store.heap.is_empty());
}

#[test]
fn removing_a_key_unschedules_its_deadline() {
   let mut store = store_with(b"key");
   store.set_ttl(b"key", 500, 0);
   assert!(store.remove(b"key").is_some());
   assert!(store.heap.is_empty());
   assert!(store.remove(b"key").is_none());
}

#[test]
fn small_sets_are_dropped_inline_and_large_ones_deferred() {
   let pool = Pool::new(1);

   let mut small = ZSet::new();
   small.insert(b"only", 1.0);
   dispose(Data::Zset(Box::new(small)), &pool);

   let mut large = ZSet::new();
   for index in 0..(LARGE_SET_LEN + 1) {
      large.insert(format!("member:{}", index).as_bytes(), index as f64);
   }
   dispose(Data::Zset(Box::new(large)), &pool);
   dispose(Data::Str(b"plain".to_vec()), &pool);
}

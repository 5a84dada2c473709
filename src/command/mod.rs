use crate::pool::Pool;
use crate::store::{self, Data, Entry, Store};
use crate::tree::NIL;
use crate::wire::{ErrCode, Value};
use crate::zset::ZSet;
use itertools::Itertools;
use log::debug;
use std::str;


/// Runs one parsed request against the keyspace and produces its reply.
/// Dispatch is by exact verb and arity; anything else is unknown.
pub fn dispatch(args: &[Vec<u8>], store: &mut Store, pool: &Pool, now_us: u64) -> Value {
   if log::log_enabled!(log::Level::Debug) {
      debug!("request: {}", args.iter().map(|arg| String::from_utf8_lossy(arg)).join(" "));
   }

   if args.is_empty() {
      return err(ErrCode::Unknown, "empty command");
   }
   let verb = &args[0];

   if is(verb, "get") && args.len() == 2 {
      get(store, &args[1])
   } else if is(verb, "set") && args.len() == 3 {
      set(store, &args[1], args[2].clone())
   } else if is(verb, "del") && args.len() == 2 {
      del(store, pool, &args[1])
   } else if is(verb, "pexpire") && args.len() == 3 {
      pexpire(store, &args[1], &args[2], now_us)
   } else if is(verb, "pttl") && args.len() == 2 {
      pttl(store, &args[1], now_us)
   } else if is(verb, "zadd") && args.len() == 4 {
      zadd(store, &args[1], &args[2], &args[3])
   } else if is(verb, "zrem") && args.len() == 3 {
      zrem(store, &args[1], &args[2])
   } else if is(verb, "zscore") && args.len() == 3 {
      zscore(store, &args[1], &args[2])
   } else if is(verb, "zquery") && args.len() == 6 {
      zquery(store, &args[1], &args[2], &args[3], &args[4], &args[5])
   } else if is(verb, "keys") && args.len() == 1 {
      keys(store)
   } else {
      err(ErrCode::Unknown, "unknown command")
   }
}

fn get(store: &mut Store, key: &[u8]) -> Value {
   match store.map.get_mut(key) {
      None => Value::Nil,
      Some(entry) => match entry.data {
         Data::Str(ref bytes) => Value::Str(bytes.clone()),
         Data::Zset(_) => err(ErrCode::BadType, "not a string value"),
      },
   }
}

fn set(store: &mut Store, key: &[u8], value: Vec<u8>) -> Value {
   if store.map.get_mut(key).is_none() {
      store.map.insert(key.to_vec(), Entry::str(value));
      return Value::Nil;
   }

   // Existing key: replace the bytes in place so the TTL survives.
   let entry = store.map.get_mut(key).unwrap();
   match entry.data {
      Data::Str(ref mut bytes) => {
         *bytes = value;
         Value::Nil
      }
      Data::Zset(_) => err(ErrCode::BadType, "not a string value"),
   }
}

fn del(store: &mut Store, pool: &Pool, key: &[u8]) -> Value {
   match store.remove(key) {
      Some(entry) => {
         store::dispose(entry.data, pool);
         Value::Int(1)
      }
      None => Value::Int(0),
   }
}

fn pexpire(store: &mut Store, key: &[u8], ttl_arg: &[u8], now_us: u64) -> Value {
   let ttl_ms = match int_arg(ttl_arg) {
      Some(ttl_ms) => ttl_ms,
      None => return err(ErrCode::BadArg, "expect int64"),
   };
   Value::Int(store.set_ttl(key, ttl_ms, now_us) as i64)
}

fn pttl(store: &mut Store, key: &[u8], now_us: u64) -> Value {
   Value::Int(store.ttl_ms(key, now_us))
}

fn zadd(store: &mut Store, key: &[u8], score_arg: &[u8], name: &[u8]) -> Value {
   let score = match float_arg(score_arg) {
      Some(score) => score,
      None => return err(ErrCode::BadArg, "expect float"),
   };

   if store.map.get_mut(key).is_none() {
      store.map.insert(key.to_vec(), Entry::zset(ZSet::new()));
   }

   let entry = store.map.get_mut(key).unwrap();
   match entry.data {
      Data::Zset(ref mut zset) => Value::Int(zset.insert(name, score) as i64),
      Data::Str(_) => err(ErrCode::BadType, "expect a zset"),
   }
}

fn zrem(store: &mut Store, key: &[u8], name: &[u8]) -> Value {
   match lookup_zset(store, key) {
      Lookup::Absent => Value::Int(0),
      Lookup::WrongType => err(ErrCode::BadType, "expect a zset"),
      Lookup::Found(zset) => Value::Int(zset.remove(name) as i64),
   }
}

fn zscore(store: &mut Store, key: &[u8], name: &[u8]) -> Value {
   match lookup_zset(store, key) {
      Lookup::Absent => Value::Nil,
      Lookup::WrongType => err(ErrCode::BadType, "expect a zset"),
      Lookup::Found(zset) => match zset.score(name) {
         Some(score) => Value::Dbl(score),
         None => Value::Nil,
      },
   }
}

fn zquery(store: &mut Store, key: &[u8], score_arg: &[u8], name: &[u8],
          offset_arg: &[u8], limit_arg: &[u8]) -> Value {
   let score = match float_arg(score_arg) {
      Some(score) => score,
      None => return err(ErrCode::BadArg, "expect float"),
   };
   let (offset, limit) = match (int_arg(offset_arg), int_arg(limit_arg)) {
      (Some(offset), Some(limit)) => (offset, limit),
      _ => return err(ErrCode::BadArg, "expect int64"),
   };
   if limit < 0 {
      return err(ErrCode::BadArg, "negative limit");
   }

   let zset = match lookup_zset(store, key) {
      Lookup::Absent => return Value::Arr(Vec::new()),
      Lookup::WrongType => return err(ErrCode::BadType, "expect a zset"),
      Lookup::Found(zset) => zset,
   };

   let mut cursor = zset.offset(zset.seek_ge(score, name), offset);
   let mut items = Vec::new();
   let mut emitted = 0;
   while cursor != NIL && emitted < limit {
      let pair = zset.pair(cursor);
      items.push(Value::Str(pair.name.clone()));
      items.push(Value::Dbl(pair.score));
      emitted += 1;
      cursor = zset.offset(cursor, 1);
   }
   Value::Arr(items)
}

fn keys(store: &mut Store) -> Value {
   let mut names = Vec::with_capacity(store.map.len());
   store.map.for_each(|key, _| names.push(Value::Str(key.to_vec())));
   Value::Arr(names)
}

enum Lookup<'a> {
   Absent,
   WrongType,
   Found(&'a mut ZSet),
}

fn lookup_zset<'a>(store: &'a mut Store, key: &[u8]) -> Lookup<'a> {
   match store.map.get_mut(key) {
      None => Lookup::Absent,
      Some(entry) => match entry.data {
         Data::Zset(ref mut zset) => Lookup::Found(zset),
         Data::Str(_) => Lookup::WrongType,
      },
   }
}

fn is(verb: &[u8], name: &str) -> bool {
   verb == name.as_bytes()
}

fn int_arg(arg: &[u8]) -> Option<i64> {
   str::from_utf8(arg).ok()?.parse().ok()
}

fn float_arg(arg: &[u8]) -> Option<f64> {
   let parsed: f64 = str::from_utf8(arg).ok()?.parse().ok()?;
   if parsed.is_nan() {
      return None;
   }
   Some(parsed)
}

fn err(code: ErrCode, message: &str) -> Value {
   Value::Err(code, String::from(message))
}

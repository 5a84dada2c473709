
/// Hard cap on a single framed message, request or response.
pub const MAX_MSG_BYTES : usize = 32 << 20;
/// Hard cap on the argument count of one request.
pub const MAX_ARGS : u32 = 200_000;

const TAG_NIL : u8 = 0;
const TAG_ERR : u8 = 1;
const TAG_STR : u8 = 2;
const TAG_INT : u8 = 3;
const TAG_DBL : u8 = 4;
const TAG_ARR : u8 = 5;

/// Wire-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
   Unknown = 1,
   TooBig  = 2,
   BadType = 3,
   BadArg  = 4,
}

/// A response value. Handlers produce one of these; serialization is a
/// pure function of the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
   Nil,
   Err(ErrCode, String),
   Str(Vec<u8>),
   Int(i64),
   Dbl(f64),
   Arr(Vec<Value>),
}

/// Outcome of scanning the incoming buffer for one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
   /// Not enough bytes buffered yet.
   Pending,
   /// Framing violation; the connection must be dropped.
   Malformed,
   /// One complete request, plus how many buffered bytes it used.
   Request { args: Vec<Vec<u8>>, consumed: usize },
}

/// Scans the head of `buf` for one complete request.
///
/// Framing, all little-endian: u32 total length, u32 argument count, then
/// for each argument a u32 length and that many raw bytes. Oversized
/// messages or argument counts and stray trailing bytes are violations.
pub fn parse_request(buf: &[u8]) -> Parsed {
   if buf.len() < 4 {
      return Parsed::Pending;
   }
   let total = read_u32(buf, 0) as usize;
   if total > MAX_MSG_BYTES {
      return Parsed::Malformed;
   }
   if buf.len() < 4 + total {
      return Parsed::Pending;
   }

   let body = &buf[4..4 + total];
   if body.len() < 4 {
      return Parsed::Malformed;
   }
   let argc = read_u32(body, 0);
   if argc > MAX_ARGS {
      return Parsed::Malformed;
   }

   let mut args = Vec::with_capacity(argc as usize);
   let mut at = 4;
   for _ in 0..argc {
      if body.len() - at < 4 {
         return Parsed::Malformed;
      }
      let len = read_u32(body, at) as usize;
      at += 4;
      if body.len() - at < len {
         return Parsed::Malformed;
      }
      args.push(body[at..at + len].to_vec());
      at += len;
   }
   if at != body.len() {
      return Parsed::Malformed;
   }

   Parsed::Request { args: args, consumed: 4 + total }
}

/// Builds one request frame; the counterpart of `parse_request`, used by
/// clients.
pub fn append_request(out: &mut Vec<u8>, args: &[&[u8]]) {
   let total: usize = 4 + args.iter().map(|arg| 4 + arg.len()).sum::<usize>();
   out.extend_from_slice(&(total as u32).to_le_bytes());
   out.extend_from_slice(&(args.len() as u32).to_le_bytes());
   for arg in args {
      out.extend_from_slice(&(arg.len() as u32).to_le_bytes());
      out.extend_from_slice(arg);
   }
}

/// Appends one framed response: a u32 length placeholder, the serialized
/// value, then the back-patched length. A value that would overflow the
/// message cap is thrown away and replaced by a TOO_BIG error.
pub fn append_response(out: &mut Vec<u8>, value: &Value) {
   let base = out.len();
   out.extend_from_slice(&[0u8; 4]);
   append_value(out, value);

   if out.len() - base - 4 > MAX_MSG_BYTES {
      out.truncate(base + 4);
      append_value(out, &Value::Err(ErrCode::TooBig, String::from("response is too big")));
   }

   let total = (out.len() - base - 4) as u32;
   out[base..base + 4].copy_from_slice(&total.to_le_bytes());
}

fn append_value(out: &mut Vec<u8>, value: &Value) {
   match *value {
      Value::Nil => out.push(TAG_NIL),
      Value::Err(code, ref message) => {
         out.push(TAG_ERR);
         out.extend_from_slice(&(code as i32).to_le_bytes());
         out.extend_from_slice(&(message.len() as u32).to_le_bytes());
         out.extend_from_slice(message.as_bytes());
      }
      Value::Str(ref bytes) => {
         out.push(TAG_STR);
         out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
         out.extend_from_slice(bytes);
      }
      Value::Int(number) => {
         out.push(TAG_INT);
         out.extend_from_slice(&number.to_le_bytes());
      }
      Value::Dbl(number) => {
         out.push(TAG_DBL);
         out.extend_from_slice(&number.to_le_bytes());
      }
      Value::Arr(ref items) => {
         out.push(TAG_ARR);
         out.extend_from_slice(&(items.len() as u32).to_le_bytes());
         for item in items {
            append_value(out, item);
         }
      }
   }
}

/// Decodes one tagged value from the head of `buf`; the client-side
/// counterpart of `append_value`. None on truncated or invalid input.
pub fn read_value(buf: &[u8]) -> Option<(Value, usize)> {
   let tag = *buf.first()?;
   let rest = &buf[1..];
   match tag {
      TAG_NIL => Some((Value::Nil, 1)),
      TAG_ERR => {
         if rest.len() < 8 {
            return None;
         }
         let code = match i32::from_le_bytes(rest[0..4].try_into().unwrap()) {
            1 => ErrCode::Unknown,
            2 => ErrCode::TooBig,
            3 => ErrCode::BadType,
            4 => ErrCode::BadArg,
            _ => return None,
         };
         let len = read_u32(rest, 4) as usize;
         if rest.len() - 8 < len {
            return None;
         }
         let message = String::from_utf8(rest[8..8 + len].to_vec()).ok()?;
         Some((Value::Err(code, message), 9 + len))
      }
      TAG_STR => {
         if rest.len() < 4 {
            return None;
         }
         let len = read_u32(rest, 0) as usize;
         if rest.len() - 4 < len {
            return None;
         }
         Some((Value::Str(rest[4..4 + len].to_vec()), 5 + len))
      }
      TAG_INT => {
         let bytes: [u8; 8] = rest.get(0..8)?.try_into().unwrap();
         Some((Value::Int(i64::from_le_bytes(bytes)), 9))
      }
      TAG_DBL => {
         let bytes: [u8; 8] = rest.get(0..8)?.try_into().unwrap();
         Some((Value::Dbl(f64::from_le_bytes(bytes)), 9))
      }
      TAG_ARR => {
         if rest.len() < 4 {
            return None;
         }
         let count = read_u32(rest, 0);
         let mut items = Vec::new();
         let mut at = 5;
         for _ in 0..count {
            let (item, used) = read_value(&buf[at..])?;
            items.push(item);
            at += used;
         }
         Some((Value::Arr(items), at))
      }
      _ => None,
   }
}

/// Decodes one framed response: u32 length prefix plus exactly one value.
pub fn read_response(buf: &[u8]) -> Option<(Value, usize)> {
   if buf.len() < 4 {
      return None;
   }
   let total = read_u32(buf, 0) as usize;
   if buf.len() - 4 < total {
      return None;
   }
   let (value, used) = read_value(&buf[4..4 + total])?;
   if used != total {
      return None;
   }
   Some((value, 4 + total))
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
   u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

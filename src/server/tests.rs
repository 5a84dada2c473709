use super::*;
use crate::wire::{self, ErrCode, Value};
use itertools::Itertools;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

fn spawn_server() -> SocketAddr {
   let mut server = Server::new(("127.0.0.1", 0)).unwrap();
   let addr = server.local_addr().unwrap();
   thread::spawn(move || {
      let _ = server.run();
   });
   addr
}

struct Client {
   stream: TcpStream,
}

impl Client {
   fn connect(addr: SocketAddr) -> Client {
      let stream = TcpStream::connect(addr).unwrap();
      stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
      Client { stream: stream }
   }

   fn send(&mut self, args: &[&[u8]]) {
      let mut frame = Vec::new();
      wire::append_request(&mut frame, args);
      self.stream.write_all(&frame).unwrap();
   }

   fn recv(&mut self) -> Value {
      let mut header = [0u8; 4];
      self.stream.read_exact(&mut header).unwrap();
      let total = u32::from_le_bytes(header) as usize;

      let mut frame = vec![0u8; 4 + total];
      frame[..4].copy_from_slice(&header);
      self.stream.read_exact(&mut frame[4..]).unwrap();

      let (value, used) = wire::read_response(&frame).unwrap();
      assert_eq!(used, frame.len());
      value
   }

   fn round_trip(&mut self, args: &[&[u8]]) -> Value {
      self.send(args);
      self.recv()
   }
}

#[test]
fn set_get_del_over_the_wire() {
   let mut client = Client::connect(spawn_server());

   assert_eq!(client.round_trip(&[b"set", b"foo", b"bar"]), Value::Nil);
   assert_eq!(client.round_trip(&[b"get", b"foo"]), Value::Str(b"bar".to_vec()));
   assert_eq!(client.round_trip(&[b"del", b"foo"]), Value::Int(1));
   assert_eq!(client.round_trip(&[b"get", b"foo"]), Value::Nil);
}

#[test]
fn zset_commands_over_the_wire() {
   let mut client = Client::connect(spawn_server());

   assert_eq!(client.round_trip(&[b"zadd", b"s", b"1", b"a"]), Value::Int(1));
   assert_eq!(client.round_trip(&[b"zadd", b"s", b"2", b"b"]), Value::Int(1));
   assert_eq!(client.round_trip(&[b"zadd", b"s", b"1", b"a"]), Value::Int(0));
   assert_eq!(client.round_trip(&[b"zscore", b"s", b"a"]), Value::Dbl(1.0));

   let reply = client.round_trip(&[b"zquery", b"s", b"0", b"", b"0", b"10"]);
   let items = match reply {
      Value::Arr(items) => items,
      other => panic!("unexpected reply: {:?}", other),
   };
   let members: Vec<(&Value, &Value)> = items.iter().tuples().collect();
   assert_eq!(members, vec![
      (&Value::Str(b"a".to_vec()), &Value::Dbl(1.0)),
      (&Value::Str(b"b".to_vec()), &Value::Dbl(2.0)),
   ]);
}

#[test]
fn pipelined_requests_answer_in_order() {
   let mut client = Client::connect(spawn_server());

   let mut burst = Vec::new();
   wire::append_request(&mut burst, &[b"set", b"a", b"1"]);
   wire::append_request(&mut burst, &[b"set", b"b", b"2"]);
   wire::append_request(&mut burst, &[b"get", b"a"]);
   wire::append_request(&mut burst, &[b"get", b"b"]);
   client.stream.write_all(&burst).unwrap();

   assert_eq!(client.recv(), Value::Nil);
   assert_eq!(client.recv(), Value::Nil);
   assert_eq!(client.recv(), Value::Str(b"1".to_vec()));
   assert_eq!(client.recv(), Value::Str(b"2".to_vec()));
}

#[test]
fn values_spanning_many_read_bursts_round_trip() {
   let mut client = Client::connect(spawn_server());

   let big: Vec<u8> = (0..1_000_000u32).map(|index| index as u8).collect();
   assert_eq!(client.round_trip(&[b"set", b"blob", &big]), Value::Nil);
   assert_eq!(client.round_trip(&[b"get", b"blob"]), Value::Str(big));
}

#[test]
fn keys_expire_while_the_connection_is_quiet() {
   let mut client = Client::connect(spawn_server());

   assert_eq!(client.round_trip(&[b"set", b"k", b"v"]), Value::Nil);
   assert_eq!(client.round_trip(&[b"pexpire", b"k", b"50"]), Value::Int(1));
   thread::sleep(Duration::from_millis(150));
   assert_eq!(client.round_trip(&[b"get", b"k"]), Value::Nil);
   assert_eq!(client.round_trip(&[b"pttl", b"k"]), Value::Int(-2));
}

#[test]
fn unknown_commands_keep_the_connection_alive() {
   let mut client = Client::connect(spawn_server());

   match client.round_trip(&[b"frobnicate"]) {
      Value::Err(code, _) => assert_eq!(code, ErrCode::Unknown),
      other => panic!("unexpected reply: {:?}", other),
   }
   assert_eq!(client.round_trip(&[b"get", b"still-works"]), Value::Nil);
}

#[test]
fn a_malformed_frame_drops_the_connection() {
   let addr = spawn_server();
   let mut client = Client::connect(addr);

   // Outer length far beyond the message cap.
   client.stream.write_all(&u32::MAX.to_le_bytes()).unwrap();
   let mut sink = Vec::new();
   assert_eq!(client.stream.read_to_end(&mut sink).unwrap(), 0);

   // The server itself is unharmed.
   let mut second = Client::connect(addr);
   assert_eq!(second.round_trip(&[b"get", b"x"]), Value::Nil);
}

#[test]
fn separate_clients_share_the_keyspace() {
   let addr = spawn_server();
   let mut alpha = Client::connect(addr);
   let mut beta = Client::connect(addr);

   assert_eq!(alpha.round_trip(&[b"set", b"shared", b"payload"]), Value::Nil);
   assert_eq!(beta.round_trip(&[b"get", b"shared"]), Value::Str(b"payload".to_vec()));
}

#[test]
fn silent_connections_are_reaped_after_the_idle_timeout() {
   let mut client = Client::connect(spawn_server());
   client.stream.set_read_timeout(Some(Duration::from_secs(30))).unwrap();

   // No traffic at all: the idle timer must close the socket on its own.
   let mut sink = Vec::new();
   let reaped = client.stream.read_to_end(&mut sink);
   assert!(reaped.is_ok() && sink.is_empty(), "expected a clean eof, got {:?}", reaped);
}

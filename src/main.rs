use hoard::server::Server;
use log::error;
use std::process;

const LISTEN_ADDR : &str = "0.0.0.0:1234";

fn main() {
   env_logger::init();

   let mut server = match Server::new(LISTEN_ADDR) {
      Ok(server) => server,
      Err(err) => {
         error!("unable to bind {}: {}", LISTEN_ADDR, err);
         process::exit(1);
      }
   };

   if let Err(err) = server.run() {
      error!("server terminated: {}", err);
      process::exit(1);
   }
}

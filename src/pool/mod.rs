use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

pub const WORKER_COUNT : usize = 4;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of worker threads draining a FIFO queue.
///
/// The queue is guarded by a mutex and a condition variable; workers block
/// on the condition while it is empty. Jobs are fire-and-forget (there is
/// no result channel) and must own everything they touch — the event loop
/// hands over fully detached structures and never sees them again. The
/// threads run for the life of the process.
pub struct Pool {
   shared: Arc<Shared>,
}

struct Shared {
   queue : Mutex<VecDeque<Job>>,
   ready : Condvar,
}

impl Pool {
   pub fn new(workers: usize) -> Pool {
      let shared = Arc::new(Shared {
         queue : Mutex::new(VecDeque::new()),
         ready : Condvar::new(),
      });

      for _ in 0..workers {
         let shared = shared.clone();
         thread::spawn(move || Pool::work(shared));
      }

      Pool { shared: shared }
   }

   pub fn enqueue(&self, job: Job) {
      let mut queue = self.shared.queue.lock().unwrap();
      queue.push_back(job);
      self.shared.ready.notify_one();
   }

   fn work(shared: Arc<Shared>) {
      loop {
         let job = {
            let mut queue = shared.queue.lock().unwrap();
            while queue.is_empty() {
               queue = shared.ready.wait(queue).unwrap();
            }
            queue.pop_front().unwrap()
         };
         job();
      }
   }
}

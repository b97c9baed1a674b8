//! Optional background worker with a synchronous fallback.
//!
//! Requests are tagged with a [`RequestId`] and a deadline. A reply that does
//! not arrive before the deadline (or a worker that died) is answered by
//! running the same job on the caller's thread; a late worker reply is then
//! discarded. Spawn failures are retried with exponential backoff.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use foundation::time::Time;
use tracing::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffloadError {
    Spawn(String),
    Disconnected,
}

impl std::fmt::Display for OffloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffloadError::Spawn(msg) => write!(f, "failed to spawn worker: {msg}"),
            OffloadError::Disconnected => write!(f, "worker disconnected"),
        }
    }
}

impl std::error::Error for OffloadError {}

/// How a request was answered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    Worker,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply<Resp> {
    pub id: RequestId,
    pub response: Resp,
    pub completion: Completion,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OffloadStats {
    pub submitted: u64,
    pub worker_replies: u64,
    pub fallbacks: u64,
    pub late_discarded: u64,
    pub spawn_failures: u64,
}

/// Exponential retry schedule.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Backoff {
    pub initial_s: f64,
    pub max_s: f64,
    failures: u32,
    retry_at: Option<Time>,
}

impl Backoff {
    pub fn new(initial_s: f64, max_s: f64) -> Self {
        Self {
            initial_s,
            max_s,
            failures: 0,
            retry_at: None,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn ready(&self, now: Time) -> bool {
        self.retry_at.is_none_or(|at| now.0 >= at.0)
    }

    /// Records a failure and returns the delay before the next attempt.
    pub fn fail(&mut self, now: Time) -> f64 {
        let exp = self.failures.min(16) as i32;
        let delay = (self.initial_s * 2f64.powi(exp)).min(self.max_s);
        self.failures = self.failures.saturating_add(1);
        self.retry_at = Some(now.after(delay));
        delay
    }

    pub fn succeed(&mut self) {
        self.failures = 0;
        self.retry_at = None;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(0.5, 30.0)
    }
}

type Job<Req, Resp> = Arc<dyn Fn(Req) -> Resp + Send + Sync>;

struct Worker<Req, Resp> {
    tx: Sender<(RequestId, Req)>,
    rx: Receiver<(RequestId, Resp)>,
}

struct Pending<Req> {
    request: Req,
    deadline: Time,
}

pub struct Offload<Req, Resp> {
    job: Job<Req, Resp>,
    enabled: bool,
    timeout_s: f64,
    worker: Option<Worker<Req, Resp>>,
    pending: BTreeMap<RequestId, Pending<Req>>,
    ready: Vec<Reply<Resp>>,
    next_id: u64,
    backoff: Backoff,
    stats: OffloadStats,
}

impl<Req, Resp> std::fmt::Debug for Offload<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Offload")
            .field("enabled", &self.enabled)
            .field("worker", &self.worker.is_some())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<Req, Resp> Offload<Req, Resp>
where
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(job: impl Fn(Req) -> Resp + Send + Sync + 'static, timeout_s: f64) -> Self {
        Self {
            job: Arc::new(job),
            enabled: true,
            timeout_s,
            worker: None,
            pending: BTreeMap::new(),
            ready: Vec::new(),
            next_id: 0,
            backoff: Backoff::default(),
            stats: OffloadStats::default(),
        }
    }

    /// Never spawns a thread; every request is answered synchronously.
    pub fn synchronous(job: impl Fn(Req) -> Resp + Send + Sync + 'static) -> Self {
        Self {
            enabled: false,
            ..Self::new(job, 0.0)
        }
    }

    pub fn stats(&self) -> OffloadStats {
        self.stats
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn submit(&mut self, now: Time, request: Req) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.stats.submitted += 1;

        self.ensure_worker(now);
        let sent = match &self.worker {
            Some(w) => w.tx.send((id, request.clone())).is_ok(),
            None => false,
        };

        if sent {
            self.pending.insert(
                id,
                Pending {
                    request,
                    deadline: now.after(self.timeout_s),
                },
            );
        } else {
            if self.worker.take().is_some() {
                self.worker_lost(now);
            }
            self.run_fallback(id, request);
        }
        id
    }

    /// Collects replies: worker results first, then synchronous answers for
    /// anything past its deadline.
    pub fn poll(&mut self, now: Time) -> Vec<Reply<Resp>> {
        let mut lost = false;
        if let Some(worker) = &self.worker {
            loop {
                match worker.rx.try_recv() {
                    Ok((id, response)) => {
                        if self.pending.remove(&id).is_some() {
                            self.stats.worker_replies += 1;
                            self.ready.push(Reply {
                                id,
                                response,
                                completion: Completion::Worker,
                            });
                        } else {
                            self.stats.late_discarded += 1;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        lost = true;
                        break;
                    }
                }
            }
        }
        if lost {
            self.worker = None;
            self.worker_lost(now);
        }

        let overdue: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| lost || now.0 >= p.deadline.0)
            .map(|(id, _)| *id)
            .collect();
        for id in overdue {
            if let Some(p) = self.pending.remove(&id) {
                debug!("offload request {} timed out; running inline", id.0);
                self.run_fallback(id, p.request);
            }
        }

        std::mem::take(&mut self.ready)
    }

    /// Detaches the worker and forgets pending work.
    pub fn shutdown(&mut self) {
        self.worker = None;
        self.pending.clear();
        self.ready.clear();
    }

    fn run_fallback(&mut self, id: RequestId, request: Req) {
        self.stats.fallbacks += 1;
        let response = (self.job)(request);
        self.ready.push(Reply {
            id,
            response,
            completion: Completion::Fallback,
        });
    }

    fn worker_lost(&mut self, now: Time) {
        let delay = self.backoff.fail(now);
        warn!("offload worker lost; retrying in {delay:.1}s");
    }

    fn ensure_worker(&mut self, now: Time) {
        if !self.enabled || self.worker.is_some() || !self.backoff.ready(now) {
            return;
        }
        match spawn_worker(self.job.clone()) {
            Ok(worker) => {
                self.backoff.succeed();
                self.worker = Some(worker);
            }
            Err(err) => {
                self.stats.spawn_failures += 1;
                let delay = self.backoff.fail(now);
                warn!("{err}; retrying in {delay:.1}s");
            }
        }
    }
}

fn spawn_worker<Req, Resp>(job: Job<Req, Resp>) -> Result<Worker<Req, Resp>, OffloadError>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let (req_tx, req_rx) = mpsc::channel::<(RequestId, Req)>();
    let (resp_tx, resp_rx) = mpsc::channel::<(RequestId, Resp)>();
    thread::Builder::new()
        .name("offload-worker".to_string())
        .spawn(move || {
            while let Ok((id, req)) = req_rx.recv() {
                if resp_tx.send((id, job(req))).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| OffloadError::Spawn(e.to_string()))?;
    Ok(Worker {
        tx: req_tx,
        rx: resp_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::{Backoff, Completion, Offload};
    use foundation::time::Time;
    use std::time::Duration;

    #[test]
    fn synchronous_mode_answers_immediately() {
        let mut off = Offload::synchronous(|x: u32| x * 2);
        let id = off.submit(Time(0.0), 21);
        let replies = off.poll(Time(0.0));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, id);
        assert_eq!(replies[0].response, 42);
        assert_eq!(replies[0].completion, Completion::Fallback);
        assert!(!off.has_worker());
    }

    #[test]
    fn worker_replies_arrive_before_deadline() {
        let mut off = Offload::new(|x: u32| x + 1, 60.0);
        off.submit(Time(0.0), 1);
        let mut replies = Vec::new();
        for _ in 0..200 {
            replies.extend(off.poll(Time(0.0)));
            if !replies.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].response, 2);
        assert_eq!(replies[0].completion, Completion::Worker);
    }

    #[test]
    fn timeout_falls_back_and_discards_late_reply() {
        let mut off = Offload::new(
            |x: u32| {
                if std::thread::current().name() == Some("offload-worker") {
                    std::thread::sleep(Duration::from_millis(50));
                }
                x * 10
            },
            0.01,
        );
        off.submit(Time(0.0), 3);
        let replies = off.poll(Time(1.0));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].response, 30);
        assert_eq!(replies[0].completion, Completion::Fallback);

        std::thread::sleep(Duration::from_millis(150));
        assert!(off.poll(Time(2.0)).is_empty());
        assert_eq!(off.stats().late_discarded, 1);
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let mut b = Backoff::new(0.5, 2.0);
        assert!(b.ready(Time(0.0)));
        assert_eq!(b.fail(Time(0.0)), 0.5);
        assert!(!b.ready(Time(0.4)));
        assert!(b.ready(Time(0.5)));
        assert_eq!(b.fail(Time(0.5)), 1.0);
        assert_eq!(b.fail(Time(1.5)), 2.0);
        assert_eq!(b.fail(Time(3.5)), 2.0);
        b.succeed();
        assert_eq!(b.failures(), 0);
    }
}

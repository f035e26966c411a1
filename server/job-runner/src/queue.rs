//! At-least-once work queue with leases, a retry ceiling and dead letters.
//!
//! A dequeued item is leased for `work_item_timeout`. It leaves the queue only
//! through [`Queue::complete`]. Abandoning it, or letting the lease expire,
//! counts as a failed attempt; once an item has been delivered `retries + 1`
//! times a further failure parks it in the dead-letter list.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
  pub retries: u32,
  pub work_item_timeout: Duration,
}

impl Default for QueueOptions {
  fn default() -> Self {
    Self {
      retries: 5,
      work_item_timeout: Duration::from_secs(2 * 60 * 60),
    }
  }
}

/// A leased copy of a queued value.
#[derive(Debug, Clone)]
pub struct WorkItem<T> {
  pub id: String,
  pub value: T,
  /// Deliveries so far, including this one.
  pub attempts: u32,
  pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
  pub queued: usize,
  pub working: usize,
  pub dead_letters: usize,
  pub enqueued: u64,
  pub dequeued: u64,
  pub completed: u64,
  pub abandoned: u64,
  pub timeouts: u64,
}

#[async_trait]
pub trait Queue<T: Send + 'static>: Send + Sync {
  async fn enqueue(&self, value: T) -> Result<String, QueueError>;

  /// Lease the next ready item, waiting up to `wait` for one to arrive.
  async fn dequeue(&self, wait: Duration) -> Result<Option<WorkItem<T>>, QueueError>;

  async fn complete(&self, id: &str) -> Result<(), QueueError>;

  async fn abandon(&self, id: &str) -> Result<(), QueueError>;

  /// Abandon the item and replace its payload for later deliveries. Counts as
  /// a failed attempt, like [`Queue::abandon`].
  async fn abandon_with(&self, id: &str, value: T) -> Result<(), QueueError>;

  async fn stats(&self) -> QueueStats;

  async fn dead_letters(&self) -> Vec<WorkItem<T>>;
}

#[derive(Debug, Clone)]
struct Entry<T> {
  id: String,
  value: T,
  attempts: u32,
  enqueued_at: DateTime<Utc>,
}

impl<T: Clone> Entry<T> {
  fn to_item(&self) -> WorkItem<T> {
    WorkItem {
      id: self.id.clone(),
      value: self.value.clone(),
      attempts: self.attempts,
      enqueued_at: self.enqueued_at,
    }
  }
}

struct Lease<T> {
  entry: Entry<T>,
  expires_at: Instant,
}

struct State<T> {
  ready: VecDeque<Entry<T>>,
  working: HashMap<String, Lease<T>>,
  dead: Vec<Entry<T>>,
  enqueued: u64,
  dequeued: u64,
  completed: u64,
  abandoned: u64,
  timeouts: u64,
}

impl<T> Default for State<T> {
  fn default() -> Self {
    Self {
      ready: VecDeque::new(),
      working: HashMap::new(),
      dead: Vec::new(),
      enqueued: 0,
      dequeued: 0,
      completed: 0,
      abandoned: 0,
      timeouts: 0,
    }
  }
}

impl<T> State<T> {
  fn retry_or_bury(&mut self, entry: Entry<T>, retries: u32) {
    if entry.attempts > retries {
      warn!(item = %entry.id, attempts = entry.attempts, "work item exhausted retries; moved to dead letters");
      self.dead.push(entry);
    } else {
      self.ready.push_back(entry);
    }
  }

  fn reclaim_expired(&mut self, now: Instant, retries: u32) -> bool {
    let expired: Vec<String> = self
      .working
      .iter()
      .filter(|(_, lease)| lease.expires_at <= now)
      .map(|(id, _)| id.clone())
      .collect();

    for id in &expired {
      if let Some(lease) = self.working.remove(id) {
        debug!(item = %id, attempts = lease.entry.attempts, "work item lease expired");
        self.timeouts += 1;
        self.retry_or_bury(lease.entry, retries);
      }
    }
    !expired.is_empty()
  }

  fn next_expiry(&self) -> Option<Instant> {
    self.working.values().map(|lease| lease.expires_at).min()
  }
}

pub struct InMemoryQueue<T> {
  options: QueueOptions,
  state: Mutex<State<T>>,
  notify: Notify,
}

impl<T> InMemoryQueue<T> {
  pub fn new(options: QueueOptions) -> Self {
    Self {
      options,
      state: Mutex::new(State::default()),
      notify: Notify::new(),
    }
  }
}

impl<T> InMemoryQueue<T> {
  async fn release(&self, id: &str, value: Option<T>) -> Result<(), QueueError> {
    {
      let mut state = self.state.lock().await;
      let mut lease = state
        .working
        .remove(id)
        .ok_or_else(|| QueueError::NotInProgress(id.to_string()))?;
      if let Some(value) = value {
        lease.entry.value = value;
      }
      state.abandoned += 1;
      state.retry_or_bury(lease.entry, self.options.retries);
    }
    self.notify.notify_waiters();
    Ok(())
  }
}

impl<T> Default for InMemoryQueue<T> {
  fn default() -> Self {
    Self::new(QueueOptions::default())
  }
}

#[async_trait]
impl<T> Queue<T> for InMemoryQueue<T>
where
  T: Clone + Send + Sync + 'static,
{
  async fn enqueue(&self, value: T) -> Result<String, QueueError> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    {
      let mut state = self.state.lock().await;
      state.ready.push_back(Entry {
        id: id.clone(),
        value,
        attempts: 0,
        enqueued_at: Utc::now(),
      });
      state.enqueued += 1;
    }
    self.notify.notify_waiters();
    Ok(id)
  }

  async fn dequeue(&self, wait: Duration) -> Result<Option<WorkItem<T>>, QueueError> {
    let deadline = Instant::now() + wait;
    loop {
      // Registered before the state check so an enqueue in between still wakes us.
      let notified = self.notify.notified();

      let wake_at = {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.reclaim_expired(now, self.options.retries);

        if let Some(mut entry) = state.ready.pop_front() {
          entry.attempts += 1;
          let item = entry.to_item();
          state.dequeued += 1;
          state.working.insert(
            entry.id.clone(),
            Lease {
              entry,
              expires_at: now + self.options.work_item_timeout,
            },
          );
          return Ok(Some(item));
        }

        if now >= deadline {
          return Ok(None);
        }
        match state.next_expiry() {
          Some(expiry) if expiry < deadline => expiry,
          _ => deadline,
        }
      };

      tokio::select! {
        _ = notified => {}
        _ = tokio::time::sleep_until(wake_at) => {}
      }
    }
  }

  async fn complete(&self, id: &str) -> Result<(), QueueError> {
    let mut state = self.state.lock().await;
    if state.working.remove(id).is_none() {
      return Err(QueueError::NotInProgress(id.to_string()));
    }
    state.completed += 1;
    Ok(())
  }

  async fn abandon(&self, id: &str) -> Result<(), QueueError> {
    self.release(id, None).await
  }

  async fn abandon_with(&self, id: &str, value: T) -> Result<(), QueueError> {
    self.release(id, Some(value)).await
  }

  async fn stats(&self) -> QueueStats {
    let mut state = self.state.lock().await;
    state.reclaim_expired(Instant::now(), self.options.retries);
    QueueStats {
      queued: state.ready.len(),
      working: state.working.len(),
      dead_letters: state.dead.len(),
      enqueued: state.enqueued,
      dequeued: state.dequeued,
      completed: state.completed,
      abandoned: state.abandoned,
      timeouts: state.timeouts,
    }
  }

  async fn dead_letters(&self) -> Vec<WorkItem<T>> {
    let state = self.state.lock().await;
    state.dead.iter().map(Entry::to_item).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  fn queue(retries: u32, timeout_secs: u64) -> InMemoryQueue<String> {
    InMemoryQueue::new(QueueOptions {
      retries,
      work_item_timeout: Duration::from_secs(timeout_secs),
    })
  }

  #[tokio::test(start_paused = true)]
  async fn delivers_in_fifo_order() {
    let q = queue(1, 60);
    q.enqueue("a".into()).await.unwrap();
    q.enqueue("b".into()).await.unwrap();

    let first = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    let second = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(first.value, "a");
    assert_eq!(second.value, "b");
    assert_eq!(first.attempts, 1);

    q.complete(&first.id).await.unwrap();
    q.complete(&second.id).await.unwrap();
    let stats = q.stats().await;
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.queued + stats.working, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn empty_queue_returns_none_after_wait() {
    let q = queue(1, 60);
    let started = Instant::now();
    assert!(q.dequeue(Duration::from_secs(3)).await.unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_secs(3));
  }

  #[tokio::test(start_paused = true)]
  async fn waiting_consumer_wakes_on_enqueue() {
    let q = Arc::new(queue(1, 60));
    let consumer = {
      let q = Arc::clone(&q);
      tokio::spawn(async move { q.dequeue(Duration::from_secs(30)).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    q.enqueue("late".into()).await.unwrap();

    let item = consumer.await.unwrap().unwrap().unwrap();
    assert_eq!(item.value, "late");
  }

  #[tokio::test(start_paused = true)]
  async fn abandoned_items_are_retried_then_dead_lettered() {
    let q = queue(2, 60);
    q.enqueue("poison".into()).await.unwrap();

    for attempt in 1..=3 {
      let item = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
      assert_eq!(item.attempts, attempt);
      q.abandon(&item.id).await.unwrap();
    }

    assert!(q.dequeue(Duration::ZERO).await.unwrap().is_none());
    let dead = q.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 3);
    assert_eq!(q.stats().await.abandoned, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn expired_lease_is_redelivered() {
    let q = queue(1, 10);
    q.enqueue("slow".into()).await.unwrap();
    let first = q.dequeue(Duration::ZERO).await.unwrap().unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;
    let again = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.attempts, 2);

    let stats = q.stats().await;
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.working, 1);
    assert_eq!(stats.queued, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn consumer_waiting_on_empty_queue_picks_up_expired_lease() {
    let q = queue(1, 5);
    q.enqueue("stuck".into()).await.unwrap();
    let leased = q.dequeue(Duration::ZERO).await.unwrap().unwrap();

    let redelivered = q.dequeue(Duration::from_secs(20)).await.unwrap().unwrap();
    assert_eq!(redelivered.id, leased.id);
    assert_eq!(redelivered.attempts, 2);
  }

  #[tokio::test(start_paused = true)]
  async fn completing_unknown_item_is_an_error() {
    let q = queue(1, 60);
    assert!(matches!(
      q.complete("missing").await,
      Err(QueueError::NotInProgress(id)) if id == "missing"
    ));
    assert!(q.abandon("missing").await.is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn abandon_with_redelivers_the_replacement_payload() {
    let q = queue(1, 60);
    q.enqueue("a,b,c".into()).await.unwrap();

    let item = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    q.abandon_with(&item.id, "c".into()).await.unwrap();

    let again = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(again.id, item.id);
    assert_eq!(again.value, "c");
    assert_eq!(again.attempts, 2);

    q.abandon_with(&again.id, "c".into()).await.unwrap();
    let dead = q.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].value, "c");
  }

  #[tokio::test(start_paused = true)]
  async fn zero_retries_dead_letters_on_first_failure() {
    let q = queue(0, 60);
    q.enqueue("once".into()).await.unwrap();
    let item = q.dequeue(Duration::ZERO).await.unwrap().unwrap();
    q.abandon(&item.id).await.unwrap();

    let stats = q.stats().await;
    assert_eq!(stats.dead_letters, 1);
    assert_eq!(stats.queued, 0);
  }
}

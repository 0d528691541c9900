//! Inactivity reaper.
//!
//! On every tick, participants whose last heartbeat is older than the
//! inactivity window are evicted and a "left" status message is recorded
//! for each. Deciding what to write ([`departures`]) is kept apart from
//! writing it so ticks can be driven by hand with a [`ManualClock`].
//!
//! [`ManualClock`]: crate::clock::ManualClock

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{error, info};

use crate::{
    clock::Clock,
    log::{Draft, MessageLog},
    registry::{Participant, Registry},
};

/// One departure announcement per evicted participant, in eviction order.
pub fn departures(evicted: &[Participant]) -> Vec<Draft> {
    evicted.iter().map(|p| Draft::left(&p.name)).collect()
}

#[derive(Debug, Default)]
pub struct Sweep {
    pub evicted: Vec<Participant>,
    pub announced: usize,
}

pub struct Reaper {
    clock: Arc<dyn Clock>,
    registry: Arc<Registry>,
    log: Arc<MessageLog>,
    window: Duration,
    /// Departures already decided but not yet in the log.
    pending: VecDeque<Draft>,
}

impl Reaper {
    pub fn new(
        clock: Arc<dyn Clock>,
        registry: Arc<Registry>,
        log: Arc<MessageLog>,
        window: Duration,
    ) -> Self {
        Self {
            clock,
            registry,
            log,
            window,
            pending: VecDeque::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Runs a single sweep.
    ///
    /// Departures left over from an interrupted sweep are written first. A
    /// departure leaves the queue only once it is in the log, so each
    /// eviction is announced exactly once.
    pub fn tick(&mut self) -> Sweep {
        let mut announced = self.flush();

        let threshold = self.clock.now() - self.window;
        let evicted = self.registry.evict_stale_before(threshold);
        self.pending.extend(departures(&evicted));
        announced += self.flush();

        Sweep { evicted, announced }
    }

    fn flush(&mut self) -> usize {
        let mut written = 0;
        while let Some(draft) = self.pending.front() {
            self.log.append(draft.clone());
            self.pending.pop_front();
            written += 1;
        }
        written
    }

    /// Starts sweeping every `interval` on the current runtime.
    ///
    /// A panicking sweep is logged and the next tick carries on. Dropping the
    /// returned handle detaches the task; only [`ReaperHandle::shutdown`]
    /// stops it.
    pub fn spawn(mut self, interval: Duration) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut detached = false;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                            Ok(sweep) => {
                                for p in &sweep.evicted {
                                    info!(name = %p.name, "participant timed out");
                                }
                            }
                            Err(_) => {
                                error!(pending = self.pending(), "sweep panicked, will retry next tick");
                            }
                        }
                    }
                    signal = shutdown_rx.recv(), if !detached => match signal {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            info!("reaper stopping");
                            break;
                        }
                        Err(RecvError::Closed) => detached = true,
                    },
                }
            }
        });

        ReaperHandle { shutdown_tx, task }
    }
}

/// Owner of a running reaper task.
#[must_use = "dropping the handle leaves the reaper running with no way to stop it"]
pub struct ReaperHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals the task and waits for it to finish its current tick.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "reaper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use time::OffsetDateTime;

    use crate::{
        clock::ManualClock,
        log::{BROADCAST_TARGET, JOINED_TEXT, LEFT_TEXT, MessageKind},
    };

    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    struct Fixture {
        clock: Arc<ManualClock>,
        registry: Arc<Registry>,
        log: Arc<MessageLog>,
        reaper: Reaper,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let registry = Arc::new(Registry::new(clock.clone()));
        let log = Arc::new(MessageLog::new(clock.clone()));
        let reaper = Reaper::new(clock.clone(), registry.clone(), log.clone(), WINDOW);
        Fixture { clock, registry, log, reaper }
    }

    /// Panics on the n-th call to `now()` after being armed.
    struct FlakyClock {
        inner: ManualClock,
        countdown: AtomicI64,
    }

    impl FlakyClock {
        fn arm(&self, nth_call: i64) {
            self.countdown.store(nth_call, Ordering::SeqCst);
        }
    }

    impl Clock for FlakyClock {
        fn now(&self) -> OffsetDateTime {
            if self.countdown.fetch_sub(1, Ordering::SeqCst) == 1 {
                panic!("clock unavailable");
            }
            self.inner.now()
        }
    }

    #[test]
    fn departures_are_status_broadcasts() {
        let p = Participant {
            name: "Alice".into(),
            last_seen: OffsetDateTime::UNIX_EPOCH,
        };
        let drafts = departures(&[p]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].from, "Alice");
        assert_eq!(drafts[0].to, BROADCAST_TARGET);
        assert_eq!(drafts[0].text, LEFT_TEXT);
        assert_eq!(drafts[0].kind, MessageKind::Status);
    }

    #[test]
    fn quiet_tick_writes_nothing() {
        let mut f = fixture();
        f.registry.join("Alice").unwrap();
        f.clock.advance(Duration::from_secs(3));

        let sweep = f.reaper.tick();
        assert!(sweep.evicted.is_empty());
        assert_eq!(sweep.announced, 0);
        assert!(f.log.is_empty());
    }

    #[test]
    fn evicts_only_the_silent() {
        let mut f = fixture();
        f.registry.join("Alice").unwrap();
        f.registry.join("Bob").unwrap();
        f.clock.advance(Duration::from_secs(8));
        f.registry.heartbeat("Bob").unwrap();
        f.clock.advance(Duration::from_secs(3));

        let sweep = f.reaper.tick();
        assert_eq!(sweep.evicted.len(), 1);
        assert_eq!(sweep.evicted[0].name, "Alice");
        assert_eq!(sweep.announced, 1);
        assert!(f.registry.exists("Bob"));

        let log = f.log.query("Bob").to_vec();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from, "Alice");
        assert_eq!(log[0].text, LEFT_TEXT);
        assert_eq!(log[0].time, "00:00:11");

        // nothing left to do
        assert_eq!(f.reaper.tick().announced, 0);
        assert_eq!(f.log.len(), 1);
    }

    #[test]
    fn exactly_at_window_is_kept() {
        let mut f = fixture();
        f.registry.join("Alice").unwrap();
        f.clock.advance(WINDOW);
        assert!(f.reaper.tick().evicted.is_empty());
        f.clock.advance(Duration::from_millis(1));
        assert_eq!(f.reaper.tick().evicted.len(), 1);
    }

    #[test]
    fn leftover_departures_go_first_and_only_once() {
        let mut f = fixture();
        f.reaper.pending.push_back(Draft::left("Carol"));
        f.registry.join("Alice").unwrap();
        f.clock.advance(Duration::from_secs(11));

        let sweep = f.reaper.tick();
        assert_eq!(sweep.evicted.len(), 1);
        assert_eq!(sweep.announced, 2);
        assert_eq!(f.reaper.pending(), 0);

        let froms: Vec<_> = f.log.query("Bob").iter().map(|m| m.from.clone()).collect();
        assert_eq!(froms, ["Carol", "Alice"]);

        for _ in 0..3 {
            assert_eq!(f.reaper.tick().announced, 0);
        }
        assert_eq!(f.log.len(), 2);
    }

    #[test]
    fn interrupted_sweep_announces_on_the_next_tick() {
        let clock = Arc::new(FlakyClock {
            inner: ManualClock::default(),
            countdown: AtomicI64::new(0),
        });
        let registry = Arc::new(Registry::new(clock.clone()));
        let log = Arc::new(MessageLog::new(clock.clone()));
        let mut reaper = Reaper::new(clock.clone(), registry.clone(), log.clone(), WINDOW);

        registry.join("Alice").unwrap();
        clock.inner.advance(Duration::from_secs(11));

        // first now() computes the threshold, the second stamps the departure
        // while the log's write guard is held
        clock.arm(2);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reaper.tick()));
        assert!(outcome.is_err());
        assert!(!registry.exists("Alice"));
        assert!(log.is_empty());
        assert_eq!(reaper.pending(), 1);

        let sweep = reaper.tick();
        assert_eq!(sweep.announced, 1);
        assert_eq!(reaper.pending(), 0);
        assert_eq!(reaper.tick().announced, 0);

        let texts: Vec<_> = log.query("Bob").iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, [LEFT_TEXT]);

        // the log still takes writes after the panic under its guard
        registry.join("Bob").unwrap();
        log.append(Draft::joined("Bob"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.query("Bob").to_vec()[1].text, JOINED_TEXT);
    }

    #[tokio::test]
    async fn spawned_reaper_sweeps_and_stops() {
        let f = fixture();
        f.registry.join("Alice").unwrap();
        f.clock.advance(Duration::from_secs(30));

        let handle = f.reaper.spawn(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert!(!f.registry.exists("Alice"));
        assert_eq!(f.log.len(), 1);
    }

    #[tokio::test]
    async fn dropped_handle_keeps_sweeping() {
        let f = fixture();
        let handle = f.reaper.spawn(Duration::from_millis(5));
        drop(handle);

        f.registry.join("Alice").unwrap();
        f.clock.advance(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!f.registry.exists("Alice"));
        assert_eq!(f.log.len(), 1);
    }
}

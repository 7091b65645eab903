use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    Shutdown,
}

/// Timer and Ctrl-C source for the watch loop. Only forwards events; all
/// work happens on the receiving side, one event at a time.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    /// The first tick fires immediately, then once per `period`.
    pub fn new(period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let task = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(period);
            // A capture slower than the period drops ticks instead of bunching them.
            tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick_interval.tick() => {
                        if tx.send(Event::Tick).is_err() {
                            break;
                        }
                    }
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(e) = signal {
                            tracing::warn!("could not listen for Ctrl-C: {e}");
                        }
                        let _ = tx.send(Event::Shutdown);
                        break;
                    }
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

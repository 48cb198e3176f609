use std::{fmt, future::Future};

use tokio::{sync::mpsc, task::JoinHandle};

/// Identifies one load cycle; results tagged with an older generation are dropped
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Tagged<M> {
    generation: Generation,

    /// `None` when the task ended without producing its message
    msg: Option<M>,
}

/// Reports exactly once per task, even if the task panics or is aborted
struct Reporter<M> {
    generation: Generation,
    sender: Option<mpsc::UnboundedSender<Tagged<M>>>,
}

impl<M> Reporter<M> {
    fn report(mut self, msg: M) {
        if let Some(sender) = self.sender.take() {
            // the receiver lives as long as the dispatcher, and a dropped
            // dispatcher has no use for the result anyway
            let _ = sender.send(Tagged {
                generation: self.generation,
                msg: Some(msg),
            });
        }
    }
}

impl<M> Drop for Reporter<M> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Tagged {
                generation: self.generation,
                msg: None,
            });
        }
    }
}

/// Runs fetches as independent tasks and funnels their results back to a
/// single owner, one at a time
///
/// Each spawned future produces exactly one message. The owner pulls them with
/// `recv`, so all state mutation happens on its side, in arrival order.
pub(crate) struct Dispatcher<M> {
    generation: Generation,
    in_flight: usize,
    sender: mpsc::UnboundedSender<Tagged<M>>,
    receiver: mpsc::UnboundedReceiver<Tagged<M>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<M: Send + 'static> Dispatcher<M> {
    pub(crate) fn new() -> Dispatcher<M> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Dispatcher {
            generation: Generation::default(),
            in_flight: 0,
            sender,
            receiver,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Must be called from within a tokio runtime
    pub(crate) fn spawn<F>(&mut self, fut: F)
    where
        F: 'static + Send + Future<Output = M>,
    {
        let reporter = Reporter {
            generation: self.generation,
            sender: Some(self.sender.clone()),
        };
        self.in_flight += 1;
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(async move {
            let msg = fut.await;
            reporter.report(msg);
        }));
    }

    /// Abandon everything in flight and start a new generation
    pub(crate) fn restart(&mut self) -> Generation {
        for t in self.tasks.drain(..) {
            t.abort();
        }
        self.in_flight = 0;
        self.generation = Generation(self.generation.0 + 1);
        self.generation
    }

    /// Next result of the current generation, or `None` once nothing is in flight
    pub(crate) async fn recv(&mut self) -> Option<M> {
        loop {
            if self.in_flight == 0 {
                return None;
            }
            let tagged = self.receiver.recv().await?;
            if tagged.generation != self.generation {
                tracing::debug!(
                    stale = %tagged.generation,
                    current = %self.generation,
                    "discarding result from superseded generation"
                );
                continue;
            }
            self.in_flight -= 1;
            match tagged.msg {
                Some(msg) => return Some(msg),
                None => {
                    tracing::warn!(
                        generation = %self.generation,
                        "fetch task died, dropping its branch"
                    );
                    continue;
                }
            }
        }
    }
}

impl<M> Drop for Dispatcher<M> {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}

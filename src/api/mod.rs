//! The presentation boundary: a machine running as a single tokio task.
//!
//! Events go in through a [`MachineHandle`]; state comes out as [`Snapshot`]s
//! on a watch channel. Fetches run on their own tasks and their outcomes are
//! queued back into the same loop, so the machine only ever sees one event at
//! a time.

use tokio::sync::{mpsc, oneshot, watch};

use crate::errors::*;
use crate::fetcher::Fetcher;
use crate::key_types::KeyManager;
use crate::machine::{Event, FetchOutcome, Machine};

pub mod types;

pub use self::types::{ErrorView, KeypairView, RecordView, Snapshot, StateValue};

struct Command {
    event: Event,
    ack: Option<oneshot::Sender<Snapshot>>,
}

/// Cheap to clone; the machine stops once every handle is dropped.
#[derive(Clone)]
pub struct MachineHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

/// Run `machine` on the current tokio runtime. `init` happens before the
/// first event is processed.
pub fn spawn<F: Fetcher, K: KeyManager>(mut machine: Machine<F, K>) -> MachineHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    machine.init();
    let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot());

    tokio::spawn(run(machine, commands_rx, snapshots_tx));

    MachineHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
    }
}

async fn run<F: Fetcher, K: KeyManager>(
    mut machine: Machine<F, K>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Snapshot>,
) {
    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<FetchOutcome>();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Command { event, ack } = match command {
                    Some(command) => command,
                    None => break,
                };

                if let Some(pending) = machine.send(event) {
                    let settled = settled_tx.clone();
                    tokio::spawn(async move {
                        // Nobody to tell if the machine is gone
                        let _ = settled.send(pending.run().await);
                    });
                }

                let snapshot = machine.snapshot();
                snapshots.send_replace(snapshot.clone());
                if let Some(ack) = ack {
                    let _ = ack.send(snapshot);
                }
            }
            Some(outcome) = settled_rx.recv() => {
                machine.settle(outcome);
                snapshots.send_replace(machine.snapshot());
            }
        }
    }

    debug!("all handles dropped, machine stopping");
}

impl MachineHandle {
    /// Queue an event without waiting for it to be applied.
    pub fn send(&self, event: Event) -> Result<()> {
        self.commands
            .send(Command {
                event: event,
                ack: None,
            })
            .map_err(|_| ErrorKind::MachineStopped.into())
    }

    /// Apply an event and return the state right after it. A fetch started by
    /// the event will still be in flight.
    pub async fn dispatch(&self, event: Event) -> Result<Snapshot> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command {
                event: event,
                ack: Some(ack_tx),
            })
            .map_err(|_| Error::from(ErrorKind::MachineStopped))?;

        ack_rx.await.map_err(|_| ErrorKind::MachineStopped.into())
    }

    /// The latest published state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait for the first published state (including the current one) that
    /// satisfies `pred`.
    pub async fn wait_until<P>(&self, mut pred: P) -> Result<Snapshot>
    where
        P: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&snapshot) {
                    return Ok(snapshot.clone());
                }
            }

            rx.changed()
                .await
                .map_err(|_| Error::from(ErrorKind::MachineStopped))?;
        }
    }
}

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::{Engine, EngineMessage, HostMessage};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Host side of a running engine worker.
#[derive(Debug)]
pub struct EngineHandle {
    sender: Sender<HostMessage>,
    receiver: Receiver<EngineMessage>,
    worker: JoinHandle<()>,
}

pub fn spawn_engine(config: EngineConfig) -> Result<EngineHandle, EngineError> {
    let mut engine = Engine::new(config)?;
    let (host_tx, inbox) = mpsc::channel();
    let (outbox, host_rx) = mpsc::channel();

    let worker = thread::Builder::new()
        .name("splat-engine".to_string())
        .spawn(move || run_worker(&mut engine, &inbox, &outbox))?;

    Ok(EngineHandle {
        sender: host_tx,
        receiver: host_rx,
        worker,
    })
}

/// Serves `inbox` until the host hangs up.
///
/// Each round blocks for one message, drains whatever else is queued, flushes
/// ingestion responses and then runs at most one sort for the newest view.
pub fn run_worker(
    engine: &mut Engine,
    inbox: &Receiver<HostMessage>,
    outbox: &Sender<EngineMessage>,
) {
    let mut responses = Vec::new();
    loop {
        let first = match inbox.recv() {
            Ok(message) => message,
            Err(_) => break,
        };
        trace!(kind = first.kind(), "engine message");
        engine.handle(first, &mut responses);

        let mut host_gone = false;
        loop {
            match inbox.try_recv() {
                Ok(message) => {
                    trace!(kind = message.kind(), "engine message");
                    engine.handle(message, &mut responses);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    host_gone = true;
                    break;
                }
            }
        }

        for response in responses.drain(..) {
            if outbox.send(response).is_err() {
                debug!("host receiver dropped, stopping engine");
                return;
            }
        }
        if let Some(order) = engine.sort_pending() {
            if outbox.send(order).is_err() {
                debug!("host receiver dropped, stopping engine");
                return;
            }
        }
        if host_gone {
            break;
        }
    }
    debug!(splats = engine.store().count(), "engine worker exiting");
}

impl EngineHandle {
    pub fn send(&self, message: HostMessage) -> Result<(), EngineError> {
        self.sender
            .send(message)
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Blocks for the next response.
    pub fn recv(&self) -> Result<EngineMessage, EngineError> {
        self.receiver.recv().map_err(|_| EngineError::ChannelClosed)
    }

    pub fn try_recv(&self) -> Result<Option<EngineMessage>, EngineError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::ChannelClosed),
        }
    }

    /// Closes the request channel, lets the worker finish queued work and
    /// returns every response it produced that was not yet received.
    pub fn shutdown(self) -> Result<Vec<EngineMessage>, EngineError> {
        let EngineHandle {
            sender,
            receiver,
            worker,
        } = self;
        drop(sender);
        let remaining: Vec<EngineMessage> = receiver.iter().collect();
        worker.join().map_err(|_| EngineError::WorkerPanicked)?;
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::generate_seeded_splats;
    use crate::math::MAT4_IDENTITY;
    use crate::parser::dot_splat::encode_rows;

    fn assert_permutation(indices: &[u32], count: usize) {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..count as u32).collect::<Vec<u32>>());
    }

    #[test]
    fn queued_views_collapse_into_one_sort() {
        let splats = generate_seeded_splats(200, 3);
        let mut engine = Engine::new(EngineConfig::default()).expect("valid config");
        let (host_tx, inbox) = mpsc::channel();
        let (outbox, host_rx) = mpsc::channel();

        let mut newest = MAT4_IDENTITY;
        newest[10] = -1.0;
        host_tx
            .send(HostMessage::LoadRaw {
                bytes: encode_rows(&splats),
                declared_count: splats.len(),
            })
            .expect("queue load");
        host_tx
            .send(HostMessage::SetView {
                view_proj: MAT4_IDENTITY,
            })
            .expect("queue first view");
        host_tx
            .send(HostMessage::SetView { view_proj: newest })
            .expect("queue second view");
        drop(host_tx);

        run_worker(&mut engine, &inbox, &outbox);
        drop(outbox);
        let responses: Vec<EngineMessage> = host_rx.iter().collect();

        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[0], EngineMessage::TextureUpdate(_)));
        let mut expected = crate::sort::DepthSorter::new(EngineConfig::default().depth_buckets);
        match &responses[1] {
            EngineMessage::OrderUpdate { indices, count } => {
                assert_eq!(*count, 200);
                assert_eq!(*indices, expected.sort(&splats, &newest));
            }
            other => panic!("expected order update, got {other:?}"),
        }
    }

    #[test]
    fn worker_stops_when_host_receiver_is_gone() {
        let mut engine = Engine::new(EngineConfig::default()).expect("valid config");
        let (host_tx, inbox) = mpsc::channel();
        let (outbox, host_rx) = mpsc::channel();
        drop(host_rx);

        host_tx
            .send(HostMessage::SetView {
                view_proj: MAT4_IDENTITY,
            })
            .expect("queue view");
        // The worker returns on the failed send even though the host sender
        // is still alive.
        run_worker(&mut engine, &inbox, &outbox);
        drop(host_tx);
    }

    #[test]
    fn spawned_engine_streams_and_orders_a_scene() {
        let splats = generate_seeded_splats(1_000, 11);
        let bytes = encode_rows(&splats);
        let handle = spawn_engine(EngineConfig::default()).expect("spawn engine");

        for declared in [250, 600, 1_000] {
            handle
                .send(HostMessage::LoadRaw {
                    bytes: bytes[..declared * 32].to_vec(),
                    declared_count: declared,
                })
                .expect("send rows");
        }
        handle
            .send(HostMessage::SetView {
                view_proj: MAT4_IDENTITY,
            })
            .expect("send view");

        let responses = handle.shutdown().expect("clean shutdown");
        let last_texture = responses
            .iter()
            .rev()
            .find_map(|message| match message {
                EngineMessage::TextureUpdate(update) => Some(update),
                _ => None,
            })
            .expect("texture update");
        assert_eq!(last_texture.height, 1);

        match responses.last() {
            Some(EngineMessage::OrderUpdate { indices, count }) => {
                assert_eq!(*count, 1_000);
                assert_permutation(indices, 1_000);
            }
            other => panic!("expected final order update, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_fails_before_spawning() {
        let result = spawn_engine(EngineConfig {
            texture_width: 1000,
            ..EngineConfig::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}

//! Integration tests for the connection lifecycle.
//!
//! The registry must always equal the set of connections that have been
//! opened and not yet closed, whatever order the transport reports events in.
//! The tests below replay scripted and generated open/close sequences
//! against a model `HashSet`, then hammer the façade from several threads to
//! check that concurrent sessions never lose an update.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use ratchet_core::{
    Connection, ConnectionHandler, ConnectionId, Payload, ServerConfig, ServerFacade,
    TransportError,
};

struct TestConnection(ConnectionId);

impl Connection for TestConnection {
    fn id(&self) -> ConnectionId {
        self.0
    }
    fn send(&self, _payload: Payload) -> Result<(), TransportError> {
        Ok(())
    }
    fn close(&self) {}
}

fn connections(count: usize) -> Vec<Arc<dyn Connection>> {
    (0..count)
        .map(|_| Arc::new(TestConnection(ConnectionId::new())) as Arc<dyn Connection>)
        .collect()
}

fn registry_ids(facade: &ServerFacade) -> HashSet<ConnectionId> {
    facade.registry().snapshot().iter().map(|c| c.id()).collect()
}

#[test]
fn test_scripted_interleaving_matches_open_set() {
    // Arrange
    let facade = ServerFacade::new(ServerConfig::default());
    let conns = connections(3);
    let (a, b, c) = (&conns[0], &conns[1], &conns[2]);

    // Act / Assert: open a, open b, close a, open c, close c, close b.
    facade.on_open(Arc::clone(a));
    facade.on_open(Arc::clone(b));
    assert_eq!(registry_ids(&facade), HashSet::from([a.id(), b.id()]));

    facade.on_close(a.as_ref());
    assert_eq!(registry_ids(&facade), HashSet::from([b.id()]));

    facade.on_open(Arc::clone(c));
    facade.on_close(c.as_ref());
    assert_eq!(registry_ids(&facade), HashSet::from([b.id()]));

    facade.on_close(b.as_ref());
    assert!(facade.registry().is_empty());
}

/// Size of the connection pool the generated sequences draw from.
const POOL: usize = 8;

/// One transport event against the connection at the given pool index.
#[derive(Debug, Clone, Copy)]
enum Event {
    Open(usize),
    Close(usize),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0..POOL).prop_map(Event::Open),
        (0..POOL).prop_map(Event::Close),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Any mix of opens, closes, duplicate closes and closes of never-opened
    /// connections leaves the registry equal to the model set.
    #[test]
    fn test_random_sequences_match_model(
        events in prop::collection::vec(event(), 1..200)
    ) {
        let facade = ServerFacade::new(ServerConfig::default());
        let conns = connections(POOL);
        let mut model: HashSet<ConnectionId> = HashSet::new();

        for event in events {
            match event {
                Event::Open(i) => {
                    facade.on_open(Arc::clone(&conns[i]));
                    model.insert(conns[i].id());
                }
                Event::Close(i) => {
                    facade.on_close(conns[i].as_ref());
                    model.remove(&conns[i].id());
                }
            }
            prop_assert_eq!(registry_ids(&facade), model.clone());
        }
    }
}

#[test]
fn test_second_close_leaves_registry_unchanged() {
    let facade = ServerFacade::new(ServerConfig::default());
    let conns = connections(2);
    facade.on_open(Arc::clone(&conns[0]));
    facade.on_open(Arc::clone(&conns[1]));

    facade.on_close(conns[0].as_ref());
    let after_first = registry_ids(&facade);
    facade.on_close(conns[0].as_ref());

    assert_eq!(registry_ids(&facade), after_first);
}

#[test]
fn test_concurrent_sessions_do_not_lose_updates() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let facade = Arc::new(ServerFacade::new(ServerConfig::default()));

    // Every thread opens its connections, closes every other one, and hands
    // back the ones it left open.
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let facade = Arc::clone(&facade);
            thread::spawn(move || {
                let conns = connections(PER_THREAD);
                let mut still_open = HashSet::new();
                for (i, conn) in conns.iter().enumerate() {
                    facade.on_open(Arc::clone(conn));
                    if i % 2 == 0 {
                        facade.on_close(conn.as_ref());
                    } else {
                        still_open.insert(conn.id());
                    }
                }
                still_open
            })
        })
        .collect();

    let mut expected = HashSet::new();
    for handle in handles {
        expected.extend(handle.join().expect("worker thread panicked"));
    }

    assert_eq!(facade.connection_count(), THREADS * PER_THREAD / 2);
    assert_eq!(registry_ids(&facade), expected);
}

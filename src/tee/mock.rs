//! In-memory connector for exercising link and router behaviour.

use std::io;
use std::sync::{Arc, Mutex};

use super::error::TeeError;
use super::link::{Connection, Connector, DialFuture, WriteFuture};

#[derive(Debug, Default)]
struct MockState {
    dials: usize,
    fail_dials_from: Option<usize>,
    fail_next_write: bool,
    writes: Vec<(String, usize, Vec<u8>)>,
}

/// Connector that records every dial and write.
///
/// Each dial produces a connection numbered from 1 upwards.
#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail every dial numbered `n` or later.
    pub(crate) fn fail_dials_from(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_dials_from = Some(n);
        self
    }

    pub(crate) fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_next_write = true;
    }

    pub(crate) fn dials(&self) -> usize {
        self.state.lock().unwrap().dials
    }

    /// `(connection number, payload)` for every successful write.
    pub(crate) fn writes(&self) -> Vec<(usize, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|(_, id, data)| (*id, data.clone()))
            .collect()
    }

    /// `(address, payload)` for every successful write, in write order.
    pub(crate) fn writes_by_address(&self) -> Vec<(String, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|(address, _, data)| (address.clone(), data.clone()))
            .collect()
    }
}

pub(crate) struct MockConnection {
    id: usize,
    address: String,
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> WriteFuture<'a> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_next_write {
                state.fail_next_write = false;
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ));
            }
            state.writes.push((self.address.clone(), self.id, buf.to_vec()));
            Ok(buf.len())
        })
    }
}

impl Connector for MockConnector {
    type Conn = MockConnection;

    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a, MockConnection> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.dials += 1;
            let id = state.dials;

            if state.fail_dials_from.is_some_and(|n| id >= n) {
                return Err(TeeError::DialError {
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "dial refused"),
                });
            }

            Ok(MockConnection {
                id,
                address: address.to_string(),
                state: Arc::clone(&self.state),
            })
        })
    }
}

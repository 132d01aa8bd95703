// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot holder for a connect request that arrived before login.

use parking_lot::Mutex;

use crate::connect::ConnectRequest;
use crate::host::same_host;

/// At most one deferred connect request; the latest one wins.
#[derive(Default)]
pub struct PendingConnectCoordinator {
    slot: Mutex<Option<ConnectRequest>>,
}

impl PendingConnectCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `request`, returning the one it superseded.
    pub fn hold(&self, request: ConnectRequest) -> Option<ConnectRequest> {
        let previous = self.slot.lock().replace(request);
        if let Some(ref prev) = previous {
            tracing::debug!(unique_id = %prev.params.unique_id, "pending connect superseded");
        }
        previous
    }

    /// Put `request` back unless another request took the slot meanwhile.
    pub fn restore(&self, request: ConnectRequest) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(request);
        true
    }

    /// Take the pending request if it is for `host`.
    pub fn take_for_host(&self, host: &str) -> Option<ConnectRequest> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|r| same_host(&r.host, host)) {
            slot.take()
        } else {
            None
        }
    }

    /// Take the pending request if it targets `unique_id`.
    pub fn take_if(&self, unique_id: &str) -> Option<ConnectRequest> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|r| r.params.unique_id == unique_id) {
            slot.take()
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<ConnectRequest> {
        self.slot.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::ConnectParams;

    fn request(host: &str, ws: &str) -> ConnectRequest {
        ConnectRequest { host: host.to_owned(), params: ConnectParams::new(host, ws, None) }
    }

    #[test]
    fn restore_only_fills_an_empty_slot() {
        let pending = PendingConnectCoordinator::new();
        assert!(pending.restore(request("https://a.test", "ws-x")));
        assert!(!pending.restore(request("https://b.test", "ws-y")));
        assert_eq!(pending.peek().map(|r| r.params.workspace_id), Some("ws-x".to_owned()));
    }

    #[test]
    fn last_request_wins() {
        let pending = PendingConnectCoordinator::new();
        assert!(pending.hold(request("https://a.test", "ws-x")).is_none());
        let superseded = pending.hold(request("https://a.test", "ws-y"));
        assert_eq!(superseded.map(|r| r.params.workspace_id), Some("ws-x".to_owned()));

        let taken = pending.take_for_host("a.test");
        assert_eq!(taken.map(|r| r.params.workspace_id), Some("ws-y".to_owned()));
        assert!(pending.is_empty());
    }

    #[test]
    fn other_host_leaves_slot_intact() {
        let pending = PendingConnectCoordinator::new();
        pending.hold(request("https://a.test", "ws-x"));
        assert!(pending.take_for_host("https://b.test").is_none());
        assert!(pending.peek().is_some());
    }

    #[test]
    fn take_if_matches_unique_id() {
        let pending = PendingConnectCoordinator::new();
        pending.hold(request("https://a.test", "ws-x"));
        assert!(pending.take_if("a.test-ws-y").is_none());
        assert!(pending.take_if("a.test-ws-x").is_some());
        assert!(pending.take_if("a.test-ws-x").is_none());
    }
}

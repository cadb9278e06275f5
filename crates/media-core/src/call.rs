//! Call endpoints
//!
//! A [`CallEndpoint`] is one leg of a call. Two legs are connected
//! symmetrically: each points at the other, and their same-named data
//! endpoints are connected pairwise. Connection changes across calls are
//! serialized by the engine's cross-call lock.

use crate::data::{DataConsumer, DataSource};
use crate::endpoint::DataEndpoint;
use crate::engine::MediaEngine;
use crate::params::NamedParams;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Name of the data endpoint used when none is given
pub const DEFAULT_ENDPOINT: &str = "audio";

/// Notifications delivered to the owner of a call leg
pub trait CallHooks: Send + Sync {
    /// The leg got a peer
    fn connected(&self, _call: &CallEndpoint, _reason: Option<&str>) {}

    /// The leg lost its peer. `final_disconnect` is true when the leg
    /// itself is going away.
    fn disconnected(&self, _call: &CallEndpoint, _final_disconnect: bool, _reason: Option<&str>) {}

    /// Parameters describing why the peer went away, delivered before
    /// [`disconnected`](Self::disconnected)
    fn set_disconnect(&self, _call: &CallEndpoint, _params: Option<&NamedParams>) {}
}

#[derive(Default)]
struct PeerIds {
    last: String,
    cached: Option<String>,
}

/// One leg of a call.
///
/// Connected legs hold strong references to each other, so a leg lives at
/// least until it is disconnected. Call [`shutdown`](Self::shutdown) when
/// the leg goes away.
pub struct CallEndpoint {
    id: String,
    engine: Arc<MediaEngine>,
    me: Weak<CallEndpoint>,
    peer: Mutex<Option<Arc<CallEndpoint>>>,
    ids: Mutex<PeerIds>,
    endpoints: Mutex<Vec<Arc<DataEndpoint>>>,
    hooks: RwLock<Option<Arc<dyn CallHooks>>>,
}

impl CallEndpoint {
    /// Create a call leg
    pub fn new(engine: &Arc<MediaEngine>, id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        debug!(call = %id, "Creating call endpoint");
        Arc::new_cyclic(|me| Self {
            id,
            engine: engine.clone(),
            me: me.clone(),
            peer: Mutex::new(None),
            ids: Mutex::new(PeerIds::default()),
            endpoints: Mutex::new(Vec::new()),
            hooks: RwLock::new(None),
        })
    }

    /// Identifier of this leg
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine this leg belongs to
    pub fn engine(&self) -> &Arc<MediaEngine> {
        &self.engine
    }

    /// Install owner notifications
    pub fn set_hooks(&self, hooks: Arc<dyn CallHooks>) {
        *self.hooks.write() = Some(hooks);
    }

    fn hooks(&self) -> Option<Arc<dyn CallHooks>> {
        self.hooks.read().clone()
    }

    /// Connected peer
    pub fn peer(&self) -> Option<Arc<CallEndpoint>> {
        self.peer.lock().clone()
    }

    fn is_peer(&self, other: &Arc<CallEndpoint>) -> bool {
        self.peer.lock().as_ref().is_some_and(|p| Arc::ptr_eq(p, other))
    }

    /// Connect to `peer`, dropping any previous peer of either leg.
    ///
    /// `None` disconnects instead. Connecting a leg to itself is refused.
    pub fn connect(&self, peer: Option<&Arc<CallEndpoint>>, reason: Option<&str>, notify: bool) -> bool {
        let Some(peer) = peer else {
            self.disconnect(false, reason, notify, None);
            return false;
        };
        if std::ptr::eq(Arc::as_ptr(peer), self) {
            warn!(call = %self.id, "Refusing to connect call to itself");
            return false;
        }
        let Some(me) = self.me.upgrade() else {
            return false;
        };
        let Ok(_lock) = self.engine.lock_calls("connect") else {
            return false;
        };
        if self.is_peer(peer) {
            return true;
        }

        self.disconnect_locked(false, reason, notify, None);
        peer.disconnect_locked(false, reason, notify, None);

        for endpoint in self.endpoints() {
            if let Some(other) = peer.get_endpoint(endpoint.name()) {
                endpoint.connect(&other);
            }
        }

        *self.peer.lock() = Some(peer.clone());
        self.ids.lock().cached = None;
        peer.set_peer(Some(me), reason, notify, None);
        debug!(call = %self.id, peer = %peer.id, "Call endpoints connected");

        if let Some(hooks) = self.hooks() {
            hooks.set_disconnect(self, None);
            hooks.connected(self, reason);
        }
        true
    }

    /// Drop the peer.
    ///
    /// The former peer is told about it. Only a `final_disconnect` fires
    /// this leg's own disconnect notification.
    pub fn disconnect(
        &self,
        final_disconnect: bool,
        reason: Option<&str>,
        notify: bool,
        params: Option<&NamedParams>,
    ) -> bool {
        if self.peer().is_none() {
            return false;
        }
        let Ok(_lock) = self.engine.lock_calls("disconnect") else {
            return false;
        };
        self.disconnect_locked(final_disconnect, reason, notify, params)
    }

    fn disconnect_locked(
        &self,
        final_disconnect: bool,
        reason: Option<&str>,
        notify: bool,
        params: Option<&NamedParams>,
    ) -> bool {
        // Clear the peer first so re-entrant calls see us disconnected
        let Some(peer) = self.peer.lock().take() else {
            return false;
        };
        self.remember_peer(&peer);

        for endpoint in self.endpoints() {
            endpoint.disconnect();
        }
        peer.set_peer(None, reason, notify, params);
        debug!(call = %self.id, peer = %peer.id, final_disconnect, "Call endpoints disconnected");

        if final_disconnect {
            if let Some(hooks) = self.hooks() {
                hooks.disconnected(self, true, reason);
            }
        }
        true
    }

    /// Far side of connect / disconnect
    fn set_peer(&self, peer: Option<Arc<CallEndpoint>>, reason: Option<&str>, notify: bool, params: Option<&NamedParams>) {
        let previous = std::mem::replace(&mut *self.peer.lock(), peer.clone());
        if let Some(previous) = &previous {
            self.remember_peer(previous);
        } else {
            self.ids.lock().cached = None;
        }

        let Some(hooks) = self.hooks() else {
            return;
        };
        if peer.is_some() {
            hooks.set_disconnect(self, None);
            hooks.connected(self, reason);
        } else if notify {
            hooks.set_disconnect(self, params);
            hooks.disconnected(self, false, reason);
        }
    }

    fn remember_peer(&self, peer: &CallEndpoint) {
        let mut ids = self.ids.lock();
        ids.last = peer.id.clone();
        ids.cached = None;
    }

    /// Identifier of the connected peer.
    ///
    /// Served from a cache when possible, otherwise read under the call lock.
    pub fn get_peer_id(&self) -> Option<String> {
        if let Some(id) = self.ids.lock().cached.clone() {
            return Some(id);
        }
        if self.peer().is_none() {
            return None;
        }
        let Ok(_lock) = self.engine.lock_calls("get_peer_id") else {
            return None;
        };
        let id = self.peer().map(|p| p.id.clone())?;
        self.ids.lock().cached = Some(id.clone());
        Some(id)
    }

    /// Identifier of the last peer this leg was connected to
    pub fn last_peer_id(&self) -> String {
        self.ids.lock().last.clone()
    }

    /// Remember the current peer as the last one
    pub fn set_last_peer_id(&self) {
        if let Some(peer) = self.peer() {
            self.remember_peer(&peer);
        }
    }

    /// Snapshot of the data endpoints
    pub fn endpoints(&self) -> Vec<Arc<DataEndpoint>> {
        self.endpoints.lock().clone()
    }

    /// Data endpoint called `name`
    pub fn get_endpoint(&self, name: &str) -> Option<Arc<DataEndpoint>> {
        self.endpoints.lock().iter().find(|e| e.name() == name).cloned()
    }

    /// Data endpoint called `name`, created if missing.
    ///
    /// A new endpoint is connected to the peer's endpoint of the same name.
    pub fn set_endpoint(&self, name: &str) -> Option<Arc<DataEndpoint>> {
        if name.is_empty() {
            return None;
        }
        let endpoint = {
            let mut endpoints = self.endpoints.lock();
            if let Some(existing) = endpoints.iter().find(|e| e.name() == name) {
                return Some(existing.clone());
            }
            let endpoint = DataEndpoint::new(self.engine.clone(), self.me.clone(), name);
            endpoints.push(endpoint.clone());
            endpoint
        };
        if let Some(other) = self.peer().and_then(|p| p.get_endpoint(name)) {
            endpoint.connect(&other);
        }
        Some(endpoint)
    }

    /// Tear down and remove the endpoint called `name`
    pub fn clear_endpoint(&self, name: &str) -> bool {
        let removed = {
            let mut endpoints = self.endpoints.lock();
            let Some(pos) = endpoints.iter().position(|e| e.name() == name) else {
                return false;
            };
            endpoints.remove(pos)
        };
        removed.teardown();
        true
    }

    /// Tear down every endpoint
    pub fn clear_endpoints(&self) {
        let removed = std::mem::take(&mut *self.endpoints.lock());
        for endpoint in removed {
            endpoint.teardown();
        }
    }

    /// Set the source of endpoint `name`, creating the endpoint if needed.
    /// Clearing the source of a missing endpoint is a no-op.
    pub fn set_source(&self, source: Option<Arc<DataSource>>, name: &str) {
        let endpoint = match source {
            Some(_) => self.set_endpoint(name),
            None => self.get_endpoint(name),
        };
        if let Some(endpoint) = endpoint {
            endpoint.set_source(source);
        }
    }

    /// Source of endpoint `name`
    pub fn get_source(&self, name: &str) -> Option<Arc<DataSource>> {
        self.get_endpoint(name)?.source()
    }

    /// Set the consumer of endpoint `name`, creating the endpoint if needed
    pub fn set_consumer(&self, consumer: Option<Arc<DataConsumer>>, name: &str) {
        let endpoint = match consumer {
            Some(_) => self.set_endpoint(name),
            None => self.get_endpoint(name),
        };
        if let Some(endpoint) = endpoint {
            endpoint.set_consumer(consumer);
        }
    }

    /// Consumer of endpoint `name`
    pub fn get_consumer(&self, name: &str) -> Option<Arc<DataConsumer>> {
        self.get_endpoint(name)?.consumer()
    }

    /// Final disconnect followed by endpoint teardown
    pub fn shutdown(&self, reason: Option<&str>) {
        self.disconnect(true, reason, true, None);
        self.clear_endpoints();
    }
}

impl fmt::Debug for CallEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallEndpoint")
            .field("id", &self.id)
            .field("peer", &self.peer.try_lock().and_then(|p| p.as_ref().map(|p| p.id.clone())))
            .finish()
    }
}

impl Drop for CallEndpoint {
    fn drop(&mut self) {
        if self.peer.get_mut().is_some() {
            error!(call = %self.id, "Call endpoint destroyed while still connected");
        }
        for endpoint in std::mem::take(self.endpoints.get_mut()) {
            endpoint.teardown();
        }
    }
}

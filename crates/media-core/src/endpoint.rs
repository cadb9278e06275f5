//! Data endpoints
//!
//! A [`DataEndpoint`] is one media stream of a call ("audio", "video", ...).
//! It owns up to one source and one consumer, two recorder taps and any
//! number of sniffers. Connecting two endpoints wires
//!
//! - this source to the peer consumer and the peer recorder
//! - the peer source to this consumer and this recorder
//!
//! while the call recorder and the sniffers always tap this endpoint's own
//! source. All rewiring happens under the engine-wide data lock.

use crate::call::CallEndpoint;
use crate::data::{DataConsumer, DataSource};
use crate::engine::MediaEngine;
use crate::params::NamedParams;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Hooks letting an endpoint implementation take part in connections
pub trait EndpointHooks: Send + Sync {
    /// Try to connect to `peer` without going through the data graph, for
    /// instance by letting two RTP legs talk to each other directly.
    /// Returning true skips the generic wiring.
    fn native_connect(&self, _endpoint: &DataEndpoint, _peer: &Arc<DataEndpoint>) -> bool {
        false
    }

    /// The endpoint was connected to a peer
    fn connected(&self, _endpoint: &DataEndpoint) {}

    /// The endpoint lost its peer
    fn disconnected(&self, _endpoint: &DataEndpoint) {}
}

#[derive(Default)]
struct EndpointNodes {
    source: Option<Arc<DataSource>>,
    consumer: Option<Arc<DataConsumer>>,
    peer_record: Option<Arc<DataConsumer>>,
    call_record: Option<Arc<DataConsumer>>,
    sniffers: Vec<Arc<DataConsumer>>,
    peer: Option<Arc<DataEndpoint>>,
}

impl EndpointNodes {
    /// Consumers fed by this endpoint's own source
    fn own_taps(&self) -> Vec<Arc<DataConsumer>> {
        self.call_record.iter().chain(self.sniffers.iter()).cloned().collect()
    }
}

/// One named media stream of a call
pub struct DataEndpoint {
    name: String,
    engine: Arc<MediaEngine>,
    call: Weak<CallEndpoint>,
    nodes: Mutex<EndpointNodes>,
    hooks: RwLock<Option<Arc<dyn EndpointHooks>>>,
}

impl DataEndpoint {
    pub(crate) fn new(engine: Arc<MediaEngine>, call: Weak<CallEndpoint>, name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            engine,
            call,
            nodes: Mutex::new(EndpointNodes::default()),
            hooks: RwLock::new(None),
        })
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call owning this endpoint, if it still exists
    pub fn call(&self) -> Option<Arc<CallEndpoint>> {
        self.call.upgrade()
    }

    /// Install implementation hooks
    pub fn set_hooks(&self, hooks: Arc<dyn EndpointHooks>) {
        *self.hooks.write() = Some(hooks);
    }

    fn hooks(&self) -> Option<Arc<dyn EndpointHooks>> {
        self.hooks.read().clone()
    }

    /// Current source
    pub fn source(&self) -> Option<Arc<DataSource>> {
        self.nodes.lock().source.clone()
    }

    /// Current consumer
    pub fn consumer(&self) -> Option<Arc<DataConsumer>> {
        self.nodes.lock().consumer.clone()
    }

    /// Recorder of what the peer sends
    pub fn peer_record(&self) -> Option<Arc<DataConsumer>> {
        self.nodes.lock().peer_record.clone()
    }

    /// Recorder of what this endpoint sends
    pub fn call_record(&self) -> Option<Arc<DataConsumer>> {
        self.nodes.lock().call_record.clone()
    }

    /// Attached sniffers
    pub fn sniffers(&self) -> Vec<Arc<DataConsumer>> {
        self.nodes.lock().sniffers.clone()
    }

    /// Connected peer endpoint
    pub fn peer(&self) -> Option<Arc<DataEndpoint>> {
        self.nodes.lock().peer.clone()
    }

    fn peer_feeds(&self) -> (Option<Arc<DataSource>>, Option<Arc<DataConsumer>>, Option<Arc<DataConsumer>>) {
        match self.peer() {
            Some(peer) => {
                let nodes = peer.nodes.lock();
                (nodes.source.clone(), nodes.consumer.clone(), nodes.peer_record.clone())
            }
            None => (None, None, None),
        }
    }

    fn attach(&self, source: &Option<Arc<DataSource>>, consumer: &Option<Arc<DataConsumer>>) {
        if let (Some(source), Some(consumer)) = (source, consumer) {
            if !self.engine.translators().attach_chain(source, consumer, false) {
                debug!(endpoint = %self.name, "Could not attach data chain");
            }
        }
    }

    fn detach(&self, source: &Option<Arc<DataSource>>, consumer: &Option<Arc<DataConsumer>>) {
        if let (Some(source), Some(consumer)) = (source, consumer) {
            self.engine.translators().detach_chain(source, consumer);
        }
    }

    /// Connect to another endpoint, replacing any previous peer of either.
    ///
    /// Connecting an endpoint to itself is refused.
    pub fn connect(self: &Arc<Self>, peer: &Arc<DataEndpoint>) -> bool {
        if Arc::ptr_eq(self, peer) {
            warn!(endpoint = %self.name, "Refusing to connect endpoint to itself");
            return false;
        }
        let _lock = self.engine.data_lock();
        if self.peer().is_some_and(|p| Arc::ptr_eq(&p, peer)) {
            return true;
        }
        self.disconnect();
        peer.disconnect();

        let native = self.name == peer.name
            && self.hooks().is_some_and(|h| h.native_connect(self, peer));
        if !native {
            let (source, peer_record) = {
                let nodes = self.nodes.lock();
                (nodes.source.clone(), nodes.peer_record.clone())
            };
            let (peer_source, peer_consumer, peer_peer_record) = {
                let nodes = peer.nodes.lock();
                (nodes.source.clone(), nodes.consumer.clone(), nodes.peer_record.clone())
            };
            let consumer = self.consumer();

            self.attach(&source, &peer_consumer);
            self.attach(&source, &peer_peer_record);
            self.attach(&peer_source, &consumer);
            self.attach(&peer_source, &peer_record);
        }

        self.nodes.lock().peer = Some(peer.clone());
        peer.nodes.lock().peer = Some(self.clone());
        debug!(endpoint = %self.name, native, "Data endpoints connected");

        if let Some(hooks) = self.hooks() {
            hooks.connected(self);
        }
        if let Some(hooks) = peer.hooks() {
            hooks.connected(peer);
        }
        true
    }

    /// Drop the connection to the peer, if any
    pub fn disconnect(&self) -> bool {
        let _lock = self.engine.data_lock();
        let Some(peer) = self.nodes.lock().peer.take() else {
            return false;
        };

        let (source, consumer, peer_record) = {
            let nodes = self.nodes.lock();
            (nodes.source.clone(), nodes.consumer.clone(), nodes.peer_record.clone())
        };
        let (peer_source, peer_consumer, peer_peer_record) = {
            let mut nodes = peer.nodes.lock();
            if nodes.peer.as_ref().is_some_and(|p| std::ptr::eq(Arc::as_ptr(p), self)) {
                nodes.peer = None;
            }
            (nodes.source.clone(), nodes.consumer.clone(), nodes.peer_record.clone())
        };

        self.detach(&source, &peer_consumer);
        self.detach(&source, &peer_peer_record);
        self.detach(&peer_source, &consumer);
        self.detach(&peer_source, &peer_record);
        debug!(endpoint = %self.name, "Data endpoints disconnected");

        if let Some(hooks) = self.hooks() {
            hooks.disconnected(self);
        }
        if let Some(hooks) = peer.hooks() {
            hooks.disconnected(&peer);
        }
        true
    }

    /// Replace the source, rewiring the peer consumer, the peer recorder,
    /// the call recorder and the sniffers
    pub fn set_source(&self, source: Option<Arc<DataSource>>) {
        let _lock = self.engine.data_lock();
        let (old, taps) = {
            let nodes = self.nodes.lock();
            if same(&nodes.source, &source) {
                return;
            }
            (nodes.source.clone(), nodes.own_taps())
        };
        let (_, peer_consumer, peer_record) = self.peer_feeds();
        let mut taps: Vec<Option<Arc<DataConsumer>>> = taps.into_iter().map(Some).collect();
        taps.push(peer_consumer);
        taps.push(peer_record);

        for tap in &taps {
            self.detach(&old, tap);
        }
        for tap in &taps {
            self.attach(&source, tap);
        }
        trace!(endpoint = %self.name, present = source.is_some(), "Source replaced");
        self.nodes.lock().source = source;
    }

    /// Replace the consumer fed by the peer source
    pub fn set_consumer(&self, consumer: Option<Arc<DataConsumer>>) {
        let _lock = self.engine.data_lock();
        let old = {
            let nodes = self.nodes.lock();
            if same(&nodes.consumer, &consumer) {
                return;
            }
            nodes.consumer.clone()
        };
        let (peer_source, _, _) = self.peer_feeds();
        self.detach(&peer_source, &old);
        self.attach(&peer_source, &consumer);
        trace!(endpoint = %self.name, present = consumer.is_some(), "Consumer replaced");
        self.nodes.lock().consumer = consumer;
    }

    /// Replace the recorder of what the peer sends
    pub fn set_peer_record(&self, consumer: Option<Arc<DataConsumer>>) {
        let _lock = self.engine.data_lock();
        let old = {
            let nodes = self.nodes.lock();
            if same(&nodes.peer_record, &consumer) {
                return;
            }
            nodes.peer_record.clone()
        };
        let (peer_source, _, _) = self.peer_feeds();
        self.detach(&peer_source, &old);
        self.attach(&peer_source, &consumer);
        self.nodes.lock().peer_record = consumer;
    }

    /// Replace the recorder of what this endpoint sends
    pub fn set_call_record(&self, consumer: Option<Arc<DataConsumer>>) {
        let _lock = self.engine.data_lock();
        let (source, old) = {
            let nodes = self.nodes.lock();
            if same(&nodes.call_record, &consumer) {
                return;
            }
            (nodes.source.clone(), nodes.call_record.clone())
        };
        self.detach(&source, &old);
        self.attach(&source, &consumer);
        self.nodes.lock().call_record = consumer;
    }

    /// Tap this endpoint's source. Returns false if already attached.
    pub fn add_sniffer(&self, sniffer: &Arc<DataConsumer>) -> bool {
        let _lock = self.engine.data_lock();
        let source = {
            let mut nodes = self.nodes.lock();
            if nodes.sniffers.iter().any(|s| Arc::ptr_eq(s, sniffer)) {
                return false;
            }
            nodes.sniffers.push(sniffer.clone());
            nodes.source.clone()
        };
        self.attach(&source, &Some(sniffer.clone()));
        true
    }

    /// Remove a sniffer
    pub fn del_sniffer(&self, sniffer: &Arc<DataConsumer>) -> bool {
        let _lock = self.engine.data_lock();
        let source = {
            let mut nodes = self.nodes.lock();
            let Some(pos) = nodes.sniffers.iter().position(|s| Arc::ptr_eq(s, sniffer)) else {
                return false;
            };
            nodes.sniffers.remove(pos);
            nodes.source.clone()
        };
        self.detach(&source, &Some(sniffer.clone()));
        true
    }

    /// Remove every sniffer
    pub fn clear_sniffers(&self) {
        let _lock = self.engine.data_lock();
        let (source, sniffers) = {
            let mut nodes = self.nodes.lock();
            (nodes.source.clone(), std::mem::take(&mut nodes.sniffers))
        };
        for sniffer in sniffers {
            self.detach(&source, &Some(sniffer));
        }
    }

    /// Offer a control request to the source, the consumer and the
    /// recorders in turn. The first one to handle it wins.
    pub fn control(&self, params: &mut NamedParams) -> bool {
        use crate::data::DataNode;

        let (source, consumer, peer_record, call_record) = {
            let nodes = self.nodes.lock();
            (
                nodes.source.clone(),
                nodes.consumer.clone(),
                nodes.peer_record.clone(),
                nodes.call_record.clone(),
            )
        };
        source.is_some_and(|s| s.control(params))
            || consumer.is_some_and(|c| c.control(params))
            || peer_record.is_some_and(|c| c.control(params))
            || call_record.is_some_and(|c| c.control(params))
    }

    /// Disconnect and drop every node
    pub(crate) fn teardown(&self) {
        let _lock = self.engine.data_lock();
        self.disconnect();
        self.clear_sniffers();
        self.set_call_record(None);
        self.set_peer_record(None);
        self.set_source(None);
        self.set_consumer(None);
    }
}

fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl fmt::Debug for DataEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataEndpoint")
            .field("name", &self.name)
            .field("connected", &self.peer().is_some())
            .finish()
    }
}

//! Call legs cross-connecting their data endpoints

mod common;

use common::recorder;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tandem_media_core::{AlarmSink, CallEndpoint, DataSource, MediaConfig, MediaEngine};

#[test]
fn test_connect_and_disconnect_are_symmetric() {
    let engine = common::engine();
    let a = CallEndpoint::new(&engine, "sip/1");
    let b = CallEndpoint::new(&engine, "sip/2");

    assert!(a.connect(Some(&b), Some("answered"), true));
    assert!(Arc::ptr_eq(&a.peer().unwrap(), &b));
    assert!(Arc::ptr_eq(&b.peer().unwrap(), &a));

    assert!(b.disconnect(false, Some("hangup"), true, None));
    assert!(a.peer().is_none());
    assert!(b.peer().is_none());
    assert_eq!(a.last_peer_id(), "sip/2");
    assert_eq!(b.last_peer_id(), "sip/1");
}

#[test]
fn test_media_flows_between_legs_with_translation() {
    let engine = common::engine();
    let alaw = engine.lookup_format("alaw").unwrap();
    let mulaw = engine.lookup_format("mulaw").unwrap();

    let a = CallEndpoint::new(&engine, "pstn/1");
    let b = CallEndpoint::new(&engine, "sip/7");

    let a_source = DataSource::new(alaw.clone());
    let (a_consumer, a_heard) = recorder(&alaw);
    let b_source = DataSource::new(mulaw.clone());
    let (b_consumer, b_heard) = recorder(&mulaw);
    a.set_source(Some(a_source.clone()), "audio");
    a.set_consumer(Some(a_consumer), "audio");
    b.set_source(Some(b_source.clone()), "audio");
    b.set_consumer(Some(b_consumer), "audio");

    let (recording, recorded) = recorder(&alaw);
    a.get_endpoint("audio").unwrap().set_call_record(Some(recording));

    assert!(a.connect(Some(&b), None, true));

    assert_eq!(a_source.forward(&[0xd5; 80], None, 0), 80);
    assert_eq!(b_heard.count(), 1);
    assert_eq!(b_heard.bytes(), 80);
    assert_eq!(recorded.count(), 1);

    assert_eq!(b_source.forward(&[0xff; 80], None, 0), 80);
    assert_eq!(a_heard.count(), 1);

    a.shutdown(Some("done"));
    assert!(b.peer().is_none());
    // Only the call recorder tap survives a disconnect, and shutdown drops it too
    assert_eq!(a_source.consumer_count(), 0);
    assert_eq!(b_source.consumer_count(), 0);
    assert_eq!(a_source.forward(&[0xd5; 80], None, 0), 0);
    assert_eq!(b_heard.count(), 1);
}

#[test]
fn test_reconnect_moves_media() {
    let engine = common::engine();
    let slin = engine.lookup_format("slin").unwrap();
    let a = CallEndpoint::new(&engine, "a");
    let b = CallEndpoint::new(&engine, "b");
    let c = CallEndpoint::new(&engine, "c");

    let source = DataSource::new(slin.clone());
    a.set_source(Some(source.clone()), "audio");
    let (b_consumer, b_heard) = recorder(&slin);
    let (c_consumer, c_heard) = recorder(&slin);
    b.set_consumer(Some(b_consumer), "audio");
    c.set_consumer(Some(c_consumer), "audio");

    assert!(a.connect(Some(&b), None, true));
    source.forward(&[0u8; 160], None, 0);
    assert!(a.connect(Some(&c), None, true));
    source.forward(&[0u8; 160], None, 0);

    assert_eq!(b_heard.count(), 1);
    assert_eq!(c_heard.count(), 1);
    assert!(b.peer().is_none());
    assert_eq!(b.last_peer_id(), "a");
    assert_eq!(a.last_peer_id(), "b");
    a.shutdown(None);
}

#[derive(Default)]
struct CountingAlarms {
    congestion: std::sync::atomic::AtomicUsize,
    fatal: std::sync::atomic::AtomicUsize,
}

impl AlarmSink for CountingAlarms {
    fn congestion(&self, _operation: &str, _waited: Duration) {
        self.congestion.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn fatal(&self, _component: &str, _message: &str) {
        self.fatal.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn restart_requested(&self) {}
}

#[test]
fn test_call_lock_expiry_is_fatal() {
    let alarms = Arc::new(CountingAlarms::default());
    let config = MediaConfig::default().with_call_lock_waits(30, 30);
    let engine = MediaEngine::with_alarms(config, alarms.clone()).unwrap();
    let a = CallEndpoint::new(&engine, "a");
    let b = CallEndpoint::new(&engine, "b");
    assert!(a.connect(Some(&b), None, true));

    let (locked_tx, locked_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let holder = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            let _guard = engine.lock_calls("stuck").unwrap();
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        })
    };
    locked_rx.recv().unwrap();

    assert!(!engine.restart_pending());
    assert!(!a.disconnect(false, None, true, None));
    assert!(engine.restart_pending());
    assert_eq!(alarms.congestion.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(alarms.fatal.load(std::sync::atomic::Ordering::SeqCst), 1);
    // Nothing changed
    assert!(Arc::ptr_eq(&a.peer().unwrap(), &b));

    release_tx.send(()).unwrap();
    holder.join().unwrap();
    assert!(a.disconnect(false, None, true, None));
}

#[test]
fn test_congestion_then_success() {
    let alarms = Arc::new(CountingAlarms::default());
    let config = MediaConfig::default().with_call_lock_waits(20, 5_000);
    let engine = MediaEngine::with_alarms(config, alarms.clone()).unwrap();
    let a = CallEndpoint::new(&engine, "a");
    let b = CallEndpoint::new(&engine, "b");

    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            let _guard = engine.lock_calls("busy").unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(100));
        })
    };
    locked_rx.recv().unwrap();

    assert!(a.connect(Some(&b), None, true));
    assert_eq!(alarms.congestion.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(alarms.fatal.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(!engine.restart_pending());
    holder.join().unwrap();
    a.shutdown(None);
}

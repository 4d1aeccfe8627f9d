mod common;

use common::{wait_until, Quote, Recorder, WAIT};
use hyphae::{Actor, BusConfig, Envelope, MessageBus, TopicId};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_integers_arrive_in_order() {
    let bus = MessageBus::new();
    let producer = Actor::new("P", &bus).unwrap();
    let consumer = Actor::new("S", &bus).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    let topic = producer.add_publisher("t").unwrap();
    let sink = Arc::clone(&received);
    consumer
        .add_subscriber("t", move |n: Arc<i32>| sink.lock().push(*n))
        .unwrap();

    for n in 0..10 {
        assert_eq!(producer.send_message(topic, n), 1);
    }
    assert!(consumer.flush(WAIT).unwrap());

    assert_eq!(*received.lock(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_every_subscriber_sees_each_message_once() {
    let bus = MessageBus::new();
    let producer = Actor::new("feed", &bus).unwrap();
    let topic = producer.add_publisher("quotes").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let consumers: Vec<Actor> = (0..4)
        .map(|i| {
            let actor = Actor::new(format!("consumer-{}", i), &bus).unwrap();
            let log = Arc::clone(&log);
            actor
                .add_subscriber("quotes", move |quote: Arc<Quote>| {
                    log.lock().push((i, quote.symbol.clone(), quote.bid));
                })
                .unwrap();
            actor
        })
        .collect();

    let quote = Quote {
        symbol: "ETH".to_string(),
        bid: 1812.25,
    };
    assert_eq!(producer.send_message(topic, quote), 4);
    for consumer in &consumers {
        assert!(consumer.flush(WAIT).unwrap());
    }

    let mut log = log.lock().clone();
    log.sort_by_key(|(i, _, _)| *i);
    let expected: Vec<_> = (0..4).map(|i| (i, "ETH".to_string(), 1812.25)).collect();
    assert_eq!(log, expected);
}

#[test]
fn test_fan_out_order_follows_registration() {
    // Subscribers on one actor share a worker, so their run order is the delivery order
    let bus = MessageBus::new();
    let actor = Actor::new("solo", &bus).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let topic = actor.add_publisher("events").unwrap();
    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        actor
            .add_subscriber("events", move |n: Arc<u8>| order.lock().push((tag, *n)))
            .unwrap();
    }

    assert_eq!(actor.send_message(topic, 1u8), 3);
    assert_eq!(actor.send_message(topic, 2u8), 3);
    assert!(actor.flush(WAIT).unwrap());

    assert_eq!(
        *order.lock(),
        vec![
            ("first", 1),
            ("second", 1),
            ("third", 1),
            ("first", 2),
            ("second", 2),
            ("third", 2),
        ]
    );
}

#[test]
fn test_unregistered_topic_is_single_routing_miss() {
    let recorder = Recorder::new();
    let bus = MessageBus::with_observer(BusConfig::default(), recorder.clone()).unwrap();

    let delivered = bus.publish(TopicId::of("nowhere"), Envelope::new(1u64));

    assert_eq!(delivered, 0);
    assert_eq!(recorder.count("miss"), 1);
    assert_eq!(bus.metrics().routing_misses(), 1);
}

#[test]
fn test_wrong_payload_type_is_reported() {
    let recorder = Recorder::new();
    let bus = MessageBus::with_observer(BusConfig::default(), recorder.clone()).unwrap();
    let producer = Actor::new("producer", &bus).unwrap();
    let consumer = Actor::new("consumer", &bus).unwrap();
    let calls = Arc::new(Mutex::new(0));

    let topic = producer.add_publisher("quotes").unwrap();
    let counter = Arc::clone(&calls);
    consumer
        .add_subscriber("quotes", move |_quote: Arc<Quote>| *counter.lock() += 1)
        .unwrap();

    assert_eq!(producer.send_message(topic, "not a quote"), 0);
    assert!(consumer.flush(WAIT).unwrap());

    assert_eq!(*calls.lock(), 0);
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("failed consumer Type mismatch"));
}

#[test]
fn test_panicking_subscriber_does_not_affect_others() {
    let bus = MessageBus::new();
    let producer = Actor::new("producer", &bus).unwrap();
    let fragile = Actor::new("fragile", &bus).unwrap();
    let steady = Actor::new("steady", &bus).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let topic = producer.add_publisher("numbers").unwrap();
    fragile
        .add_subscriber("numbers", |n: Arc<u32>| {
            if *n == 2 {
                panic!("cannot handle two");
            }
        })
        .unwrap();
    let sink = Arc::clone(&seen);
    steady
        .add_subscriber("numbers", move |n: Arc<u32>| sink.lock().push(*n))
        .unwrap();

    for n in 1..=3u32 {
        producer.send_message(topic, n);
    }
    assert!(steady.flush(WAIT).unwrap());
    assert!(wait_until(|| bus.metrics().worker_faults() == 1));

    // Isolate is the default: the faulting actor keeps going
    assert!(fragile.flush(WAIT).unwrap());
    assert_eq!(*seen.lock(), vec![1, 2, 3]);
}

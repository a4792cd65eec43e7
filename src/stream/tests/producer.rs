//! Tests for the producer pump and lifecycle

use super::{eventually, test_producer_config, SHARD, STREAM};
use crate::stream::api::{
    MemoryStreamService, Message, Producer, ProducerConfig, StreamError, TransportOp,
};
use tokio::time::{sleep, timeout, Duration};

fn wired_producer(service: &MemoryStreamService, config: ProducerConfig) -> Producer {
    let producer = Producer::new(STREAM, SHARD, config).unwrap();
    producer.set_endpoint(service.endpoint(STREAM, SHARD)).unwrap();
    producer
}

fn stored_values(service: &MemoryStreamService) -> Vec<String> {
    service
        .records(STREAM, SHARD)
        .iter()
        .map(|record| record.value_str().into_owned())
        .collect()
}

#[test]
fn test_new_producer_is_stopped() {
    let producer = Producer::new(STREAM, SHARD, test_producer_config()).unwrap();
    assert!(!producer.is_producing());
    assert!(!producer.is_closed());
    assert_eq!(producer.error_count(), 0);
    assert_eq!(producer.sent_count(), 0);
    assert_eq!(producer.pending(), 0);
    assert_eq!(producer.stream_name(), STREAM);
    assert_eq!(producer.shard_id(), SHARD);
}

#[test]
fn test_new_rejects_invalid_identifiers() {
    let err = Producer::new("", SHARD, test_producer_config()).unwrap_err();
    assert!(matches!(err, StreamError::Config { .. }));

    let err = Producer::new(STREAM, "shard 0", test_producer_config()).unwrap_err();
    assert!(matches!(err, StreamError::Config { .. }));
}

#[test]
fn test_new_rejects_invalid_config() {
    let config = ProducerConfig {
        put_attempts: 0,
        ..test_producer_config()
    };
    assert!(matches!(
        Producer::new(STREAM, SHARD, config),
        Err(StreamError::Config { .. })
    ));
}

#[test]
fn test_endpoint_must_match_binding() {
    let service = MemoryStreamService::new();
    let producer = Producer::new(STREAM, SHARD, test_producer_config()).unwrap();

    let err = producer
        .set_endpoint(service.endpoint(STREAM, "shard-9"))
        .unwrap_err();
    assert!(err.to_string().contains("shard-9"));
}

#[tokio::test]
async fn test_start_without_endpoint_is_not_initialised() {
    let producer = Producer::new(STREAM, SHARD, test_producer_config()).unwrap();

    assert!(matches!(
        producer.start(),
        Err(StreamError::NotInitialized { .. })
    ));
    assert!(matches!(
        producer.produce().await,
        Err(StreamError::NotInitialized { .. })
    ));
    assert!(!producer.is_producing());
}

#[tokio::test]
async fn test_start_and_close_flip_running_flag() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    let handle = producer.start().unwrap();
    assert!(producer.is_producing());

    producer.close().await.unwrap();
    assert!(!producer.is_producing());
    assert!(producer.is_closed());
    timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    producer.start().unwrap();
    assert!(matches!(
        producer.start(),
        Err(StreamError::AlreadyRunning { .. })
    ));
    assert!(matches!(
        producer.produce().await,
        Err(StreamError::AlreadyRunning { .. })
    ));

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_messages_are_put_in_send_order() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    let expected: Vec<String> = (1..=20).map(|i| format!("m{}", i)).collect();
    for value in &expected {
        producer.send(Message::new(value.as_str(), "test")).unwrap();
    }
    assert_eq!(producer.pending(), 20);

    producer.start().unwrap();
    eventually("all messages put", || producer.sent_count() == 20).await;

    assert_eq!(stored_values(&service), expected);
    assert_eq!(producer.pending(), 0);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_put_failure_is_counted_and_pump_continues() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());
    let mut errors = producer.errors();

    service.fail_next_puts(1);
    producer.send(Message::new("lost", "test")).unwrap();
    producer.send(Message::new("kept", "test")).unwrap();
    producer.start().unwrap();

    eventually("second message put", || producer.sent_count() == 1).await;
    assert_eq!(producer.error_count(), 1);
    assert!(producer.is_producing());
    assert_eq!(stored_values(&service), vec!["kept".to_string()]);

    let reported = timeout(Duration::from_secs(1), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reported.operation, TransportOp::Put);
    assert_eq!(reported.shard, SHARD);

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_errors_without_subscribers_do_not_block() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    service.fail_next_puts(3);
    producer
        .send_batch((0..4).map(|i| Message::new(format!("m{}", i), "k")).collect())
        .unwrap();
    producer.start().unwrap();

    eventually("every message attempted", || {
        producer.error_count() + producer.sent_count() == 4
    })
    .await;
    assert_eq!(producer.error_count(), 3);
    assert!(producer.is_producing());

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_put_retry_hides_transient_failure() {
    let service = MemoryStreamService::new();
    let config = ProducerConfig {
        put_attempts: 2,
        put_retry_delay_ms: 1,
        ..test_producer_config()
    };
    let producer = wired_producer(&service, config);

    service.fail_next_puts(1);
    producer.send(Message::new("retried", "k")).unwrap();
    producer.start().unwrap();

    eventually("retried put", || producer.sent_count() == 1).await;
    assert_eq!(producer.error_count(), 0);

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent_and_rejects_sends() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());
    producer.start().unwrap();

    producer.close().await.unwrap();
    producer.close().await.unwrap();
    assert!(!producer.is_producing());

    assert!(producer.send(Message::new("late", "k")).unwrap_err().is_closed());
    assert!(producer.send_batch(vec![Message::new("late", "k")]).unwrap_err().is_closed());
    assert!(producer.start().unwrap_err().is_closed());
    assert!(service.records(STREAM, SHARD).is_empty());
}

#[tokio::test]
async fn test_close_without_start() {
    let producer = Producer::new(STREAM, SHARD, test_producer_config()).unwrap();
    timeout(Duration::from_secs(1), producer.close())
        .await
        .unwrap()
        .unwrap();
    assert!(producer.is_closed());
}

#[tokio::test]
async fn test_interrupt_stops_pump_and_allows_restart() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    producer.start().unwrap();
    producer.interrupt();
    timeout(Duration::from_secs(1), producer.wait_stopped())
        .await
        .expect("pump should stop after an interrupt");
    assert!(!producer.is_producing());
    assert!(!producer.is_closed());

    producer.send(Message::new("after restart", "k")).unwrap();
    producer.start().unwrap();
    eventually("message put after restart", || producer.sent_count() == 1).await;

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_interrupt_when_stopped_is_ignored() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    producer.interrupt();
    producer.interrupt_handle().interrupt();

    producer.start().unwrap();
    producer.send(Message::new("delivered", "k")).unwrap();
    eventually("message put", || producer.sent_count() == 1).await;
    assert!(producer.is_producing());

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_interrupt_handle_stops_pump() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());
    let handle = producer.interrupt_handle();

    producer.start().unwrap();
    handle.interrupt();
    timeout(Duration::from_secs(1), producer.wait_stopped())
        .await
        .expect("pump should stop after an interrupt");

    drop(producer);
    // The handle does not keep the producer alive
    handle.interrupt();
}

#[tokio::test]
async fn test_produce_runs_in_place_until_closed() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());

    let pump = {
        let producer = producer.clone();
        tokio::spawn(async move { producer.produce().await })
    };

    eventually("pump running", || producer.is_producing()).await;
    producer.send(Message::new("in place", "k")).unwrap();
    eventually("message put", || producer.sent_count() == 1).await;

    producer.close().await.unwrap();
    let result = timeout(Duration::from_secs(1), pump).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_bounded_queue_surfaces_queue_full() {
    let service = MemoryStreamService::new();
    let config = ProducerConfig {
        queue_capacity: Some(2),
        ..test_producer_config()
    };
    let producer = wired_producer(&service, config);

    producer.send(Message::new("a", "k")).unwrap();
    producer.send(Message::new("b", "k")).unwrap();
    assert!(matches!(
        producer.send(Message::new("c", "k")),
        Err(StreamError::QueueFull { max_size: 2 })
    ));

    producer.start().unwrap();
    eventually("queue drained", || producer.sent_count() == 2).await;
    producer.send(Message::new("c", "k")).unwrap();

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_senders() {
    let service = MemoryStreamService::new();
    let producer = wired_producer(&service, test_producer_config());
    producer.start().unwrap();

    let senders: Vec<_> = (0..4)
        .map(|task| {
            let producer = producer.clone();
            tokio::spawn(async move {
                for i in 0..10 {
                    producer
                        .send(Message::new(format!("{}-{}", task, i), "k"))
                        .unwrap();
                    sleep(Duration::from_millis(1)).await;
                }
            })
        })
        .collect();
    for sender in senders {
        sender.await.unwrap();
    }

    eventually("all concurrent sends put", || producer.sent_count() == 40).await;
    assert_eq!(service.records(STREAM, SHARD).len(), 40);

    producer.close().await.unwrap();
}

#[cfg(unix)]
mod os_signals {
    use super::{eventually, stored_values, wired_producer};
    use crate::stream::api::{MemoryStreamService, Message, Producer, ProducerConfig};
    use serial_test::serial;
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::time::{timeout, Duration};

    /// Start a signal-aware producer and wait until its pump is listening
    async fn listening_producer(service: &MemoryStreamService) -> Producer {
        let producer = wired_producer(service, ProducerConfig::default());
        producer.start().unwrap();
        // The pump registers its handlers on its first pass, before taking a message
        let sent = producer.sent_count();
        producer.send(Message::new("ready", "test")).unwrap();
        eventually("first put", || producer.sent_count() > sent).await;
        producer
    }

    fn raise_sigint() {
        unsafe {
            libc::raise(libc::SIGINT);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn test_sigint_stops_producer() {
        // Holds a tokio SIGINT registration so the signal never reaches the default handler
        let _sigint = signal(SignalKind::interrupt()).unwrap();
        let service = MemoryStreamService::new();
        let producer = listening_producer(&service).await;
        assert!(producer.is_producing());

        raise_sigint();
        timeout(Duration::from_secs(2), producer.wait_stopped())
            .await
            .expect("producer kept running after SIGINT");
        assert!(!producer.is_producing());
        assert!(!producer.is_closed());

        producer.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn test_restart_after_sigint_delivers() {
        let _sigint = signal(SignalKind::interrupt()).unwrap();
        let service = MemoryStreamService::new();
        let producer = listening_producer(&service).await;

        raise_sigint();
        timeout(Duration::from_secs(2), producer.wait_stopped())
            .await
            .unwrap();

        producer.start().unwrap();
        assert!(producer.is_producing());
        producer.send(Message::new("after signal", "test")).unwrap();
        eventually("put after restart", || producer.sent_count() == 2).await;
        assert_eq!(stored_values(&service), vec!["ready", "after signal"]);
        assert!(producer.is_producing());

        producer.close().await.unwrap();
        assert!(!producer.is_producing());
    }
}

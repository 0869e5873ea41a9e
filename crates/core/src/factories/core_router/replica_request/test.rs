use super::*;
use crate::factories::{
    core_router::{collector::ResponseCollector, GetBlob},
    encode_blob_record, MemMetrics, MemTopology, RecordBlobDecoder,
};
use blobrouter_test_utils::id::{random_blob_id, replicas_in};
use bytes::Bytes;
use std::time::Duration;

const CORRELATION_ID: u64 = 11;

struct TestCase {
    context: Arc<OperationContext>,
    topology: Arc<MemTopology>,
    metrics: Arc<MemMetrics>,
    replica: ReplicaDescriptor,
    down_replica_count: Arc<AtomicUsize>,
}

fn setup_test() -> TestCase {
    blobrouter_test_utils::enable_tracing();
    let replica = replicas_in("local", "node", 1).remove(0);
    let topology = MemTopology::create("local", vec![replica.clone()]);
    let metrics = MemMetrics::create();
    let context = Arc::new(OperationContext::new(
        CORRELATION_ID,
        "test".into(),
        Duration::from_millis(100),
        topology.clone(),
        metrics.clone(),
    ));
    TestCase {
        context,
        topology,
        metrics,
        replica,
        down_replica_count: Arc::new(AtomicUsize::new(0)),
    }
}

/// A connection that accepts the request and answers with `response`.
/// `None` means it never answers.
fn mock_connection(response: Option<BrResult<Bytes>>) -> MockConnection {
    let mut connection = MockConnection::new();
    connection
        .expect_send()
        .returning(|_| Box::pin(async { Ok(()) }));
    connection.expect_receive().returning(move || {
        let response = response.clone();
        Box::pin(async move {
            match response {
                Some(response) => response,
                None => std::future::pending().await,
            }
        })
    });
    connection
}

fn mock_pool(
    response: Option<BrResult<Bytes>>,
    released: usize,
    destroyed: usize,
) -> Arc<MockConnectionPool> {
    let mut pool = MockConnectionPool::new();
    pool.expect_acquire().returning(move |_, _| {
        let connection: DynConnection =
            Box::new(mock_connection(response.clone()));
        Box::pin(async move { Ok(connection) })
    });
    pool.expect_release().times(released).return_const(());
    pool.expect_destroy().times(destroyed).return_const(());
    Arc::new(pool)
}

async fn run_request(
    test: &TestCase,
    pool: DynConnectionPool,
) -> Result<BlobOutput, ReplicaErrorKind> {
    let mut collector = ResponseCollector::new();
    let request = ReplicaRequest::<GetBlob>::new(
        test.context.clone(),
        &random_blob_id(),
        test.replica.clone(),
        pool,
        RecordBlobDecoder::create(),
        test.down_replica_count.clone(),
    );
    request.run(collector.sender()).await;

    let mut outcomes = collector.drain();
    assert_eq!(1, outcomes.len());
    let outcome = outcomes.remove(0);
    assert_eq!(test.replica, outcome.replica);
    outcome.result
}

fn response(correlation_id: u64, code: ServerErrorCode, body: Bytes) -> Bytes {
    serialize_get_response(correlation_id, code, body)
}

#[tokio::test]
async fn clean_exchange_releases_the_connection() {
    let test = setup_test();
    let body = encode_blob_record(Bytes::from_static(b"hello"));
    let pool = mock_pool(
        Some(Ok(response(CORRELATION_ID, ServerErrorCode::NoError, body))),
        1,
        0,
    );

    let output = run_request(&test, pool).await.unwrap();

    assert_eq!(&Bytes::from_static(b"hello"), output.data());
    assert_eq!(
        Some(ReplicaState::Up),
        test.topology.hint(&test.replica.node)
    );
    assert_eq!(
        1,
        test.metrics
            .counter(MetricKind::GetBlobRequest, &test.replica.node)
    );
    assert_eq!(1, test.metrics.latency_samples(MetricKind::GetBlobRequest));
}

#[tokio::test]
async fn receive_error_destroys_the_connection() {
    let test = setup_test();
    let pool = mock_pool(Some(Err(BrError::other("connection reset"))), 0, 1);

    let result = run_request(&test, pool).await;

    assert_eq!(Err(ReplicaErrorKind::Unreachable), result.map(|_| ()));
    assert_eq!(1, test.down_replica_count.load(Ordering::SeqCst));
    assert_eq!(
        Some(ReplicaState::Down),
        test.topology.hint(&test.replica.node)
    );
}

#[tokio::test]
async fn acquire_failure_is_unreachable() {
    let test = setup_test();
    let mut pool = MockConnectionPool::new();
    pool.expect_acquire().returning(|_, _| {
        Box::pin(async { Err(BrError::other("connection refused")) })
    });
    pool.expect_release().never();
    pool.expect_destroy().never();

    let result = run_request(&test, Arc::new(pool)).await;

    assert_eq!(Err(ReplicaErrorKind::Unreachable), result.map(|_| ()));
    assert_eq!(1, test.metrics.latency_samples(MetricKind::GetBlobRequest));
}

#[tokio::test(start_paused = true)]
async fn silent_replica_times_out_at_the_deadline() {
    let test = setup_test();
    let pool = mock_pool(None, 0, 1);

    let result = run_request(&test, pool).await;

    assert_eq!(Err(ReplicaErrorKind::Timeout), result.map(|_| ()));
    assert!(test.context.is_expired());
    assert_eq!(0, test.down_replica_count.load(Ordering::SeqCst));
    assert_eq!(None, test.topology.hint(&test.replica.node));
}

#[tokio::test]
async fn mismatched_correlation_id_is_unexpected() {
    let test = setup_test();
    let body = encode_blob_record(Bytes::from_static(b"hello"));
    let pool = mock_pool(
        Some(Ok(response(
            CORRELATION_ID + 1,
            ServerErrorCode::NoError,
            body,
        ))),
        1,
        0,
    );

    let result = run_request(&test, pool).await;

    assert_eq!(Err(ReplicaErrorKind::Unexpected), result.map(|_| ()));
}

#[tokio::test]
async fn server_errors_map_to_replica_errors() {
    for (code, kind) in [
        (ServerErrorCode::BlobNotFound, ReplicaErrorKind::NotFound),
        (ServerErrorCode::BlobDeleted, ReplicaErrorKind::Deleted),
        (ServerErrorCode::BlobExpired, ReplicaErrorKind::Expired),
        (ServerErrorCode::DataCorrupt, ReplicaErrorKind::Corrupt),
        (ServerErrorCode::ReplicaUnavailable, ReplicaErrorKind::Unreachable),
        (ServerErrorCode::PartitionUnknown, ReplicaErrorKind::Unexpected),
    ] {
        let test = setup_test();
        let pool =
            mock_pool(Some(Ok(response(CORRELATION_ID, code, Bytes::new()))), 1, 0);

        let result = run_request(&test, pool).await;

        assert_eq!(Err(kind), result.map(|_| ()), "{code:?}");
    }
}

#[tokio::test]
async fn undecodable_body_is_corrupt() {
    let test = setup_test();
    let pool = mock_pool(
        Some(Ok(response(
            CORRELATION_ID,
            ServerErrorCode::NoError,
            Bytes::from_static(&[0xff, 0xff]),
        ))),
        1,
        0,
    );

    let result = run_request(&test, pool).await;

    assert_eq!(Err(ReplicaErrorKind::Corrupt), result.map(|_| ()));
    assert_eq!(
        Some(ReplicaState::Up),
        test.topology.hint(&test.replica.node)
    );
}

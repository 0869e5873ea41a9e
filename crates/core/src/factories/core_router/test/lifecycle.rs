use super::utils::*;
use crate::factories::{
    core_router::{
        GetBlobOperation, GetBlobProperties, GetBlobUserMetadata,
        OperationState,
    },
    mem_connection_pool::{MemBlob, MemReplicaBehavior as B},
    MemTopology,
};
use blobrouter_api::*;
use bytes::Bytes;

#[tokio::test(start_paused = true)]
async fn blob_output_is_unavailable_before_resolution() {
    let test = setup_test(1, 0);
    test.pool
        .set_behavior(test.local[0].node.clone(), B::serve(1, b"blob"));

    let mut op: GetBlobOperation = test.operation(&config(1, 1_000));
    assert_eq!(OperationState::Pending, op.state());
    assert_eq!(
        CoordinatorErrorKind::UnexpectedInternalError,
        op.blob_output().unwrap_err().kind
    );

    op.start().unwrap();
    assert_eq!(OperationState::AwaitingResponses, op.state());
    assert_eq!(
        CoordinatorErrorKind::UnexpectedInternalError,
        op.blob_output().unwrap_err().kind
    );

    op.await_result().await.unwrap();
    op.blob_output().unwrap();
}

#[tokio::test(start_paused = true)]
async fn blob_output_is_unavailable_after_failure() {
    let test = setup_test(1, 0);
    test.pool.set_behavior(
        test.local[0].node.clone(),
        B::fail(1, ServerErrorCode::BlobNotFound),
    );

    let mut op: GetBlobOperation = test.operation(&config(1, 1_000));
    op.start().unwrap();
    op.await_result().await.unwrap_err();

    assert_eq!(OperationState::Failed, op.state());
    assert_eq!(
        CoordinatorErrorKind::UnexpectedInternalError,
        op.blob_output().unwrap_err().kind
    );
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let test = setup_test(1, 0);
    test.pool
        .set_behavior(test.local[0].node.clone(), B::serve(1, b"blob"));

    let mut op: GetBlobOperation = test.operation(&config(1, 1_000));
    op.start().unwrap();
    let err = op.start().unwrap_err();
    assert_eq!(CoordinatorErrorKind::UnexpectedInternalError, err.kind);

    // the misuse did not resolve the operation
    op.await_result().await.unwrap();
    assert_eq!(1, test.pool.requests().len());
}

#[tokio::test(start_paused = true)]
async fn await_before_start_is_rejected() {
    let test = setup_test(1, 0);

    let mut op: GetBlobOperation = test.operation(&config(1, 1_000));
    let err = op.await_result().await.unwrap_err();

    assert_eq!(CoordinatorErrorKind::UnexpectedInternalError, err.kind);
    assert_eq!(OperationState::Pending, op.state());
}

#[tokio::test(start_paused = true)]
async fn empty_replica_set_is_unexpected() {
    let mut test = setup_test(0, 0);
    test.topology = MemTopology::create("local", Vec::new());

    let mut op: GetBlobOperation = test.operation(&config(1, 1_000));
    let err = op.start().unwrap_err();

    assert_eq!(CoordinatorErrorKind::UnexpectedInternalError, err.kind);
    assert_eq!(OperationState::Failed, op.state());
    assert_eq!(err, op.await_result().await.unwrap_err());
}

#[tokio::test(start_paused = true)]
async fn properties_and_user_metadata_are_decoded() {
    let test = setup_test(1, 0);
    let mut blob = MemBlob::new(Bytes::from_static(b"content"));
    blob.user_metadata = Bytes::from_static(b"meta");
    test.pool.set_behavior(
        test.local[0].node.clone(),
        B::Serve {
            delay: ms(1),
            blob: blob.clone(),
        },
    );

    let mut op = test.operation::<GetBlobProperties>(&config(1, 1_000));
    op.start().unwrap();
    op.await_result().await.unwrap();
    assert_eq!(blob.properties, op.payload().unwrap());

    let mut op = test.operation::<GetBlobUserMetadata>(&config(1, 1_000));
    op.start().unwrap();
    op.await_result().await.unwrap();
    assert_eq!(Bytes::from_static(b"meta"), op.payload().unwrap());

    let flags: Vec<MessageFormatFlags> = test
        .pool
        .requests()
        .iter()
        .map(|(_, request)| request.flags())
        .collect();
    assert_eq!(
        vec![
            MessageFormatFlags::BlobProperties,
            MessageFormatFlags::BlobUserMetadata
        ],
        flags
    );
    assert_eq!(
        1,
        test.metrics.total(MetricKind::GetBlobPropertiesRequest)
    );
}

//! Integration tests for large object I/O

use bytes::Bytes;
use futures::TryStreamExt;
use objstream_core::*;
use objstream_engine::*;
use proptest::prelude::*;
use sha2::{Digest, Sha256};

fn engine_without_part_minimum() -> (StorageEngine, tempfile::TempDir) {
    StorageEngine::temp_with(EngineConfig {
        min_part_size: 0,
        ..EngineConfig::default()
    })
    .unwrap()
}

async fn read_all(engine: &StorageEngine, bucket: &BucketName, key: &ObjectKey) -> Vec<u8> {
    let output = engine.get_object(bucket, key).await.unwrap();
    let chunks: Vec<Bytes> = output.body.try_collect().await.unwrap();
    chunks.concat()
}

#[tokio::test]
async fn multipart_put_commit_then_get_matches_sha() {
    let (engine, _temp) = StorageEngine::temp().unwrap();
    let bucket = BucketName::new("test-bucket").unwrap();
    let key = ObjectKey::new("large-file").unwrap();
    ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();

    // 5 parts of 5MiB each satisfy the default minimum part size
    const PART_SIZE: usize = 5 * 1024 * 1024;
    let upload_id = engine
        .create_multipart_upload(&bucket, &key, None)
        .await
        .unwrap();

    let mut all_data = Vec::new();
    let mut parts = Vec::new();
    for i in 0..5u32 {
        let part = vec![i as u8; PART_SIZE];
        all_data.extend_from_slice(&part);
        let result = engine
            .upload_part(&bucket, &key, &upload_id, i + 1, Bytes::from(part))
            .await
            .unwrap();
        assert_eq!(result.size, PART_SIZE as u64);
        parts.push(result);
    }

    let completion = engine
        .complete_multipart_upload(&bucket, &key, &upload_id, &parts)
        .await
        .unwrap();
    assert_eq!(completion.parts, 5);
    assert_eq!(completion.size, all_data.len() as u64);

    let retrieved = read_all(&engine, &bucket, &key).await;
    assert_eq!(Sha256::digest(&retrieved), Sha256::digest(&all_data));
    assert_eq!(retrieved.len(), all_data.len());
}

#[tokio::test]
async fn small_non_final_parts_are_rejected_by_default() {
    let (engine, _temp) = StorageEngine::temp().unwrap();
    let bucket = BucketName::new("test-bucket").unwrap();
    let key = ObjectKey::new("tiny-parts").unwrap();
    ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();

    let upload_id = engine.create_multipart_upload(&bucket, &key, None).await.unwrap();
    let p1 = engine
        .upload_part(&bucket, &key, &upload_id, 1, Bytes::from_static(b"tiny"))
        .await
        .unwrap();
    let p2 = engine
        .upload_part(&bucket, &key, &upload_id, 2, Bytes::from_static(b"tail"))
        .await
        .unwrap();

    let err = engine
        .complete_multipart_upload(&bucket, &key, &upload_id, &[p1, p2])
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidRequest);

    engine.abort_multipart_upload(&bucket, &key, &upload_id).await.unwrap();
    assert!(engine.list_multipart_uploads(&bucket).await.unwrap().is_empty());
}

#[tokio::test]
async fn reuploaded_part_replaces_previous_body() {
    let (engine, _temp) = engine_without_part_minimum();
    let bucket = BucketName::new("test-bucket").unwrap();
    let key = ObjectKey::new("retry").unwrap();
    ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();

    let upload_id = engine.create_multipart_upload(&bucket, &key, None).await.unwrap();
    engine
        .upload_part(&bucket, &key, &upload_id, 1, Bytes::from_static(b"first try"))
        .await
        .unwrap();
    let p1 = engine
        .upload_part(&bucket, &key, &upload_id, 1, Bytes::from_static(b"second try"))
        .await
        .unwrap();

    engine
        .complete_multipart_upload(&bucket, &key, &upload_id, &[p1])
        .await
        .unwrap();
    assert_eq!(read_all(&engine, &bucket, &key).await, b"second try");
}

#[tokio::test]
async fn data_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let bucket = BucketName::new("test-bucket").unwrap();
    let key = ObjectKey::new("durable").unwrap();

    {
        let engine = StorageEngine::new(temp.path(), EngineConfig::default()).unwrap();
        ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();
        engine
            .put_object(UploadRequest::new(bucket.clone(), key.clone(), &b"persisted"[..]))
            .await
            .unwrap();
    }

    let engine = StorageEngine::new(temp.path(), EngineConfig::default()).unwrap();
    assert!(ObjectStorage::bucket_exists(&engine, &bucket).await.unwrap());
    assert_eq!(read_all(&engine, &bucket, &key).await, b"persisted");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn props_put_then_get_returns_same_bytes(
        data in prop::collection::vec(any::<u8>(), 0..200_000)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (engine, _temp) = StorageEngine::temp().unwrap();
            let bucket = BucketName::new("test-bucket").unwrap();
            let key = ObjectKey::new("test-key").unwrap();
            ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();

            engine
                .put_object(UploadRequest::new(bucket.clone(), key.clone(), data.clone()))
                .await
                .unwrap();

            assert_eq!(read_all(&engine, &bucket, &key).await, data);
        });
    }

    #[test]
    fn props_parts_reassemble_in_part_number_order(
        part_sizes in prop::collection::vec(1usize..2000, 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (engine, _temp) = engine_without_part_minimum();
            let bucket = BucketName::new("test-bucket").unwrap();
            let key = ObjectKey::new("chunked-object").unwrap();
            ObjectStorage::create_bucket(&engine, &bucket).await.unwrap();

            let upload_id = engine.create_multipart_upload(&bucket, &key, None).await.unwrap();
            let mut expected = Vec::new();
            let mut parts = Vec::new();
            for (i, size) in part_sizes.iter().enumerate() {
                let part = vec![i as u8; *size];
                expected.extend_from_slice(&part);
                parts.push(
                    engine
                        .upload_part(&bucket, &key, &upload_id, i as u32 + 1, Bytes::from(part))
                        .await
                        .unwrap(),
                );
            }

            engine
                .complete_multipart_upload(&bucket, &key, &upload_id, &parts)
                .await
                .unwrap();
            assert_eq!(read_all(&engine, &bucket, &key).await, expected);
        });
    }
}

fn main() {
    println!("Run `cargo test -p persist-compat` to execute persistence compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::fs;
    use std::future::Future;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chunklift_engine::{
        AdapterError, ChunkContext, ChunkOutcome, ChunkSource, FileSource, FinalizeContext,
        FinalizeOutcome, PrepareContext, PrepareOutcome, RetryPolicy, TransferError, UploadAdapter,
        UploadTask, UploaderConfig,
    };
    use chunklift_identity::identity_from_reader;
    use chunklift_manifest::{FsManifestStore, ManifestStore, NewManifest, TransferManifest};

    /// Identity of the 12 MiB test payload chunked at the default 5 MiB.
    const PAYLOAD_FILE_ID: &str =
        "f05fb14364461a87759a3fc471b01eceb6c5a0bc4bc3e1a5520afa02ccb51fc8";

    /// 12 MiB of patterned bytes: 3 chunks at the default chunk size.
    fn payload() -> Vec<u8> {
        (0..12 * 1024 * 1024).map(|i| (i % 251) as u8).collect()
    }

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and
    /// compares the JSON values. Field names, key encodings and timestamp
    /// format must survive unchanged or old on-disk records break.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  disk: {fixture}\n  rust: {reserialized}"
        );
    }

    // --- Manifest record fixtures ---

    #[test]
    fn fixture_manifest_in_flight() {
        roundtrip_test::<TransferManifest>("manifest_in_flight.json");
    }

    #[test]
    fn fixture_manifest_completed() {
        roundtrip_test::<TransferManifest>("manifest_completed.json");
    }

    #[test]
    fn minimal_manifest_defaults_optional_fields() {
        // Records written before a transfer negotiates carry no session,
        // tags or url.
        let json = r#"{
            "key": "http-multipart|abc",
            "name": "a.bin",
            "size": 10,
            "chunkSize": 4,
            "chunkCount": 3,
            "uploaded": [],
            "updatedAt": "2025-11-07T18:20:05Z"
        }"#;
        let m: TransferManifest = serde_json::from_str(json).unwrap();

        assert!(m.session_id.is_none());
        assert!(m.chunk_tags.is_empty());
        assert!(m.url.is_none());
        assert!(!m.completed);
        assert_eq!(m.uploaded_count(), 0);
    }

    // --- Filesystem store layout ---

    #[tokio::test]
    async fn fs_store_file_naming_is_stable() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsManifestStore::open(dir.path()).await.unwrap();

        store
            .put(
                "http-multipart",
                "f1",
                NewManifest {
                    name: "a.bin".into(),
                    size: 10,
                    chunk_size: 4,
                    chunk_count: 3,
                },
            )
            .await
            .unwrap();

        // sha256("up:pro:manifest:http-multipart|f1")
        let expected = dir
            .path()
            .join("c8f944e285648b9bac48243aaa7fc787e9a7418eae0f384f39abbe7c2c99f930.json");
        assert!(
            expected.exists(),
            "record file moved; existing stores would lose their manifests"
        );
    }

    #[tokio::test]
    async fn fs_store_roundtrips_across_instances() {
        let dir = tempfile::TempDir::new().unwrap();

        let writer = FsManifestStore::open(dir.path()).await.unwrap();
        let mut written = writer
            .put(
                "s3-multipart",
                "f9",
                NewManifest {
                    name: "movie.mp4".into(),
                    size: 9,
                    chunk_size: 5,
                    chunk_count: 2,
                },
            )
            .await
            .unwrap();
        written.session_id = Some("mpu-7".into());
        written.record_uploaded(0, Some("\"p0\"".into()));
        writer.save(&mut written).await.unwrap();

        let reader = FsManifestStore::open(dir.path()).await.unwrap();
        let loaded = reader.load("s3-multipart", "f9").await.unwrap().unwrap();
        assert_eq!(loaded, written);
    }

    // --- Resume across process restarts ---

    /// Adapter that accepts chunks below `reject_from` and records
    /// everything it sees.
    struct RecordingAdapter {
        reject_from: Option<u32>,
        prepared_file_ids: Mutex<Vec<String>>,
        chunk_indices: Mutex<Vec<u32>>,
        finalized_parts: Mutex<Vec<(u32, String)>>,
    }

    impl RecordingAdapter {
        fn new(reject_from: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                reject_from,
                prepared_file_ids: Mutex::new(Vec::new()),
                chunk_indices: Mutex::new(Vec::new()),
                finalized_parts: Mutex::new(Vec::new()),
            })
        }

        fn chunk_indices(&self) -> Vec<u32> {
            let mut seen = self.chunk_indices.lock().unwrap().clone();
            seen.sort_unstable();
            seen
        }
    }

    impl UploadAdapter for RecordingAdapter {
        fn name(&self) -> &str {
            "restart-mock"
        }

        fn prepare<'a>(
            &'a self,
            ctx: PrepareContext<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<PrepareOutcome, AdapterError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.prepared_file_ids
                    .lock()
                    .unwrap()
                    .push(ctx.identity.file_id.clone());
                Ok(PrepareOutcome {
                    session_id: "sess-restart".into(),
                    already_uploaded: Vec::new(),
                    upload_targets: HashMap::new(),
                })
            })
        }

        fn upload_chunk<'a>(
            &'a self,
            ctx: ChunkContext<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<ChunkOutcome, AdapterError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.chunk_indices.lock().unwrap().push(ctx.index);
                if self.reject_from.is_some_and(|from| ctx.index >= from) {
                    return Ok(ChunkOutcome::rejected());
                }
                Ok(ChunkOutcome::accepted(Some(format!("t{}", ctx.index))))
            })
        }

        fn finalize<'a>(
            &'a self,
            ctx: FinalizeContext<'a>,
        ) -> Pin<Box<dyn Future<Output = Result<FinalizeOutcome, AdapterError>> + Send + 'a>>
        {
            Box::pin(async move {
                let mut parts = self.finalized_parts.lock().unwrap();
                for part in ctx.parts {
                    parts.push((part.part_number, part.tag.clone()));
                }
                Ok(FinalizeOutcome {
                    ok: true,
                    url: Some("https://cdn.test/build.tar".into()),
                })
            })
        }
    }

    fn restart_config() -> UploaderConfig {
        UploaderConfig {
            concurrency: 1,
            retry: RetryPolicy {
                attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: None,
                jitter: false,
            },
            ..UploaderConfig::default()
        }
    }

    /// A transfer that dies mid-flight picks up from the on-disk manifest
    /// in a fresh process: acknowledged chunks are never sent again.
    /// Real-size run: 12 MiB at the default 5 MiB chunking, 3 chunks.
    #[tokio::test]
    async fn resume_across_process_restarts() {
        let dir = tempfile::TempDir::new().unwrap();
        let payload_path = dir.path().join("build.tar");
        fs::write(&payload_path, payload()).unwrap();
        let store_dir = dir.path().join("manifests");

        // First run: chunk 0 lands, chunk 1 is rejected with no retry
        // budget, so the transfer errors out with chunk 2 untouched.
        let first_adapter = RecordingAdapter::new(Some(1));
        let first_store = Arc::new(FsManifestStore::open(&store_dir).await.unwrap());
        let task = UploadTask::new(first_adapter.clone(), first_store, restart_config());
        let source: Arc<dyn ChunkSource> =
            Arc::new(FileSource::open(&payload_path).await.unwrap());
        let err = task.start(source, None).await.unwrap_err();

        assert!(matches!(err, TransferError::ChunkTransfer { index: 1, .. }));
        assert_eq!(first_adapter.chunk_indices(), vec![0, 1]);

        // Second run: fresh store instance on the same directory, healthy
        // backend. Only the outstanding chunks go out.
        let second_adapter = RecordingAdapter::new(None);
        let second_store = Arc::new(FsManifestStore::open(&store_dir).await.unwrap());
        let task = UploadTask::new(second_adapter.clone(), second_store.clone(), restart_config());
        let source: Arc<dyn ChunkSource> =
            Arc::new(FileSource::open(&payload_path).await.unwrap());
        let outcome = task.start(source, None).await.unwrap();

        assert!(outcome.ok);
        assert_eq!(second_adapter.chunk_indices(), vec![1, 2]);

        // Both runs hashed the file to the same id.
        let prepared_first = first_adapter.prepared_file_ids.lock().unwrap().clone();
        let prepared_second = second_adapter.prepared_file_ids.lock().unwrap().clone();
        assert_eq!(prepared_first, vec![PAYLOAD_FILE_ID.to_string()]);
        assert_eq!(prepared_second, vec![PAYLOAD_FILE_ID.to_string()]);

        let payload = payload();
        let identity = identity_from_reader(
            payload.as_slice(),
            payload.len() as u64,
            5 * 1024 * 1024,
        )
        .unwrap();
        assert_eq!(identity.file_id, PAYLOAD_FILE_ID);

        // Finalize saw all three parts, numbered from 1, with the tags
        // collected across both runs.
        assert_eq!(
            *second_adapter.finalized_parts.lock().unwrap(),
            vec![(1, "t0".to_string()), (2, "t1".to_string()), (3, "t2".to_string())]
        );

        // The surviving record is complete.
        let record = second_store
            .load("restart-mock", PAYLOAD_FILE_ID)
            .await
            .unwrap()
            .unwrap();
        assert!(record.completed);
        assert_eq!(record.uploaded, BTreeSet::from([0, 1, 2]));
        assert_eq!(record.url.as_deref(), Some("https://cdn.test/build.tar"));
    }
}

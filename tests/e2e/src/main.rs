fn main() {
    println!("Run `cargo test -p vdrlink-e2e` to execute the end-to-end upload tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use percent_encoding::percent_decode_str;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use vdrlink_client::{ClientConfig, VdrClient};
    use vdrlink_protocol::{
        ChunkAck, UploadProgress, UploadStatus, UploadTarget, UploadedDocument,
    };
    use vdrlink_transfer::{MemoryFile, checksum_bytes};
    use vdrlink_uploader::{ChunkedUploader, UploadError, UploadOptions};

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Parses a fixture into `T`, re-serializes it, and compares JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(fixture, reserialized, "round-trip mismatch for {name}");
        parsed
    }

    #[test]
    fn document_record_fixture() {
        let doc: UploadedDocument = roundtrip_test("document.json");
        assert_eq!(doc.id, "doc-7f3a");
        assert_eq!(doc.parent_id, "folder-9");
        assert_eq!(doc.size, 47_185_920);
        assert!(doc.created_at.unwrap() < doc.updated_at.unwrap());
    }

    #[test]
    fn minimal_document_record_fixture() {
        let doc: UploadedDocument = roundtrip_test("document_minimal.json");
        assert!(doc.created_at.is_none());
        assert_eq!(doc.size, 0);
    }

    #[test]
    fn chunk_ack_fixture() {
        let ack: ChunkAck = roundtrip_test("chunk_ack.json");
        assert_eq!(ack.chunk_number, Some(2));
        assert_eq!(ack.received_bytes, Some(41_943_040));
    }

    #[test]
    fn progress_fixtures() {
        let uploading: UploadProgress = roundtrip_test("progress_uploading.json");
        assert_eq!(uploading.status, UploadStatus::Uploading);
        assert_eq!(uploading.remaining_bytes(), 26_214_400);
        assert!(uploading.error.is_none());

        let failed: UploadProgress = roundtrip_test("progress_failed.json");
        assert_eq!(failed.status, UploadStatus::Failed);
        assert_eq!(failed.document_id, uploading.document_id);
        assert!(failed.error.unwrap().contains("HTTP 500"));
    }

    // -----------------------------------------------------------------------
    // Mock VDR service
    // -----------------------------------------------------------------------

    /// One chunk as the mock service stored it.
    #[derive(Debug, Clone)]
    struct StoredChunk {
        path: String,
        authorization: Option<String>,
        content_type: Option<String>,
        document_id: String,
        folder_id: String,
        file_name: String,
        chunk_number: u32,
        total_size: u64,
        checksum: Option<String>,
        body: Vec<u8>,
    }

    /// A stand-in for the service: stores chunks and finalizes a document
    /// once it has received `x-total-size` bytes under one document id.
    struct MockVdr {
        base_url: String,
        chunks: Arc<Mutex<Vec<StoredChunk>>>,
    }

    impl MockVdr {
        /// Starts the service. `fail` answers that chunk number with an error status.
        async fn start(fail: Option<(u32, u16)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let chunks = Arc::new(Mutex::new(Vec::new()));

            let store = chunks.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let store = store.clone();
                    tokio::spawn(serve(stream, store, fail));
                }
            });

            Self {
                base_url: format!("http://127.0.0.1:{port}/api/v1"),
                chunks,
            }
        }

        fn chunks(&self) -> Vec<StoredChunk> {
            self.chunks.lock().unwrap().clone()
        }

        fn uploader(&self, options: UploadOptions) -> ChunkedUploader<VdrClient> {
            let client =
                VdrClient::new(&ClientConfig::new(self.base_url.clone(), "test-token")).unwrap();
            ChunkedUploader::new(client).with_options(options)
        }
    }

    async fn serve(
        mut stream: TcpStream,
        store: Arc<Mutex<Vec<StoredChunk>>>,
        fail: Option<(u32, u16)>,
    ) {
        let Some((path, headers, body)) = read_request(&mut stream).await else {
            return;
        };
        let header = |name: &str| headers.get(name).cloned();

        let chunk = StoredChunk {
            path,
            authorization: header("authorization"),
            content_type: header("content-type"),
            document_id: header("x-document-id").unwrap_or_default(),
            folder_id: header("x-folder-id").unwrap_or_default(),
            file_name: header("x-file-name")
                .map(|n| percent_decode_str(&n).decode_utf8_lossy().into_owned())
                .unwrap_or_default(),
            chunk_number: header("x-chunk-number")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            total_size: header("x-total-size")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            checksum: header("x-chunk-checksum"),
            body,
        };

        let (status, response) = {
            let mut store = store.lock().unwrap();
            store.push(chunk.clone());

            if let Some((number, status)) = fail
                && number == chunk.chunk_number
            {
                (status, r#"{"error":"storage unavailable"}"#.to_string())
            } else {
                let received: u64 = store
                    .iter()
                    .filter(|c| c.document_id == chunk.document_id)
                    .map(|c| c.body.len() as u64)
                    .sum();
                if received >= chunk.total_size {
                    let doc = serde_json::json!({
                        "id": format!("doc-{}", chunk.document_id),
                        "name": chunk.file_name,
                        "size": received,
                        "parentId": chunk.folder_id,
                        "createdAt": "2024-05-14T09:30:00Z",
                    });
                    (200, doc.to_string())
                } else {
                    let ack = serde_json::json!({
                        "documentId": chunk.document_id,
                        "chunkNumber": chunk.chunk_number,
                        "receivedBytes": received,
                    });
                    (200, ack.to_string())
                }
            }
        };

        let resp = format!(
            "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.len(),
            response
        );
        let _ = stream.write_all(resp.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    async fn read_request(
        stream: &mut TcpStream,
    ) -> Option<(String, HashMap<String, String>, Vec<u8>)> {
        let mut buf = Vec::new();
        let mut tmp = vec![0u8; 64 * 1024];
        let header_end = loop {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let path = lines.next()?.split(' ').nth(1)?.to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let len: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut body = buf[header_end..].to_vec();
        while body.len() < len {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&tmp[..n]);
        }

        Some((path, headers, body))
    }

    fn small_chunks() -> UploadOptions {
        UploadOptions {
            chunk_size: 4096,
            single_shot_threshold: 4096,
            send_checksums: true,
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UploadProgress>) -> Vec<UploadProgress> {
        let mut out = Vec::new();
        while let Ok(p) = rx.try_recv() {
            out.push(p);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Upload scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn small_file_is_one_request() {
        let service = MockVdr::start(None).await;
        let uploader = service.uploader(UploadOptions::default());
        let file = MemoryFile::new("term-sheet.pdf", patterned(1000));
        let target = UploadTarget::new("deal-42", "folder-legal");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let doc = uploader.upload(&file, &target, &tx).await.unwrap();

        let chunks = service.chunks();
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.path, "/api/v1/projects/deal-42/documents/upload");
        assert_eq!(chunk.authorization.as_deref(), Some("Bearer test-token"));
        assert_eq!(chunk.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(chunk.chunk_number, 1);
        assert_eq!(chunk.total_size, 1000);
        assert_eq!(chunk.folder_id, "folder-legal");
        assert_eq!(chunk.file_name, "term-sheet.pdf");
        assert_eq!(chunk.checksum.as_deref(), Some(checksum_bytes(&chunk.body).as_str()));

        assert_eq!(doc.id, format!("doc-{}", chunk.document_id));
        assert_eq!(doc.size, 1000);
        assert_eq!(doc.parent_id, "folder-legal");

        let statuses: Vec<UploadStatus> = drain(&mut rx).iter().map(|p| p.status).collect();
        assert_eq!(statuses, vec![UploadStatus::Pending, UploadStatus::Completed]);
    }

    #[tokio::test]
    async fn large_file_is_reassembled_in_order() {
        let service = MockVdr::start(None).await;
        let uploader = service.uploader(small_chunks());
        let data = patterned(10_000);
        let file = MemoryFile::new("data room index.xlsx", data.clone());
        let target = UploadTarget::new("deal-42", "folder-finance");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let doc = uploader.upload(&file, &target, &tx).await.unwrap();

        let chunks = service.chunks();
        let numbers: Vec<u32> = chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.body.len()).collect();
        assert_eq!(lengths, vec![4096, 4096, 1808]);

        let reassembled: Vec<u8> = chunks.iter().flat_map(|c| c.body.clone()).collect();
        assert_eq!(reassembled, data);

        let id = &chunks[0].document_id;
        assert!(chunks.iter().all(|c| &c.document_id == id));
        assert!(chunks.iter().all(|c| c.file_name == "data room index.xlsx"));
        assert!(chunks.iter().all(|c| c.total_size == 10_000));
        assert_eq!(doc.size, 10_000);

        let snapshots = drain(&mut rx);
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[0].status, UploadStatus::Pending);
        assert_eq!(snapshots[1].uploaded_size, 4096);
        assert_eq!(snapshots[2].uploaded_size, 8192);
        assert_eq!(snapshots[3].status, UploadStatus::Completed);
        assert_eq!(snapshots[3].percentage(), 100.0);
    }

    #[tokio::test]
    async fn rejection_stops_the_upload() {
        let service = MockVdr::start(Some((2, 500))).await;
        let uploader = service.uploader(small_chunks());
        let file = MemoryFile::new("model.xlsx", patterned(10_000));
        let target = UploadTarget::new("deal-42", "folder-finance");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let failure = uploader.upload(&file, &target, &tx).await.unwrap_err();

        match &failure.error {
            UploadError::Rejected {
                chunk_number,
                status,
                message,
            } => {
                assert_eq!(*chunk_number, 2);
                assert_eq!(*status, 500);
                assert!(message.contains("storage unavailable"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(failure.progress.uploaded_size, 4096);
        assert_eq!(failure.progress.chunks_uploaded, 1);

        // Chunk 3 was never sent.
        assert_eq!(service.chunks().len(), 2);

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.status, UploadStatus::Failed);
        assert!(last.error.unwrap().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn second_upload_gets_its_own_document() {
        let service = MockVdr::start(None).await;
        let uploader = service.uploader(small_chunks());
        let file = MemoryFile::new("a.bin", patterned(5000));
        let target = UploadTarget::new("deal-42", "folder-1");

        let first = uploader.upload(&file, &target, &()).await.unwrap();
        let second = uploader.upload(&file, &target, &()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(service.chunks().len(), 4);
    }

    #[tokio::test]
    async fn non_ascii_names_survive_encoding() {
        let service = MockVdr::start(None).await;
        let uploader = service.uploader(UploadOptions::default());
        let file = MemoryFile::new("Résumé (v2) 100%.pdf", patterned(16));
        let target = UploadTarget::new("Project Falcon/2024", "folder-1");

        let doc = uploader.upload(&file, &target, &()).await.unwrap();

        let chunk = &service.chunks()[0];
        assert_eq!(chunk.file_name, "Résumé (v2) 100%.pdf");
        assert_eq!(chunk.path, "/api/v1/projects/Project%20Falcon%2F2024/documents/upload");
        assert_eq!(doc.name, "Résumé (v2) 100%.pdf");
    }

    #[tokio::test]
    async fn empty_file_is_one_empty_request() {
        let service = MockVdr::start(None).await;
        let uploader = service.uploader(small_chunks());
        let file = MemoryFile::new("placeholder.txt", Vec::new());
        let target = UploadTarget::new("deal-42", "folder-1");

        let doc = uploader.upload(&file, &target, &()).await.unwrap();

        let chunks = service.chunks();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].body.is_empty());
        assert_eq!(chunks[0].total_size, 0);
        assert_eq!(doc.size, 0);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            VdrClient::new(&ClientConfig::new(format!("http://127.0.0.1:{port}"), "t")).unwrap();
        let uploader = ChunkedUploader::new(client);
        let file = MemoryFile::new("a.bin", patterned(10));

        let failure = uploader
            .upload(&file, &UploadTarget::new("p", "f"), &())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            UploadError::Transport { chunk_number: 1, .. }
        ));
        assert_eq!(failure.progress.status, UploadStatus::Failed);
    }
}

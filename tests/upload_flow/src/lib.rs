//! End-to-end flows across the blob, queue, and transfer crates.

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;
    use uplift_blob::Blob;
    use uplift_queue::{FileSource, FileState, QueueRegistry, UploadFile};
    use uplift_transfer::{
        TransferError, Transport, TransportEvent, TransportRequest, TransportResponse, Uploader,
    };

    /// Transport that walks the payload in fixed steps, emitting progress,
    /// then returns the scripted result.
    struct SteppedTransport {
        step: u64,
        results: Mutex<Vec<Result<TransportResponse, TransferError>>>,
    }

    impl SteppedTransport {
        fn ok(step: u64, uploads: usize) -> Arc<Self> {
            let results = (0..uploads)
                .map(|_| {
                    Ok(TransportResponse {
                        status: 200,
                        body: b"{}".to_vec(),
                    })
                })
                .collect();
            Arc::new(Self {
                step,
                results: Mutex::new(results),
            })
        }
    }

    impl Transport for SteppedTransport {
        fn send(
            &self,
            request: TransportRequest,
            events: mpsc::Sender<TransportEvent>,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransferError>> + Send + '_>>
        {
            let total = match &request.body {
                uplift_transfer::RequestBody::Multipart { file, .. } => file.data.len() as u64,
                uplift_transfer::RequestBody::Raw { data, .. } => data.len() as u64,
            };
            Box::pin(async move {
                let mut loaded = 0;
                while loaded < total {
                    loaded = (loaded + self.step).min(total);
                    let _ = events
                        .send(TransportEvent::Progress {
                            loaded,
                            total,
                            length_computable: true,
                        })
                        .await;
                }
                self.results.lock().unwrap().remove(0)
            })
        }
    }

    fn blob_of(size: usize) -> Blob {
        Blob::new("test-filename.jpg", "image/jpeg", vec![0u8; size])
    }

    #[tokio::test]
    async fn registry_tracks_progress_through_uploads() {
        let registry = QueueRegistry::new();
        let photos = registry.create("photos");
        let docs = registry.create("docs");

        let a = photos.push_blob(blob_of(2000), FileSource::Browse);
        let b = docs.push_blob(blob_of(3500), FileSource::DragAndDrop);
        let c = docs.push_blob(blob_of(1400), FileSource::Blob);

        assert_eq!(registry.files().len(), 3);
        assert_eq!(registry.size(), 6900);
        assert_eq!(registry.loaded(), 0);
        assert_eq!(registry.progress(), 0);

        let transport = SteppedTransport::ok(512, 3);
        let uploader = Uploader::with_transport(transport as Arc<dyn Transport>);

        for file in [&a, &b, &c] {
            uploader
                .upload(file, "https://example.com/upload", Default::default())
                .await
                .unwrap();
        }

        // Everything uploaded: both queues flush, the rollup resets.
        assert_eq!(a.state(), FileState::Uploaded);
        assert!(photos.is_empty());
        assert!(docs.is_empty());
        assert_eq!(registry.files().len(), 0);
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.progress(), 0);
        assert_eq!(uploader.pending(), 0);
    }

    #[tokio::test]
    async fn failed_upload_keeps_file_requeueable() {
        let registry = QueueRegistry::new();
        let queue = registry.create("photos");
        let file = queue.push_blob(blob_of(1000), FileSource::Browse);

        let transport = Arc::new(SteppedTransport {
            step: 256,
            results: Mutex::new(vec![
                Err(TransferError::Http {
                    status: 502,
                    body: "bad gateway".into(),
                }),
                Ok(TransportResponse {
                    status: 200,
                    body: b"{}".to_vec(),
                }),
            ]),
        });
        let uploader = Uploader::with_transport(transport as Arc<dyn Transport>);

        let err = uploader
            .upload(&file, "https://example.com/upload", Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Http { status: 502, .. }));
        assert_eq!(file.state(), FileState::Failed);
        // Failed members keep the queue alive.
        assert_eq!(queue.len(), 1);
        assert_eq!(registry.files().len(), 1);

        // Caller-initiated retry succeeds and the queue flushes.
        uploader
            .upload(&file, "https://example.com/upload", Default::default())
            .await
            .unwrap();
        assert_eq!(file.state(), FileState::Uploaded);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn aborted_and_uploaded_members_flush_together() {
        let registry = QueueRegistry::new();
        let queue = registry.create("photos");

        let file0 = UploadFile::from_blob(blob_of(10));
        let file1 = UploadFile::from_blob(blob_of(10));
        let file2 = UploadFile::from_blob(blob_of(10));
        file2.try_start_upload().unwrap();
        file2.mark_uploaded();

        queue.push(Arc::clone(&file0));
        queue.push(Arc::clone(&file1));
        queue.push(Arc::clone(&file2));
        assert_eq!(queue.len(), 3);

        file0.mark_aborted();
        assert_eq!(queue.len(), 3);
        assert_eq!(registry.files().len(), 3);

        file1.mark_aborted();
        assert_eq!(queue.len(), 0);
        assert_eq!(registry.files().len(), 0);
    }

    #[tokio::test]
    async fn data_url_round_trip_through_file() {
        let source = UploadFile::from_blob(Blob::new("img.png", "image/png", vec![9u8; 321]));
        let url = source.read_as_data_url().await.unwrap();

        let copy = UploadFile::from_data_url(&url).unwrap();
        assert_eq!(copy.source(), FileSource::DataUrl);
        assert_eq!(copy.mime_type(), "image/png");
        assert_eq!(copy.size(), 321);
        assert_eq!(
            copy.read_as_bytes().await.unwrap(),
            source.read_as_bytes().await.unwrap()
        );
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_bounded() {
        let registry = QueueRegistry::new();
        let queue = registry.create("photos");
        let file = queue.push_blob(blob_of(5000), FileSource::Browse);

        // Sample the file's counters while the transfer runs.
        let sampler = {
            let file = Arc::clone(&file);
            tokio::spawn(async move {
                let mut samples = Vec::new();
                while !file.state().is_terminal() {
                    samples.push(file.loaded());
                    tokio::task::yield_now().await;
                }
                samples
            })
        };

        let transport = SteppedTransport::ok(700, 1);
        let uploader = Uploader::with_transport(transport as Arc<dyn Transport>);
        uploader
            .upload(&file, "https://example.com/upload", Default::default())
            .await
            .unwrap();

        let samples = sampler.await.unwrap();
        assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(samples.iter().all(|&loaded| loaded <= 5000));
        assert_eq!(file.loaded(), 5000);
        assert_eq!(file.size(), 5000);
        assert!((file.progress() - 100.0).abs() < f64::EPSILON);
    }
}

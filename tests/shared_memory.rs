// File-backed shared memory and handshake tests
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(unix)]
mod unix_tests {
    use spsc_shmqueue::Core::retry::RetryPolicy;
    use spsc_shmqueue::Core::SharedMemory::{
        extend_with_zeros, MappedFile, RawHandle, SharedMemoryBackend, EXTEND_CHUNK,
    };
    use spsc_shmqueue::SPSC::Structs::{SyncHeader, PHASE_NOT_STARTED, READY_CLAIMED, READY_MAGIC};
    use spsc_shmqueue::SPSC::{minimum_size, ChannelBuilder, SharedRegion};
    use spsc_shmqueue::QueueError;
    use std::fs;
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    fn ready_word(path: &std::path::Path, min_size: usize) -> u64 {
        let file = MappedFile::open(path, min_size).unwrap();
        let header = unsafe { &*(file.as_ptr() as *const SyncHeader) };
        header.ready.load(Ordering::Acquire)
    }

    fn quick_attach() -> RetryPolicy {
        RetryPolicy::sleep(Duration::from_millis(5)).with_deadline(Duration::from_secs(10))
    }

    #[test]
    fn test_create_extends_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extend.ipc");

        let file = MappedFile::create(&path, 1000, false).unwrap();
        assert_eq!(file.size(), 1000);
        assert_eq!(file.file_len().unwrap(), EXTEND_CHUNK as u64);
        assert!(!file.as_ptr().is_null());
        assert!(matches!(file.raw_handle(), RawHandle::Fd(fd) if fd >= 0));

        let big = MappedFile::create(&dir.path().join("big.ipc"), EXTEND_CHUNK * 2 + 1, false).unwrap();
        assert_eq!(big.file_len().unwrap(), (EXTEND_CHUNK * 3) as u64);
    }

    #[test]
    fn test_two_mappings_share_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.ipc");

        let writer = MappedFile::create(&path, 4096, false).unwrap();
        let reader = MappedFile::open(&path, 4096).unwrap();
        assert_ne!(writer.as_ptr(), reader.as_ptr());

        unsafe {
            let out = std::slice::from_raw_parts_mut(writer.as_ptr(), 4096);
            for (i, byte) in out.iter_mut().enumerate().take(100) {
                *byte = (i % 256) as u8;
            }
            let seen = std::slice::from_raw_parts(reader.as_ptr(), 4096);
            for (i, byte) in seen.iter().enumerate().take(100) {
                assert_eq!(*byte, (i % 256) as u8);
            }
        }
    }

    #[test]
    fn test_stale_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.ipc");
        fs::File::create(&path).unwrap().write_all(&[0xAB; 256]).unwrap();

        let file = MappedFile::create(&path, 256, false).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(file.as_ptr(), 256) };
        assert!(bytes.iter().all(|&b| b == 0), "old contents survived");
    }

    #[test]
    fn test_unlink_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.ipc");
        let removed = dir.path().join("removed.ipc");

        drop(MappedFile::create(&kept, 128, false).unwrap());
        drop(MappedFile::create(&removed, 128, true).unwrap());

        assert!(kept.exists());
        assert!(!removed.exists());
    }

    #[test]
    fn test_open_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.ipc");
        fs::write(&path, [0u8; 100]).unwrap();

        let err = MappedFile::open(&path, 4096).unwrap_err();
        assert!(matches!(err, QueueError::RegionTooSmall { needed: 4096, available: 100 }));

        let missing = MappedFile::open(&dir.path().join("missing.ipc"), 64).unwrap_err();
        assert!(matches!(missing, QueueError::Io { .. }));
    }

    #[test]
    fn test_extend_leaves_long_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.ipc");
        fs::write(&path, vec![1u8; 5000]).unwrap();

        let mut file = fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        assert_eq!(extend_with_zeros(&mut file, 4000).unwrap(), 5000);
        assert_eq!(extend_with_zeros(&mut file, 6000).unwrap(), 5000 + EXTEND_CHUNK as u64);

        // existing bytes are preserved, the tail is zero
        let contents = fs::read(&path).unwrap();
        assert!(contents[..5000].iter().all(|&b| b == 1));
        assert!(contents[5000..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_producer_header_after_setup() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("header.ipc"))
            .with_capacity(100);
        let layout = builder.layout::<u32>().unwrap();

        let region = SharedRegion::create(builder.path(), layout, false).unwrap();
        let header = region.header().unwrap();
        assert_eq!(header.ready.load(Ordering::Acquire), 0);
        assert_eq!(header.phase.load(Ordering::Acquire), PHASE_NOT_STARTED);
        assert_eq!(header.capacity.load(Ordering::Relaxed), 128);
        assert_eq!(header.element_size.load(Ordering::Relaxed), 4);
        assert_eq!(header.cache_line.load(Ordering::Relaxed), 64);
        assert!(region.file().file_len().unwrap() >= minimum_size(&layout) as u64);

        let (producer, barrier) = region.into_producer::<u32>(&builder).unwrap();
        assert_eq!(producer.capacity(), 128);
        assert_eq!(barrier.phase(), PHASE_NOT_STARTED);

        assert_eq!(ready_word(builder.path(), minimum_size(&layout)), READY_MAGIC);

        // attaching takes the region
        let region = SharedRegion::attach(builder.path(), layout, &builder).unwrap();
        assert_eq!(region.header().unwrap().ready.load(Ordering::Acquire), READY_CLAIMED);
    }

    #[test]
    fn test_handshake_round_trip_across_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("roundtrip.ipc"))
            .with_capacity(1024)
            .with_attach_policy(quick_attach());
        let items = 200_000u64;

        // Consumer first: it has to wait for the file to show up
        let consumer_builder = builder.clone();
        let consumer_handle = thread::spawn(move || {
            let (mut consumer, barrier) = consumer_builder.build_consumer::<u64>().unwrap();
            barrier.begin_run(0).unwrap();

            let mut expected = 0u64;
            while expected < items {
                if let Some(v) = consumer.try_dequeue() {
                    assert_eq!(v, expected);
                    expected += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
            barrier.acknowledge(0).unwrap();
            expected
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer_handle.is_finished());

        let (mut producer, barrier) = builder.build_producer::<u64>().unwrap();
        barrier.begin_run(0).unwrap();
        for i in 0..items {
            while !producer.try_enqueue(i).unwrap() {
                std::hint::spin_loop();
            }
        }
        barrier.mark_sent(0).unwrap();
        barrier.await_acknowledged(0).unwrap();

        assert_eq!(consumer_handle.join().unwrap(), items);
        assert_eq!(barrier.phase(), 2);
        assert_eq!(producer.size(), 0);
    }

    #[test]
    fn test_attach_times_out_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("never.ipc"))
            .with_attach_policy(RetryPolicy::sleep(Duration::from_millis(1)).with_max_attempts(3));

        let err = builder.build_consumer::<u64>().unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, QueueError::Timeout { what: "backing file", attempts: 3 }));
    }

    #[test]
    fn test_attach_waits_for_ready_word() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("unready.ipc"))
            .with_capacity(64)
            .with_ready_policy(RetryPolicy::yielding().with_max_attempts(10));
        let layout = builder.layout::<u64>().unwrap();

        // file created and sized, but the producer never finishes setup
        let _region = SharedRegion::create(builder.path(), layout, false).unwrap();
        let err = builder.build_consumer::<u64>().unwrap_err();
        assert!(matches!(err, QueueError::Timeout { what: "producer ready", .. }));
    }

    #[test]
    fn test_consumer_rejects_other_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("mismatch.ipc"))
            .with_capacity(16)
            .with_attach_policy(quick_attach());
        let _producer = builder.build_producer::<u64>().unwrap();

        let err = builder.clone().with_capacity(32).build_consumer::<u64>().unwrap_err();
        assert!(matches!(
            err,
            QueueError::LayoutMismatch { field: "capacity", expected: 32, found: 16 }
        ));
        assert!(err.is_config());

        let err = builder.build_consumer::<u32>().unwrap_err();
        assert!(matches!(
            err,
            QueueError::LayoutMismatch { field: "element_size", expected: 4, found: 8 }
        ));
    }

    #[test]
    fn test_default_producer_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.ipc");
        let builder = ChannelBuilder::new()
            .with_path(&path)
            .with_capacity(8)
            .with_attach_policy(RetryPolicy::sleep(Duration::from_millis(1)).with_max_attempts(3));

        let (producer, barrier) = builder.build_producer::<u64>().unwrap();
        assert!(path.exists());
        drop(producer);
        drop(barrier);
        assert!(!path.exists());

        let err = builder.build_consumer::<u64>().unwrap_err();
        assert!(matches!(err, QueueError::Timeout { what: "backing file", .. }));
    }

    #[test]
    fn test_second_consumer_cannot_claim_region() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ChannelBuilder::new()
            .with_path(dir.path().join("claimed.ipc"))
            .with_capacity(8)
            .with_ready_policy(RetryPolicy::yielding().with_max_attempts(20));

        let (mut producer, _) = builder.build_producer::<u64>().unwrap();
        let (mut first, _) = builder.build_consumer::<u64>().unwrap();

        let err = builder.build_consumer::<u64>().unwrap_err();
        assert!(matches!(err, QueueError::Timeout { what: "producer ready", .. }));

        // the first consumer is unaffected
        producer.add(5).unwrap();
        assert_eq!(first.remove().unwrap(), 5);
    }

    #[test]
    fn test_new_consumer_skips_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous.ipc");

        // An earlier session leaves its file behind with data still queued
        let old = ChannelBuilder::new()
            .with_path(&path)
            .with_capacity(16)
            .with_unlink_on_drop(false);
        {
            let (mut producer, barrier) = old.build_producer::<u64>().unwrap();
            let (_consumer, _) = old.build_consumer::<u64>().unwrap();
            for v in [111, 222, 333] {
                producer.add(v).unwrap();
            }
            barrier.begin_run(0).unwrap();
            barrier.mark_sent(0).unwrap();
        }
        assert!(path.exists());

        // The new consumer starts first and finds the leftover file
        let builder = ChannelBuilder::new()
            .with_path(&path)
            .with_capacity(16)
            .with_attach_policy(quick_attach())
            .with_ready_policy(
                RetryPolicy::sleep(Duration::from_millis(1)).with_deadline(Duration::from_secs(10)),
            );
        let consumer_builder = builder.clone();
        let consumer_handle = thread::spawn(move || {
            let (mut consumer, barrier) = consumer_builder.build_consumer::<u64>().unwrap();
            barrier.begin_run(0).unwrap();
            let mut received = Vec::new();
            while received.len() < 3 {
                match consumer.try_dequeue() {
                    Some(v) => received.push(v),
                    None => thread::yield_now(),
                }
            }
            barrier.acknowledge(0).unwrap();
            received
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer_handle.is_finished());

        let (mut producer, barrier) = builder.build_producer::<u64>().unwrap();
        barrier.begin_run(0).unwrap();
        for v in [7, 8, 9] {
            producer.add(v).unwrap();
        }
        barrier.mark_sent(0).unwrap();
        barrier.await_acknowledged(0).unwrap();

        assert_eq!(consumer_handle.join().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_file_mode_and_identity() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("private.ipc");
        let shared_path = dir.path().join("shared.ipc");

        let private = MappedFile::create_with_mode(&private_path, 128, false, 0o600).unwrap();
        let mode = fs::metadata(&private_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & 0o077, 0);
        assert_eq!(mode & 0o600, 0o600);

        // the default leaves group and other bits to the umask
        let _shared = MappedFile::create(&shared_path, 128, false).unwrap();
        let mode = fs::metadata(&shared_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & 0o600, 0o600);

        assert!(private.is_current().unwrap());
        fs::remove_file(&private_path).unwrap();
        assert!(!private.is_current().unwrap());
        fs::write(&private_path, [0u8; 128]).unwrap();
        assert!(!private.is_current().unwrap());
    }
}

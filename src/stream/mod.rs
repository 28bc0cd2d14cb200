//! Camera streams
//!
//! A [`CameraStream`] owns one decoder process and one background read loop.
//! It is the unit of failure and restart: when its decoder dies, only that
//! camera is affected.

pub mod camera;
mod reader;

pub use camera::{CameraStream, MAX_FRAME_ATTEMPTS};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::error::StreamError;
    use crate::process::{DecoderProcess, DecoderSpawner};
    use crate::registry::{RegistryConfig, RestartPolicy};
    use crate::test_support::PipeSpawner;

    fn test_config() -> RegistryConfig {
        RegistryConfig::with_base_url("rtsp://test:8554")
            .yield_interval(Duration::from_millis(1))
            .kill_grace_period(Duration::from_millis(100))
    }

    fn start(config: RegistryConfig) -> (Arc<CameraStream>, Arc<PipeSpawner>) {
        let spawner = Arc::new(PipeSpawner::new());
        let process = spawner.spawn("cam", "rtsp://test:8554/cam").unwrap();
        let stream = CameraStream::start(
            "cam",
            process,
            Arc::new(config),
            Arc::clone(&spawner) as Arc<dyn DecoderSpawner>,
        );
        (stream, spawner)
    }

    #[tokio::test]
    async fn test_publishes_newest_frame_of_read() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        writer
            .write_all(b"\xff\xd8AAA\xff\xd9\xff\xd8BBB\xff\xd9")
            .await
            .unwrap();

        let frame = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8BBB\xff\xd9");
        assert_eq!(frame.sequence, 1);

        let stats = stream.stats().await;
        assert_eq!(stats.frames_published, 1);
        assert_eq!(stats.frames_skipped, 1);
        assert_eq!(stats.bytes_read, 14);
        assert!(stats.has_frame);

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_scripted_decoder_output() {
        let output = tokio_test::io::Builder::new()
            .read(b"noise\xff\xd8AA")
            .wait(Duration::from_millis(5))
            .read(b"A\xff\xd9\xff\xd8partial")
            .build();
        let stream = CameraStream::start(
            "cam",
            DecoderProcess::from_reader(output),
            Arc::new(test_config()),
            Arc::new(PipeSpawner::new()),
        );

        // Output ends after the script, so the stream terminates on its own
        while !stream.is_terminated() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let frame = stream.latest_frame().await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8AAA\xff\xd9");

        let stats = stream.stats().await;
        assert!(!stats.running);
        assert_eq!(stats.bytes_read, 21);
        assert_eq!(stats.buffer_size, 9);
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        writer.write_all(b"junk\xff\xd8first-half").await.unwrap();
        writer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(stream.latest_frame().await.is_none());

        writer.write_all(b"-second-half\xff\xd9").await.unwrap();
        let frame = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8first-half-second-half\xff\xd9");

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_fresh_frame_consumed_once() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        writer.write_all(b"\xff\xd8ONE\xff\xd9").await.unwrap();
        let first = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.sequence, 1);

        // Signal was cleared; no new frame means timeout
        let result = stream.get_fresh_frame(Duration::from_millis(5)).await;
        assert!(matches!(result, Err(StreamError::FrameTimeout { attempts: 16, .. })));

        // Latest frame is still available without waiting
        assert_eq!(stream.latest_frame().await.unwrap().sequence, 1);

        writer.write_all(b"\xff\xd8TWO\xff\xd9").await.unwrap();
        let second = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&second.data[..], b"\xff\xd8TWO\xff\xd9");
        assert_eq!(second.sequence, 2);

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_frame_published_before_wait_is_fresh() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        writer.write_all(b"\xff\xd8EARLY\xff\xd9").await.unwrap();
        while stream.latest_frame().await.is_none() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let frame = stream.get_fresh_frame(Duration::from_millis(5)).await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8EARLY\xff\xd9");

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_served() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let stream = Arc::clone(&stream);
                tokio::spawn(async move { stream.get_fresh_frame(Duration::from_secs(1)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.write_all(b"\xff\xd8SHARED\xff\xd9").await.unwrap();

        for waiter in waiters {
            let frame = waiter.await.unwrap().unwrap();
            assert_eq!(frame.sequence, 1);
        }

        stream.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_timeout_retry_ceiling() {
        let (stream, _spawner) = start(test_config());
        let timeout = Duration::from_secs(1);

        let started = tokio::time::Instant::now();
        let result = stream.get_fresh_frame(timeout).await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(StreamError::FrameTimeout { attempts: MAX_FRAME_ATTEMPTS, .. })
        ));
        assert!(elapsed >= timeout * 15, "gave up too early: {elapsed:?}");
        assert!(elapsed <= timeout * 16 + Duration::from_millis(100), "waited too long: {elapsed:?}");
        assert!(stream.is_running());

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_output_closed_terminates_stream() {
        let (stream, spawner) = start(test_config());
        drop(spawner.take_writer(0));

        let result = stream.get_fresh_frame(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StreamError::StreamTerminated(ref id)) if id == "cam"));
        assert!(!stream.is_running());
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_stop_blocks_further_publication() {
        let (stream, spawner) = start(test_config());
        let mut writer = spawner.take_writer(0);

        stream.stop().await;
        assert!(!stream.is_running());
        assert!(stream.is_terminated());

        // Reader side is gone; the write may fail, nothing may be published
        let _ = writer.write_all(b"\xff\xd8LATE\xff\xd9").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(stream.latest_frame().await.is_none());
        assert_eq!(stream.stats().await.frames_published, 0);

        // Idempotent
        stream.stop().await;

        let result = stream.get_fresh_frame(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(StreamError::StreamTerminated(_))));
    }

    #[tokio::test]
    async fn test_stop_wakes_waiter() {
        let (stream, _spawner) = start(test_config());

        let waiter = {
            let stream = Arc::clone(&stream);
            tokio::spawn(async move { stream.get_fresh_frame(Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        stream.stop().await;

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on stop")
            .unwrap();
        assert!(matches!(result, Err(StreamError::StreamTerminated(_))));
    }

    #[tokio::test]
    async fn test_backoff_restart_respawns_decoder() {
        let config = test_config().restart_policy(RestartPolicy::Backoff {
            delay: Duration::from_millis(10),
        });
        let (stream, spawner) = start(config);

        drop(spawner.take_writer(0));
        while spawner.spawn_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(stream.is_running());
        assert!(!stream.is_terminated());

        let mut writer = spawner.take_writer(1);
        writer.write_all(b"\xff\xd8AGAIN\xff\xd9").await.unwrap();

        let frame = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8AGAIN\xff\xd9");
        assert_eq!(stream.stats().await.restarts, 1);
        assert_eq!(spawner.urls()[1], "rtsp://test:8554/cam");

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_backoff_retries_failed_spawns() {
        let config = test_config().restart_policy(RestartPolicy::Backoff {
            delay: Duration::from_millis(5),
        });
        let (stream, spawner) = start(config);

        spawner.set_failing(true);
        drop(spawner.take_writer(0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(stream.is_running());
        assert_eq!(spawner.spawn_count(), 1);

        spawner.set_failing(false);
        while spawner.spawn_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(stream.is_running());

        stream.stop().await;
        assert!(!stream.is_running());
    }

    #[tokio::test]
    async fn test_stall_timeout_terminates() {
        let config = test_config().stall_timeout(Duration::from_millis(30));
        let (stream, spawner) = start(config);
        let _writer = spawner.take_writer(0);

        let result = stream.get_fresh_frame(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(StreamError::StreamTerminated(_))));
    }

    #[tokio::test]
    async fn test_buffer_cap_respected() {
        let config = test_config().max_buffer_size(64);
        let (stream, spawner) = start(config);
        let mut writer = spawner.take_writer(0);

        // Oversized frame candidate is dropped, the following small one survives
        let mut oversized = b"\xff\xd8".to_vec();
        oversized.extend_from_slice(&[0x55; 200]);
        writer.write_all(&oversized).await.unwrap();
        writer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(stream.stats().await.buffer_size <= 64);

        writer.write_all(b"\xff\xd9\xff\xd8SMALL\xff\xd9").await.unwrap();
        let frame = stream.get_fresh_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&frame.data[..], b"\xff\xd8SMALL\xff\xd9");

        stream.stop().await;
    }

    #[tokio::test]
    async fn test_last_used_tracking() {
        let (stream, _spawner) = start(test_config());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(stream.idle_for() >= Duration::from_millis(30));

        stream.touch();
        assert!(stream.idle_for() < Duration::from_millis(30));

        stream.stop().await;
    }
}

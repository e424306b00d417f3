//! Tests for the manager state machine and lifecycle hooks

#[cfg(test)]
mod tests {
    use crate::listener::api::{
        ListenerConfig, ListenerManager, ManagerError, ManagerState,
    };
    use crate::listener::tests::utils::{
        fast_config, message, wait_until, Behavior, DriverCall, RecordingDriver,
        ScriptedListener,
    };
    use crate::queue::api::{InMemoryDriver, MessageBody};
    use serial_test::serial;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    #[serial]
    async fn test_hooks_run_once_around_workers() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![listener.registration("hooks", ListenerConfig::new("q").workers(3))],
        )
        .with_config(fast_config());
        assert_eq!(manager.state(), ManagerState::Created);

        manager.start().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Running);
        assert_eq!(listener.startups(), 1);
        assert_eq!(listener.shutdowns(), 0);
        assert!(wait_until(|| driver.polls() >= 3).await);

        manager.stop().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.startups(), 1);
        assert_eq!(listener.shutdowns(), 1);
        assert_eq!(manager.worker_count(), 0);
        assert_eq!(driver.calls(), vec![DriverCall::Connect, DriverCall::Disconnect]);
    }

    #[tokio::test]
    #[serial]
    async fn test_stop_is_idempotent() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("idem", ListenerConfig::new("q"))])
                .with_config(fast_config());

        manager.start().await.unwrap();
        manager.stop().await.unwrap();
        manager.stop().await.unwrap();

        assert_eq!(listener.shutdowns(), 1);
        assert_eq!(
            driver
                .calls()
                .iter()
                .filter(|call| **call == DriverCall::Disconnect)
                .count(),
            1
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_state_transitions_are_observable() {
        let driver = RecordingDriver::new();
        let mut manager = ListenerManager::new(driver, Vec::new()).with_config(fast_config());
        let mut states = manager.subscribe_state();

        manager.start().await.unwrap();
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ManagerState::Running);

        manager.stop().await.unwrap();
        assert_eq!(*states.borrow_and_update(), ManagerState::Stopped);
    }

    #[tokio::test]
    #[serial]
    async fn test_start_twice_is_invalid() {
        let driver = RecordingDriver::new();
        let mut manager = ListenerManager::new(driver, Vec::new()).with_config(fast_config());

        manager.start().await.unwrap();
        let err = manager.start().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::InvalidState {
                state: ManagerState::Running,
                ..
            }
        ));
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_connect_failure_is_fatal() {
        let driver = RecordingDriver::new();
        driver.fail_connect();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("c", ListenerConfig::new("q"))])
                .with_config(fast_config());

        let err = manager.start().await.unwrap_err();

        assert!(matches!(err, ManagerError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.startups(), 0);
        assert_eq!(manager.worker_count(), 0);
        assert_eq!(driver.calls(), vec![DriverCall::Connect]);
    }

    #[tokio::test]
    #[serial]
    async fn test_startup_hook_failure_cleans_up() {
        let driver = RecordingDriver::new();
        let healthy = ScriptedListener::new(Behavior::Succeed);
        let broken = ScriptedListener::failing_startup(Behavior::Succeed);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![
                healthy.registration("healthy", ListenerConfig::new("a")),
                broken.registration("broken", ListenerConfig::new("b")),
            ],
        )
        .with_config(fast_config());

        let err = manager.start().await.unwrap_err();

        match err {
            ManagerError::StartupHook { listener, cause } => {
                assert_eq!(listener, "broken");
                assert!(cause.contains("startup refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(healthy.shutdowns(), 1);
        assert_eq!(broken.shutdowns(), 0);
        assert_eq!(driver.calls(), vec![DriverCall::Connect, DriverCall::Disconnect]);
        assert_eq!(driver.polls(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_config_fails_before_connecting() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![listener.registration("bad", ListenerConfig::new("q").max_messages(500))],
        );

        let err = manager.start().await.unwrap_err();

        assert!(matches!(err, ManagerError::Listener { .. }));
        assert!(driver.calls().is_empty());
        assert_eq!(manager.state(), ManagerState::Stopped);
    }

    #[tokio::test]
    #[serial]
    async fn test_duplicate_listener_names_are_rejected() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![
                listener.registration("same", ListenerConfig::new("a")),
                listener.registration("same", ListenerConfig::new("b")),
            ],
        );

        assert!(matches!(
            manager.start().await,
            Err(ManagerError::Listener { .. })
        ));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_stuck_handler_does_not_block_stop() {
        let driver = RecordingDriver::new();
        driver.push_batch("q", vec![message("stuck", 1)]);
        let listener = ScriptedListener::new(Behavior::Sleep(Duration::from_secs(600)));
        let config = fast_config().shutdown_timeout(Duration::from_millis(100));
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("stuck", ListenerConfig::new("q"))])
                .with_config(config);

        manager.start().await.unwrap();
        assert!(wait_until(|| !listener.handled().is_empty()).await);

        tokio::time::timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang")
            .unwrap();

        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.shutdowns(), 1);
        assert!(driver.resolutions().is_empty());
        assert_eq!(driver.calls().last(), Some(&DriverCall::Disconnect));
    }

    #[tokio::test]
    #[serial]
    async fn test_undispatched_messages_are_released_on_stop() {
        let driver = RecordingDriver::new();
        driver.push_batch(
            "q",
            vec![message("m1", 1), message("m2", 1), message("m3", 1)],
        );
        let listener = ScriptedListener::new(Behavior::Sleep(Duration::from_millis(200)));
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![listener.registration("batch", ListenerConfig::new("q").max_messages(3))],
        )
        .with_config(fast_config());

        manager.start().await.unwrap();
        assert!(wait_until(|| !listener.handled().is_empty()).await);
        manager.stop().await.unwrap();

        assert_eq!(listener.handled(), vec!["m1".to_string()]);
        assert_eq!(
            driver.resolutions(),
            vec![
                DriverCall::Ack { id: "m1".into() },
                DriverCall::Reject {
                    id: "m2".into(),
                    requeue: true,
                    visibility_timeout: None,
                },
                DriverCall::Reject {
                    id: "m3".into(),
                    requeue: true,
                    visibility_timeout: None,
                },
            ]
        );
        assert_eq!(manager.stats()["batch"].requeued, 2);
    }

    #[tokio::test]
    #[serial]
    async fn test_run_until_shutdown_stops_on_trigger() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("run", ListenerConfig::new("q"))])
                .with_config(fast_config());
        let handle = manager.shutdown_handle();

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        });

        tokio::time::timeout(Duration::from_secs(5), manager.run_until_shutdown())
            .await
            .expect("manager must stop after trigger")
            .unwrap();
        trigger.await.unwrap();

        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.startups(), 1);
        assert_eq!(listener.shutdowns(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_stop_before_start() {
        let driver = RecordingDriver::new();
        let mut manager = ListenerManager::new(driver.clone(), Vec::new());

        manager.stop().await.unwrap();

        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_unbounded_shutdown_timeout_still_stops() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let config = fast_config().shutdown_timeout(Duration::MAX);
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("grace", ListenerConfig::new("q"))])
                .with_config(config);

        manager.start().await.unwrap();
        assert!(wait_until(|| driver.polls() >= 1).await);
        tokio::time::timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang")
            .unwrap();

        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.shutdowns(), 1);
        assert_eq!(driver.calls().last(), Some(&DriverCall::Disconnect));
    }

    #[tokio::test]
    #[serial]
    async fn test_unbounded_wait_time_keeps_workers_polling() {
        let driver = Arc::new(InMemoryDriver::new());
        let listener = ScriptedListener::new(Behavior::Succeed);
        let config = fast_config().wait_time(Duration::MAX);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![listener.registration("long", ListenerConfig::new("q").workers(2))],
        )
        .with_config(config);

        manager.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.worker_count(), 2);

        let id = driver.send("q", MessageBody::new()).unwrap();
        assert!(wait_until(|| listener.handled() == vec![id.clone()]).await);
        assert!(wait_until(|| driver.in_flight_count("q") == 0).await);
        assert_eq!(manager.worker_count(), 2);

        tokio::time::timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang")
            .unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    #[serial]
    async fn test_zero_wait_time_does_not_starve_runtime() {
        let driver = RecordingDriver::new();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let config = fast_config().wait_time(Duration::ZERO);
        let mut manager =
            ListenerManager::new(driver.clone(), vec![listener.registration("short", ListenerConfig::new("q"))])
                .with_config(config);

        manager.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        let idle_polls = driver.polls();
        assert!(idle_polls >= 1);
        assert!(idle_polls <= 10, "idle worker polled {} times", idle_polls);

        driver.push_batch("q", vec![message("short-poll", 1)]);
        assert!(wait_until(|| driver.resolutions().len() == 1).await);

        tokio::time::timeout(Duration::from_secs(5), manager.stop())
            .await
            .expect("stop must not hang")
            .unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(
            driver.resolutions(),
            vec![DriverCall::Ack { id: "short-poll".into() }]
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_worker_count_excludes_dead_workers() {
        let driver = RecordingDriver::new();
        driver.panic_on_poll();
        let listener = ScriptedListener::new(Behavior::Succeed);
        let mut manager = ListenerManager::new(
            driver.clone(),
            vec![listener.registration("doomed", ListenerConfig::new("q").workers(2))],
        )
        .with_config(fast_config());

        manager.start().await.unwrap();
        assert!(wait_until(|| driver.polls() >= 2).await);
        let mut live = manager.worker_count();
        for _ in 0..200 {
            if live == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            live = manager.worker_count();
        }
        assert_eq!(live, 0);
        assert_eq!(manager.state(), ManagerState::Running);

        manager.stop().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(listener.shutdowns(), 1);
    }
}

use std::{
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};

use crate::parallel::{
    command::CommandSpec,
    controller::CommandController,
    error::CommandError,
    event::Event,
    integration_tests::helper::{
        collector, controller, count, drain, marker_path, sh, step_clock, wait_for_state,
    },
    state::CommandState,
};

#[tokio::test]
async fn successful_command_reports_started_then_finished() {
    let (controller, mut rx) = controller(sh("exit 0"));
    assert_eq!(controller.state(), CommandState::NotStarted);

    assert!(controller.run().await);
    assert_eq!(controller.state(), CommandState::Finished);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    let started_time = match &events[0] {
        Event::Started { time, command } => {
            assert_eq!(command, &sh("exit 0"));
            *time
        }
        other => panic!("unexpected event: {:?}", other),
    };
    match &events[1] {
        Event::Finished {
            started_at,
            finished_at,
            error,
            ..
        } => {
            assert_eq!(*started_at, started_time);
            assert!(started_at <= finished_at);
            assert!(error.is_none());
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn failing_command_returns_false_with_exit_error() {
    let (controller, mut rx) = controller(sh("exit 3"));

    assert!(!controller.run().await);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "finished"), 1);
    match events[1].error() {
        Some(CommandError::Exit { command, status }) => {
            assert_eq!(command, "sh -c exit 3");
            assert!(status.contains('3'), "unexpected status: {}", status);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn missing_executable_reports_start_failure() {
    let (controller, mut rx) = controller(CommandSpec::new("/nonexistent/tcrm-parallel-missing"));

    assert!(!controller.run().await);
    assert_eq!(controller.state(), CommandState::Finished);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind(), "started");
    match events[1].error() {
        Some(CommandError::Start { command, .. }) => {
            assert_eq!(command, "/nonexistent/tcrm-parallel-missing");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // A second run must not retry the start.
    assert!(controller.run().await);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn run_twice_sequentially_emits_one_pair() {
    let (controller, mut rx) = controller(sh("exit 0"));

    assert!(controller.run().await);
    assert!(controller.run().await);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "finished"), 1);
}

#[tokio::test]
async fn run_twice_concurrently_emits_one_pair() {
    let (controller, mut rx) = controller(sh("sleep 0.1"));

    let (first, second) = tokio::join!(controller.run(), controller.run());
    assert!(first);
    assert!(second);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "finished"), 1);
}

#[tokio::test]
async fn kill_before_run_suppresses_start() {
    let marker = marker_path("kill-before-run");
    let _ = std::fs::remove_file(&marker);
    let (controller, mut rx) = controller(sh(&format!("touch {}", marker.display())));

    controller.kill();
    assert_eq!(controller.state(), CommandState::Finished);

    assert!(controller.run().await);
    assert!(drain(&mut rx).is_empty());
    assert!(!marker.exists(), "process was spawned after kill");
}

#[tokio::test]
async fn kill_running_command_reports_kill() {
    let (controller, mut rx) = controller(CommandSpec::new("sleep").args(["10"]));

    let running = Arc::clone(&controller);
    let handle = tokio::spawn(async move { running.run().await });
    wait_for_state(&controller, CommandState::Started).await;

    controller.kill();
    assert_eq!(controller.state(), CommandState::Finished);

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not return after kill")
        .expect("run task panicked");
    assert!(result);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match events[1].error() {
        Some(CommandError::Killed { command }) => assert_eq!(command, "sleep 10"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn repeated_kill_emits_single_finished_event() {
    let (controller, mut rx) = controller(CommandSpec::new("sleep").args(["10"]));

    let running = Arc::clone(&controller);
    let handle = tokio::spawn(async move { running.run().await });
    wait_for_state(&controller, CommandState::Started).await;

    let mut killers = Vec::new();
    for _ in 0..8 {
        let controller = Arc::clone(&controller);
        killers.push(tokio::spawn(async move { controller.kill() }));
    }
    for killer in killers {
        killer.await.expect("kill task panicked");
    }
    controller.kill();

    assert!(handle.await.expect("run task panicked"));

    let events = drain(&mut rx);
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "finished"), 1);
    assert!(events[1].error().is_some_and(CommandError::is_kill));
}

#[tokio::test]
async fn kill_after_finish_is_noop() {
    let (controller, mut rx) = controller(sh("exit 0"));

    assert!(controller.run().await);
    controller.kill();
    controller.kill();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events[1].error().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn kill_racing_completion_never_double_reports() {
    for _ in 0..25 {
        let (controller, mut rx) = controller(sh("exit 0"));

        let running = Arc::clone(&controller);
        let handle = tokio::spawn(async move { running.run().await });
        tokio::task::yield_now().await;
        controller.kill();

        assert!(handle.await.expect("run task panicked"));
        assert_eq!(controller.state(), CommandState::Finished);

        let events = drain(&mut rx);
        let started = count(&events, "started");
        let finished = count(&events, "finished");
        assert!(started <= 1);
        assert_eq!(started, finished, "unpaired events: {:?}", events);
    }
}

#[tokio::test]
async fn timestamps_come_from_injected_clock() {
    let (handler, mut rx) = collector();
    let controller = CommandController::new(sh("exit 0"), Arc::new(handler), Arc::new(step_clock()));

    assert!(controller.run().await);

    let events = drain(&mut rx);
    match &events[..] {
        [
            Event::Started { time, .. },
            Event::Finished {
                started_at,
                finished_at,
                ..
            },
        ] => {
            assert_eq!(*time, UNIX_EPOCH + Duration::from_secs(1));
            assert_eq!(*started_at, UNIX_EPOCH + Duration::from_secs(1));
            assert_eq!(*finished_at, UNIX_EPOCH + Duration::from_secs(2));
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[cfg(feature = "process-group")]
#[tokio::test]
async fn kill_reaches_process_group() {
    let (controller, mut rx) = controller(sh("sleep 10 & wait").process_group(true));

    let running = Arc::clone(&controller);
    let handle = tokio::spawn(async move { running.run().await });
    wait_for_state(&controller, CommandState::Started).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    controller.kill();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not return after group kill")
        .expect("run task panicked");
    assert!(result);
    assert_eq!(count(&drain(&mut rx), "finished"), 1);
}

#[tokio::test]
async fn dropped_run_reports_killed() {
    let (controller, mut rx) = controller(CommandSpec::new("sleep").args(["10"]));

    let cancelled = tokio::time::timeout(Duration::from_millis(200), controller.run()).await;
    assert!(cancelled.is_err());
    assert_eq!(controller.state(), CommandState::Finished);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "finished"), 1);
    assert!(matches!(
        events[1].error(),
        Some(CommandError::Killed { .. })
    ));

    // Nothing left to report once the controller is finished.
    controller.kill();
    assert!(controller.run().await);
    assert!(drain(&mut rx).is_empty());
}

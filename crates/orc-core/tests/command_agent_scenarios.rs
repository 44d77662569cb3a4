//! Scenarios 4 and 6: a per-task timeout tearing down a hung child, and the
//! concurrency cap never letting more than `max_concurrency` tasks run at
//! once.
use compact_str::CompactString;
use crossbeam_channel::unbounded;
use orc_core::command::{CommandAgent, CommandNotification, CommandRequest, ExecuteRequest};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

fn exec(keyword: &str, exe: &str, args: &[&str], timeout: Duration) -> ExecuteRequest {
    ExecuteRequest {
        keyword: CompactString::new(keyword),
        exe: CompactString::new(exe),
        args: args.iter().map(|a| CompactString::new(*a)).collect(),
        env: HashMap::new(),
        redirections: Vec::new(),
        optional: false,
        timeout,
    }
}

#[test]
fn per_task_timeout_aborts_a_hanging_child() {
    let (req_tx, req_rx) = unbounded();
    let (notif_tx, notif_rx) = unbounded();
    let agent = CommandAgent::new(req_rx, notif_tx, 2, orc_core::command::JobObjectLimits::default());
    let handle = thread::spawn(move || agent.run());

    req_tx
        .send(CommandRequest::Execute(exec(
            "hang",
            "sleep",
            &["5"],
            Duration::from_millis(200),
        )))
        .unwrap();

    let started = notif_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(started, CommandNotification::Started { .. }));

    // Give the child a moment past its 200ms timeout, then tick the agent.
    thread::sleep(Duration::from_millis(300));
    req_tx.send(CommandRequest::RefreshRunningList).unwrap();

    let mut exit_code = None;
    for _ in 0..4 {
        match notif_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            CommandNotification::Terminated { exit_code: code, .. } => {
                exit_code = Some(code);
                break;
            }
            CommandNotification::Stats { .. } => continue,
            other => panic!("unexpected notification before Terminated: {other:?}"),
        }
    }
    assert!(exit_code.is_some());
    assert_ne!(exit_code.unwrap(), 0);

    req_tx.send(CommandRequest::Done).unwrap();
    handle.join().unwrap();
}

#[test]
fn concurrency_cap_never_exceeds_two_simultaneous_tasks() {
    let (req_tx, req_rx) = unbounded();
    let (notif_tx, notif_rx) = unbounded();
    let agent = CommandAgent::new(req_rx, notif_tx, 2, orc_core::command::JobObjectLimits::default());
    let handle = thread::spawn(move || agent.run());

    for i in 0..5 {
        req_tx
            .send(CommandRequest::Execute(exec(
                &format!("t{i}"),
                "true",
                &[],
                Duration::from_secs(30),
            )))
            .unwrap();
    }

    let mut running = 0i32;
    let mut started_total = 0;
    let mut terminated_total = 0;
    let mut ticks = 0;

    while terminated_total < 5 {
        match notif_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            CommandNotification::Started { .. } => {
                running += 1;
                started_total += 1;
                assert!(running <= 2, "concurrency cap exceeded: {running} running");
            }
            CommandNotification::Terminated { .. } => {
                running -= 1;
                terminated_total += 1;
            }
            CommandNotification::Stats { .. } => {}
            other => panic!("unexpected notification: {other:?}"),
        }

        if terminated_total < 5 {
            assert!(ticks < 200, "gave up waiting for all five tasks to terminate");
            thread::sleep(Duration::from_millis(20));
            req_tx.send(CommandRequest::RefreshRunningList).unwrap();
            ticks += 1;
        }
    }

    assert_eq!(started_total, 5);
    assert_eq!(terminated_total, 5);

    req_tx.send(CommandRequest::Done).unwrap();
    handle.join().unwrap();
}

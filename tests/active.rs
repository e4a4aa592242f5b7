use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hsmkit::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Ev {
    Go,
    Tick,
}

#[test]
fn events_are_dispatched_without_an_execute_call() {
    let mut chart: Chart<&'static str, Ev> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();
    chart.add_state(State::new("s2")).unwrap();
    chart
        .add_transition(&"s1", Ev::Go, Transition::to("s2"))
        .unwrap();

    let mut machine = chart.active_machine();
    let (tx, rx) = crossbeam_channel::bounded(1);
    machine.subscribe_transition_completed(move |n| {
        let _ = tx.send(*n.target);
        Ok(())
    });
    machine.initialize(&"s1").unwrap();
    machine.send(Ev::Go, ()).unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok("s2"));
    assert_eq!(machine.current_state_id(), Some("s2"));
}

#[test]
fn send_wait_blocks_until_the_event_was_dispatched() {
    let hits = Arc::new(AtomicUsize::new(0));

    let mut chart: Chart<&'static str, Ev> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();
    let seen = hits.clone();
    chart
        .add_transition(
            &"s1",
            Ev::Tick,
            Transition::internal().action(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    let mut machine = chart.active_machine();
    machine.initialize(&"s1").unwrap();
    machine.send_wait(Ev::Tick, ()).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn events_are_processed_in_send_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut chart: Chart<&'static str, Ev, u32> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();
    let sink = order.clone();
    chart
        .add_transition(
            &"s1",
            Ev::Tick,
            Transition::internal().action(move |_, args| {
                sink.lock().unwrap().push(*args);
                Ok(())
            }),
        )
        .unwrap();

    let mut machine = chart.active_machine();
    machine.initialize(&"s1").unwrap();
    for n in 1..=5 {
        machine.send(Ev::Tick, n).unwrap();
    }
    machine.send_wait(Ev::Tick, 6).unwrap();

    assert_eq!(*order.lock().unwrap(), [1, 2, 3, 4, 5, 6]);
}

#[test]
fn callbacks_run_on_the_worker_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));

    let mut chart: Chart<&'static str, Ev> = Chart::new();
    let seen = threads.clone();
    chart
        .add_state(State::new("s1").on_entry(move |_| {
            seen.lock().unwrap().push(thread::current().id());
            Ok(())
        }))
        .unwrap();
    let seen = threads.clone();
    chart
        .add_transition(
            &"s1",
            Ev::Tick,
            Transition::internal().action(move |_, _| {
                seen.lock().unwrap().push(thread::current().id());
                Ok(())
            }),
        )
        .unwrap();

    let mut machine = chart.active_machine();
    machine.initialize(&"s1").unwrap();
    machine.send_wait(Ev::Tick, ()).unwrap();

    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0], threads[1]);
    assert_ne!(threads[0], thread::current().id());
}

#[test]
fn queued_events_are_drained_on_drop() {
    let hits = Arc::new(AtomicUsize::new(0));

    let mut chart: Chart<&'static str, Ev> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();
    let seen = hits.clone();
    chart
        .add_transition(
            &"s1",
            Ev::Tick,
            Transition::internal().action(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    let mut machine = chart.active_machine();
    machine.initialize(&"s1").unwrap();
    for _ in 0..100 {
        machine.send(Ev::Tick, ()).unwrap();
    }
    drop(machine);

    assert_eq!(hits.load(Ordering::SeqCst), 100);
}

#[test]
fn stopped_machine_rejects_events() {
    let mut chart: Chart<&'static str, Ev> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();

    let mut machine = chart.active_machine();
    assert_eq!(machine.send(Ev::Go, ()), Err(SendError::NotInitialized));

    machine.initialize(&"s1").unwrap();
    machine.stop();
    assert_eq!(machine.send(Ev::Go, ()), Err(SendError::Stopped));
    assert_eq!(machine.send_wait(Ev::Go, ()), Err(SendError::Stopped));
}

#[test]
fn reentrant_sends_complete_before_shutdown() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut chart: Chart<&'static str, Ev> = Chart::new();
    chart.add_state(State::new("s1")).unwrap();
    chart.add_state(State::new("s2")).unwrap();
    let sink = order.clone();
    chart
        .add_transition(
            &"s1",
            Ev::Go,
            Transition::to("s2").action(move |sender, _| {
                sink.lock().unwrap().push("action");
                sender.send(Ev::Tick, ())?;
                Ok(())
            }),
        )
        .unwrap();
    let sink = order.clone();
    chart
        .add_transition(
            &"s2",
            Ev::Tick,
            Transition::internal().action(move |_, _| {
                sink.lock().unwrap().push("follow-up");
                Ok(())
            }),
        )
        .unwrap();

    let mut machine = chart.active_machine();
    machine.initialize(&"s1").unwrap();
    machine.send_wait(Ev::Go, ()).unwrap();
    machine.stop();

    assert_eq!(*order.lock().unwrap(), ["action", "follow-up"]);
}

//! Scopes across threads and tokio tasks: adoption by other flows and
//! lossless concurrent merging.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod harness;

use std::sync::Arc;
use std::thread;

use harness::Fixture;
use scopewatch_core::flow;
use scopewatch_core::{FlowId, FlowRegistry, MemorySink, MonotonicClock, ScopeHandle, Tracer};

#[test]
fn siblings_opened_on_other_threads_add_up() {
    let fx = Fixture::new();
    let root = fx.tracer.create("root");

    let open_on_thread = |handle: ScopeHandle| thread::spawn(move || handle.scope("io")).join().unwrap();
    let a = open_on_thread(root.handle());
    fx.clock.advance_ms(4);
    let b = open_on_thread(root.handle());

    assert_eq!(a.depth(), 2);
    assert_eq!(b.depth(), 2);
    assert_ne!(a.flow(), b.flow());

    // close in reverse order of creation, on yet another flow
    fx.clock.advance_ms(6);
    b.close();
    fx.clock.advance_ms(1);
    a.close();
    root.close();

    assert_eq!(a.milliseconds(), 11);
    assert_eq!(b.milliseconds(), 6);
    let snap = root.collect();
    assert_eq!(snap.total_for("root_io"), Some(17));
    let io_groups = snap.grouped().into_iter().filter(|g| g.label == "root_io").count();
    assert_eq!(io_groups, 1);
}

#[test]
fn work_on_a_fresh_thread_nests_under_the_launching_scope() {
    let fx = Fixture::new();
    let root = fx.tracer.create("root");
    let launch = root.scope("launch");
    let handle = launch.handle();
    let clock = fx.clock.clone();

    let (label, depth, flow) = thread::spawn(move || {
        let work = handle.scope("work");
        let inner = work.scope("inner");
        clock.advance_ms(9);
        let seen = (inner.label().to_owned(), inner.depth(), inner.flow());
        drop(inner);
        drop(work);
        seen
    })
    .join()
    .unwrap();

    assert_eq!(label, "root_launch_work_inner");
    assert_eq!(depth, 4);
    assert_ne!(flow, FlowId::current());

    launch.close();
    root.close();
    let snap = root.collect();
    assert_eq!(snap.total_for("root_launch_work_inner"), Some(9));
    assert_eq!(snap.total_for("root_launch_work"), Some(9));
    // the spawned flow released its stack when it emptied
    assert!(fx.tracer.registry().is_empty());
}

#[test]
fn many_threads_merge_into_one_parent_without_loss() {
    let fx = Fixture::new();
    let root = fx.tracer.create("root");
    let parent = root.scope("fanout");
    let handle = parent.handle();

    let per_thread: Vec<u64> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let clock = fx.clock.clone();
                s.spawn(move || {
                    let mut total = 0;
                    for _ in 0..50 {
                        let step = handle.scope("step");
                        clock.advance_ms(1);
                        step.close();
                        total += step.milliseconds();
                    }
                    total
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    parent.close();
    let snap = parent.collect();
    let expected: u64 = per_thread.iter().sum();
    assert_eq!(snap.total_for("root_fanout_step"), Some(expected));
    assert!(expected >= 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_flows_nest_under_the_request_scope() {
    let sink = Arc::new(MemorySink::new());
    let tracer = Tracer::builder()
        .clock(Arc::new(MonotonicClock::new()))
        .sink(sink)
        .registry(Arc::new(FlowRegistry::new()))
        .build()
        .unwrap();

    let request = flow::in_new_flow(async move {
        let root = tracer.create("req");
        let mut tasks = Vec::new();
        for i in 0..4 {
            let handle = root.handle();
            tasks.push(flow::spawn(async move {
                let job = handle.scope("job");
                let sub = job.scope(&format!("part{i}"));
                tokio::task::yield_now().await;
                let label = sub.label().to_owned();
                drop(sub);
                drop(job);
                label
            }));
        }
        let mut labels = Vec::new();
        for t in tasks {
            labels.push(t.await.unwrap());
        }
        root.close();
        (root.collect(), labels)
    });

    let (snap, mut labels) = request.await;
    labels.sort();
    assert_eq!(
        labels,
        vec!["req_job_part0", "req_job_part1", "req_job_part2", "req_job_part3"]
    );
    assert!(snap.contains_label("req_job"));
    assert_eq!(
        snap.grouped().iter().filter(|g| g.label == "req_job").count(),
        1
    );
    for i in 0..4 {
        assert!(snap.contains_label(&format!("req_job_part{i}")));
    }
}

#[tokio::test]
async fn concurrent_requests_on_one_thread_stay_apart() {
    let fx = Fixture::new();
    let tracer = fx.tracer.clone();

    let run = |name: &'static str| {
        let tracer = tracer.clone();
        flow::in_new_flow(async move {
            let root = tracer.create(name);
            let child = root.scope("db");
            tokio::task::yield_now().await;
            let label = child.label().to_owned();
            drop(child);
            label
        })
    };

    let (a, b) = tokio::join!(run("a"), run("b"));
    assert_eq!(a, "a_db");
    assert_eq!(b, "b_db");
}

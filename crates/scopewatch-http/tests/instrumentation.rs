#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scopewatch_core::{FlowRegistry, Level, ManualClock, MemorySink, ScopeHandle, Tracer};
use scopewatch_http::config::{self, InstrumentationConfig};
use scopewatch_http::{Instrumentation, RequestHook};

struct Harness {
    inst: Instrumentation,
    clock: ManualClock,
    sink: Arc<MemorySink>,
}

fn harness(yaml: &str) -> Harness {
    let cfg: InstrumentationConfig = config::load_from_str(yaml)
        .expect("config must parse")
        .instrumentation;
    let clock = ManualClock::new();
    let sink = Arc::new(MemorySink::new());
    let tracer = Tracer::builder()
        .options(cfg.scope.clone())
        .clock(Arc::new(clock.clone()))
        .sink(sink.clone())
        .registry(Arc::new(FlowRegistry::new()))
        .build()
        .expect("tracer must build");
    Harness {
        inst: Instrumentation::with_tracer(cfg, tracer),
        clock,
        sink,
    }
}

/// Opens `db` under the request root and spends 5 + 20 ms.
async fn handle(clock: ManualClock, scope: Option<ScopeHandle>) -> ScopeHandle {
    let root = scope.expect("request must be instrumented");
    clock.advance_ms(5);
    {
        let _db = root.scope("db");
        clock.advance_ms(20);
    }
    root
}

#[tokio::test]
async fn skipped_prefix_is_case_insensitive() {
    let h = harness(
        r#"
version: 1
instrumentation:
  ignore_path_prefix: "/health"
"#,
    );

    let skipped = h.inst.run("/HEALTH/live?x=1", |s| async move { s.is_none() }).await;
    assert!(skipped);

    let instrumented = h.inst.run("/v1/orders", |s| async move { s.is_some() }).await;
    assert!(instrumented);

    assert!(h.inst.skips("/healthz"));
    assert!(!h.inst.skips("/v1/health"));
    assert!(!h.inst.skips("/he"));
}

#[tokio::test]
async fn root_closed_and_aggregated_after_run() {
    let h = harness("version: 1\n");

    let root = h
        .inst
        .run("/v1/orders/7", |s| handle(h.clock.clone(), s))
        .await;

    assert_eq!(root.label(), "request");
    assert!(root.is_closed());

    let snap = root.collect();
    assert_eq!(snap.total_for("request_db"), Some(20));
    assert_eq!(snap.total_for("request"), Some(25));
    assert!(h.inst.tracer().registry().is_empty());
}

#[tokio::test]
async fn concurrent_requests_do_not_mix() {
    let h = harness("version: 1\n");

    let a = h.inst.run("/a", |s| async move {
        let root = s.unwrap();
        let _x = root.scope("a_only");
        tokio::task::yield_now().await;
        root
    });
    let b = h.inst.run("/b", |s| async move {
        let root = s.unwrap();
        let _x = root.scope("b_only");
        tokio::task::yield_now().await;
        root
    });
    let (a, b) = futures_util::future::join(a, b).await;

    assert!(!a.same_scope(&b));
    assert!(a.collect().contains_label("request_a_only"));
    assert!(!a.collect().contains_label("request_b_only"));
    assert!(b.collect().contains_label("request_b_only"));
    assert!(!b.collect().contains_label("request_a_only"));
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

struct Phase {
    name: &'static str,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl RequestHook for Phase {
    async fn on_request(&self, scope: &ScopeHandle) {
        self.recorder.seen.lock().unwrap().push(format!(
            "{}:{}:{}",
            self.name,
            scope.label(),
            scope.is_closed()
        ));
    }
}

#[tokio::test]
async fn hooks_run_around_work() {
    let h = harness("version: 1\n");
    let recorder = Arc::new(Recorder::default());
    let inst = h
        .inst
        .pre_request(Arc::new(Phase {
            name: "pre",
            recorder: recorder.clone(),
        }))
        .post_request(Arc::new(Phase {
            name: "post",
            recorder: recorder.clone(),
        }));

    let rec = recorder.clone();
    inst.run("/v1/x", |_| async move {
        rec.seen.lock().unwrap().push("work".into());
    })
    .await;

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "pre:request:false".to_string(),
            "work".to_string(),
            "post:request:true".to_string(),
        ]
    );
}

#[tokio::test]
async fn hooks_skipped_for_ignored_paths() {
    let h = harness(
        r#"
version: 1
instrumentation:
  ignore_path_prefix: "/health"
"#,
    );
    let recorder = Arc::new(Recorder::default());
    let inst = h.inst.pre_request(Arc::new(Phase {
        name: "pre",
        recorder: recorder.clone(),
    }));

    inst.run("/health", |_| async {}).await;
    assert!(recorder.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn table_report_logged_at_collect_level() {
    let h = harness(
        r#"
version: 1
instrumentation:
  collect_level: "info"
  scope:
    logger_category: "svc.timing"
"#,
    );

    h.inst
        .run("/v1/orders/7", |s| handle(h.clock.clone(), s))
        .await;

    let info = h.sink.at(Level::INFO);
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].category, "svc.timing");
    assert!(info[0].message.starts_with("| Metric"));
    assert!(info[0].message.contains("| request "));
    assert!(info[0].message.contains(".request_db"));
}

#[tokio::test]
async fn json_report_logged_at_collect_level() {
    let h = harness(
        r#"
version: 1
instrumentation:
  collect_level: "warn"
  report_format: json
"#,
    );

    h.inst
        .run("/v1/orders/7", |s| handle(h.clock.clone(), s))
        .await;

    let warn = h.sink.at(Level::WARN);
    assert_eq!(warn.len(), 1);
    let rows: serde_json::Value = serde_json::from_str(&warn[0].message).expect("valid json");
    let rows = rows.as_array().expect("array of rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["label"], "request");
    assert_eq!(rows[0]["milliseconds"], 25);
    assert_eq!(rows[1]["label"], "request_db");
    assert_eq!(rows[1]["milliseconds"], 20);
}

#[tokio::test]
async fn no_report_without_collect_level() {
    let h = harness("version: 1\n");

    h.inst
        .run("/v1/orders/7", |s| handle(h.clock.clone(), s))
        .await;

    assert!(h.sink.at(Level::INFO).is_empty());
    assert!(h.sink.at(Level::WARN).is_empty());
}

#[tokio::test]
async fn root_closes_when_the_request_is_cancelled() {
    let h = harness("version: 1\n");
    let leaked: Arc<Mutex<Option<ScopeHandle>>> = Arc::default();

    let slot = Arc::clone(&leaked);
    let run = h.inst.run("/v1/slow", |s| async move {
        let root = s.unwrap();
        let _wait = root.scope("wait");
        *slot.lock().unwrap() = Some(root);
        std::future::pending::<()>().await
    });
    let out = tokio::time::timeout(Duration::from_millis(20), run).await;
    assert!(out.is_err(), "work never finishes");

    let root = leaked.lock().unwrap().take().expect("work started");
    assert!(root.is_closed());
    assert!(root.collect().contains_label("request_wait"));
    assert!(h.inst.tracer().registry().is_empty());
}

#[tokio::test]
async fn root_closes_when_the_work_panics() {
    let h = harness("version: 1\n");
    let inst = Arc::new(h.inst);
    let leaked: Arc<Mutex<Option<ScopeHandle>>> = Arc::default();

    let task = tokio::spawn({
        let inst = Arc::clone(&inst);
        let slot = Arc::clone(&leaked);
        async move {
            inst.run("/v1/boom", |s| async move {
                *slot.lock().unwrap() = s;
                panic!("handler failed");
            })
            .await
        }
    });
    let err = task.await.expect_err("task must panic");
    assert!(err.is_panic());

    let root = leaked.lock().unwrap().take().expect("work started");
    assert!(root.is_closed());
    assert!(inst.tracer().registry().is_empty());
}

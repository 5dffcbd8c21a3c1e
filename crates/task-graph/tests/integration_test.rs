//! Integration tests for the task graph executor.
//!
//! These run realistic multi-level graphs and check the run-level
//! properties: exactly one entry per step on success, and a single error
//! with no partial work past the failure point otherwise.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use task_graph::{GraphDefinitionError, GraphError, TaskGraph, TaskGraphExecutor};

/// Diamond: source -> (double, square) -> combine
fn diamond(input: i64) -> TaskGraph {
    TaskGraph::new()
        .add_step("source", &[], move |_| async move { Ok(input) })
        .add_step("double", &["source"], |deps| async move {
            Ok(deps.get::<i64>("source")? * 2)
        })
        .add_step("square", &["source"], |deps| async move {
            let v = *deps.get::<i64>("source")?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(v * v)
        })
        .add_step("combine", &["double", "square"], |deps| async move {
            Ok(format!(
                "{}+{}",
                deps.get::<i64>("double")?,
                deps.get::<i64>("square")?
            ))
        })
}

#[tokio::test]
async fn test_diamond_graph_produces_every_result() {
    let executor = TaskGraphExecutor::new("diamond");
    let mut results = executor.run(diamond(4)).await.unwrap();

    assert_eq!(results.len(), 4);
    for step in ["source", "double", "square", "combine"] {
        assert!(results.contains(step), "missing result for {step}");
    }
    assert_eq!(results.take::<String>("combine").unwrap(), "8+16");
}

#[tokio::test]
async fn test_executor_is_reusable_across_runs() {
    let executor = TaskGraphExecutor::new("reuse");

    let (first, second) = tokio::join!(executor.run(diamond(1)), executor.run(diamond(3)));

    assert_eq!(first.unwrap().take::<String>("combine").unwrap(), "2+1");
    assert_eq!(second.unwrap().take::<String>("combine").unwrap(), "6+9");
}

#[tokio::test]
async fn test_wide_fan_out_and_fan_in() {
    let width = 32;
    let mut graph = TaskGraph::new();
    let mut names = Vec::new();
    for i in 0..width {
        let name = format!("leaf-{i}");
        graph = graph.add_step(name.clone(), &[], move |_| async move { Ok(i as u64) });
        names.push(name);
    }
    let deps: Vec<&str> = names.iter().map(String::as_str).collect();
    let owned = names.clone();
    graph = graph.add_step("total", &deps, move |results| async move {
        let mut sum = 0;
        for name in &owned {
            sum += *results.get::<u64>(name)?;
        }
        Ok(sum)
    });

    let mut results = TaskGraphExecutor::default().run(graph).await.unwrap();

    assert_eq!(results.len(), width + 1);
    assert_eq!(results.take::<u64>("total").unwrap(), (0..width as u64).sum::<u64>());
}

#[tokio::test]
async fn test_failure_mid_chain_stops_the_chain() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let track = |log: &Arc<Mutex<Vec<&'static str>>>, id: &'static str| {
        log.lock().unwrap().push(id);
    };
    let (s1, s2, s3) = (started.clone(), started.clone(), started.clone());

    let graph = TaskGraph::new()
        .add_step("one", &[], move |_| async move {
            track(&s1, "one");
            Ok(())
        })
        .add_step("two", &["one"], move |_| async move {
            track(&s2, "two");
            Err::<(), _>(anyhow!("two cannot continue"))
        })
        .add_step("three", &["two"], move |_| async move {
            track(&s3, "three");
            Ok(())
        });

    let error = TaskGraphExecutor::default().run(graph).await.unwrap_err();

    assert!(matches!(error, GraphError::Step { ref step, .. } if step == "two"));
    assert_eq!(*started.lock().unwrap(), vec!["one", "two"]);
}

#[tokio::test]
async fn test_unknown_dependency_rejected_before_running() {
    let ran = Arc::new(AtomicUsize::new(0));
    let flag = ran.clone();

    let graph = TaskGraph::new()
        .add_step("real", &[], move |_| async move {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .add_step("orphan", &["imaginary"], |_| async { Ok(()) });

    let error = TaskGraphExecutor::default().run(graph).await.unwrap_err();

    assert!(matches!(
        error,
        GraphError::Definition(GraphDefinitionError::UnknownDependency { .. })
    ));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_failures_on_multi_thread_runtime() {
    for _ in 0..20 {
        let mut graph = TaskGraph::new();
        for i in 0..8 {
            graph = graph.add_step(format!("fail-{i}"), &[], move |_| async move {
                Err::<(), _>(anyhow!("failure {i}"))
            });
        }

        let error = TaskGraphExecutor::default().run(graph).await.unwrap_err();
        assert!(error.step().is_some_and(|s| s.starts_with("fail-")));
    }
}

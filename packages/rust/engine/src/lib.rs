//! Dependency-ordered, cached pipeline engine.
//!
//! A [`Stage`] is a named unit of work with zero or more upstream stage
//! dependencies. [`Engine::execute`] runs a stage depth-first: dependencies
//! first (each at most once per invocation, even when shared by several
//! downstream stages), then the stage itself — unless a persisted record for
//! `(document, stage)` already exists in the [`StageStore`], in which case
//! the record is loaded and returned without recomputation.
//!
//! Failure semantics: a stage error is not caught; it aborts the whole
//! invocation. Because the store writes atomically, a failed stage leaves no
//! record behind and re-executes on the next run.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};

use bookdex_shared::{BookdexError, DocId, Result};
use bookdex_store::StageStore;

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// A named, cacheable unit of pipeline work.
///
/// Stage names key the persisted records and must be unique within a
/// pipeline. The dependency graph is declared at construction time and must
/// be a DAG; the engine asserts acyclicity before the first execution.
pub trait Stage {
    /// Stable stage name; used as the cache key component and in logs.
    fn name(&self) -> &'static str;

    /// Upstream stages, executed (or loaded from cache) before [`Stage::run`].
    fn dependencies(&self) -> Vec<&dyn Stage> {
        Vec::new()
    }

    /// Produce this stage's output record from its dependencies' outputs.
    fn run(&self, doc: &DocId, deps: &DepOutputs) -> Result<Value>;
}

/// Outputs of a stage's upstream dependencies, keyed by stage name.
#[derive(Debug, Default)]
pub struct DepOutputs {
    outputs: HashMap<&'static str, Value>,
}

impl DepOutputs {
    /// Raw JSON record of the named dependency.
    pub fn raw(&self, name: &str) -> Result<&Value> {
        self.outputs.get(name).ok_or_else(|| {
            BookdexError::stage(name, "dependency output not available")
        })
    }

    /// Decode the named dependency's record into a typed value.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.raw(name)?.clone();
        serde_json::from_value(value).map_err(|e| {
            BookdexError::stage(name, format!("dependency output malformed: {e}"))
        })
    }
}

/// Serialize a stage output into its persisted record form.
pub fn encode<T: Serialize>(output: &T) -> Result<Value> {
    serde_json::to_value(output)
        .map_err(|e| BookdexError::Store(format!("stage output serialization: {e}")))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Executes stage graphs against a [`StageStore`].
#[derive(Debug)]
pub struct Engine {
    store: StageStore,
}

impl Engine {
    pub fn new(store: StageStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Execute `stage` (and, depth-first, everything upstream of it) for one
    /// document, returning the stage's output record.
    #[instrument(skip_all, fields(doc = %doc, stage = stage.name()))]
    pub fn execute(&self, doc: &DocId, stage: &dyn Stage) -> Result<Value> {
        assert_acyclic(stage)?;
        let mut memo: HashMap<&'static str, Value> = HashMap::new();
        self.execute_inner(doc, stage, &mut memo)
    }

    fn execute_inner(
        &self,
        doc: &DocId,
        stage: &dyn Stage,
        memo: &mut HashMap<&'static str, Value>,
    ) -> Result<Value> {
        // Shared dependency already produced during this invocation.
        if let Some(value) = memo.get(stage.name()) {
            return Ok(value.clone());
        }

        // Dependencies first, depth-first.
        let mut outputs = HashMap::new();
        for dep in stage.dependencies() {
            let value = self.execute_inner(doc, dep, memo)?;
            outputs.insert(dep.name(), value);
        }

        // Cache check: a persisted record short-circuits `run`.
        if let Some(cached) = self.store.load(doc, stage.name())? {
            debug!(stage = stage.name(), "cached record found, skipping run");
            memo.insert(stage.name(), cached.clone());
            return Ok(cached);
        }

        info!(stage = stage.name(), "executing stage");
        let value = stage.run(doc, &DepOutputs { outputs })?;
        self.store.save(doc, stage.name(), &value)?;
        memo.insert(stage.name(), value.clone());
        Ok(value)
    }
}

/// Walk the declared dependency graph and reject cycles.
fn assert_acyclic(root: &dyn Stage) -> Result<()> {
    fn visit(
        stage: &dyn Stage,
        path: &mut Vec<&'static str>,
        done: &mut HashSet<&'static str>,
    ) -> Result<()> {
        if path.contains(&stage.name()) {
            return Err(BookdexError::stage(
                stage.name(),
                format!("dependency cycle through: {}", path.join(" -> ")),
            ));
        }
        if done.contains(stage.name()) {
            return Ok(());
        }

        path.push(stage.name());
        for dep in stage.dependencies() {
            visit(dep, path, done)?;
        }
        path.pop();
        done.insert(stage.name());
        Ok(())
    }

    visit(root, &mut Vec::new(), &mut HashSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    /// Test stage that counts its own runs and echoes dependency names.
    struct Counting {
        name: &'static str,
        deps: Vec<Arc<dyn Stage>>,
        runs: Arc<AtomicUsize>,
    }

    impl Counting {
        fn new(name: &'static str, deps: Vec<Arc<dyn Stage>>) -> (Arc<Self>, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            let stage = Arc::new(Self {
                name,
                deps,
                runs: runs.clone(),
            });
            (stage, runs)
        }
    }

    impl Stage for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dependencies(&self) -> Vec<&dyn Stage> {
            self.deps.iter().map(|d| d.as_ref()).collect()
        }

        fn run(&self, _doc: &DocId, deps: &DepOutputs) -> Result<Value> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let mut upstream: Vec<&str> = self
                .deps
                .iter()
                .map(|d| {
                    deps.raw(d.name()).expect("dependency output present");
                    d.name()
                })
                .collect();
            upstream.sort_unstable();
            Ok(json!({"stage": self.name, "upstream": upstream}))
        }
    }

    struct Failing;

    impl Stage for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run(&self, _doc: &DocId, _deps: &DepOutputs) -> Result<Value> {
            Err(BookdexError::validation("boom"))
        }
    }

    /// A stage that (illegally) depends on itself.
    struct SelfCycle;

    impl Stage for SelfCycle {
        fn name(&self) -> &'static str {
            "ouroboros"
        }

        fn dependencies(&self) -> Vec<&dyn Stage> {
            vec![self]
        }

        fn run(&self, _doc: &DocId, _deps: &DepOutputs) -> Result<Value> {
            Ok(json!({}))
        }
    }

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StageStore::open(dir.path().join("index")).expect("open store");
        (dir, Engine::new(store))
    }

    #[test]
    fn shared_dependency_runs_once_per_invocation() {
        let (_dir, engine) = engine();
        let doc = DocId::from_name("diamond");

        // a <- b, a <- c, {b, c} <- d
        let (a, a_runs) = Counting::new("a", vec![]);
        let (b, _) = Counting::new("b", vec![a.clone()]);
        let (c, _) = Counting::new("c", vec![a.clone()]);
        let (d, d_runs) = Counting::new("d", vec![b, c]);

        let out = engine.execute(&doc, d.as_ref()).expect("execute");
        assert_eq!(out["upstream"], json!(["b", "c"]));
        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(d_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_run_is_served_from_cache() {
        let (_dir, engine) = engine();
        let doc = DocId::from_name("cached");

        let (a, a_runs) = Counting::new("a", vec![]);
        let (b, b_runs) = Counting::new("b", vec![a.clone()]);

        let first = engine.execute(&doc, b.as_ref()).expect("first run");
        let second = engine.execute(&doc, b.as_ref()).expect("second run");

        assert_eq!(first, second);
        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corrupt_record_forces_reexecution() {
        let (_dir, engine) = engine();
        let doc = DocId::from_name("corrupt");

        let (a, a_runs) = Counting::new("a", vec![]);
        engine.execute(&doc, a.as_ref()).expect("first run");

        let path = engine.store().doc_dir(&doc).join("a.json");
        std::fs::write(&path, "garbage").unwrap();

        engine.execute(&doc, a.as_ref()).expect("second run");
        assert_eq!(a_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failure_aborts_and_writes_nothing() {
        let (_dir, engine) = engine();
        let doc = DocId::from_name("fails");

        let err = engine.execute(&doc, &Failing).expect_err("must fail");
        assert!(err.to_string().contains("boom"));
        assert!(!engine.store().contains(&doc, "failing"));
    }

    #[test]
    fn self_cycle_is_rejected_before_execution() {
        let (_dir, engine) = engine();
        let doc = DocId::from_name("cycle");

        let err = engine.execute(&doc, &SelfCycle).expect_err("must reject");
        assert!(matches!(err, BookdexError::Stage { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn dep_outputs_decode_typed() {
        #[derive(serde::Deserialize)]
        struct Echo {
            stage: String,
        }

        let (_dir, engine) = engine();
        let doc = DocId::from_name("typed");

        let (a, _) = Counting::new("a", vec![]);
        let (b, _) = Counting::new("b", vec![a.clone()]);
        engine.execute(&doc, b.as_ref()).expect("execute");

        let record = engine.store().load(&doc, "a").expect("load").expect("present");
        let deps = DepOutputs {
            outputs: HashMap::from([("a", record)]),
        };
        let echo: Echo = deps.decode("a").expect("decode");
        assert_eq!(echo.stage, "a");
    }
}

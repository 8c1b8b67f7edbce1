//! Scenario registry.
//!
//! The original discovers test cases by import side effects: importing a
//! test module runs its `@hermes_testcase` decorators, which register the
//! function into a module-level dictionary. That relies on Python's import
//! system; the idiomatic Rust replacement is an explicit, compile-time-known
//! list built by calling `register` for each scenario, typically from a
//! single `register_all(&mut registry)` entry point that the scenario crate
//! exports and the harness binary calls once at startup.

use std::collections::BTreeMap;

use crate::Environment;

pub type ScenarioError = Box<dyn std::error::Error + Send + Sync>;
pub type ScenarioFn = fn(&Environment) -> Result<(), ScenarioError>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TestResult {
    Pass,
    Fail,
    /// The scenario invoked the callback channel but no callback was
    /// registered to answer it -- §4.E: "the scenario is skipped, not
    /// failed."
    Skip,
}

/// Everything `available_tests()` reports about a registered scenario.
/// `tag` is a short, not-guaranteed-unique identifier derived the same way
/// the original derives it: `"H" + first 4 hex digits of md5(name)`.
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub name: String,
    pub module: String,
    pub description: String,
    pub tag: String,
}

impl TestInfo {
    fn new(name: &str, module: &str, description: &str) -> Self {
        let digest = md5::compute(name.as_bytes());
        let tag = format!("H{:02x}{:02x}", digest[0], digest[1]);
        TestInfo {
            name: name.to_string(),
            module: module.to_string(),
            description: description.to_string(),
            tag,
        }
    }
}

struct Entry {
    info: TestInfo,
    func: ScenarioFn,
}

/// Holds every scenario an embedder has chosen to make runnable. Unlike the
/// original's process-wide dictionary, this is an ordinary value: nothing
/// stops an embedder from building two independent registries (e.g. one per
/// test run configuration).
#[derive(Default)]
pub struct TestRegistry {
    entries: BTreeMap<String, Entry>,
}

impl TestRegistry {
    pub fn new() -> Self {
        TestRegistry { entries: BTreeMap::new() }
    }

    /// Register a scenario. Panics on a duplicate name, mirroring the
    /// original's `NameError` on a duplicate `@hermes_testcase` function
    /// name -- a programming error in the scenario crate, not a runtime
    /// condition a caller should need to handle.
    pub fn register(&mut self, name: &str, module: &str, description: &str, func: ScenarioFn) {
        let info = TestInfo::new(name, module, description);
        if self.entries.insert(name.to_string(), Entry { info, func }).is_some() {
            panic!("duplicate scenario registered: {name}");
        }
    }

    pub fn available_tests(&self) -> BTreeMap<String, TestInfo> {
        self.entries.iter().map(|(name, entry)| (name.clone(), entry.info.clone())).collect()
    }

    /// Run one scenario by name. Returns `Ok(Pass/Fail/Skip)`; an unknown
    /// name is the only thing that produces `Err`, matching `run_test`'s
    /// "False, called unknown test case" path translated into a typed
    /// error instead of a boolean/log-only signal.
    ///
    /// Wraps the scenario per §4.E "Test wrapper": when
    /// `use_wrapper_callback` is set, `BEFORE_TEST_CASE`/`AFTER_TEST_CASE`
    /// fire unconditionally around the call; otherwise `AFTER_TEST_CASE`
    /// only fires if the scenario itself used the callback channel, so an
    /// interactive driver still gets a terminal cue without every
    /// non-interactive scenario needing one.
    pub fn run(&self, name: &str, env: &Environment) -> Result<TestResult, UnknownTest> {
        let entry = self.entries.get(name).ok_or_else(|| UnknownTest(name.to_string()))?;
        tracing::info!(test = name, module = %entry.info.module, "start");
        env.reset_callback_used();

        let wrapper = env.use_wrapper_callback();
        if wrapper {
            env.dispatch_wrapper_event(crate::CbEvt::BeforeTestCase { name: name.to_string() });
        }

        let result = match (entry.func)(env) {
            Ok(()) => {
                tracing::info!(test = name, "passed");
                TestResult::Pass
            }
            Err(err) => {
                if err.downcast_ref::<crate::ScenarioSkipped>().is_some() {
                    tracing::info!(test = name, %err, "skipped");
                    TestResult::Skip
                } else {
                    tracing::error!(test = name, %err, "failed");
                    let _ = env.run_callback(crate::CbEvt::Error { text: err.to_string() });
                    TestResult::Fail
                }
            }
        };

        if wrapper {
            env.dispatch_wrapper_event(crate::CbEvt::AfterTestCase {
                name: name.to_string(),
                passed: result == TestResult::Pass,
            });
        } else if env.callback_used() {
            env.dispatch_wrapper_event(crate::CbEvt::AfterTestCase {
                name: name.to_string(),
                passed: result == TestResult::Pass,
            });
        }

        Ok(result)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("called unknown test case: {0}")]
pub struct UnknownTest(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    fn always_pass(_env: &Environment) -> Result<(), ScenarioError> {
        Ok(())
    }

    fn always_fail(_env: &Environment) -> Result<(), ScenarioError> {
        Err("deliberate failure".into())
    }

    fn invokes_missing_callback(env: &Environment) -> Result<(), ScenarioError> {
        env.run_callback(crate::CbEvt::ClientConnected { address: "127.0.0.1:9".to_string() })?;
        Ok(())
    }

    #[test]
    fn run_reports_pass_and_fail() {
        let mut registry = TestRegistry::new();
        registry.register("test_ok", "dummy", "always passes", always_pass);
        registry.register("test_bad", "dummy", "always fails", always_fail);
        let env = Environment::for_test();

        assert_eq!(registry.run("test_ok", &env).unwrap(), TestResult::Pass);
        assert_eq!(registry.run("test_bad", &env).unwrap(), TestResult::Fail);
    }

    #[test]
    fn scenario_invoking_an_unanswered_callback_is_skipped_not_failed() {
        let mut registry = TestRegistry::new();
        registry.register("test_skip", "dummy", "needs a driver", invokes_missing_callback);
        let env = Environment::for_test();
        assert_eq!(registry.run("test_skip", &env).unwrap(), TestResult::Skip);
    }

    #[test]
    fn unknown_test_is_an_error() {
        let registry = TestRegistry::new();
        let env = Environment::for_test();
        assert!(registry.run("does_not_exist", &env).is_err());
    }

    #[test]
    #[should_panic(expected = "duplicate scenario registered")]
    fn duplicate_registration_panics() {
        let mut registry = TestRegistry::new();
        registry.register("dup", "dummy", "d", always_pass);
        registry.register("dup", "dummy", "d", always_pass);
    }
}

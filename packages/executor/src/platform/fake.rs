// ABOUTME: In-memory platform used by tests across the workspace
// ABOUTME: Scriptable run phases, canned pod logs, and per-call failure injection

use super::{ExecutionSurface, PayloadSpec, Platform, PlatformError, Result, RunPhase, RunSpec};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct Failures {
    create_payload: Option<PlatformError>,
    create_run: Option<PlatformError>,
    delete_payload: Option<PlatformError>,
    delete_run: Option<PlatformError>,
    list: Option<PlatformError>,
    list_surfaces: Option<PlatformError>,
    read_log: Option<PlatformError>,
}

#[derive(Default)]
struct Calls {
    phase_reads: usize,
    delete_payload: usize,
    delete_run: usize,
}

struct State {
    payloads: BTreeMap<Key, PayloadSpec>,
    runs: BTreeMap<Key, Option<RunSpec>>,
    surfaces: BTreeMap<Key, Vec<(ExecutionSurface, String)>>,
    created_runs: Vec<RunSpec>,
    created_payloads: Vec<PayloadSpec>,
    /// Consumed one step per status read; the last step repeats
    phase_script: VecDeque<Result<RunPhase>>,
    /// Logs given to the pods of every newly created run, oldest pod first
    pod_logs: Vec<String>,
    failures: Failures,
    calls: Calls,
}

impl Default for State {
    fn default() -> Self {
        Self {
            payloads: BTreeMap::new(),
            runs: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            created_runs: Vec::new(),
            created_payloads: Vec::new(),
            phase_script: VecDeque::from([Ok(RunPhase::Succeeded)]),
            pod_logs: vec![String::new()],
            failures: Failures::default(),
            calls: Calls::default(),
        }
    }
}

/// Platform double holding every object in memory.
///
/// By default each run succeeds on its first status read and gets a single pod
/// with an empty log. Builder methods change that before the fake is shared.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Phases returned by successive status reads, across all runs
    pub fn with_phases(self, phases: impl IntoIterator<Item = RunPhase>) -> Self {
        self.with_phase_results(phases.into_iter().map(Ok))
    }

    /// Like `with_phases`, but individual reads may fail
    pub fn with_phase_results(self, steps: impl IntoIterator<Item = Result<RunPhase>>) -> Self {
        self.state().phase_script = steps.into_iter().collect();
        self
    }

    /// Single pod per run with the given log
    pub fn with_log(self, log: &str) -> Self {
        self.with_pod_logs([log])
    }

    /// One pod per entry, created in order
    pub fn with_pod_logs<'a>(self, logs: impl IntoIterator<Item = &'a str>) -> Self {
        self.state().pod_logs = logs.into_iter().map(str::to_string).collect();
        self
    }

    /// Runs never get a pod
    pub fn without_pods(self) -> Self {
        self.state().pod_logs.clear();
        self
    }

    pub fn fail_create_payload(self, err: PlatformError) -> Self {
        self.state().failures.create_payload = Some(err);
        self
    }

    pub fn fail_create_run(self, err: PlatformError) -> Self {
        self.state().failures.create_run = Some(err);
        self
    }

    pub fn fail_delete_payload(self, err: PlatformError) -> Self {
        self.state().failures.delete_payload = Some(err);
        self
    }

    pub fn fail_delete_run(self, err: PlatformError) -> Self {
        self.state().failures.delete_run = Some(err);
        self
    }

    pub fn fail_list(self, err: PlatformError) -> Self {
        self.state().failures.list = Some(err);
        self
    }

    pub fn fail_list_surfaces(self, err: PlatformError) -> Self {
        self.state().failures.list_surfaces = Some(err);
        self
    }

    pub fn fail_read_log(self, err: PlatformError) -> Self {
        self.state().failures.read_log = Some(err);
        self
    }

    /// Insert a run that was not created through this platform
    pub fn seed_run(&self, namespace: &str, name: &str) {
        self.state().runs.insert(key(namespace, name), None);
    }

    /// Insert a payload that was not created through this platform
    pub fn seed_payload(&self, namespace: &str, name: &str) {
        self.state().payloads.insert(
            key(namespace, name),
            PayloadSpec {
                name: name.to_string(),
                data: BTreeMap::new(),
                labels: BTreeMap::new(),
            },
        );
    }

    /// Names of runs currently present, in any namespace
    pub fn run_names(&self) -> Vec<String> {
        self.state().runs.keys().map(|(_, name)| name.clone()).collect()
    }

    /// Names of payloads currently present, in any namespace
    pub fn payload_names(&self) -> Vec<String> {
        self.state()
            .payloads
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Every run spec accepted so far, including deleted ones
    pub fn created_runs(&self) -> Vec<RunSpec> {
        self.state().created_runs.clone()
    }

    /// Every payload accepted so far, including deleted ones
    pub fn created_payloads(&self) -> Vec<PayloadSpec> {
        self.state().created_payloads.clone()
    }

    pub fn phase_reads(&self) -> usize {
        self.state().calls.phase_reads
    }

    pub fn delete_run_calls(&self) -> usize {
        self.state().calls.delete_run
    }

    pub fn delete_payload_calls(&self) -> usize {
        self.state().calls.delete_payload
    }
}

fn check(failure: &Option<PlatformError>) -> Result<()> {
    match failure {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

fn already_exists(name: &str) -> PlatformError {
    PlatformError::new(409, format!("\"{}\" already exists", name))
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_payload(&self, namespace: &str, payload: &PayloadSpec) -> Result<()> {
        let mut state = self.state();
        check(&state.failures.create_payload)?;

        let k = key(namespace, &payload.name);
        if state.payloads.contains_key(&k) {
            return Err(already_exists(&payload.name));
        }
        state.payloads.insert(k, payload.clone());
        state.created_payloads.push(payload.clone());
        Ok(())
    }

    async fn delete_payload(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.delete_payload += 1;
        check(&state.failures.delete_payload)?;

        state
            .payloads
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| PlatformError::not_found(name))
    }

    async fn list_payloads(&self, namespace: &str) -> Result<Vec<String>> {
        let state = self.state();
        check(&state.failures.list)?;

        Ok(state
            .payloads
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn create_run(&self, namespace: &str, run: &RunSpec) -> Result<()> {
        let mut state = self.state();
        check(&state.failures.create_run)?;

        let k = key(namespace, &run.name);
        if state.runs.contains_key(&k) {
            return Err(already_exists(&run.name));
        }

        let started = Utc::now();
        let pods = state
            .pod_logs
            .iter()
            .enumerate()
            .map(|(i, log)| {
                let surface = ExecutionSurface {
                    name: format!("{}-pod{}", run.name, i),
                    created_at: Some(started + Duration::seconds(i as i64)),
                };
                (surface, log.clone())
            })
            .collect();

        state.surfaces.insert(k.clone(), pods);
        state.runs.insert(k, Some(run.clone()));
        state.created_runs.push(run.clone());
        Ok(())
    }

    async fn read_run_phase(&self, namespace: &str, name: &str) -> Result<RunPhase> {
        let mut state = self.state();
        state.calls.phase_reads += 1;

        let step = if state.phase_script.len() > 1 {
            state.phase_script.pop_front()
        } else {
            state.phase_script.front().cloned()
        };

        let step = step.unwrap_or(Ok(RunPhase::Pending))?;
        if !state.runs.contains_key(&key(namespace, name)) {
            return Err(PlatformError::not_found(name));
        }
        Ok(step)
    }

    async fn delete_run(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.delete_run += 1;
        check(&state.failures.delete_run)?;

        let k = key(namespace, name);
        // Foreground propagation: pods go with the run
        state.surfaces.remove(&k);
        state
            .runs
            .remove(&k)
            .map(|_| ())
            .ok_or_else(|| PlatformError::not_found(name))
    }

    async fn list_runs(&self, namespace: &str) -> Result<Vec<String>> {
        let state = self.state();
        check(&state.failures.list)?;

        Ok(state
            .runs
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn list_surfaces(
        &self,
        namespace: &str,
        run_name: &str,
    ) -> Result<Vec<ExecutionSurface>> {
        let state = self.state();
        check(&state.failures.list_surfaces)?;

        // Newest first; the API server makes no ordering promise
        Ok(state
            .surfaces
            .get(&key(namespace, run_name))
            .map(|pods| pods.iter().rev().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default())
    }

    async fn read_surface_log(&self, namespace: &str, surface_name: &str) -> Result<String> {
        let state = self.state();
        check(&state.failures.read_log)?;

        state
            .surfaces
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .flat_map(|(_, pods)| pods.iter())
            .find(|(surface, _)| surface.name == surface_name)
            .map(|(_, log)| log.clone())
            .ok_or_else(|| PlatformError::not_found(surface_name))
    }
}

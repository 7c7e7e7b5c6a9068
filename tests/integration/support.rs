//! Fake document host for integration tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use office_copilot::{
    ConfirmationRequest, CoreError, CoreResult, OperationArgs, OperationExecutor,
    OperationOutcome, StepConfirmer, UndoAction,
};

/// Records every call; fails the operations listed in `failing`.
#[derive(Default)]
pub struct FakeDocument {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    undone: Arc<Mutex<Vec<String>>>,
    /// Runs after the n-th call (1-based)
    hook: Option<(usize, Box<dyn Fn() + Send + Sync>)>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    pub fn after_call(mut self, n: usize, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hook = Some((n, Box::new(hook)));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn undone(&self) -> Vec<String> {
        self.undone.lock().unwrap().clone()
    }
}

struct RecordUndo {
    operation: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl UndoAction for RecordUndo {
    async fn undo(&self) -> CoreResult<()> {
        self.log.lock().unwrap().push(self.operation.clone());
        Ok(())
    }
}

#[async_trait]
impl OperationExecutor for FakeDocument {
    async fn execute(&self, name: &str, args: &OperationArgs) -> CoreResult<OperationOutcome> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(name.to_string());
            calls.len()
        };
        if let Some((n, hook)) = &self.hook {
            if *n == count {
                hook();
            }
        }

        if self.failing.contains(name) {
            return Ok(OperationOutcome::failed(format!("{name} rejected by host")));
        }
        if name == "host_crash" {
            return Err(CoreError::internal("host crashed"));
        }
        Ok(
            OperationOutcome::ok(json!({ "operation": name, "args": args, "call": count }))
                .with_undo(RecordUndo {
                    operation: name.to_string(),
                    log: self.undone.clone(),
                }),
        )
    }
}

/// Answers every confirmation with a fixed decision and remembers the prompts.
pub struct FixedConfirmer {
    decision: bool,
    prompts: Mutex<Vec<ConfirmationRequest>>,
}

impl FixedConfirmer {
    pub fn new(decision: bool) -> Self {
        Self {
            decision,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<ConfirmationRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepConfirmer for FixedConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> CoreResult<bool> {
        self.prompts.lock().unwrap().push(request.clone());
        Ok(self.decision)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fakes of the external collaborators. Each one is cheap to clone and shares
//! its record of calls between clones, so a test can keep a handle after
//! giving one to the code under test.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde_json::Value;

use super::*;

type Call = (String, Vec<(String, String)>);

/// Answers by the value of the `cmd` query parameter (or the whole URL when
/// there is none). Unknown commands get `None`.
#[derive(Clone, Default)]
pub(crate) struct CannedHttp {
    responses: Rc<RefCell<HashMap<String, Value>>>,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl CannedHttp {
    pub(crate) fn new() -> CannedHttp {
        CannedHttp::default()
    }

    pub(crate) fn respond(&self, cmd: &str, value: Value) {
        self.responses.borrow_mut().insert(cmd.to_string(), value);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls whose `cmd` (or URL) is `cmd`.
    pub(crate) fn calls_to(&self, cmd: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|(url, params)| {
                params.iter().any(|(k, v)| k == "cmd" && v == cmd) || url == cmd
            })
            .collect()
    }
}

impl JsonGetter for CannedHttp {
    fn get_json(&self, url: &str, params: &[(&str, String)]) -> Option<Value> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let key = params
            .iter()
            .find(|(k, _)| k == "cmd")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| url.to_string());
        self.calls.borrow_mut().push((url.to_string(), params));
        self.responses.borrow().get(&key).cloned()
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingMailer {
    sent: Rc<RefCell<Vec<(String, String)>>>,
}

impl RecordingMailer {
    /// (recipient, subject) of every message.
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, _from: &str, to: &str, subject: &str, _body: &str) -> Result<(), ClientError> {
        self.sent
            .borrow_mut()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingRunner {
    runs: Rc<RefCell<Vec<(String, Vec<String>)>>>,
}

impl RecordingRunner {
    pub(crate) fn runs(&self) -> Vec<(String, Vec<String>)> {
        self.runs.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ClientError> {
        self.runs
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        Ok(CommandOutput {
            success: true,
            ..Default::default()
        })
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingTracker {
    pub(crate) exists: bool,
    updates: Rc<RefCell<Vec<(TrackingField, String)>>>,
}

impl RecordingTracker {
    pub(crate) fn updates(&self) -> Vec<(TrackingField, String)> {
        self.updates.borrow().clone()
    }

    /// The last value written to a field.
    pub(crate) fn last(&self, field: TrackingField) -> Option<String> {
        self.updates
            .borrow()
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.clone())
    }
}

impl ProgressTracker for RecordingTracker {
    fn record_exists(&self) -> bool {
        self.exists
    }

    fn update(&self, field: TrackingField, value: &str) {
        self.updates.borrow_mut().push((field, value.to_string()));
    }
}

/// A full set of fakes, plus handles to inspect them.
pub(crate) struct FakeClients {
    pub(crate) http: CannedHttp,
    pub(crate) mailer: RecordingMailer,
    pub(crate) runner: RecordingRunner,
    pub(crate) tracker: RecordingTracker,
}

impl FakeClients {
    pub(crate) fn new() -> FakeClients {
        FakeClients {
            http: CannedHttp::new(),
            mailer: RecordingMailer::default(),
            runner: RecordingRunner::default(),
            tracker: RecordingTracker::default(),
        }
    }

    pub(crate) fn clients(&self) -> Clients {
        Clients {
            http: Box::new(self.http.clone()),
            mailer: Box::new(self.mailer.clone()),
            runner: Box::new(self.runner.clone()),
            tracker: Box::new(self.tracker.clone()),
        }
    }
}

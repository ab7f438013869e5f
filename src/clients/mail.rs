// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    io::Write,
    process::{Command, Stdio},
};

use log::debug;

use super::ClientError;

pub trait Mailer {
    fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<(), ClientError>;
}

/// Hands messages to the local MTA with `sendmail -t`.
pub struct SendmailMailer;

impl Mailer for SendmailMailer {
    fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<(), ClientError> {
        if to.trim().is_empty() {
            return Err(ClientError::NoRecipient(subject.to_string()));
        }
        debug!("Emailing {to}: {subject}");

        let spawn_err = |err| ClientError::Spawn {
            program: "sendmail".to_string(),
            err,
        };
        let mut child = Command::new("sendmail")
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(stdin) = child.stdin.as_mut() {
            write!(stdin, "From: {from}\nTo: {to}\nSubject: {subject}\n\n{body}\n")
                .map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ClientError::CommandFailed {
                program: "sendmail".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

//! Scripted stand-in for the container engine.
//!
//! `ScriptedRunner` records every invocation it receives and answers from
//! per-pattern reply queues, so controller and policy tests can assert exact
//! call sequences without a real engine.

use crate::executor::{CommandInvocation, CommandRunner};
use crate::RuntimeError;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Fail(String),
}

impl Reply {
    pub fn ok(text: &str) -> Self {
        Self::Ok(text.to_owned())
    }

    pub fn fail(output: &str) -> Self {
        Self::Fail(output.to_owned())
    }
}

struct Rule {
    needle: String,
    replies: VecDeque<Reply>,
    last: Option<Reply>,
}

/// A fake [`CommandRunner`].
///
/// Rules match when their needle is a substring of the space-joined
/// arguments; the first matching rule wins. Each rule replays its queued
/// replies in order and then keeps repeating the final one. Invocations
/// matching no rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<CommandInvocation>>,
    rules: Mutex<Vec<Rule>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn script(self, needle: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                needle: needle.to_owned(),
                replies: replies.into_iter().collect(),
                last: None,
            });
        }
        self
    }

    #[must_use]
    pub fn ok(self, needle: &str, text: &str) -> Self {
        self.script(needle, [Reply::ok(text)])
    }

    #[must_use]
    pub fn fail(self, needle: &str, output: &str) -> Self {
        self.script(needle, [Reply::fail(output)])
    }

    pub fn calls(&self) -> Vec<CommandInvocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args().join(" ").contains(needle))
            .count()
    }

    /// First argument of every recorded call, in order.
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.subcommand().unwrap_or_default().to_owned())
            .collect()
    }

    fn next_reply(&self, joined: &str) -> Reply {
        let Ok(mut rules) = self.rules.lock() else {
            return Reply::fail("scripted runner poisoned");
        };
        for rule in rules.iter_mut() {
            if !joined.contains(&rule.needle) {
                continue;
            }
            if let Some(reply) = rule.replies.pop_front() {
                rule.last = Some(reply.clone());
                return reply;
            }
            return rule.last.clone().unwrap_or_else(|| Reply::ok(""));
        }
        Reply::ok("")
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<String, RuntimeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        match self.next_reply(&invocation.args().join(" ")) {
            Reply::Ok(text) => Ok(text),
            Reply::Fail(output) => Err(RuntimeError::ExecFailed {
                command: invocation.render("mock"),
                reason: "exit status: 1".to_owned(),
                output,
            }),
        }
    }
}

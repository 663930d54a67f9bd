//! # Scripted Runner
//!
//! A [`CommandRunner`] that answers from a script instead of spawning
//! processes. Rules match on the space-joined command line (program first):
//! a rule fires when the line starts with its prefix and contains every one of
//! its needles. The first matching rule wins. Each rule replays its outputs in
//! order and repeats the last one once the queue is down to a single entry.
//!
//! Unmatched commands succeed with empty output, which the `show`-style
//! queries read as "absent". Every call is recorded.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::runner::{CommandOutput, CommandRunner};

struct Rule {
    prefix: String,
    needles: Vec<String>,
    outputs: VecDeque<CommandOutput>,
}

impl Rule {
    fn matches(&self, line: &str) -> bool {
        line.starts_with(&self.prefix) && self.needles.iter().all(|n| line.contains(n.as_str()))
    }

    fn next_output(&mut self) -> CommandOutput {
        if self.outputs.len() > 1 {
            self.outputs.pop_front().unwrap_or_else(|| CommandOutput::ok(""))
        } else {
            self.outputs.front().cloned().unwrap_or_else(|| CommandOutput::ok(""))
        }
    }
}

/// Fake runner for tests.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `outputs`, in order.
    pub fn on(self, prefix: &str, outputs: impl IntoIterator<Item = CommandOutput>) -> Self {
        self.on_matching(prefix, &[], outputs)
    }

    /// Like [`Self::on`], but the command line must also contain every needle.
    pub fn on_matching(
        self,
        prefix: &str,
        needles: &[&str],
        outputs: impl IntoIterator<Item = CommandOutput>,
    ) -> Self {
        self.rules.borrow_mut().push(Rule {
            prefix: prefix.to_string(),
            needles: needles.iter().map(|n| n.to_string()).collect(),
            outputs: outputs.into_iter().collect(),
        });
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Command lines starting with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(line.clone());
        let mut rules = self.rules.borrow_mut();
        let output = rules
            .iter_mut()
            .find(|r| r.matches(&line))
            .map(Rule::next_output)
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(runner: &ScriptedRunner, line: &str) -> CommandOutput {
        let mut parts = line.split(' ');
        let program = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(str::to_string).collect();
        runner.run(program, &args).unwrap()
    }

    #[test]
    fn outputs_replay_then_repeat_last() {
        let runner = ScriptedRunner::new().on(
            "az containerapp env show",
            [CommandOutput::ok("InProgress"), CommandOutput::ok("Succeeded")],
        );
        assert_eq!(run(&runner, "az containerapp env show -n e").stdout, "InProgress");
        assert_eq!(run(&runner, "az containerapp env show -n e").stdout, "Succeeded");
        assert_eq!(run(&runner, "az containerapp env show -n e").stdout, "Succeeded");
    }

    #[test]
    fn needles_narrow_the_match() {
        let runner = ScriptedRunner::new()
            .on_matching("az acr create", &["westeurope"], [CommandOutput::failed(1, "denied")])
            .on("az acr create", [CommandOutput::ok("")]);
        assert!(!run(&runner, "az acr create --location westeurope").is_success());
        assert!(run(&runner, "az acr create --location uksouth").is_success());
        assert_eq!(runner.calls_starting_with("az acr create").len(), 2);
    }

    #[test]
    fn unmatched_commands_succeed_empty() {
        let runner = ScriptedRunner::new();
        let out = run(&runner, "az group show --name rg");
        assert!(out.is_success());
        assert!(out.stdout.is_empty());
        assert_eq!(runner.calls(), ["az group show --name rg"]);
    }
}

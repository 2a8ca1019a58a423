//! Replays hand-written backend output.
//!
//! [`TranscriptBackend`] answers each command with the first scripted reply
//! whose target and command fragment match, so tests can feed the harness
//! stderr text captured from a real vDVS installation. Commands without a
//! scripted reply succeed with empty output.

use std::future::Future;
use std::sync::Mutex;

use volprobe_backend::{BackendError, CommandLine, CommandOutput, RemoteExecutor, RemoteTarget};

struct Reply {
    target: String,
    fragment: String,
    output: CommandOutput,
}

#[derive(Default)]
pub struct TranscriptBackend {
    replies: Vec<Reply>,
    log: Mutex<Vec<(String, String)>>,
}

impl TranscriptBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands on `target` containing `fragment` with `output`
    pub fn reply(mut self, target: &str, fragment: &str, output: CommandOutput) -> Self {
        self.replies.push(Reply {
            target: target.to_owned(),
            fragment: fragment.to_owned(),
            output,
        });
        self
    }

    pub fn commands_on(&self, label: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn answer(&self, target: &RemoteTarget, command: &CommandLine) -> CommandOutput {
        self.log
            .lock()
            .unwrap()
            .push((target.label.clone(), command.as_str().to_owned()));
        self.replies
            .iter()
            .find(|r| r.target == target.label && command.as_str().contains(&r.fragment))
            .map_or_else(|| CommandOutput::ok(""), |r| r.output.clone())
    }
}

impl RemoteExecutor for TranscriptBackend {
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutput, BackendError>> + Send {
        let output = self.answer(target, command);
        async move { Ok(output) }
    }
}

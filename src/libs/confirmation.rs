// Yes/no decision points.
//
// Every question the installer asks the operator (initial consent, wiping the cache,
// reinstalling a component that is already at the required version) goes through the
// `ConfirmationGate` trait, so the orchestrator never talks to the terminal directly
// and can be driven non-interactively or from tests.

use crate::errors::{InstallerError, Result};
use crate::log_info;
use colored::Colorize;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::VecDeque;

/// A yes/no question with the answer used when nobody is there to ask.
pub trait ConfirmationGate {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Asks on the terminal. Blocks until the operator answers.
pub struct InteractiveGate;

impl ConfirmationGate for InteractiveGate {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| InstallerError::Prompt(e.to_string()))
    }
}

/// Answers every question with its default and says so in the log.
pub struct NonInteractiveGate;

impl ConfirmationGate for NonInteractiveGate {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let answer = if default { "yes" } else { "no" };
        log_info!("[Prompt] {} -> {} (non-interactive)", prompt, answer.bold());
        Ok(default)
    }
}

/// Replays a fixed list of answers and records the prompts it was shown.
/// Once the script runs out, the prompt's default is used.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedGate {
    answers: RefCell<VecDeque<bool>>,
    asked: RefCell<Vec<String>>,
}

#[cfg(test)]
impl ScriptedGate {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        ScriptedGate {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Prompts shown so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

#[cfg(test)]
impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        self.asked.borrow_mut().push(prompt.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(default))
    }
}

/// Asks a question whose "no" ends the run cleanly.
pub fn require(gate: &dyn ConfirmationGate, prompt: &str, default: bool) -> Result<()> {
    if gate.confirm(prompt, default)? {
        Ok(())
    } else {
        Err(InstallerError::UserDeclined(prompt.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_returns_defaults() {
        assert!(NonInteractiveGate.confirm("continue?", true).unwrap());
        assert!(!NonInteractiveGate.confirm("reinstall?", false).unwrap());
    }

    #[test]
    fn scripted_gate_replays_then_falls_back() {
        let gate = ScriptedGate::new([false, true]);
        assert!(!gate.confirm("one", true).unwrap());
        assert!(gate.confirm("two", false).unwrap());
        assert!(gate.confirm("three", true).unwrap());
        assert_eq!(gate.asked(), vec!["one", "two", "three"]);
    }

    #[test]
    fn require_maps_no_to_user_declined() {
        let gate = ScriptedGate::new([false]);
        let err = require(&gate, "Proceed with installation?", true).unwrap_err();
        assert!(matches!(err, InstallerError::UserDeclined(_)));
        assert_eq!(err.exit_code(), 0);
    }
}

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use log::{info, warn};

use crate::engine::IntentResult;
use crate::intents::UNKNOWN_LABEL;

/// Confidence below which no action is ever proposed.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// A yes/no oracle for the human-in-the-loop confirmation step.
///
/// The console implementation blocks on stdin; event-driven hosts
/// should implement this over whatever request/response channel they
/// have. The gate itself defines no timeout for the wait.
pub trait ConfirmationOracle {
    fn confirm(&self, intent_name: &str, confidence: f64) -> bool;
}

/// Blocking console oracle: prints the pending decision and reads a
/// y/n line from stdin.
#[derive(Debug, Default)]
pub struct ConsoleOracle;

impl ConfirmationOracle for ConsoleOracle {
    fn confirm(&self, intent_name: &str, confidence: f64) -> bool {
        println!("\n[PERMISSION REQUEST]");
        println!("Detected intent: {}", intent_name);
        println!("Confidence: {:.2}%", confidence * 100.0);
        print!("Confirm execution of {}? (y/n): ", intent_name);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().eq_ignore_ascii_case("y"),
            Err(_) => false,
        }
    }
}

/// Terminal state of one pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Confidence below threshold, or the intent was UNKNOWN.
    Rejected,
    /// The user declined the confirmation prompt. A normal outcome,
    /// not an error.
    Aborted,
    /// The registered handler was invoked exactly once.
    Executed,
}

type ActionHandler = Box<dyn Fn() + Send + Sync>;

/// The safety layer between classification and execution.
///
/// No action handler ever runs without first passing the confidence
/// threshold and then receiving an explicit affirmative confirmation.
/// Decisions are ephemeral; nothing about them is persisted.
pub struct PermissionGate {
    threshold: f64,
    handlers: HashMap<usize, ActionHandler>,
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_CONFIDENCE_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            handlers: HashMap::new(),
        }
    }

    /// Registers the host-supplied handler for an intent id. The gate
    /// owns no OS effects itself.
    pub fn register_handler<F>(&mut self, intent_id: usize, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.insert(intent_id, Box::new(handler));
    }

    /// True iff the classification is confident enough and actionable.
    pub fn should_prompt(&self, intent_name: &str, confidence: f64) -> bool {
        confidence >= self.threshold && intent_name != UNKNOWN_LABEL
    }

    /// Invokes the registered handler for the intent, exactly once and
    /// synchronously. An unknown id is logged and ignored; availability
    /// for other intents must not be affected.
    pub fn execute(&self, intent_id: usize) {
        match self.handlers.get(&intent_id) {
            Some(handler) => handler(),
            None => warn!("No action handler registered for intent id {}", intent_id),
        }
    }

    /// Runs the full gate state machine for one classification:
    /// threshold check, confirmation, then dispatch.
    pub fn process(&self, result: &IntentResult, oracle: &dyn ConfirmationOracle) -> GateOutcome {
        if !self.should_prompt(&result.intent_name, result.confidence) {
            info!(
                "Rejected '{}' ({:.1}% confidence, threshold {:.0}%)",
                result.intent_name,
                result.confidence * 100.0,
                self.threshold * 100.0
            );
            return GateOutcome::Rejected;
        }
        if !oracle.confirm(&result.intent_name, result.confidence) {
            info!("User declined '{}'", result.intent_name);
            return GateOutcome::Aborted;
        }
        self.execute(result.intent_id);
        GateOutcome::Executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedOracle(bool);

    impl ConfirmationOracle for FixedOracle {
        fn confirm(&self, _intent_name: &str, _confidence: f64) -> bool {
            self.0
        }
    }

    fn result(intent_id: usize, intent_name: &str, confidence: f64) -> IntentResult {
        IntentResult {
            intent_id,
            intent_name: intent_name.to_string(),
            confidence,
            distribution: vec![confidence],
        }
    }

    fn counting_gate() -> (PermissionGate, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut gate = PermissionGate::new();
        let counter = Arc::clone(&calls);
        gate.register_handler(0, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (gate, calls)
    }

    #[test]
    fn test_should_prompt_threshold() {
        let gate = PermissionGate::new();
        assert!(gate.should_prompt("LOCK_SYSTEM", 0.75));
        assert!(!gate.should_prompt("LOCK_SYSTEM", 0.74));
        assert!(!gate.should_prompt(UNKNOWN_LABEL, 0.99));
    }

    #[test]
    fn test_low_confidence_never_executes() {
        let (gate, calls) = counting_gate();
        let outcome = gate.process(&result(0, "LOCK_SYSTEM", 0.5), &FixedOracle(true));
        assert_eq!(outcome, GateOutcome::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_intent_never_executes() {
        let (gate, calls) = counting_gate();
        let outcome = gate.process(&result(0, UNKNOWN_LABEL, 0.99), &FixedOracle(true));
        assert_eq!(outcome, GateOutcome::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_confirmed_executes_exactly_once() {
        let (gate, calls) = counting_gate();
        let outcome = gate.process(&result(0, "LOCK_SYSTEM", 0.9), &FixedOracle(true));
        assert_eq!(outcome, GateOutcome::Executed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_declined_never_executes() {
        let (gate, calls) = counting_gate();
        let outcome = gate.process(&result(0, "LOCK_SYSTEM", 0.9), &FixedOracle(false));
        assert_eq!(outcome, GateOutcome::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_intent_is_a_noop() {
        let (gate, calls) = counting_gate();
        let outcome = gate.process(&result(7, "SLEEP_SYSTEM", 0.9), &FixedOracle(true));
        // Still Executed from the gate's perspective; the missing
        // handler is logged and skipped.
        assert_eq!(outcome, GateOutcome::Executed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

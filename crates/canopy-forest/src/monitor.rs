//! Training monitors, including loss-based early stopping.

use tracing::{debug, info};

/// What a monitor wants the training loop to do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Keep training.
    Continue,
    /// Stop after the current step.
    Stop,
}

/// Observes the training loop after every step.
pub trait Monitor {
    /// Called once per training step with the global step and the training loss.
    fn after_step(&mut self, step: u64, loss: f64) -> MonitorAction;
}

/// Relative margin a loss must beat the best loss by to count as an improvement.
pub const DEFAULT_LOSS_THRESHOLD: f64 = 0.001;

/// Stops training once the loss has not improved for `early_stopping_rounds` steps.
///
/// The forest's training loss is the negated mean tree size, so this stops
/// training when the forest is no longer growing.
///
/// # Defaults
///
/// | Setting | Value |
/// |---|---|
/// | `loss_threshold` | [`DEFAULT_LOSS_THRESHOLD`] |
#[derive(Debug, Clone)]
pub struct TensorForestLossHook {
    early_stopping_rounds: u64,
    loss_threshold: f64,
    min_loss: Option<f64>,
    min_loss_step: u64,
}

impl TensorForestLossHook {
    /// Create a hook with the given patience window.
    #[must_use]
    pub fn new(early_stopping_rounds: u64) -> Self {
        Self {
            early_stopping_rounds,
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            min_loss: None,
            min_loss_step: 0,
        }
    }

    /// Require each improvement to beat the best loss by this relative fraction.
    ///
    /// Pass `0.0` to count any decrease as an improvement.
    #[must_use]
    pub fn with_loss_threshold(mut self, loss_threshold: f64) -> Self {
        self.loss_threshold = loss_threshold;
        self
    }

    /// Return the patience window.
    #[must_use]
    pub fn early_stopping_rounds(&self) -> u64 {
        self.early_stopping_rounds
    }

    /// Return the lowest loss seen so far.
    #[must_use]
    pub fn min_loss(&self) -> Option<f64> {
        self.min_loss
    }
}

impl Monitor for TensorForestLossHook {
    fn after_step(&mut self, step: u64, loss: f64) -> MonitorAction {
        let improved = match self.min_loss {
            None => true,
            Some(min) => loss < min - min.abs() * self.loss_threshold,
        };
        if improved {
            self.min_loss = Some(loss);
            self.min_loss_step = step;
            debug!(step, loss, "loss improved");
        }

        if step.saturating_sub(self.min_loss_step) >= self.early_stopping_rounds {
            info!(
                step,
                min_loss = self.min_loss,
                min_loss_step = self.min_loss_step,
                "loss stopped improving, requesting stop"
            );
            return MonitorAction::Stop;
        }
        MonitorAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::{Monitor, MonitorAction, TensorForestLossHook};

    #[test]
    fn stops_exactly_after_patience() {
        let mut hook = TensorForestLossHook::new(3);
        assert_eq!(hook.after_step(1, -5.0), MonitorAction::Continue);
        assert_eq!(hook.after_step(2, -5.0), MonitorAction::Continue);
        assert_eq!(hook.after_step(3, -5.0), MonitorAction::Continue);
        assert_eq!(hook.after_step(4, -5.0), MonitorAction::Stop);
    }

    #[test]
    fn improvement_resets_window() {
        let mut hook = TensorForestLossHook::new(2);
        hook.after_step(1, -1.0);
        hook.after_step(2, -1.0);
        assert_eq!(hook.after_step(3, -2.0), MonitorAction::Continue);
        assert_eq!(hook.after_step(4, -2.0), MonitorAction::Continue);
        assert_eq!(hook.after_step(5, -2.0), MonitorAction::Stop);
        assert_eq!(hook.min_loss(), Some(-2.0));
    }

    #[test]
    fn threshold_ignores_tiny_improvements() {
        let mut hook = TensorForestLossHook::new(2).with_loss_threshold(0.1);
        hook.after_step(1, -10.0);
        // -10.5 is not below -10.0 - 1.0
        assert_eq!(hook.after_step(2, -10.5), MonitorAction::Continue);
        assert_eq!(hook.after_step(3, -10.5), MonitorAction::Stop);
    }

    #[test]
    fn default_threshold_ignores_sub_permille_growth() {
        let mut hook = TensorForestLossHook::new(2);
        hook.after_step(1, -100.0);
        // -100.05 is within 0.1% of -100.0
        assert_eq!(hook.after_step(2, -100.05), MonitorAction::Continue);
        assert_eq!(hook.after_step(3, -100.09), MonitorAction::Stop);
        assert_eq!(hook.min_loss(), Some(-100.0));
    }

    #[test]
    fn default_threshold_accepts_real_growth() {
        let mut hook = TensorForestLossHook::new(2);
        hook.after_step(1, -100.0);
        assert_eq!(hook.after_step(2, -100.2), MonitorAction::Continue);
        assert_eq!(hook.after_step(3, -100.2), MonitorAction::Continue);
        assert_eq!(hook.min_loss(), Some(-100.2));
    }

    #[test]
    fn zero_threshold_counts_any_decrease() {
        let mut hook = TensorForestLossHook::new(2).with_loss_threshold(0.0);
        hook.after_step(1, -100.0);
        hook.after_step(2, -100.05);
        assert_eq!(hook.after_step(3, -100.05), MonitorAction::Continue);
        assert_eq!(hook.min_loss(), Some(-100.05));
    }

    #[test]
    fn zero_patience_stops_immediately() {
        let mut hook = TensorForestLossHook::new(0);
        assert_eq!(hook.after_step(1, 0.0), MonitorAction::Stop);
    }
}

//! Stopping criteria of iterative solvers.

use super::config::ConvCheckConfig;
use std::fmt::Write as _;

/// Outcome of an iteration as seen by a [`ConvergenceCheck`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Running,
    /// Defect fell below the absolute limit.
    AbsoluteReached,
    /// Defect reduction fell below the relative limit.
    RelativeReached,
    /// Step limit reached without convergence.
    MaxStepsReached,
    /// Defect is NaN, infinite or negative.
    InvalidDefect,
}

impl ConvergenceStatus {
    pub fn is_converged(self) -> bool {
        matches!(self, ConvergenceStatus::AbsoluteReached | ConvergenceStatus::RelativeReached)
    }

    pub fn is_terminal(self) -> bool {
        self != ConvergenceStatus::Running
    }
}

/// Controls an iteration through the sequence of its defect norms.
pub trait ConvergenceCheck: Send {
    /// Begin a new iteration with the initial defect norm.
    fn start_defect(&mut self, defect: f64);
    /// Record the defect norm after one more step.
    fn update_defect(&mut self, defect: f64);
    /// True once the iteration has to stop (converged or failed).
    fn iteration_ended(&mut self) -> bool;
    /// Report the final state; true on convergence.
    fn post(&mut self) -> bool;

    fn status(&self) -> ConvergenceStatus;
    fn defect(&self) -> f64;
    fn initial_defect(&self) -> f64;
    fn step(&self) -> usize;
    fn reduction(&self) -> f64;

    fn set_offset(&mut self, offset: usize);
    fn set_symbol(&mut self, symbol: char);
    fn set_name(&mut self, name: &str);

    fn clone_box(&self) -> Box<dyn ConvergenceCheck>;
}

impl Clone for Box<dyn ConvergenceCheck> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Absolute/relative defect limits with a step limit.
#[derive(Clone, Debug)]
pub struct StandardConvCheck {
    config: ConvCheckConfig,
    initial_defect: f64,
    current_defect: f64,
    last_defect: f64,
    step: usize,
    offset: usize,
    symbol: char,
    name: String,
}

fn is_valid_number(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

impl StandardConvCheck {
    pub fn new(config: ConvCheckConfig) -> Self {
        Self {
            config,
            initial_defect: 0.0,
            current_defect: 0.0,
            last_defect: 0.0,
            step: 0,
            offset: 0,
            symbol: '%',
            name: "Iteration".to_owned(),
        }
    }

    pub fn config(&self) -> &ConvCheckConfig {
        &self.config
    }

    fn prefix(&self) -> String {
        format!("{:width$}{} ", "", self.symbol, width = self.offset)
    }

    fn banner(&self, n: usize) -> String {
        std::iter::repeat_n(self.symbol, n).collect()
    }
}

impl Default for StandardConvCheck {
    fn default() -> Self {
        Self::new(ConvCheckConfig::default())
    }
}

impl ConvergenceCheck for StandardConvCheck {
    fn start_defect(&mut self, defect: f64) {
        self.initial_defect = defect;
        self.current_defect = defect;
        self.last_defect = defect;
        self.step = 0;
        if self.config.verbose {
            let p = self.prefix();
            log::info!("{p}{}  {}  {}", self.banner(10), self.name, self.banner(10));
            log::info!("{p}  Iter      Defect         Rate");
            log::info!("{p}{:>4}:    {:e}      -------", self.step, defect);
        }
    }

    fn update_defect(&mut self, defect: f64) {
        self.last_defect = self.current_defect;
        self.current_defect = defect;
        self.step += 1;
        if self.config.verbose {
            log::info!(
                "{}{:>4}:    {:e}    {:e}",
                self.prefix(),
                self.step,
                defect,
                defect / self.last_defect
            );
        }
    }

    fn iteration_ended(&mut self) -> bool {
        self.status().is_terminal()
    }

    fn post(&mut self) -> bool {
        let status = self.status();
        if self.config.verbose {
            let p = self.prefix();
            let mut msg = String::new();
            match status {
                ConvergenceStatus::AbsoluteReached => {
                    let _ = write!(msg, "Absolute reduction {:e} reached after {} steps.", self.config.min_defect, self.step);
                }
                ConvergenceStatus::RelativeReached => {
                    let _ = write!(msg, "Relative reduction {:e} reached after {} steps.", self.config.rel_reduction, self.step);
                }
                ConvergenceStatus::InvalidDefect => {
                    let _ = write!(msg, "Current defect {} is not a valid number.", self.current_defect);
                }
                ConvergenceStatus::MaxStepsReached => {
                    let _ = write!(msg, "Maximum numbers of {} iterations reached without convergence.", self.config.max_steps);
                }
                ConvergenceStatus::Running => {
                    let _ = write!(msg, "Iteration stopped after {} steps.", self.step);
                }
            }
            log::info!("{p}{msg}");
            let verdict = if status.is_converged() {
                "Iteration converged"
            } else {
                "Iteration not successful"
            };
            log::info!("{p}{}  {verdict}  {}", self.banner(5), self.banner(5));
        }
        status.is_converged()
    }

    fn status(&self) -> ConvergenceStatus {
        if !is_valid_number(self.current_defect) {
            ConvergenceStatus::InvalidDefect
        } else if self.current_defect < self.config.min_defect {
            ConvergenceStatus::AbsoluteReached
        } else if self.reduction() < self.config.rel_reduction {
            ConvergenceStatus::RelativeReached
        } else if self.step >= self.config.max_steps {
            ConvergenceStatus::MaxStepsReached
        } else {
            ConvergenceStatus::Running
        }
    }

    fn defect(&self) -> f64 {
        self.current_defect
    }

    fn initial_defect(&self) -> f64 {
        self.initial_defect
    }

    fn step(&self) -> usize {
        self.step
    }

    /// Current over initial defect; zero if the iteration started at zero.
    fn reduction(&self) -> f64 {
        if self.initial_defect == 0.0 {
            0.0
        } else {
            self.current_defect / self.initial_defect
        }
    }

    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    fn set_symbol(&mut self, symbol: char) {
        self.symbol = symbol;
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    fn clone_box(&self) -> Box<dyn ConvergenceCheck> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_reduction_ends_the_iteration() {
        let mut c = StandardConvCheck::new(ConvCheckConfig::new(10, 1e-30, 1e-3));
        c.start_defect(1.0);
        assert!(!c.iteration_ended());
        c.update_defect(1e-2);
        assert!(!c.iteration_ended());
        c.update_defect(1e-4);
        assert!(c.iteration_ended());
        assert_eq!(c.status(), ConvergenceStatus::RelativeReached);
        assert!(c.post());
        assert_eq!(c.step(), 2);
    }

    #[test]
    fn invalid_defects() {
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let mut c = StandardConvCheck::default();
            c.start_defect(1.0);
            c.update_defect(bad);
            assert!(c.iteration_ended());
            assert_eq!(c.status(), ConvergenceStatus::InvalidDefect);
            assert!(!c.post());
        }
    }

    #[test]
    fn step_limit() {
        let mut c = StandardConvCheck::new(ConvCheckConfig::new(2, 0.0, 0.0));
        c.start_defect(1.0);
        c.update_defect(0.9);
        c.update_defect(0.8);
        assert_eq!(c.status(), ConvergenceStatus::MaxStepsReached);
        assert!(!c.post());
    }

    #[test]
    fn zero_start_defect_is_converged() {
        let mut c = StandardConvCheck::default();
        c.start_defect(0.0);
        assert_eq!(c.status(), ConvergenceStatus::AbsoluteReached);
    }
}

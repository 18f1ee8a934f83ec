use std::fmt;

use crate::problem::{Goal, LpProblem};

/// The two phases of the simplex method.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Feasibility search on the auxiliary problem
    One,
    /// Optimization of the actual objective
    Two,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::One => f.write_str("1"),
            Phase::Two => f.write_str("2"),
        }
    }
}

/// Number of pivots performed in each phase
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Iterations {
    pub phase_one: usize,
    pub phase_two: usize,
}

impl Iterations {
    pub fn total(&self) -> usize {
        self.phase_one + self.phase_two
    }
}

/// An optimal basic feasible solution of a standard-form problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BasicSolution {
    /// Basic column of each remaining row
    pub basis: Vec<usize>,
    /// Value of every column; non-basic columns are zero
    pub values: Vec<f64>,
    /// Objective value of the standard-form problem
    pub objective_value: f64,
    /// Rows found to be linearly dependent on the others and dropped before phase 2
    pub dropped_rows: Vec<usize>,
    pub iterations: Iterations,
}

/// Evidence that the objective decreases without limit.
///
/// Increasing `entering` by one unit changes the basic variable of row `i`
/// by `-direction[i]`, and no basic variable ever reaches zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundedRay {
    pub phase: Phase,
    pub entering: usize,
    pub basis: Vec<usize>,
    pub direction: Vec<f64>,
}

/// Result of running the simplex method on a standard-form problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimal(BasicSolution),
    Infeasible,
    Unbounded(UnboundedRay),
}

/// Sum of `objective[i] * values[i]` over the basic columns.
pub fn objective_value(problem: &LpProblem, basis: &[usize], values: &[f64]) -> f64 {
    basis
        .iter()
        .map(|&i| problem.objective.coefficients[i] * values[i])
        .sum()
}

/// The result of solving an LP problem in its original form
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Names of the standard-form columns in the final basis
    pub basic_variables: Vec<String>,
    pub iterations: Iterations,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolutionStatus::Optimal => "OPTIMAL",
            SolutionStatus::Infeasible => "INFEASIBLE",
            SolutionStatus::Unbounded => "UNBOUNDED",
        })
    }
}

impl Solution {
    /// Reports the worst objective for `goal`: `+inf` when minimizing,
    /// `-inf` when maximizing.
    pub fn infeasible(goal: Goal) -> Self {
        let objective_value = match goal {
            Goal::Minimize => f64::INFINITY,
            Goal::Maximize => f64::NEG_INFINITY,
        };
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value,
            basic_variables: Vec::new(),
            iterations: Iterations::default(),
        }
    }

    /// The objective improves without limit in the direction of `goal`.
    pub fn unbounded(goal: Goal) -> Self {
        let objective_value = match goal {
            Goal::Minimize => f64::NEG_INFINITY,
            Goal::Maximize => f64::INFINITY,
        };
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value,
            basic_variables: Vec::new(),
            iterations: Iterations::default(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }
}

use log::{debug, error, trace, warn};
use thiserror::Error;

use crate::linalg::{invert, mul_vec, vec_mul};
use crate::normalize::{normalize, NormalizeError};
use crate::problem::{LpProblem, ProblemError};
use crate::solution::{
    objective_value, BasicSolution, Iterations, Outcome, Phase, Solution, SolutionStatus, UnboundedRay,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Problem is not in standard form")]
    NotStandardForm,
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Basis matrix is singular in phase {phase} at iteration {iteration}")]
    SingularBasis { phase: Phase, iteration: usize },
    #[error("Iteration limit of {iterations} reached in phase {phase}")]
    IterationLimit { phase: Phase, iterations: usize },
}

/// Rule for choosing the entering column among those with negative reduced cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricingRule {
    /// Most negative reduced cost, lowest column index on ties
    #[default]
    Dantzig,
    /// Lowest column index with a negative reduced cost; never cycles
    Bland,
}

/// Two-phase revised simplex solver for linear programming problems
#[derive(Debug, Clone, Copy)]
pub struct Solver {
    /// Maximum pivots per phase before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
    pricing: PricingRule,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            pricing: PricingRule::Dantzig,
        }
    }
}

/// Dense system `A x = b, x >= 0` with costs `c`.
#[derive(Debug, Clone)]
struct Program {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    costs: Vec<f64>,
}

impl Program {
    fn from_problem(problem: &LpProblem) -> Self {
        Self {
            rows: problem.constraints.iter().map(|c| c.coefficients.clone()).collect(),
            rhs: problem.rhs(),
            costs: problem.objective.coefficients.clone(),
        }
    }

    /// Artificial identity block in columns `0..m` with cost 1, followed by
    /// the original columns at cost 0.
    fn auxiliary(&self) -> Self {
        let m = self.rows.len();
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut aux = vec![0.0; m + row.len()];
                aux[i] = 1.0;
                aux[m..].copy_from_slice(row);
                aux
            })
            .collect();
        let mut costs = vec![1.0; m];
        costs.extend(std::iter::repeat_n(0.0, self.costs.len()));
        Self {
            rows,
            rhs: self.rhs.clone(),
            costs,
        }
    }

    fn num_columns(&self) -> usize {
        self.costs.len()
    }

    fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    /// `y^T A_j` without materializing the column
    fn column_dot(&self, y: &[f64], j: usize) -> f64 {
        self.rows.iter().zip(y).map(|(row, v)| row[j] * v).sum()
    }

    fn basis_matrix(&self, basis: &[usize]) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| basis.iter().map(|&j| row[j]).collect())
            .collect()
    }

    fn remove_row(&mut self, row: usize) {
        self.rows.remove(row);
        self.rhs.remove(row);
    }
}

/// Everything computed from one basis by a single simplex iteration.
#[derive(Debug)]
struct Iterate {
    /// `A_B^-1 b`
    values: Vec<f64>,
    /// `(column, reduced cost)` for every non-basic column
    reduced_costs: Vec<(usize, f64)>,
    decision: Decision,
}

#[derive(Debug, PartialEq)]
enum Decision {
    Optimal,
    Pivot { entering: usize, row: usize },
    Unbounded { entering: usize, direction: Vec<f64> },
}

enum Run {
    Optimal { values: Vec<f64>, iterations: usize },
    Unbounded { entering: usize, direction: Vec<f64> },
}

enum PhaseOne {
    Feasible {
        basis: Vec<usize>,
        rows: Vec<usize>,
        iterations: usize,
    },
    Infeasible,
    Unbounded(UnboundedRay),
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingRule) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn pricing(&self) -> PricingRule {
        self.pricing
    }

    /// Normalize the problem, solve it, and map the result back to the
    /// original variables and objective sense.
    pub fn solve(&self, problem: &LpProblem) -> Result<Solution, SolveError> {
        let standard = normalize(problem)?;

        let basic = match self.solve_standard(&standard.problem)? {
            Outcome::Optimal(basic) => basic,
            Outcome::Infeasible => return Ok(Solution::infeasible(problem.objective.goal)),
            Outcome::Unbounded(_) => return Ok(Solution::unbounded(problem.objective.goal)),
        };

        let values = standard.recover(&basic.values);
        let objective_value = standard.original_objective(&values);
        let basic_variables = basic
            .basis
            .iter()
            .map(|&j| standard.problem.variables[j].clone())
            .collect();

        Ok(Solution {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            basic_variables,
            iterations: basic.iterations,
        })
    }

    /// Solve a standard-form problem with the two-phase revised simplex method
    pub fn solve_standard(&self, problem: &LpProblem) -> Result<Outcome, SolveError> {
        problem.validate()?;
        if !problem.is_standard_form() {
            return Err(SolveError::NotStandardForm);
        }

        let program = Program::from_problem(problem);
        debug!(
            "solving {} rows x {} columns with {:?} pricing",
            program.rows.len(),
            program.num_columns(),
            self.pricing
        );

        let (basis, rows, phase_one) = match self.phase1(&program)? {
            PhaseOne::Feasible {
                basis,
                rows,
                iterations,
            } => (basis, rows, iterations),
            PhaseOne::Infeasible => return Ok(Outcome::Infeasible),
            PhaseOne::Unbounded(ray) => return Ok(Outcome::Unbounded(ray)),
        };

        let mut reduced = program.clone();
        let dropped_rows: Vec<usize> = (0..program.rows.len()).filter(|r| !rows.contains(r)).collect();
        for &row in dropped_rows.iter().rev() {
            reduced.remove_row(row);
        }

        let mut basis = basis;
        match self.run(&reduced, &mut basis, Phase::Two)? {
            Run::Optimal { values, iterations } => {
                debug!("phase 2 optimal after {} iterations", iterations);
                let objective_value = objective_value(problem, &basis, &values);
                Ok(Outcome::Optimal(BasicSolution {
                    basis,
                    values,
                    objective_value,
                    dropped_rows,
                    iterations: Iterations {
                        phase_one,
                        phase_two: iterations,
                    },
                }))
            }
            Run::Unbounded { entering, direction } => {
                debug!("phase 2 unbounded along column {}", entering);
                Ok(Outcome::Unbounded(UnboundedRay {
                    phase: Phase::Two,
                    entering,
                    basis,
                    direction,
                }))
            }
        }
    }

    /// Finds a feasible basis of the original columns, or proves there is none.
    ///
    /// On success the returned basis indexes the original columns and `rows`
    /// lists the original rows that remain; rows proven redundant are left out.
    fn phase1(&self, program: &Program) -> Result<PhaseOne, SolveError> {
        let m = program.rows.len();
        let mut aux = program.auxiliary();
        let mut basis: Vec<usize> = (0..m).collect();

        let (values, iterations) = match self.run(&aux, &mut basis, Phase::One)? {
            Run::Optimal { values, iterations } => (values, iterations),
            Run::Unbounded { entering, direction } => {
                return Ok(PhaseOne::Unbounded(UnboundedRay {
                    phase: Phase::One,
                    entering,
                    basis,
                    direction,
                }));
            }
        };

        let infeasibility: f64 = values[..m].iter().sum();
        let scale = 1.0 + program.rhs.iter().fold(0.0_f64, |acc, b| acc.max(b.abs()));
        if infeasibility > self.tolerance * scale {
            debug!("phase 1 ended with infeasibility {:e}", infeasibility);
            return Ok(PhaseOne::Infeasible);
        }
        debug!("phase 1 feasible after {} iterations", iterations);

        // Artificial columns still basic (at zero) are pivoted out on an
        // original column, or their row is dropped as linearly dependent.
        let mut rows: Vec<usize> = (0..m).collect();
        while let Some(position) = basis.iter().position(|&j| j < m) {
            let inverse = invert(&aux.basis_matrix(&basis));
            debug_assert!(inverse.is_some(), "singular basis {:?} while removing artificial columns", basis);
            let inverse = inverse.ok_or_else(|| {
                error!("singular basis while removing artificial columns");
                SolveError::SingularBasis {
                    phase: Phase::One,
                    iteration: iterations,
                }
            })?;
            let replacement = (m..aux.num_columns())
                .filter(|j| !basis.contains(j))
                .find(|&j| aux.column_dot(&inverse[position], j).abs() > self.tolerance);

            match replacement {
                Some(j) => {
                    trace!("artificial {} leaves for column {}", basis[position], j - m);
                    basis[position] = j;
                }
                None => {
                    let artificial = basis[position];
                    let Some(row) = rows.iter().position(|&r| r == artificial) else {
                        unreachable!("basic artificial {} has no remaining row", artificial);
                    };
                    warn!("constraint row {} is redundant and is dropped", artificial);
                    aux.remove_row(row);
                    rows.remove(row);
                    basis.remove(position);
                }
            }
        }

        Ok(PhaseOne::Feasible {
            basis: basis.into_iter().map(|j| j - m).collect(),
            rows,
            iterations,
        })
    }

    /// Repeats the core iteration from `basis` until optimal or unbounded
    fn run(&self, program: &Program, basis: &mut Vec<usize>, phase: Phase) -> Result<Run, SolveError> {
        // The basis reached after the last allowed pivot is still priced
        for iteration in 0..=self.max_iterations {
            let iterate = self.iterate(program, basis, phase, iteration)?;
            match iterate.decision {
                Decision::Optimal => {
                    let mut values = vec![0.0; program.num_columns()];
                    for (&j, &value) in basis.iter().zip(&iterate.values) {
                        values[j] = if value <= 0.0 { 0.0 } else { value };
                    }
                    return Ok(Run::Optimal { values, iterations: iteration });
                }
                Decision::Unbounded { entering, direction } => {
                    return Ok(Run::Unbounded { entering, direction });
                }
                Decision::Pivot { .. } if iteration == self.max_iterations => break,
                Decision::Pivot { entering, row } => {
                    trace!(
                        "phase {} iteration {}: column {} enters, column {} leaves",
                        phase,
                        iteration,
                        entering,
                        basis[row]
                    );
                    basis[row] = entering;
                }
            }
        }

        warn!("phase {} hit the iteration limit of {}", phase, self.max_iterations);
        Err(SolveError::IterationLimit {
            phase,
            iterations: self.max_iterations,
        })
    }

    /// One revised simplex iteration: invert the basis, price the non-basic
    /// columns, and pick the pivot.
    fn iterate(&self, program: &Program, basis: &[usize], phase: Phase, iteration: usize) -> Result<Iterate, SolveError> {
        let inverse = invert(&program.basis_matrix(basis));
        debug_assert!(inverse.is_some(), "basis {:?} is singular in phase {}", basis, phase);
        let inverse = inverse.ok_or_else(|| {
            error!("basis {:?} is singular in phase {}", basis, phase);
            SolveError::SingularBasis { phase, iteration }
        })?;

        let values = mul_vec(&inverse, &program.rhs);
        let basic_costs: Vec<f64> = basis.iter().map(|&j| program.costs[j]).collect();
        let prices = vec_mul(&basic_costs, &inverse);

        let mut is_basic = vec![false; program.num_columns()];
        for &j in basis {
            is_basic[j] = true;
        }
        let reduced_costs: Vec<(usize, f64)> = (0..program.num_columns())
            .filter(|&j| !is_basic[j])
            .map(|j| (j, program.costs[j] - program.column_dot(&prices, j)))
            .collect();

        let Some(entering) = self.find_entering(&reduced_costs) else {
            return Ok(Iterate {
                values,
                reduced_costs,
                decision: Decision::Optimal,
            });
        };

        let direction = mul_vec(&inverse, &program.column(entering));
        let decision = match self.find_leaving(&values, &direction, basis) {
            Some(row) => Decision::Pivot { entering, row },
            None => Decision::Unbounded { entering, direction },
        };

        Ok(Iterate {
            values,
            reduced_costs,
            decision,
        })
    }

    fn find_entering(&self, reduced_costs: &[(usize, f64)]) -> Option<usize> {
        let mut candidates = reduced_costs.iter().filter(|(_, rc)| *rc < -self.tolerance);
        match self.pricing {
            PricingRule::Bland => candidates.next().map(|&(j, _)| j),
            PricingRule::Dantzig => candidates
                .fold(None, |best: Option<(usize, f64)>, &(j, rc)| match best {
                    Some((_, min)) if min <= rc => best,
                    _ => Some((j, rc)),
                })
                .map(|(j, _)| j),
        }
    }

    /// Minimum ratio test. Ties go to the lowest row, or under Bland's rule
    /// to the lowest basic column.
    fn find_leaving(&self, values: &[f64], direction: &[f64], basis: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, (&w, &b)) in direction.iter().zip(values).enumerate() {
            if w <= self.tolerance {
                continue;
            }
            let ratio = b.max(0.0) / w;
            best = match best {
                None => Some((i, ratio)),
                Some((_, min)) if ratio < min => Some((i, ratio)),
                Some((row, min)) if ratio == min && self.pricing == PricingRule::Bland && basis[i] < basis[row] => {
                    Some((i, ratio))
                }
                keep => keep,
            };
        }
        best.map(|(row, _)| row)
    }
}

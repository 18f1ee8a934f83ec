//! Rewrites a general linear program into standard form: minimize, equality
//! rows only, non-negative right-hand sides, every variable in `[0, +inf)`.
//!
//! The input problem is never modified. The returned [`StandardForm`] keeps
//! enough bookkeeping to translate a standard-form assignment back into
//! values of the original variables.

use log::debug;
use thiserror::Error;

use crate::problem::{Bounds, Constraint, Goal, LpProblem, ProblemError, Sense};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Variable {variable} has unsupported bounds [{lower}, {upper}]")]
    MalformedBounds { variable: String, lower: f64, upper: f64 },
    #[error(transparent)]
    Problem(#[from] ProblemError),
}

/// Where a column of the standard-form problem came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Column {
    /// Contributes `scale * value` to original variable `variable`.
    Structural { variable: usize, scale: f64 },
    /// Slack of a `<=` row.
    Slack { row: usize },
    /// Surplus of a `>=` row.
    Surplus { row: usize },
}

/// A standard-form problem together with the mapping back to the problem it
/// was derived from.
#[derive(Debug, Clone)]
pub struct StandardForm {
    pub problem: LpProblem,
    /// The objective was negated to turn a maximization into a minimization.
    pub negated: bool,
    /// Origin of each standard-form column.
    pub columns: Vec<Column>,
    /// Constant added to each original variable (from lower-bound shifting).
    pub offsets: Vec<f64>,
    original_costs: Vec<f64>,
}

impl StandardForm {
    /// Values of the original variables for a standard-form assignment.
    pub fn recover(&self, values: &[f64]) -> Vec<f64> {
        let mut x = self.offsets.clone();
        for (column, value) in self.columns.iter().zip(values) {
            if let Column::Structural { variable, scale } = column {
                x[*variable] += scale * value;
            }
        }
        x
    }

    /// Objective of the original problem, in its original sense, at `x`.
    pub fn original_objective(&self, x: &[f64]) -> f64 {
        self.original_costs.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// Number of structural columns plus slack/surplus columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// How a single variable is brought to `[0, +inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Elimination {
    Keep,
    /// `x = x' - x''`
    Split,
    /// `x = offset + scale * x'`, optionally followed by `x' <= upper`.
    Substitute { offset: f64, scale: f64, upper: Option<f64> },
    /// `x >= lower` (when positive) and `x <= upper` as explicit rows.
    Rows { lower: Option<f64>, upper: f64 },
}

fn classify(bounds: Bounds) -> Option<Elimination> {
    let Bounds { lower, upper } = bounds;
    if lower.is_nan() || upper.is_nan() || lower == f64::INFINITY || upper == f64::NEG_INFINITY || lower > upper {
        return None;
    }
    let elimination = match (lower.is_finite(), upper.is_finite()) {
        (false, false) => Elimination::Split,
        (true, false) if lower == 0.0 => Elimination::Keep,
        (true, false) => Elimination::Substitute {
            offset: lower,
            scale: 1.0,
            upper: None,
        },
        (true, true) if lower == 0.0 => Elimination::Rows { lower: None, upper },
        (true, true) if lower > 0.0 => Elimination::Rows {
            lower: Some(lower),
            upper,
        },
        (true, true) => Elimination::Substitute {
            offset: lower,
            scale: 1.0,
            upper: Some(upper - lower),
        },
        // x = upper - x' with x' >= 0
        (false, true) => Elimination::Substitute {
            offset: upper,
            scale: -1.0,
            upper: None,
        },
    };
    Some(elimination)
}

/// A row added during bound elimination: `column <sense> rhs`.
struct BoundRow {
    name: String,
    column: usize,
    sense: Sense,
    rhs: f64,
}

/// Produces an equivalent standard-form problem.
///
/// Steps, in order: maximization is negated into minimization, variable
/// bounds are eliminated by splitting, shifting and extra rows, rows with a
/// negative right-hand side are negated, and every inequality row receives a
/// slack (`<=`) or surplus (`>=`) column.
pub fn normalize(problem: &LpProblem) -> Result<StandardForm, NormalizeError> {
    problem.validate()?;

    let negated = problem.objective.goal == Goal::Maximize;
    let costs: Vec<f64> = if negated {
        problem.objective.coefficients.iter().map(|c| -c).collect()
    } else {
        problem.objective.coefficients.clone()
    };

    let mut out = LpProblem {
        variables: Vec::new(),
        objective: crate::problem::Objective {
            coefficients: Vec::new(),
            goal: Goal::Minimize,
        },
        constraints: problem
            .constraints
            .iter()
            .map(|c| Constraint {
                name: c.name.clone(),
                coefficients: Vec::with_capacity(c.coefficients.len()),
                sense: c.sense,
                rhs: c.rhs,
            })
            .collect(),
        bounds: Vec::new(),
    };
    let mut columns = Vec::with_capacity(problem.num_variables());
    let mut offsets = vec![0.0; problem.num_variables()];
    let mut bound_rows = Vec::new();

    for (i, name) in problem.variables.iter().enumerate() {
        let bounds = problem.bounds[i];
        let elimination = classify(bounds).ok_or_else(|| NormalizeError::MalformedBounds {
            variable: name.clone(),
            lower: bounds.lower,
            upper: bounds.upper,
        })?;
        let cost = costs[i];

        match elimination {
            Elimination::Keep => {
                push_column(&mut out, problem, i, name.clone(), cost, 1.0);
                columns.push(Column::Structural { variable: i, scale: 1.0 });
            }
            Elimination::Split => {
                push_column(&mut out, problem, i, format!("{}'", name), cost, 1.0);
                columns.push(Column::Structural { variable: i, scale: 1.0 });
                push_column(&mut out, problem, i, format!("{}''", name), cost, -1.0);
                columns.push(Column::Structural { variable: i, scale: -1.0 });
            }
            Elimination::Substitute { offset, scale, upper } => {
                for (row, c) in out.constraints.iter_mut().zip(&problem.constraints) {
                    let a = c.coefficients[i];
                    if a != 0.0 {
                        row.rhs -= a * offset;
                    }
                }
                offsets[i] = offset;
                let column = out.num_variables();
                push_column(&mut out, problem, i, name.clone(), cost, scale);
                columns.push(Column::Structural { variable: i, scale });
                if let Some(upper) = upper {
                    bound_rows.push(BoundRow {
                        name: format!("{}_upper", name),
                        column,
                        sense: Sense::Le,
                        rhs: upper,
                    });
                }
            }
            Elimination::Rows { lower, upper } => {
                let column = out.num_variables();
                push_column(&mut out, problem, i, name.clone(), cost, 1.0);
                columns.push(Column::Structural { variable: i, scale: 1.0 });
                if let Some(lower) = lower {
                    bound_rows.push(BoundRow {
                        name: format!("{}_lower", name),
                        column,
                        sense: Sense::Ge,
                        rhs: lower,
                    });
                }
                bound_rows.push(BoundRow {
                    name: format!("{}_upper", name),
                    column,
                    sense: Sense::Le,
                    rhs: upper,
                });
            }
        }
    }

    let added_rows = bound_rows.len();
    for row in bound_rows {
        let mut coefficients = vec![0.0; out.num_variables()];
        coefficients[row.column] = 1.0;
        out.add_constraint(row.name, coefficients, row.sense, row.rhs);
    }

    let mut flipped = 0;
    for c in &mut out.constraints {
        if c.rhs < 0.0 {
            c.rhs = -c.rhs;
            for a in &mut c.coefficients {
                *a = -*a;
            }
            c.sense = c.sense.flipped();
            flipped += 1;
        }
    }

    for row in 0..out.num_constraints() {
        let (name, sign, column) = match out.constraints[row].sense {
            Sense::Eq => continue,
            Sense::Le => (format!("s_{}", out.constraints[row].name), 1.0, Column::Slack { row }),
            Sense::Ge => (format!("e_{}", out.constraints[row].name), -1.0, Column::Surplus { row }),
        };
        let j = out.add_variable(name, 0.0, Bounds::NON_NEGATIVE);
        out.constraints[row].coefficients[j] = sign;
        out.constraints[row].sense = Sense::Eq;
        columns.push(column);
    }

    debug!(
        "normalized {}x{} problem to {}x{} ({} bound rows, {} rows negated)",
        problem.num_constraints(),
        problem.num_variables(),
        out.num_constraints(),
        out.num_variables(),
        added_rows,
        flipped
    );

    Ok(StandardForm {
        problem: out,
        negated,
        columns,
        offsets,
        original_costs: problem.objective.coefficients.clone(),
    })
}

/// Appends original column `i` multiplied by `scale`, with cost `cost * scale`.
fn push_column(out: &mut LpProblem, problem: &LpProblem, i: usize, name: String, cost: f64, scale: f64) {
    out.variables.push(name);
    out.objective.coefficients.push(cost * scale);
    out.bounds.push(Bounds::NON_NEGATIVE);
    for (row, c) in out.constraints.iter_mut().zip(&problem.constraints) {
        row.coefficients.push(c.coefficients[i] * scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("x{}", i)).collect()
    }

    #[test]
    fn test_standard_form_is_unchanged() {
        let mut problem = LpProblem::new(names(3));
        problem.set_objective(vec![1.0, -2.0, 0.5], Goal::Minimize);
        problem.add_constraint("a", vec![1.0, 1.0, 0.0], Sense::Eq, 4.0);
        problem.add_constraint("b", vec![0.0, 2.0, -1.0], Sense::Eq, 0.0);
        assert!(problem.is_standard_form());

        let standard = normalize(&problem).unwrap();

        assert_eq!(standard.problem, problem);
        assert!(!standard.negated);
        assert_eq!(standard.offsets, vec![0.0; 3]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut problem = LpProblem::new(names(2));
        problem.set_objective(vec![2.0, 3.0], Goal::Maximize);
        problem.add_constraint("sum", vec![1.0, 1.0], Sense::Le, 4.0);
        problem.add_constraint("neg", vec![1.0, -1.0], Sense::Ge, -1.0);
        problem.set_bounds(1, Bounds::FREE);

        let once = normalize(&problem).unwrap();
        let twice = normalize(&once.problem).unwrap();

        assert!(once.problem.is_standard_form());
        assert_eq!(twice.problem, once.problem);
    }

    #[test]
    fn test_maximize_is_negated() {
        let mut problem = LpProblem::new(names(2));
        problem.set_objective(vec![2.0, -3.0], Goal::Maximize);

        let standard = normalize(&problem).unwrap();

        assert!(standard.negated);
        assert_eq!(standard.problem.objective.goal, Goal::Minimize);
        assert_eq!(standard.problem.objective.coefficients, vec![-2.0, 3.0]);

        // negating a second time restores the original coefficients
        let mut back = standard.problem.clone();
        back.objective.goal = Goal::Maximize;
        let again = normalize(&back).unwrap();
        assert_eq!(again.problem.objective.coefficients, vec![2.0, -3.0]);
    }

    #[test]
    fn test_free_variable_is_split_in_place() {
        let mut problem = LpProblem::new(names(2));
        problem.set_objective(vec![1.0, 4.0], Goal::Minimize);
        problem.add_constraint("c", vec![3.0, 1.0], Sense::Eq, 5.0);
        problem.set_bounds(0, Bounds::FREE);

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        assert_eq!(p.variables, vec!["x1'", "x1''", "x2"]);
        assert_eq!(p.objective.coefficients, vec![1.0, -1.0, 4.0]);
        assert_eq!(p.constraints[0].coefficients, vec![3.0, -3.0, 1.0]);
        assert_eq!(standard.recover(&[2.0, 5.0, 1.0]), vec![-3.0, 1.0]);
    }

    #[test]
    fn test_lower_bound_shifts_rhs() {
        let mut problem = LpProblem::new(names(2));
        problem.set_objective(vec![1.0, 1.0], Goal::Minimize);
        problem.add_constraint("c", vec![2.0, 1.0], Sense::Eq, 10.0);
        problem.set_bounds(0, Bounds::new(3.0, f64::INFINITY));

        let standard = normalize(&problem).unwrap();

        assert_eq!(standard.problem.num_constraints(), 1);
        assert_abs_diff_eq!(standard.problem.constraints[0].rhs, 4.0);
        assert_eq!(standard.offsets, vec![3.0, 0.0]);
        assert_eq!(standard.recover(&[1.0, 2.0]), vec![4.0, 2.0]);
    }

    #[test]
    fn test_negative_lower_bound_with_zero_upper() {
        let mut problem = LpProblem::new(names(1));
        problem.add_constraint("c", vec![1.0], Sense::Le, 10.0);
        problem.set_bounds(0, Bounds::new(-4.0, 0.0));

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        // c: x' <= 14, x1_upper: x' <= 4, one slack each
        assert_eq!(p.num_constraints(), 2);
        assert_abs_diff_eq!(p.constraints[0].rhs, 14.0);
        assert_eq!(p.constraints[1].name, "x1_upper");
        assert_abs_diff_eq!(p.constraints[1].rhs, 4.0);
        assert_eq!(p.variables, vec!["x1", "s_c", "s_x1_upper"]);
        assert!(p.is_standard_form());
    }

    #[test]
    fn test_straddling_bounds() {
        let mut problem = LpProblem::new(names(1));
        problem.set_bounds(0, Bounds::new(-2.0, 3.0));

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        assert_eq!(p.num_constraints(), 1);
        assert_abs_diff_eq!(p.constraints[0].rhs, 5.0);
        assert_eq!(standard.recover(&[5.0, 0.0]), vec![3.0]);
    }

    #[test]
    fn test_upper_only_bound_is_mirrored() {
        let mut problem = LpProblem::new(names(1));
        problem.set_objective(vec![2.0], Goal::Minimize);
        problem.add_constraint("c", vec![1.0], Sense::Ge, -10.0);
        problem.set_bounds(0, Bounds::new(f64::NEG_INFINITY, 4.0));

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        // x = 4 - x'; c: -x' >= -14 becomes x' <= 14
        assert_eq!(p.objective.coefficients[0], -2.0);
        assert_eq!(p.constraints[0].coefficients, vec![1.0, 1.0]);
        assert_abs_diff_eq!(p.constraints[0].rhs, 14.0);
        assert_eq!(standard.recover(&[14.0, 0.0]), vec![-10.0]);
    }

    #[test]
    fn test_finite_bounds_add_one_row_per_bound() {
        let mut problem = LpProblem::new(names(3));
        problem.add_constraint("c", vec![1.0, 1.0, 1.0], Sense::Le, 20.0);
        problem.set_bounds(0, Bounds::new(0.0, 5.0));
        problem.set_bounds(1, Bounds::new(1.0, 6.0));
        problem.set_bounds(2, Bounds::fixed(2.0));

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        // one row for x1, two each for x2 and x3
        assert_eq!(p.num_constraints(), 1 + 5);
        let row_names: Vec<&str> = p.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(row_names, vec!["c", "x1_upper", "x2_lower", "x2_upper", "x3_lower", "x3_upper"]);
        assert!(p.bounds.iter().all(Bounds::is_non_negative));
        assert!(p.is_standard_form());
    }

    #[test]
    fn test_negative_rhs_flips_row() {
        let mut problem = LpProblem::new(names(2));
        problem.add_constraint("le", vec![1.0, -2.0], Sense::Le, -3.0);
        problem.add_constraint("eq", vec![1.0, 1.0], Sense::Eq, -1.0);

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        // le became ">= 3", so it receives a surplus column
        assert_eq!(p.constraints[0].coefficients, vec![-1.0, 2.0, -1.0]);
        assert_eq!(p.constraints[0].rhs, 3.0);
        assert_eq!(p.constraints[1].coefficients, vec![-1.0, -1.0, 0.0]);
        assert_eq!(p.constraints[1].rhs, 1.0);
        assert_eq!(standard.columns[2], Column::Surplus { row: 0 });
    }

    #[test]
    fn test_slack_and_surplus_columns() {
        let mut problem = LpProblem::new(names(1));
        problem.add_constraint("hi", vec![1.0], Sense::Le, 4.0);
        problem.add_constraint("lo", vec![1.0], Sense::Ge, 1.0);
        problem.add_constraint("fix", vec![1.0], Sense::Eq, 2.0);

        let standard = normalize(&problem).unwrap();
        let p = &standard.problem;

        assert_eq!(p.variables, vec!["x1", "s_hi", "e_lo"]);
        assert_eq!(p.constraints[0].coefficients, vec![1.0, 1.0, 0.0]);
        assert_eq!(p.constraints[1].coefficients, vec![1.0, 0.0, -1.0]);
        assert_eq!(p.constraints[2].coefficients, vec![1.0, 0.0, 0.0]);
        assert!(p.constraints.iter().all(|c| c.sense == Sense::Eq));
    }

    #[test]
    fn test_malformed_bounds() {
        let mut problem = LpProblem::new(names(2));
        problem.set_bounds(1, Bounds::new(5.0, 1.0));

        let err = normalize(&problem).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MalformedBounds {
                variable: "x2".to_string(),
                lower: 5.0,
                upper: 1.0,
            }
        );

        problem.set_bounds(1, Bounds::new(f64::INFINITY, f64::INFINITY));
        assert!(matches!(normalize(&problem), Err(NormalizeError::MalformedBounds { .. })));
    }

    #[test]
    fn test_ragged_problem_is_rejected() {
        let mut problem = LpProblem::new(names(2));
        problem.add_constraint("c", vec![1.0], Sense::Le, 1.0);
        assert!(matches!(normalize(&problem), Err(NormalizeError::Problem(_))));
    }
}

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Objective has {found} coefficients but the problem has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {name} has {found} coefficients but the problem has {expected} variables")]
    RowLength {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Problem has {found} bounds but {expected} variables")]
    BoundsLength { expected: usize, found: usize },
}

/// Represents a linear programming problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Objective function coefficients (costs)
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
    /// Lower and upper bound of each variable
    pub bounds: Vec<Bounds>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub goal: Goal,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Minimize,
    Maximize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub sense: Sense,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Less than or equal (<=)
    Le,
    /// Equal (=)
    Eq,
    /// Greater than or equal (>=)
    Ge,
}

impl Sense {
    /// The sense obtained by multiplying both sides of the row by -1.
    pub fn flipped(self) -> Self {
        match self {
            Sense::Le => Sense::Ge,
            Sense::Eq => Sense::Eq,
            Sense::Ge => Sense::Le,
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Eq => "=",
            Sense::Ge => ">=",
        })
    }
}

/// Bounds of a single variable; either side may be infinite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const NON_NEGATIVE: Bounds = Bounds {
        lower: 0.0,
        upper: f64::INFINITY,
    };

    pub const FREE: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// True for exactly `[0, +inf)`.
    pub fn is_non_negative(&self) -> bool {
        self.lower == 0.0 && self.upper == f64::INFINITY
    }

    pub fn is_free(&self) -> bool {
        self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::NON_NEGATIVE
    }
}

impl LpProblem {
    /// Creates a minimization problem with a zero objective, no constraints,
    /// and every variable bounded to `[0, +inf)`.
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            objective: Objective {
                coefficients: vec![0.0; n],
                goal: Goal::Minimize,
            },
            constraints: Vec::new(),
            bounds: vec![Bounds::NON_NEGATIVE; n],
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, goal: Goal) {
        self.objective = Objective { coefficients, goal };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            sense,
            rhs,
        });
    }

    pub fn set_bounds(&mut self, variable: usize, bounds: Bounds) {
        self.bounds[variable] = bounds;
    }

    /// Appends a column with the given cost and bounds. Every existing row
    /// receives a zero coefficient so the matrix stays rectangular.
    pub fn add_variable(&mut self, name: impl Into<String>, cost: f64, bounds: Bounds) -> usize {
        self.variables.push(name.into());
        self.objective.coefficients.push(cost);
        self.bounds.push(bounds);
        for constraint in &mut self.constraints {
            constraint.coefficients.push(0.0);
        }
        self.variables.len() - 1
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Coefficients of column `j` across all rows.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.constraints.iter().map(|c| c.coefficients[j]).collect()
    }

    pub fn rhs(&self) -> Vec<f64> {
        self.constraints.iter().map(|c| c.rhs).collect()
    }

    /// Checks that every vector parallel to the columns has one entry per variable.
    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        if self.bounds.len() != n {
            return Err(ProblemError::BoundsLength {
                expected: n,
                found: self.bounds.len(),
            });
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(ProblemError::RowLength {
                    name: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
        }
        Ok(())
    }

    /// Minimize, equality rows only, non-negative right-hand sides and
    /// every variable in `[0, +inf)`.
    pub fn is_standard_form(&self) -> bool {
        self.objective.goal == Goal::Minimize
            && self.constraints.iter().all(|c| c.sense == Sense::Eq && c.rhs >= 0.0)
            && self.bounds.iter().all(Bounds::is_non_negative)
    }
}

impl fmt::Display for LpProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let goal = match self.objective.goal {
            Goal::Minimize => "minimize",
            Goal::Maximize => "maximize",
        };
        writeln!(f, "{}", goal)?;
        writeln!(f, "  {}", format_row(&self.objective.coefficients, &self.variables))?;
        writeln!(f, "subject to")?;
        for c in &self.constraints {
            writeln!(
                f,
                "  {}: {} {} {}",
                c.name,
                format_row(&c.coefficients, &self.variables),
                c.sense,
                c.rhs
            )?;
        }
        let bounded: Vec<_> = self
            .variables
            .iter()
            .zip(&self.bounds)
            .filter(|(_, b)| !b.is_non_negative())
            .collect();
        if !bounded.is_empty() {
            writeln!(f, "bounds")?;
            for (name, b) in bounded {
                if b.is_free() {
                    writeln!(f, "  {} free", name)?;
                } else {
                    writeln!(f, "  {} <= {} <= {}", b.lower, name, b.upper)?;
                }
            }
        }
        write!(f, "end")
    }
}

fn format_row(coefficients: &[f64], names: &[String]) -> String {
    let mut out = String::new();
    for (coef, name) in coefficients.iter().zip(names) {
        if *coef == 0.0 {
            continue;
        }
        if out.is_empty() {
            if *coef < 0.0 {
                out.push_str("- ");
            }
        } else if *coef < 0.0 {
            out.push_str(" - ");
        } else {
            out.push_str(" + ");
        }
        let abs = coef.abs();
        if abs != 1.0 {
            out.push_str(&format!("{} ", abs));
        }
        out.push_str(name);
    }
    if out.is_empty() {
        out.push('0');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_variable_keeps_rows_rectangular() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.add_constraint("sum", vec![1.0, 1.0], Sense::Le, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], Sense::Le, 3.0);

        let s = problem.add_variable("s", 0.0, Bounds::NON_NEGATIVE);

        assert_eq!(s, 2);
        assert_eq!(problem.num_variables(), 3);
        assert!(problem.constraints.iter().all(|c| c.coefficients.len() == 3));
        assert_eq!(problem.objective.coefficients, vec![0.0, 0.0, 0.0]);
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_ragged_row() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.add_constraint("short", vec![1.0], Sense::Le, 4.0);

        assert_eq!(
            problem.validate(),
            Err(ProblemError::RowLength {
                name: "short".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_standard_form_predicate() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.add_constraint("row", vec![1.0], Sense::Eq, 2.0);
        assert!(problem.is_standard_form());

        problem.constraints[0].rhs = -2.0;
        assert!(!problem.is_standard_form());
        problem.constraints[0].rhs = 2.0;

        problem.set_bounds(0, Bounds::FREE);
        assert!(!problem.is_standard_form());
        problem.set_bounds(0, Bounds::NON_NEGATIVE);

        problem.objective.goal = Goal::Maximize;
        assert!(!problem.is_standard_form());
    }

    #[test]
    fn test_display() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![2.0, -1.0], Goal::Maximize);
        problem.add_constraint("c0", vec![1.0, 3.0], Sense::Ge, 1.5);
        problem.set_bounds(1, Bounds::FREE);

        let text = problem.to_string();
        assert_eq!(
            text,
            "maximize\n  2 x - y\nsubject to\n  c0: x + 3 y >= 1.5\nbounds\n  y free\nend"
        );
    }
}

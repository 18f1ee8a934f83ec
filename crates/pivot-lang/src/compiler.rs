use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use pivot_solver::{Bounds, Goal, LpProblem, Sense};
use thiserror::Error;

use crate::ast::*;
use crate::parser::{ParseError, Parser};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("line {line}: duplicate constraint name '{name}'")]
    DuplicateConstraint { name: String, line: usize },
    #[error("line {line}: unknown variable '{name}' in bounds")]
    UnknownVariable { name: String, line: usize },
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

impl CompileError {
    /// Line the error was reported on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::DuplicateConstraint { line, .. } | CompileError::UnknownVariable { line, .. } => Some(*line),
            CompileError::ParseError(err) => err.line(),
            CompileError::IoError(_) => None,
        }
    }
}

/// An LP file turned into a solver problem
#[derive(Debug, Clone)]
pub struct CompiledModel {
    /// Name of the objective row, `obj` unless the file names it
    pub objective_name: String,
    pub problem: LpProblem,
}

/// Builds an [`LpProblem`] from a parsed LP file.
///
/// Variables are numbered in order of first appearance, objective first and
/// then the constraints top to bottom. Unnamed constraints are called `c<n>`
/// after their 0-based position.
#[derive(Debug, Default)]
pub struct Compiler {
    variables: Vec<String>,
    index: HashMap<String, usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads, parses and compiles an LP file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<CompiledModel, CompileError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| CompileError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::compile_source(&source)
    }

    pub fn compile_source(source: &str) -> Result<CompiledModel, CompileError> {
        let file = Parser::parse(source)?;
        Compiler::new().compile(&file)
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.variables.len();
        self.variables.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }

    /// Dense coefficient row, summing repeated variables.
    fn row(&self, terms: &[Term]) -> Vec<f64> {
        let mut row = vec![0.0; self.variables.len()];
        for term in terms {
            row[self.index[&term.variable]] += term.coefficient;
        }
        row
    }

    pub fn compile(mut self, file: &LpFile) -> Result<CompiledModel, CompileError> {
        let all_terms = file
            .objective
            .terms
            .iter()
            .chain(file.constraints.iter().flat_map(|c| c.terms.iter()));
        for term in all_terms {
            self.intern(&term.variable);
        }

        let mut problem = LpProblem::new(self.variables.clone());
        let goal = match file.objective.direction {
            Direction::Maximize => Goal::Maximize,
            Direction::Minimize => Goal::Minimize,
        };
        problem.set_objective(self.row(&file.objective.terms), goal);

        let mut names = HashSet::new();
        for (i, constraint) in file.constraints.iter().enumerate() {
            let name = constraint.name.clone().unwrap_or_else(|| format!("c{i}"));
            if !names.insert(name.clone()) {
                return Err(CompileError::DuplicateConstraint {
                    name,
                    line: constraint.line,
                });
            }
            let sense = match constraint.relation {
                Relation::Le => Sense::Le,
                Relation::Eq => Sense::Eq,
                Relation::Ge => Sense::Ge,
            };
            problem.add_constraint(name, self.row(&constraint.terms), sense, constraint.rhs);
        }

        for bound in &file.bounds {
            let Some(&i) = self.index.get(&bound.variable) else {
                return Err(CompileError::UnknownVariable {
                    name: bound.variable.clone(),
                    line: bound.line,
                });
            };
            let current = problem.bounds[i];
            let bounds = match bound.kind {
                BoundKind::Lower(lower) => Bounds::new(lower, current.upper),
                BoundKind::Upper(upper) => Bounds::new(current.lower, upper),
                BoundKind::Range { lower, upper } => Bounds::new(lower, upper),
                BoundKind::Fixed(value) => Bounds::fixed(value),
                BoundKind::Free => Bounds::FREE,
            };
            problem.set_bounds(i, bounds);
        }

        debug!(
            "compiled {} variables, {} constraints, {} bounds",
            problem.num_variables(),
            problem.num_constraints(),
            file.bounds.len()
        );

        Ok(CompiledModel {
            objective_name: file.objective.name.clone().unwrap_or_else(|| "obj".to_string()),
            problem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pivot_solver::{normalize, SolutionStatus, Solver};

    fn compile(source: &str) -> CompiledModel {
        Compiler::compile_source(source).unwrap()
    }

    #[test]
    fn test_variable_order_and_default_names() {
        let model = compile("max 2 y\nst\n x + y <= 4\n named: z - x >= 1\n y <= 3\nend");
        assert_eq!(model.objective_name, "obj");
        assert_eq!(model.problem.variables, vec!["y", "x", "z"]);
        assert_eq!(model.problem.objective.coefficients, vec![2.0, 0.0, 0.0]);
        let names: Vec<_> = model.problem.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c0", "named", "c2"]);
        assert_eq!(model.problem.constraints[1].coefficients, vec![0.0, -1.0, 1.0]);
        assert_eq!(model.problem.constraints[1].sense, Sense::Ge);
    }

    #[test]
    fn test_repeated_variables_are_summed() {
        let model = compile("min x + 2 x\nst\n x - 3 x + y = 2\nend");
        assert_eq!(model.problem.objective.coefficients, vec![3.0, 0.0]);
        assert_eq!(model.problem.constraints[0].coefficients, vec![-2.0, 1.0]);
    }

    #[test]
    fn test_bounds_applied() {
        let model = compile(
            "min profit: a + b + c + d + e\nbounds\n a <= 10\n b >= -5\n b <= 7\n c free\n d = 2\n -3 <= e <= 4\nend",
        );
        assert_eq!(model.objective_name, "profit");
        let bounds = &model.problem.bounds;
        assert_eq!(bounds[0], Bounds::new(0.0, 10.0));
        assert_eq!(bounds[1], Bounds::new(-5.0, 7.0));
        assert_eq!(bounds[2], Bounds::FREE);
        assert_eq!(bounds[3], Bounds::fixed(2.0));
        assert_eq!(bounds[4], Bounds::new(-3.0, 4.0));
    }

    #[test]
    fn test_duplicate_constraint_name() {
        let err = Compiler::compile_source("max x\nst\n row: x <= 1\n row: x <= 2\nend").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateConstraint { ref name, line: 4 } if name == "row"));
        assert_eq!(err.line(), Some(4));

        // The second row defaults to `c1`, which is already taken
        let err = Compiler::compile_source("max x\nst\n c1: x <= 1\n x <= 2\nend").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateConstraint { ref name, line: 4 } if name == "c1"));
    }

    #[test]
    fn test_unknown_variable_in_bounds() {
        let err = Compiler::compile_source("max x\nbounds\n y <= 1\nend").unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { ref name, line: 3 } if name == "y"));
    }

    #[test]
    fn test_parse_error_passthrough() {
        let err = Compiler::compile_source("max x\nst\n x <=\nend").unwrap_err();
        assert!(matches!(err, CompileError::ParseError(ParseError::IncompleteConstraint { line: 3 })));
    }

    #[test]
    fn test_missing_file() {
        let err = Compiler::load_file("/nonexistent/model.lp").unwrap_err();
        assert!(matches!(err, CompileError::IoError(_)));
    }

    #[test]
    fn test_solve_production_model() {
        let model = compile("max 3 x + 2 y\nst\n x + y <= 4\n x + 3 y <= 6\n x <= 3\nend");
        let solution = Solver::new().solve(&model.problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_relative_eq!(solution.objective_value, 11.0, epsilon = 1e-9);
        assert_relative_eq!(solution.values[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(solution.values[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solve_with_bounds_section() {
        // x free, y in [-1, 2]: minimum of x + y subject to x >= -3 is at (-3, -1)
        let model = compile("min x + y\nst\n x >= -3\nbounds\n x free\n -1 <= y <= 2\nend");
        let solution = Solver::new().solve(&model.problem).unwrap();
        assert!(solution.is_optimal());
        assert_relative_eq!(solution.objective_value, -4.0, epsilon = 1e-9);
        assert_relative_eq!(solution.values[0], -3.0, epsilon = 1e-9);
        assert_relative_eq!(solution.values[1], -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solve_infeasible_and_unbounded() {
        let infeasible = compile("max x\nst\n x <= 1\n x >= 2\nend");
        let solution = Solver::new().solve(&infeasible.problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Infeasible);

        let unbounded = compile("max x + y\nst\n x - y <= 1\nend");
        let solution = Solver::new().solve(&unbounded.problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_upper_bound_becomes_row() {
        let model = compile("max x\nbounds\n x <= 5\nend");
        let standard = normalize(&model.problem).unwrap();
        assert_eq!(standard.problem.num_constraints(), 1);
        assert_eq!(standard.problem.constraints[0].name, "x_upper");
    }
}

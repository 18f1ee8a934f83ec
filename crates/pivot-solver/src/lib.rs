mod linalg;
mod normalize;
mod problem;
mod simplex;
mod solution;

pub use normalize::{normalize, Column, NormalizeError, StandardForm};
pub use problem::{Bounds, Constraint, Goal, LpProblem, Objective, ProblemError, Sense};
pub use simplex::{PricingRule, SolveError, Solver};
pub use solution::{
    objective_value, BasicSolution, Iterations, Outcome, Phase, Solution, SolutionStatus, UnboundedRay,
};

//! WASM bindings for the LP reader and solver
//!
//! JavaScript-friendly entry points for editors and web tooling.

use wasm_bindgen::prelude::*;

use crate::compiler::{CompileError, Compiler};
use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;
use pivot_solver::{SolutionStatus, Solver};

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse an LP file and return the AST as JSON
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsValue> {
    let file = Parser::parse(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&file)
}

/// Token information for JavaScript
#[derive(serde::Serialize)]
struct TokenInfo {
    kind: String,
    text: String,
    line: usize,
    start: usize,
    end: usize,
}

/// Tokenize an LP file, skipping line breaks
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<JsValue, JsValue> {
    let tokens: Vec<TokenInfo> = Lexer::tokenize(source)
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Eof))
        .map(|t| TokenInfo {
            kind: format!("{:?}", t.kind),
            text: t.text,
            line: t.line,
            start: t.span.start,
            end: t.span.end,
        })
        .collect();
    to_js(&tokens)
}

#[derive(serde::Serialize)]
struct Diagnostic {
    start: usize,
    end: usize,
    line: Option<usize>,
    severity: String,
    message: String,
}

/// Byte range of a 1-based line.
fn line_range(source: &str, line: usize) -> (usize, usize) {
    let mut start = 0;
    for (i, text) in source.split('\n').enumerate() {
        let end = start + text.len();
        if i + 1 == line {
            return (start, end);
        }
        start = end + 1;
    }
    (0, source.len())
}

fn diagnostic(source: &str, err: &CompileError) -> Diagnostic {
    let line = err.line();
    let (start, end) = line.map_or((0, source.len()), |l| line_range(source, l));
    Diagnostic {
        start,
        end,
        line,
        severity: "error".to_string(),
        message: err.to_string(),
    }
}

/// Validate an LP file and return diagnostics as JSON
#[wasm_bindgen]
pub fn validate(source: &str) -> JsValue {
    let diagnostics: Vec<Diagnostic> = match Compiler::compile_source(source) {
        Ok(_) => Vec::new(),
        Err(e) => vec![diagnostic(source, &e)],
    };
    serde_wasm_bindgen::to_value(&diagnostics).unwrap_or(JsValue::NULL)
}

#[derive(serde::Serialize)]
struct VariableResult {
    name: String,
    value: f64,
}

#[derive(serde::Serialize)]
struct SolveResult {
    status: String,
    objective_name: String,
    objective_value: Option<f64>,
    variables: Vec<VariableResult>,
    iterations: usize,
}

/// Solve an LP file with default settings and return the result as JSON
#[wasm_bindgen]
pub fn solve(source: &str) -> Result<JsValue, JsValue> {
    let model = Compiler::compile_source(source).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let solution = Solver::new()
        .solve(&model.problem)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let variables = model
        .problem
        .variables
        .iter()
        .zip(&solution.values)
        .map(|(name, &value)| VariableResult {
            name: name.clone(),
            value,
        })
        .collect();

    to_js(&SolveResult {
        status: solution.status.to_string(),
        objective_name: model.objective_name,
        objective_value: (solution.status == SolutionStatus::Optimal).then_some(solution.objective_value),
        variables,
        iterations: solution.iterations.total(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range() {
        let source = "max x\nst\n x <= 1\nend";
        assert_eq!(line_range(source, 1), (0, 5));
        assert_eq!(line_range(source, 3), (9, 16));
        assert_eq!(&source[9..16], " x <= 1");
        assert_eq!(line_range(source, 9), (0, source.len()));
    }

    #[test]
    fn test_diagnostic_points_at_line() {
        let source = "max x\nbounds\n y <= 1\nend";
        let err = Compiler::compile_source(source).unwrap_err();
        let d = diagnostic(source, &err);
        assert_eq!(d.line, Some(3));
        assert_eq!(&source[d.start..d.end], " y <= 1");
    }
}

use crate::lexer::Span;

/// A parsed LP file
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpFile {
    pub objective: ObjectiveDef,
    pub constraints: Vec<ConstraintDef>,
    pub bounds: Vec<BoundDef>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Eq,
    Ge,
}

/// `max` / `min` section
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDef {
    pub name: Option<String>,
    pub direction: Direction,
    pub terms: Vec<Term>,
    pub line: usize,
    pub span: Span,
}

/// `coefficient variable`, sign already folded into the coefficient
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub variable: String,
    pub span: Span,
}

/// One row of the `subject to` section
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDef {
    pub name: Option<String>,
    pub terms: Vec<Term>,
    pub relation: Relation,
    pub rhs: f64,
    /// Line the constraint starts on
    pub line: usize,
    pub span: Span,
}

/// One line of the `bounds` section
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BoundDef {
    pub variable: String,
    pub kind: BoundKind,
    pub line: usize,
    pub span: Span,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum BoundKind {
    /// `x >= l` or `l <= x`
    Lower(f64),
    /// `x <= u` or `u >= x`
    Upper(f64),
    /// `l <= x <= u`
    Range { lower: f64, upper: f64 },
    /// `x = v`
    Fixed(f64),
    /// `x free`
    Free,
}

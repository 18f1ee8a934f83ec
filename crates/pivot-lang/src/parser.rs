use crate::ast::*;
use crate::lexer::{Lexer, Span, Token, TokenKind};
use log::trace;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("line {line}: expected {expected} before end of line")]
    UnexpectedEol { expected: String, line: usize },
    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber { text: String, line: usize },
    #[error("line {line}: invalid character '{text}'")]
    InvalidCharacter { text: String, line: usize },
    #[error("line {line}: invalid name '{text}'")]
    InvalidName { text: String, line: usize },
    #[error("line {line}: names are not allowed in the bounds section")]
    NameInBounds { line: usize },
    #[error("line {line}: incomplete constraint")]
    IncompleteConstraint { line: usize },
    #[error("missing objective: expected 'maximize' or 'minimize'")]
    MissingObjective,
    #[error("line {line}: missing 'end'")]
    MissingEnd { line: usize },
}

impl ParseError {
    /// Line the error was reported on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnexpectedEol { line, .. }
            | ParseError::InvalidNumber { line, .. }
            | ParseError::InvalidCharacter { line, .. }
            | ParseError::InvalidName { line, .. }
            | ParseError::NameInBounds { line }
            | ParseError::IncompleteConstraint { line }
            | ParseError::MissingEnd { line } => Some(*line),
            ParseError::MissingObjective => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Objective,
    Constraints,
    Bounds,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Goal(Direction),
    SubjectTo,
    Bounds,
    End,
}

/// Recognizes a section keyword at the start of a line, returning it with the
/// number of tokens it spans.
fn keyword(line: &[Token]) -> Option<(Keyword, usize)> {
    let first = line.first()?;
    if first.kind != TokenKind::Ident {
        return None;
    }
    let word = first.text.to_ascii_lowercase();
    let found = match word.as_str() {
        "max" | "maximize" | "maximise" | "maximum" => (Keyword::Goal(Direction::Maximize), 1),
        "min" | "minimize" | "minimise" | "minimum" => (Keyword::Goal(Direction::Minimize), 1),
        "s.t." | "st." | "st" => (Keyword::SubjectTo, 1),
        "subject" if line.get(1).is_some_and(|t| t.is_keyword("to")) => (Keyword::SubjectTo, 2),
        "such" if line.get(1).is_some_and(|t| t.is_keyword("that")) => (Keyword::SubjectTo, 2),
        "bounds" | "bound" => (Keyword::Bounds, 1),
        "end" => (Keyword::End, 1),
        _ => return None,
    };
    Some(found)
}

fn is_infinity(token: &Token) -> bool {
    token.is_keyword("inf") || token.is_keyword("infinity")
}

fn parse_number(token: &Token) -> Result<f64, ParseError> {
    token.text.parse().map_err(|_| ParseError::InvalidNumber {
        text: token.text.clone(),
        line: token.line,
    })
}

fn unexpected(token: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        expected: expected.to_string(),
        found: token.text.clone(),
        line: token.line,
    }
}

fn span_of(tokens: &[Token]) -> Span {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => first.span.merge(last.span),
        _ => Span::new(0, 0),
    }
}

/// Splits an optional `name:` prefix off a line.
fn split_name(line: &[Token]) -> Result<(Option<&Token>, &[Token]), ParseError> {
    match line.iter().position(|t| t.kind == TokenKind::Colon) {
        None => Ok((None, line)),
        Some(1) if line[0].kind == TokenKind::Ident => Ok((Some(&line[0]), &line[2..])),
        Some(i) => Err(ParseError::InvalidName {
            text: line[..i].iter().map(|t| t.text.as_str()).collect(),
            line: line[i].line,
        }),
    }
}

/// Parses a linear expression such as `3 x1 - x2 + 0.5e1 y`.
///
/// The first term may omit its sign, every later term needs one. Runs of
/// signs multiply out, so `- - x` is `x`.
fn parse_terms(tokens: &[Token]) -> Result<Vec<Term>, ParseError> {
    let mut terms = Vec::new();
    let mut sign = 1.0;
    let mut signed = true;
    let mut dangling_sign = false;
    let mut coefficient: Option<(f64, Span)> = None;

    for token in tokens {
        match token.kind {
            TokenKind::Plus | TokenKind::Minus if coefficient.is_none() => {
                if token.kind == TokenKind::Minus {
                    sign = -sign;
                }
                signed = true;
                dangling_sign = true;
            }
            TokenKind::Number if signed && coefficient.is_none() => {
                coefficient = Some((parse_number(token)?, token.span));
            }
            TokenKind::Ident if signed => {
                let (value, start) = coefficient.take().unwrap_or((1.0, token.span));
                terms.push(Term {
                    coefficient: sign * value,
                    variable: token.text.clone(),
                    span: start.merge(token.span),
                });
                sign = 1.0;
                signed = false;
                dangling_sign = false;
            }
            TokenKind::Number | TokenKind::Ident => return Err(unexpected(token, "'+' or '-'")),
            _ if coefficient.is_some() => return Err(unexpected(token, "variable")),
            _ => return Err(unexpected(token, "term")),
        }
    }

    if coefficient.is_some() || dangling_sign {
        let line = tokens.last().map_or(0, |t| t.line);
        return Err(ParseError::UnexpectedEol {
            expected: "variable".to_string(),
            line,
        });
    }
    Ok(terms)
}

/// Parses `[sign]* number`, consuming the whole slice.
fn parse_rhs(tokens: &[Token], line: usize) -> Result<f64, ParseError> {
    let mut sign = 1.0;
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Plus => {}
            TokenKind::Minus => sign = -sign,
            TokenKind::Number => {
                let value = sign * parse_number(token)?;
                return match iter.next() {
                    Some(extra) => Err(unexpected(extra, "end of line")),
                    None => Ok(value),
                };
            }
            _ => return Err(unexpected(token, "number")),
        }
    }
    Err(ParseError::UnexpectedEol {
        expected: "number".to_string(),
        line,
    })
}

#[derive(Debug, Clone)]
enum Operand<'t> {
    Value(f64),
    Variable(&'t Token),
}

fn bound_operand<'t>(tokens: &'t [Token], pos: &mut usize, line: usize) -> Result<Operand<'t>, ParseError> {
    let mut sign = 1.0;
    let mut signed = false;
    while let Some(token) = tokens.get(*pos) {
        match token.kind {
            TokenKind::Plus => {}
            TokenKind::Minus => sign = -sign,
            _ => break,
        }
        signed = true;
        *pos += 1;
    }

    let Some(token) = tokens.get(*pos) else {
        return Err(ParseError::UnexpectedEol {
            expected: "number or variable".to_string(),
            line,
        });
    };
    *pos += 1;
    match token.kind {
        TokenKind::Number => Ok(Operand::Value(sign * parse_number(token)?)),
        TokenKind::Ident if is_infinity(token) => Ok(Operand::Value(sign * f64::INFINITY)),
        TokenKind::Ident if !signed => Ok(Operand::Variable(token)),
        TokenKind::Ident => Err(unexpected(token, "number")),
        _ => Err(unexpected(token, "number or variable")),
    }
}

fn bound_relation(tokens: &[Token], pos: &mut usize, line: usize) -> Result<Relation, ParseError> {
    let Some(token) = tokens.get(*pos) else {
        return Err(ParseError::UnexpectedEol {
            expected: "'<=', '>=' or '='".to_string(),
            line,
        });
    };
    *pos += 1;
    match token.kind {
        TokenKind::Le => Ok(Relation::Le),
        TokenKind::Ge => Ok(Relation::Ge),
        TokenKind::Eq => Ok(Relation::Eq),
        _ => Err(unexpected(token, "'<=', '>=' or '='")),
    }
}

fn parse_bound(tokens: &[Token]) -> Result<BoundDef, ParseError> {
    let line = tokens[0].line;
    let span = span_of(tokens);

    if let Some(colon) = tokens.iter().find(|t| t.kind == TokenKind::Colon) {
        return Err(ParseError::NameInBounds { line: colon.line });
    }

    if let [name, free] = tokens
        && name.kind == TokenKind::Ident
        && free.is_keyword("free")
    {
        return Ok(BoundDef {
            variable: name.text.clone(),
            kind: BoundKind::Free,
            line,
            span,
        });
    }

    let mut pos = 0;
    let left = bound_operand(tokens, &mut pos, line)?;
    let relation = bound_relation(tokens, &mut pos, line)?;
    let right = bound_operand(tokens, &mut pos, line)?;

    let (variable, kind) = match (left, right) {
        (Operand::Variable(var), Operand::Value(value)) => {
            let kind = match relation {
                Relation::Le => BoundKind::Upper(value),
                Relation::Ge => BoundKind::Lower(value),
                Relation::Eq => BoundKind::Fixed(value),
            };
            (var, kind)
        }
        (Operand::Value(value), Operand::Variable(var)) if pos == tokens.len() => {
            let kind = match relation {
                Relation::Le => BoundKind::Lower(value),
                Relation::Ge => BoundKind::Upper(value),
                Relation::Eq => BoundKind::Fixed(value),
            };
            (var, kind)
        }
        (Operand::Value(first), Operand::Variable(var)) => {
            let second_relation = bound_relation(tokens, &mut pos, line)?;
            let Operand::Value(second) = bound_operand(tokens, &mut pos, line)? else {
                return Err(unexpected(&tokens[pos - 1], "number"));
            };
            let kind = match (relation, second_relation) {
                (Relation::Le, Relation::Le) => BoundKind::Range {
                    lower: first,
                    upper: second,
                },
                (Relation::Ge, Relation::Ge) => BoundKind::Range {
                    lower: second,
                    upper: first,
                },
                _ => {
                    return Err(unexpected(&tokens[pos - 2], "matching relation"));
                }
            };
            (var, kind)
        }
        (Operand::Value(_), Operand::Value(_)) => return Err(unexpected(&tokens[pos - 1], "variable")),
        (Operand::Variable(_), Operand::Variable(var)) => return Err(unexpected(var, "number")),
    };

    if let Some(extra) = tokens.get(pos) {
        return Err(unexpected(extra, "end of line"));
    }

    Ok(BoundDef {
        variable: variable.text.clone(),
        kind,
        line,
        span,
    })
}

/// A constraint whose relation or right-hand side has not been read yet
#[derive(Debug)]
struct Pending {
    name: Option<String>,
    line: usize,
    tokens: Vec<Token>,
}

impl Pending {
    fn is_complete(&self) -> bool {
        self.tokens
            .iter()
            .position(Token::is_relation)
            .is_some_and(|rel| self.tokens[rel + 1..].iter().any(|t| t.kind == TokenKind::Number))
    }

    fn finish(self) -> Result<ConstraintDef, ParseError> {
        let Some(rel) = self.tokens.iter().position(Token::is_relation) else {
            return Err(ParseError::IncompleteConstraint { line: self.line });
        };
        let relation = match self.tokens[rel].kind {
            TokenKind::Le => Relation::Le,
            TokenKind::Ge => Relation::Ge,
            _ => Relation::Eq,
        };
        let terms = parse_terms(&self.tokens[..rel])?;
        let rhs = parse_rhs(&self.tokens[rel + 1..], self.tokens[rel].line)?;
        Ok(ConstraintDef {
            name: self.name,
            terms,
            relation,
            rhs,
            line: self.line,
            span: span_of(&self.tokens),
        })
    }
}

struct ObjectiveHeader {
    direction: Direction,
    name: Option<String>,
    line: usize,
    span: Span,
    tokens: Vec<Token>,
}

pub struct Parser {
    section: Section,
    objective: Option<ObjectiveHeader>,
    parsed_objective: Option<ObjectiveDef>,
    constraints: Vec<ConstraintDef>,
    bounds: Vec<BoundDef>,
    pending: Option<Pending>,
}

impl Parser {
    fn new() -> Self {
        Self {
            section: Section::Start,
            objective: None,
            parsed_objective: None,
            constraints: Vec::new(),
            bounds: Vec::new(),
            pending: None,
        }
    }

    pub fn parse(source: &str) -> Result<LpFile, ParseError> {
        let lines = Self::split_lines(Lexer::tokenize(source))?;
        let mut parser = Parser::new();
        for line in &lines {
            parser.parse_line(line)?;
        }
        parser.finish(lines.last().map_or(1, |l| l[0].line))
    }

    /// Groups tokens into non-empty logical lines, dropping comments.
    fn split_lines(tokens: Vec<Token>) -> Result<Vec<Vec<Token>>, ParseError> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        for token in tokens {
            match token.kind {
                TokenKind::Newline | TokenKind::Eof => {
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                }
                TokenKind::Comment => {}
                TokenKind::Error => {
                    return Err(ParseError::InvalidCharacter {
                        text: token.text,
                        line: token.line,
                    });
                }
                _ => current.push(token),
            }
        }
        Ok(lines)
    }

    fn parse_line(&mut self, line: &[Token]) -> Result<(), ParseError> {
        let first = &line[0];
        let found = keyword(line);

        // Section keywords stand alone on their line, except the goal which
        // may be followed by the objective itself
        let standalone = found.filter(|&(_, used)| used == line.len()).map(|(k, _)| k);

        match self.section {
            Section::Start => match found {
                Some((Keyword::Goal(direction), used)) => {
                    trace!("objective section at line {}", first.line);
                    self.objective = Some(ObjectiveHeader {
                        direction,
                        name: None,
                        line: first.line,
                        span: first.span,
                        tokens: Vec::new(),
                    });
                    self.section = Section::Objective;
                    if used < line.len() {
                        self.objective_line(&line[used..])?;
                    }
                    Ok(())
                }
                _ => Err(unexpected(first, "'maximize' or 'minimize'")),
            },
            Section::Objective => match standalone {
                Some(Keyword::SubjectTo) => self.enter(Section::Constraints, first),
                Some(Keyword::Bounds) => self.enter(Section::Bounds, first),
                Some(Keyword::End) => self.enter(Section::End, first),
                Some(Keyword::Goal(_)) => Err(unexpected(first, "objective term")),
                None => self.objective_line(line),
            },
            Section::Constraints => match standalone {
                Some(Keyword::Bounds) => self.enter(Section::Bounds, first),
                Some(Keyword::End) => self.enter(Section::End, first),
                Some(_) => Err(unexpected(first, "constraint")),
                None => self.constraint_line(line),
            },
            Section::Bounds => match standalone {
                Some(Keyword::End) => self.enter(Section::End, first),
                Some(_) => Err(unexpected(first, "bound")),
                None => {
                    self.bounds.push(parse_bound(line)?);
                    Ok(())
                }
            },
            Section::End => Err(unexpected(first, "end of file")),
        }
    }

    fn enter(&mut self, section: Section, keyword: &Token) -> Result<(), ParseError> {
        trace!("{:?} section at line {}", section, keyword.line);
        if let Some(header) = self.objective.take() {
            self.parsed_objective = Some(ObjectiveDef {
                terms: parse_terms(&header.tokens)?,
                span: header.span.merge(span_of(&header.tokens)),
                name: header.name,
                direction: header.direction,
                line: header.line,
            });
        }
        if let Some(pending) = &self.pending {
            return Err(ParseError::IncompleteConstraint { line: pending.line });
        }
        self.section = section;
        Ok(())
    }

    fn objective_line(&mut self, line: &[Token]) -> Result<(), ParseError> {
        let (name, rest) = split_name(line)?;
        let Some(header) = self.objective.as_mut() else {
            return Err(ParseError::MissingObjective);
        };
        if let Some(name) = name {
            if header.name.is_some() || !header.tokens.is_empty() {
                return Err(unexpected(&line[1], "objective term"));
            }
            header.name = Some(name.text.clone());
        }
        header.tokens.extend_from_slice(rest);
        Ok(())
    }

    fn constraint_line(&mut self, line: &[Token]) -> Result<(), ParseError> {
        let (name, rest) = split_name(line)?;
        if name.is_some()
            && let Some(pending) = &self.pending
        {
            return Err(ParseError::IncompleteConstraint { line: pending.line });
        }

        let pending = self.pending.get_or_insert_with(|| Pending {
            name: name.map(|t| t.text.clone()),
            line: line[0].line,
            tokens: Vec::new(),
        });
        pending.tokens.extend_from_slice(rest);

        if pending.is_complete()
            && let Some(pending) = self.pending.take()
        {
            self.constraints.push(pending.finish()?);
        }
        Ok(())
    }

    fn finish(mut self, last_line: usize) -> Result<LpFile, ParseError> {
        if self.section == Section::Start {
            return Err(ParseError::MissingObjective);
        }
        if let Some(pending) = &self.pending {
            return Err(ParseError::IncompleteConstraint { line: pending.line });
        }
        if self.section != Section::End {
            return Err(ParseError::MissingEnd { line: last_line });
        }
        let objective = self.parsed_objective.take().ok_or(ParseError::MissingObjective)?;
        Ok(LpFile {
            objective,
            constraints: self.constraints,
            bounds: self.bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
\ production planning
Maximize
 profit: 3 x + 2y
Subject To
 wood: x + y <= 4
 labor: x + 3 y
   <= 6
 x <= 3
Bounds
 y >= 0.5
End
"#;

    #[test]
    fn test_parse_sections() {
        let file = Parser::parse(EXAMPLE).unwrap();
        assert_eq!(file.objective.direction, Direction::Maximize);
        assert_eq!(file.objective.name.as_deref(), Some("profit"));
        assert_eq!(file.objective.terms.len(), 2);
        assert_eq!(file.objective.terms[1].variable, "y");
        assert_eq!(file.objective.terms[1].coefficient, 2.0);

        assert_eq!(file.constraints.len(), 3);
        assert_eq!(file.constraints[0].name.as_deref(), Some("wood"));
        assert_eq!(file.constraints[1].name.as_deref(), Some("labor"));
        assert_eq!(file.constraints[1].line, 7);
        assert_eq!(file.constraints[1].rhs, 6.0);
        assert_eq!(file.constraints[2].name, None);
        assert_eq!(file.constraints[2].relation, Relation::Le);

        assert_eq!(file.bounds.len(), 1);
        assert_eq!(file.bounds[0].kind, BoundKind::Lower(0.5));
    }

    #[test]
    fn test_objective_on_goal_line() {
        let file = Parser::parse("min 2 a - b\nst\n a + b >= 1\nend").unwrap();
        assert_eq!(file.objective.direction, Direction::Minimize);
        let coefficients: Vec<_> = file.objective.terms.iter().map(|t| t.coefficient).collect();
        assert_eq!(coefficients, vec![2.0, -1.0]);
        assert_eq!(file.constraints[0].relation, Relation::Ge);
    }

    #[test]
    fn test_objective_spanning_lines() {
        let file = Parser::parse("maximize\n obj: x +\n - 2 y\n - -z\nsubject to\n x <= 1\nend").unwrap();
        let coefficients: Vec<_> = file.objective.terms.iter().map(|t| t.coefficient).collect();
        assert_eq!(coefficients, vec![1.0, -2.0, 1.0]);
    }

    #[test]
    fn test_subject_to_spellings() {
        for keyword in ["subject to", "SUCH THAT", "s.t.", "st.", "ST"] {
            let source = format!("max x\n{keyword}\n x <= 1\nend");
            let file = Parser::parse(&source).unwrap();
            assert_eq!(file.constraints.len(), 1, "{keyword}");
        }
    }

    #[test]
    fn test_signed_rhs_and_relations() {
        let file = Parser::parse("min x\ns.t.\n x - y => - 4\n x =< +2\n x + y = 1\nend").unwrap();
        assert_eq!(file.constraints[0].relation, Relation::Ge);
        assert_eq!(file.constraints[0].rhs, -4.0);
        assert_eq!(file.constraints[1].relation, Relation::Le);
        assert_eq!(file.constraints[1].rhs, 2.0);
        assert_eq!(file.constraints[2].relation, Relation::Eq);
    }

    #[test]
    fn test_bound_forms() {
        let source = "min x\nbounds\n x <= 10\n 2 <= y\n -inf <= z <= 4\n w = 3\n v free\n 5 >= u\n 9 >= t >= -infinity\nend";
        let file = Parser::parse(source).unwrap();
        let kinds: Vec<_> = file.bounds.iter().map(|b| b.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                BoundKind::Upper(10.0),
                BoundKind::Lower(2.0),
                BoundKind::Range {
                    lower: f64::NEG_INFINITY,
                    upper: 4.0
                },
                BoundKind::Fixed(3.0),
                BoundKind::Free,
                BoundKind::Upper(5.0),
                BoundKind::Range {
                    lower: f64::NEG_INFINITY,
                    upper: 9.0
                },
            ]
        );
        assert_eq!(file.bounds[2].variable, "z");
    }

    #[test]
    fn test_missing_sign_between_terms() {
        let err = Parser::parse("max x y\nend").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { line: 1, ref found, .. } if found == "y"));
    }

    #[test]
    fn test_dangling_coefficient() {
        let err = Parser::parse("max x + 3\nend").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEol { line: 1, .. }));
    }

    #[test]
    fn test_incomplete_constraint() {
        let err = Parser::parse("max x\nst\n c1: x + y <=\nbounds\nend").unwrap_err();
        assert_eq!(err, ParseError::IncompleteConstraint { line: 3 });

        let err = Parser::parse("max x\nst\n x + y\n c2: x <= 1\nend").unwrap_err();
        assert_eq!(err, ParseError::IncompleteConstraint { line: 3 });
    }

    #[test]
    fn test_name_in_bounds() {
        let err = Parser::parse("max x\nbounds\n b1: x <= 4\nend").unwrap_err();
        assert_eq!(err, ParseError::NameInBounds { line: 3 });
    }

    #[test]
    fn test_invalid_name() {
        let err = Parser::parse("max x\nst\n 2 c: x <= 4\nend").unwrap_err();
        assert!(matches!(err, ParseError::InvalidName { line: 3, .. }));
    }

    #[test]
    fn test_missing_objective_and_end() {
        assert_eq!(Parser::parse("\\ only a comment\n").unwrap_err(), ParseError::MissingObjective);
        assert!(matches!(
            Parser::parse("subject to\n x <= 1\nend").unwrap_err(),
            ParseError::UnexpectedToken { line: 1, .. }
        ));
        assert_eq!(
            Parser::parse("max x\nst\n x <= 1\n").unwrap_err(),
            ParseError::MissingEnd { line: 3 }
        );
    }

    #[test]
    fn test_content_after_end() {
        let err = Parser::parse("max x\nend\nx <= 1").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { line: 3, .. }));
    }

    #[test]
    fn test_invalid_character() {
        let err = Parser::parse("max 2 * x\nend").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidCharacter {
                text: "*".into(),
                line: 1
            }
        );
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_term_spans() {
        let source = "max 3 x1\nend";
        let file = Parser::parse(source).unwrap();
        let span = file.objective.terms[0].span;
        assert_eq!(&source[span.start..span.end], "3 x1");
    }
}

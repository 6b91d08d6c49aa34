//! SQL front end.
//!
//! Translates one `SELECT` statement, parsed with `sqlparser` in the
//! PostgreSQL dialect, into a [`ParsedQuery`].
//!
//! # Supported SQL
//!
//! ```text
//! SELECT [DISTINCT] a, b | * | SUM(expr) [, g ...]
//! FROM t1 [, t2 ...]
//! [WHERE c1 AND c2 ...]
//! [GROUP BY g ...]
//! ```
//!
//! Comparisons are `=`, `<`, or `>` between attributes and literals.
//! `SUM` takes an arithmetic expression built from `+ - * /`.
//!
//! ```
//! use quarry_sql::parser::Parser;
//!
//! let query = Parser::parse_query("SELECT a FROM t WHERE b = 3").unwrap();
//! assert_eq!(query.tables, vec!["t"]);
//! ```

use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use thiserror::Error;

use quarry_common::QuarryError;

mod query;

pub use query::*;

/// Errors that can occur during SQL parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Error from the underlying sqlparser crate.
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    /// Valid SQL outside the supported subset.
    #[error("unsupported SQL feature: {0}")]
    Unsupported(String),

    /// Literal that does not fit an attribute type.
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// Empty input.
    #[error("empty query")]
    EmptyQuery,
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

impl From<ParseError> for QuarryError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Unsupported(feature) => QuarryError::Unsupported { feature },
            other => QuarryError::Syntax {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

fn unsupported<T>(what: impl Into<String>) -> ParseResult<T> {
    Err(ParseError::Unsupported(what.into()))
}

/// SQL parser for Quarry queries.
pub struct Parser;

impl Parser {
    /// Parses exactly one `SELECT` statement.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Syntax`] for malformed SQL and
    /// [`ParseError::Unsupported`] for SQL outside the supported subset.
    pub fn parse_query(sql: &str) -> ParseResult<ParsedQuery> {
        if sql.trim().is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        let dialect = PostgreSqlDialect {};
        let mut statements = SqlParser::parse_sql(&dialect, sql)?;
        if statements.len() != 1 {
            return Err(ParseError::Syntax(format!(
                "expected 1 statement, got {}",
                statements.len()
            )));
        }
        match statements.remove(0) {
            sql_ast::Statement::Query(query) => Self::from_query(*query),
            other => unsupported(format!("statement kind: {other}")),
        }
    }

    fn from_query(query: sql_ast::Query) -> ParseResult<ParsedQuery> {
        if query.with.is_some() {
            return unsupported("WITH");
        }
        if !query.order_by.is_empty() {
            return unsupported("ORDER BY");
        }
        if query.limit.is_some() || query.offset.is_some() {
            return unsupported("LIMIT/OFFSET");
        }
        let select = match *query.body {
            sql_ast::SetExpr::Select(select) => *select,
            _ => return unsupported("set operations"),
        };
        if select.having.is_some() {
            return unsupported("HAVING");
        }

        let mut parsed = ParsedQuery {
            distinct: select.distinct.is_some(),
            ..Default::default()
        };

        for table in select.from {
            if !table.joins.is_empty() {
                return unsupported("explicit JOIN; list tables in FROM instead");
            }
            match table.relation {
                sql_ast::TableFactor::Table { name, alias, .. } => {
                    if alias.is_some() {
                        return unsupported("table aliases");
                    }
                    parsed.tables.push(object_name(&name)?);
                }
                other => return unsupported(format!("FROM item {other}")),
            }
        }
        if parsed.tables.is_empty() {
            return unsupported("SELECT without FROM");
        }

        if let Some(selection) = select.selection {
            collect_conjuncts(selection, &mut parsed.predicate)?;
        }

        parsed.grouping = match select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs) => exprs
                .into_iter()
                .map(|e| attribute_name(&e))
                .collect::<ParseResult<_>>()?,
            sql_ast::GroupByExpr::All => return unsupported("GROUP BY ALL"),
        };

        let mut plain = Vec::new();
        let mut wildcard = false;
        for item in select.projection {
            match item {
                sql_ast::SelectItem::UnnamedExpr(expr)
                | sql_ast::SelectItem::ExprWithAlias { expr, .. } => match expr {
                    sql_ast::Expr::Function(func) => {
                        if parsed.aggregate.is_some() {
                            return unsupported("more than one aggregate");
                        }
                        parsed.aggregate = Some(sum_argument(func)?);
                    }
                    other => plain.push(attribute_name(&other)?),
                },
                sql_ast::SelectItem::Wildcard(_) => wildcard = true,
                sql_ast::SelectItem::QualifiedWildcard(..) => {
                    return unsupported("qualified wildcard")
                }
            }
        }

        if parsed.aggregate.is_some() {
            if wildcard || parsed.distinct {
                return unsupported("SUM combined with * or DISTINCT");
            }
            if let Some(stray) = plain.iter().find(|a| !parsed.grouping.contains(a)) {
                return unsupported(format!("attribute {stray} is neither summed nor grouped"));
            }
        } else {
            if !parsed.grouping.is_empty() {
                return unsupported("GROUP BY without SUM");
            }
            if wildcard && !plain.is_empty() {
                return unsupported("* mixed with attributes");
            }
            parsed.projection = plain;
        }
        Ok(parsed)
    }
}

fn object_name(name: &sql_ast::ObjectName) -> ParseResult<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => unsupported(format!("qualified table name {name}")),
    }
}

fn attribute_name(expr: &sql_ast::Expr) -> ParseResult<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [table, attr] => Ok(format!("{}.{}", table.value, attr.value)),
            _ => unsupported(format!("identifier {expr}")),
        },
        sql_ast::Expr::Nested(inner) => attribute_name(inner),
        other => unsupported(format!("expression {other} where an attribute was expected")),
    }
}

fn collect_conjuncts(expr: sql_ast::Expr, out: &mut Vec<Comparison>) -> ParseResult<()> {
    match expr {
        sql_ast::Expr::Nested(inner) => collect_conjuncts(*inner, out),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::And,
            right,
        } => {
            collect_conjuncts(*left, out)?;
            collect_conjuncts(*right, out)
        }
        sql_ast::Expr::BinaryOp { left, op, right } => {
            let op = match op {
                sql_ast::BinaryOperator::Eq => CompOp::Eq,
                sql_ast::BinaryOperator::Lt => CompOp::Lt,
                sql_ast::BinaryOperator::Gt => CompOp::Gt,
                other => return unsupported(format!("operator {other} in WHERE")),
            };
            out.push(Comparison::new(operand(*left)?, op, operand(*right)?));
            Ok(())
        }
        other => unsupported(format!("predicate {other}")),
    }
}

fn operand(expr: sql_ast::Expr) -> ParseResult<Operand> {
    match expr {
        sql_ast::Expr::Value(value) => literal(&value, false),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match *expr {
            sql_ast::Expr::Value(value) => literal(&value, true),
            other => unsupported(format!("negated expression {other}")),
        },
        sql_ast::Expr::Nested(inner) => operand(*inner),
        other => attribute_name(&other).map(Operand::Attribute),
    }
}

fn literal(value: &sql_ast::Value, negate: bool) -> ParseResult<Operand> {
    match value {
        sql_ast::Value::Number(n, _) => {
            let text = if negate { format!("-{n}") } else { n.clone() };
            if let Ok(i) = text.parse::<i32>() {
                Ok(Operand::Int(i))
            } else if let Ok(f) = text.parse::<f64>() {
                Ok(Operand::Float(f))
            } else {
                Err(ParseError::InvalidLiteral(text))
            }
        }
        sql_ast::Value::SingleQuotedString(s) if !negate => Ok(Operand::Str(s.clone())),
        other => unsupported(format!("literal {other}")),
    }
}

fn sum_argument(func: sql_ast::Function) -> ParseResult<ArithExpr> {
    let name = func.name.to_string().to_uppercase();
    if name != "SUM" {
        return unsupported(format!("aggregate {name}"));
    }
    if func.distinct {
        return unsupported("SUM(DISTINCT ...)");
    }
    match func.args.as_slice() {
        [sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e))] => arith(e),
        _ => unsupported("SUM takes exactly one expression"),
    }
}

fn arith(expr: &sql_ast::Expr) -> ParseResult<ArithExpr> {
    match expr {
        sql_ast::Expr::Nested(inner) => arith(inner),
        sql_ast::Expr::Value(value) => match literal(value, false)? {
            Operand::Int(v) => Ok(ArithExpr::Int(v)),
            Operand::Float(v) => Ok(ArithExpr::Float(v)),
            _ => unsupported("non-numeric literal in SUM"),
        },
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => Ok(ArithExpr::binary(ArithOp::Sub, ArithExpr::Int(0), arith(expr)?)),
        sql_ast::Expr::BinaryOp { left, op, right } => {
            let op = match op {
                sql_ast::BinaryOperator::Plus => ArithOp::Add,
                sql_ast::BinaryOperator::Minus => ArithOp::Sub,
                sql_ast::BinaryOperator::Multiply => ArithOp::Mul,
                sql_ast::BinaryOperator::Divide => ArithOp::Div,
                other => return unsupported(format!("operator {other} in SUM")),
            };
            Ok(ArithExpr::binary(op, arith(left)?, arith(right)?))
        }
        other => attribute_name(other).map(ArithExpr::Attribute),
    }
}

//! The operator configuration language.
//!
//! One rule per line:
//!
//! ```text
//! # arithmetic operator replacement
//! ADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A, B)
//! ICMP_SLT(A, B) --> LtToLe, ICMP_SLE(A, B); LtFalse, CONST(0)
//! MUL(A, 1) --> MulOneToOperand, OPERAND(A)
//! STMT --> DeleteStatement, DELSTMT
//! ```
//!
//! The left-hand side is a *matcher*: a binary operation name, a comparison
//! name (`ICMP_` + predicate) or `STMT`, with placeholder operands. A
//! placeholder is either a name, which binds whatever operand is found there,
//! or an integer literal, which only matches that constant. Each entry of the
//! right-hand side names one mutant kind and gives its *replacer*.
//!
//! Everything after `#` is a comment and blank lines are skipped. Parsing
//! stops at the first bad line with [`Error::Config`] carrying its 1-based
//! line number.

use std::{fmt, path::Path, str::FromStr};

use crate::{
    ir::{BinaryOp, CmpPredicate},
    Error, Result,
};

/// The operator catalog used when no configuration is given.
pub const DEFAULT_OPERATORS: &str = "\
# Arithmetic operator replacement
ADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A, B); AddLhs, OPERAND(A); AddRhs, OPERAND(B)
SUB(A, B) --> SubToAdd, ADD(A, B); SubSwapped, SUB(B, A); SubLhs, OPERAND(A)
MUL(A, B) --> MulToAdd, ADD(A, B); MulToSdiv, SDIV(A, B); MulLhs, OPERAND(A); MulRhs, OPERAND(B)
SDIV(A, B) --> SdivToMul, MUL(A, B); SdivToSrem, SREM(A, B); SdivLhs, OPERAND(A)
UDIV(A, B) --> UdivToMul, MUL(A, B); UdivToUrem, UREM(A, B); UdivLhs, OPERAND(A)
SREM(A, B) --> SremToSdiv, SDIV(A, B); SremToZero, CONST(0)
UREM(A, B) --> UremToUdiv, UDIV(A, B); UremToZero, CONST(0)
# Logical operator replacement
AND(A, B) --> AndToOr, OR(A, B); AndToXor, XOR(A, B)
OR(A, B) --> OrToAnd, AND(A, B); OrToXor, XOR(A, B)
XOR(A, B) --> XorToOr, OR(A, B); XorToAnd, AND(A, B)
SHL(A, B) --> ShlToLshr, LSHR(A, B); ShlLhs, OPERAND(A)
LSHR(A, B) --> LshrToShl, SHL(A, B); LshrToAshr, ASHR(A, B)
ASHR(A, B) --> AshrToLshr, LSHR(A, B); AshrToShl, SHL(A, B)
# Relational operator replacement
ICMP_EQ(A, B) --> EqToNe, ICMP_NE(A, B); EqFalse, CONST(0)
ICMP_NE(A, B) --> NeToEq, ICMP_EQ(A, B); NeTrue, CONST(1)
ICMP_SGT(A, B) --> SgtToSge, ICMP_SGE(A, B); SgtToSle, ICMP_SLE(A, B); SgtToNe, ICMP_NE(A, B)
ICMP_SGE(A, B) --> SgeToSgt, ICMP_SGT(A, B); SgeToSlt, ICMP_SLT(A, B); SgeToEq, ICMP_EQ(A, B)
ICMP_SLT(A, B) --> SltToSle, ICMP_SLE(A, B); SltToSge, ICMP_SGE(A, B); SltToNe, ICMP_NE(A, B)
ICMP_SLE(A, B) --> SleToSlt, ICMP_SLT(A, B); SleToSgt, ICMP_SGT(A, B); SleToEq, ICMP_EQ(A, B)
ICMP_UGT(A, B) --> UgtToUge, ICMP_UGE(A, B); UgtToUle, ICMP_ULE(A, B)
ICMP_UGE(A, B) --> UgeToUgt, ICMP_UGT(A, B); UgeToUlt, ICMP_ULT(A, B)
ICMP_ULT(A, B) --> UltToUle, ICMP_ULE(A, B); UltToUge, ICMP_UGE(A, B)
ICMP_ULE(A, B) --> UleToUlt, ICMP_ULT(A, B); UleToUgt, ICMP_UGT(A, B)
# Statement deletion
STMT --> DeleteStatement, DELSTMT
";

/// A placeholder in a matcher or replacer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleOperand {
    /// Binds (in a matcher) or refers to (in a replacer) a matched operand.
    Named(String),
    /// An integer constant.
    Literal(i64),
}

impl fmt::Display for RuleOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOperand::Named(name) => f.write_str(name),
            RuleOperand::Literal(v) => write!(f, "{v}"),
        }
    }
}

/// What a matcher looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// A binary operation with this opcode.
    Binary(BinaryOp),
    /// A comparison with this predicate.
    Cmp(CmpPredicate),
    /// Any statement.
    Statement,
}

/// The left-hand side of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherSpec {
    /// What to look for
    pub kind: MatcherKind,
    /// Operand placeholders in order
    pub operands: Vec<RuleOperand>,
}

impl MatcherSpec {
    /// Returns `true` if `name` is bound by this matcher.
    #[must_use]
    pub fn binds(&self, name: &str) -> bool {
        self.operands
            .iter()
            .any(|o| matches!(o, RuleOperand::Named(n) if n == name))
    }
}

/// How a matched instruction is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacerSpec {
    /// Rebuild as a binary operation.
    Binary(BinaryOp, Vec<RuleOperand>),
    /// Rebuild as a comparison.
    Cmp(CmpPredicate, Vec<RuleOperand>),
    /// Replace the result by one of the matched operands.
    Operand(String),
    /// Replace the result by a constant.
    Const(i64),
    /// Delete the whole statement.
    DeleteStatement,
}

/// The replacer category, used as the dispatch tag of the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize, serde::Deserialize,
)]
pub enum ReplacerKind {
    /// Binary operation replacement.
    Binary,
    /// Comparison replacement.
    Cmp,
    /// Operand replacement.
    Operand,
    /// Constant replacement.
    Const,
    /// Statement deletion.
    DeleteStatement,
}

impl ReplacerSpec {
    /// Returns the dispatch tag of this replacer.
    #[must_use]
    pub fn kind(&self) -> ReplacerKind {
        match self {
            ReplacerSpec::Binary(..) => ReplacerKind::Binary,
            ReplacerSpec::Cmp(..) => ReplacerKind::Cmp,
            ReplacerSpec::Operand(_) => ReplacerKind::Operand,
            ReplacerSpec::Const(_) => ReplacerKind::Const,
            ReplacerSpec::DeleteStatement => ReplacerKind::DeleteStatement,
        }
    }
}

/// One named mutant kind of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutantSpec {
    /// Kind label recorded in the mutant metadata
    pub name: String,
    /// How to build the mutant
    pub replacer: ReplacerSpec,
}

/// One line of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRule {
    /// 1-based line number
    pub line: usize,
    /// The left-hand side
    pub matcher: MatcherSpec,
    /// The mutant kinds, in the order they were written
    pub mutants: Vec<MutantSpec>,
}

/// A parsed operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorConfig {
    rules: Vec<OperatorRule>,
}

fn config_error(line: usize, message: impl Into<String>) -> Error {
    Error::Config {
        line,
        message: message.into(),
    }
}

/// Splits `NAME(a, b)` into its name and arguments. `NAME` alone has none.
fn parse_call(text: &str, line: usize) -> Result<(String, Vec<String>)> {
    let text = text.trim();
    let Some(open) = text.find('(') else {
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(config_error(line, format!("expected an operator name, got '{text}'")));
        }
        return Ok((text.to_string(), Vec::new()));
    };
    if !text.ends_with(')') {
        return Err(config_error(line, format!("missing ')' in '{text}'")));
    }
    let name = text[..open].trim().to_string();
    if name.is_empty() {
        return Err(config_error(line, format!("missing operator name in '{text}'")));
    }
    let inner = &text[open + 1..text.len() - 1];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|a| a.trim().to_string()).collect()
    };
    if args.iter().any(String::is_empty) {
        return Err(config_error(line, format!("empty operand in '{text}'")));
    }
    Ok((name, args))
}

fn parse_operand(text: &str, line: usize) -> Result<RuleOperand> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(RuleOperand::Literal(value));
    }
    let valid = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(config_error(line, format!("invalid operand '{text}'")));
    }
    Ok(RuleOperand::Named(text.to_string()))
}

fn parse_binary(name: &str) -> Option<BinaryOp> {
    BinaryOp::from_str(name).ok()
}

fn parse_cmp(name: &str) -> Option<CmpPredicate> {
    let upper = name.to_ascii_uppercase();
    let pred = upper.strip_prefix("ICMP_")?;
    CmpPredicate::from_str(pred).ok()
}

fn expect_arity(name: &str, args: &[String], arity: usize, line: usize) -> Result<()> {
    if args.len() != arity {
        return Err(config_error(
            line,
            format!("{name} takes {arity} operand(s), got {}", args.len()),
        ));
    }
    Ok(())
}

fn parse_matcher(text: &str, line: usize) -> Result<MatcherSpec> {
    let (name, args) = parse_call(text, line)?;
    let kind = if name.eq_ignore_ascii_case("STMT") {
        expect_arity(&name, &args, 0, line)?;
        MatcherKind::Statement
    } else if let Some(op) = parse_binary(&name) {
        expect_arity(&name, &args, 2, line)?;
        MatcherKind::Binary(op)
    } else if let Some(pred) = parse_cmp(&name) {
        expect_arity(&name, &args, 2, line)?;
        MatcherKind::Cmp(pred)
    } else {
        return Err(config_error(line, format!("unknown matcher '{name}'")));
    };
    let operands = args
        .iter()
        .map(|a| parse_operand(a, line))
        .collect::<Result<Vec<_>>>()?;
    Ok(MatcherSpec { kind, operands })
}

fn parse_replacer(text: &str, matcher: &MatcherSpec, line: usize) -> Result<ReplacerSpec> {
    let (name, args) = parse_call(text, line)?;
    let operands = |args: &[String]| -> Result<Vec<RuleOperand>> {
        args.iter()
            .map(|a| {
                let operand = parse_operand(a, line)?;
                match &operand {
                    RuleOperand::Named(n) if !matcher.binds(n) => Err(config_error(
                        line,
                        format!("operand '{n}' is not bound by the matcher"),
                    )),
                    _ => Ok(operand),
                }
            })
            .collect()
    };

    let replacer = if name.eq_ignore_ascii_case("DELSTMT") {
        expect_arity(&name, &args, 0, line)?;
        ReplacerSpec::DeleteStatement
    } else if name.eq_ignore_ascii_case("OPERAND") {
        expect_arity(&name, &args, 1, line)?;
        match operands(&args)?.pop() {
            Some(RuleOperand::Named(n)) => ReplacerSpec::Operand(n),
            _ => return Err(config_error(line, "OPERAND needs a named operand")),
        }
    } else if name.eq_ignore_ascii_case("CONST") {
        expect_arity(&name, &args, 1, line)?;
        match operands(&args)?.pop() {
            Some(RuleOperand::Literal(v)) => ReplacerSpec::Const(v),
            _ => return Err(config_error(line, "CONST needs an integer literal")),
        }
    } else if let Some(op) = parse_binary(&name) {
        expect_arity(&name, &args, 2, line)?;
        ReplacerSpec::Binary(op, operands(&args)?)
    } else if let Some(pred) = parse_cmp(&name) {
        expect_arity(&name, &args, 2, line)?;
        ReplacerSpec::Cmp(pred, operands(&args)?)
    } else {
        return Err(config_error(line, format!("unknown replacer '{name}'")));
    };

    let compatible = match (matcher.kind, &replacer) {
        (MatcherKind::Statement, ReplacerSpec::DeleteStatement) => true,
        (MatcherKind::Statement, _) | (_, ReplacerSpec::DeleteStatement) => false,
        (MatcherKind::Binary(_), ReplacerSpec::Binary(..) | ReplacerSpec::Operand(_)) => true,
        (MatcherKind::Cmp(_), ReplacerSpec::Cmp(..)) => true,
        (_, ReplacerSpec::Const(_)) => true,
        _ => false,
    };
    if !compatible {
        return Err(config_error(
            line,
            format!("replacer '{name}' cannot be used with this matcher"),
        ));
    }
    Ok(replacer)
}

fn parse_rule(text: &str, line: usize) -> Result<OperatorRule> {
    let Some((lhs, rhs)) = text.split_once("-->") else {
        return Err(config_error(line, "expected '-->'"));
    };
    let matcher = parse_matcher(lhs, line)?;

    let mut mutants = Vec::new();
    for entry in rhs.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, replacer)) = entry.split_once(',') else {
            return Err(config_error(
                line,
                format!("expected 'Name, Replacer' in '{entry}'"),
            ));
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(config_error(line, format!("invalid mutant name '{name}'")));
        }
        mutants.push(MutantSpec {
            name: name.to_string(),
            replacer: parse_replacer(replacer, &matcher, line)?,
        });
    }
    if mutants.is_empty() {
        return Err(config_error(line, "rule defines no mutants"));
    }
    Ok(OperatorRule {
        line,
        matcher,
        mutants,
    })
}

impl OperatorConfig {
    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for the first malformed line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            rules.push(parse_rule(content, idx + 1)?);
        }
        Ok(Self { rules })
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read and
    /// [`Error::Config`] for the first malformed line.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Returns the built-in operator catalog.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the catalog is parsed like any other text.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_OPERATORS)
    }

    /// Returns the rules in file order.
    #[must_use]
    pub fn rules(&self) -> &[OperatorRule] {
        &self.rules
    }

    /// Returns the total number of mutant kinds.
    #[must_use]
    pub fn mutant_kinds(&self) -> usize {
        self.rules.iter().map(|r| r.mutants.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_with_comments() {
        let config = OperatorConfig::parse(
            "# header\n\nADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A,B)  # tail\n",
        )
        .unwrap();
        assert_eq!(config.rules().len(), 1);
        let rule = &config.rules()[0];
        assert_eq!(rule.line, 3);
        assert_eq!(rule.matcher.kind, MatcherKind::Binary(BinaryOp::Add));
        assert_eq!(rule.mutants[1].name, "AddToMul");
        assert_eq!(rule.mutants[1].replacer.kind(), ReplacerKind::Binary);
    }

    #[test]
    fn test_literal_operands() {
        let config =
            OperatorConfig::parse("MUL(A, 1) --> MulOne, OPERAND(A); MulZero, CONST(0)").unwrap();
        let rule = &config.rules()[0];
        assert_eq!(rule.matcher.operands[1], RuleOperand::Literal(1));
        assert_eq!(rule.mutants[1].replacer, ReplacerSpec::Const(0));
    }

    #[test]
    fn test_unbound_operand_reports_line() {
        let err = OperatorConfig::parse("ADD(A, B) --> Ok, SUB(A, B)\nSUB(A, B) --> Bad, ADD(A, C)")
            .unwrap_err();
        assert!(matches!(err, Error::Config { line: 2, .. }));
    }

    #[test]
    fn test_invalid_combinations() {
        for text in [
            "ADD(A) --> X, SUB(A, A)",
            "FOO(A, B) --> X, SUB(A, B)",
            "ADD(A, B) -> X, SUB(A, B)",
            "ADD(A, B) --> X, ICMP_EQ(A, B)",
            "ICMP_EQ(A, B) --> X, OPERAND(A)",
            "ADD(A, B) --> X, DELSTMT",
            "STMT --> X, CONST(0)",
            "ADD(A, B) --> X SUB(A, B)",
            "ADD(A, B) -->",
        ] {
            let err = OperatorConfig::parse(text).unwrap_err();
            assert!(
                matches!(err, Error::Config { line: 1, .. }),
                "{text} gave {err}"
            );
        }
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let config = OperatorConfig::builtin().unwrap();
        assert!(config.rules().len() > 20);
        let last = config.rules().last().unwrap();
        assert_eq!(last.matcher.kind, MatcherKind::Statement);
        assert_eq!(
            last.mutants[0].replacer.kind(),
            ReplacerKind::DeleteStatement
        );
    }
}

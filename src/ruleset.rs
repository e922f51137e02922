//! YAML rule sets: named patterns plus an optional grammar over them.
//!
//! ```yaml
//! rules:
//!   - name: number
//!     pattern: NUMT()
//!   - name: sum
//!     pattern: EXP(2)-UCHAR("+")-EXP(2)
//! grammar:
//!   members: [number, sum]
//! ```
//!
//! Rule `i` sits at scope index `i`; the grammar, when declared, occupies
//! scope index `rules.len()`, so `EXP(rules.len())` is the grammar
//! self-reference.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::pattern::{Expression, Grammar, GrammarId, ScopeRule};

#[derive(serde::Deserialize)]
struct RuleSetFile {
    #[serde(default)]
    rules: Vec<RuleDecl>,
    grammar: Option<GrammarDecl>,
}

#[derive(serde::Deserialize)]
struct RuleDecl {
    name: String,
    pattern: String,
}

#[derive(serde::Deserialize)]
struct GrammarDecl {
    members: Vec<String>,
}

/// A loaded rule set: compiled expressions, their names, and the optional
/// grammar index built over them.
#[derive(Debug)]
pub struct RuleSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
    expressions: Vec<Expression>,
    grammar: Option<Grammar>,
}

impl RuleSet {
    pub fn from_str(yaml: &str) -> Result<RuleSet> {
        let file: RuleSetFile =
            serde_yml::from_str(yaml).context("failed to parse rule set YAML")?;

        let mut index = HashMap::new();
        for (i, rule) in file.rules.iter().enumerate() {
            if index.insert(rule.name.clone(), i).is_some() {
                bail!("duplicate rule name `{}`", rule.name);
            }
        }

        let members = match &file.grammar {
            Some(decl) => {
                let mut members = Vec::with_capacity(decl.members.len());
                for name in &decl.members {
                    let Some(&i) = index.get(name.as_str()) else {
                        bail!("grammar member `{name}` names no rule");
                    };
                    members.push(i);
                }
                Some(members)
            }
            None => None,
        };

        // Expressions compile against a placeholder scope of the final
        // shape; only EXP bounds are checked at compile time.
        let mut grammar = file.grammar.is_some().then(Grammar::new);
        let scope_len = file.rules.len() + usize::from(grammar.is_some());
        let placeholder = grammar.as_ref().map(Grammar::id).unwrap_or_else(GrammarId::next);
        let stub = vec![ScopeRule::GrammarRef(placeholder); scope_len];

        let mut names = Vec::with_capacity(file.rules.len());
        let mut expressions = Vec::with_capacity(file.rules.len());
        for rule in &file.rules {
            let expression = Expression::compile(&rule.pattern, &stub)
                .with_context(|| format!("failed to compile rule `{}`", rule.name))?;
            names.push(rule.name.clone());
            expressions.push(expression);
        }

        if let (Some(grammar), Some(members)) = (&mut grammar, &members) {
            let mut scope: Vec<ScopeRule<'_>> =
                expressions.iter().map(ScopeRule::Expr).collect();
            scope.push(ScopeRule::GrammarRef(grammar.id()));
            if !grammar.set_expressions(members, &scope) {
                bail!("grammar rejected its member rules");
            }
        }

        Ok(RuleSet { names, index, expressions, grammar })
    }

    pub fn from_path(path: &Path) -> Result<RuleSet> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rule set {}", path.display()))?;
        Self::from_str(&contents)
            .with_context(|| format!("failed to load rule set {}", path.display()))
    }

    /// Parses `text` between `*pos` and `last_pos` with the declared
    /// grammar. A rule set without a grammar parses nothing.
    pub fn parse(&self, text: &[u8], pos: &mut usize, last_pos: usize) -> bool {
        let Some(grammar) = &self.grammar else {
            return false;
        };
        let scope = self.scope();
        grammar.parse(text, pos, last_pos, &scope)
    }

    /// Whole-text match against one named rule. Unknown names match
    /// nothing.
    pub fn matches(&self, name: &str, text: &[u8]) -> bool {
        let Some(expression) = self.expression(name) else {
            return false;
        };
        let scope = self.scope();
        expression.matches(text, &scope)
    }

    pub fn expression(&self, name: &str) -> Option<&Expression> {
        self.index.get(name).map(|&i| &self.expressions[i])
    }

    pub fn expression_mut(&mut self, name: &str) -> Option<&mut Expression> {
        let i = *self.index.get(name)?;
        Some(&mut self.expressions[i])
    }

    /// The match-time scope: every rule in declaration order, then the
    /// grammar when one is declared.
    pub fn scope(&self) -> Vec<ScopeRule<'_>> {
        let mut scope: Vec<ScopeRule<'_>> =
            self.expressions.iter().map(ScopeRule::Expr).collect();
        if let Some(grammar) = &self.grammar {
            scope.push(ScopeRule::Grammar(grammar));
        }
        scope
    }

    pub fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{recorded, span_recorder};

    const ARITHMETIC: &str = r#"
rules:
  - name: number
    pattern: NUMT()
  - name: sum
    pattern: EXP(2)-SET("+-")-EXP(2)
grammar:
  members: [number, sum]
"#;

    #[test]
    fn loads_and_parses_arithmetic() {
        let rule_set = RuleSet::from_str(ARITHMETIC).expect("loads");
        assert_eq!(rule_set.names(), &["number", "sum"]);
        let grammar = rule_set.grammar().expect("grammar");
        assert_eq!(grammar.continuation_members(), &[1]);

        for text in [b"7".as_slice(), b"1+2", b"1 - 2.5 + 3"] {
            let mut pos = 0;
            assert!(rule_set.parse(text, &mut pos, text.len()), "{text:?}");
            assert_eq!(pos, text.len());
        }
        let mut pos = 0;
        assert!(!rule_set.parse(b"x+1", &mut pos, 3));
        assert_eq!(pos, 0);
    }

    #[test]
    fn matches_by_rule_name() {
        let rule_set = RuleSet::from_str(ARITHMETIC).expect("loads");
        assert!(rule_set.matches("number", b"3.5"));
        assert!(!rule_set.matches("number", b"x"));
        assert!(!rule_set.matches("missing", b"3.5"));
        // Delegation parses to the full bound, so the leading EXP swallows
        // the whole text; sum rules complete only through the grammar.
        assert!(!rule_set.matches("sum", b"1+2"));
    }

    #[test]
    fn actions_fire_through_the_loaded_grammar() {
        let mut rule_set = RuleSet::from_str(ARITHMETIC).expect("loads");
        let (spans, action) = span_recorder();
        rule_set
            .expression_mut("number")
            .expect("rule exists")
            .set_action(action);

        let mut pos = 0;
        assert!(rule_set.parse(b"1+2", &mut pos, 3));
        assert_eq!(recorded(&spans), vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn duplicate_rule_names_abort_loading() {
        let err = RuleSet::from_str(
            "rules:\n  - name: x\n    pattern: CHAR()\n  - name: x\n    pattern: CHAR()\n",
        )
        .expect_err("duplicate must fail");
        assert!(err.to_string().contains("duplicate rule name `x`"));
    }

    #[test]
    fn unknown_grammar_member_aborts_loading() {
        let err = RuleSet::from_str(
            "rules:\n  - name: x\n    pattern: CHAR()\ngrammar:\n  members: [y]\n",
        )
        .expect_err("unknown member must fail");
        assert!(err.to_string().contains("grammar member `y` names no rule"));
    }

    #[test]
    fn compile_failures_name_the_rule() {
        let err = RuleSet::from_str("rules:\n  - name: bad\n    pattern: FOO()\n")
            .expect_err("bad pattern must fail");
        let chain = format!("{err:#}");
        assert!(chain.contains("failed to compile rule `bad`"));
        assert!(chain.contains("unknown command `FOO`"));
    }

    #[test]
    fn exp_bounds_are_checked_against_the_declared_scope() {
        let err = RuleSet::from_str("rules:\n  - name: x\n    pattern: EXP(5)\n")
            .expect_err("out-of-range EXP must fail");
        assert!(format!("{err:#}").contains("rule index 5"));
        // With a grammar declared the scope grows by one slot.
        assert!(RuleSet::from_str(
            "rules:\n  - name: x\n    pattern: EXP(1)\ngrammar:\n  members: [x]\n",
        )
        .is_ok());
    }

    #[test]
    fn rule_set_without_grammar_parses_nothing() {
        let rule_set =
            RuleSet::from_str("rules:\n  - name: x\n    pattern: CHAR()\n").expect("loads");
        assert!(rule_set.grammar().is_none());
        let mut pos = 0;
        assert!(!rule_set.parse(b"x", &mut pos, 1));
        assert!(rule_set.matches("x", b"y"));
    }

    #[test]
    fn empty_documents_load_empty() {
        let rule_set = RuleSet::from_str("rules: []\n").expect("loads");
        assert!(rule_set.names().is_empty());
        assert!(rule_set.scope().is_empty());
    }

    #[test]
    fn loads_from_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.yml");
        std::fs::write(&path, ARITHMETIC).expect("write rules");

        let rule_set = RuleSet::from_path(&path).expect("loads");
        assert!(rule_set.matches("number", b"7"));

        let err = RuleSet::from_path(&dir.path().join("absent.yml"))
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("failed to read rule set"));
    }
}

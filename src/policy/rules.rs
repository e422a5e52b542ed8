//! Policy rule language
//!
//! A rule is a boolean expression over checks such as `role:admin`,
//! `rule:admin_or_owner` or `project_id:%(project_id)s`, combined with
//! `and`, `or`, `not` and parentheses.
use std::collections::HashMap;

use serde_json::Value;

use crate::errors::DaemonError;

/// Recursion limit for `rule:` references, protects against cycles
const MAX_RULE_DEPTH: usize = 32;

/// Base rules every resource rule builds upon
const BASE_RULES: &[(&str, &str)] = &[
  ("context_is_admin", "role:admin"),
  ("admin_or_owner", "is_admin:True or project_id:%(project_id)s"),
  ("admin_api", "rule:context_is_admin"),
  ("admin_or_user", "is_admin:True or user_id:%(user_id)s"),
  ("cluster_user", "user_id:%(trustee_user_id)s"),
  ("deny_cluster_user", "not domain_id:%(trustee_domain_id)s"),
  ("default", "rule:admin_or_owner"),
];

const RESOURCE_RULES: &[(&str, &str)] = &[
  ("bay:create", "rule:deny_cluster_user"),
  ("bay:delete", "rule:deny_cluster_user"),
  ("bay:detail", "rule:deny_cluster_user"),
  ("bay:get", "rule:deny_cluster_user"),
  ("bay:get_all", "rule:deny_cluster_user"),
  ("bay:update", "rule:deny_cluster_user"),
  ("baymodel:create", "rule:deny_cluster_user"),
  ("baymodel:delete", "rule:deny_cluster_user and rule:admin_or_owner"),
  ("baymodel:detail", "rule:deny_cluster_user"),
  ("baymodel:get", "rule:deny_cluster_user"),
  ("baymodel:get_all", "rule:deny_cluster_user"),
  ("baymodel:update", "rule:deny_cluster_user and rule:admin_or_owner"),
  ("baymodel:publish", "rule:admin_api"),
  ("certificate:create", "rule:admin_or_user or rule:cluster_user"),
  ("certificate:get", "rule:admin_or_user or rule:cluster_user"),
  ("certificate:rotate_ca", "rule:admin_or_owner"),
  ("cluster:create", "rule:deny_cluster_user"),
  ("cluster:delete", "rule:deny_cluster_user"),
  ("cluster:delete_all_projects", "rule:admin_api"),
  ("cluster:detail", "rule:deny_cluster_user"),
  ("cluster:detail_all_projects", "rule:admin_api"),
  ("cluster:get", "rule:deny_cluster_user"),
  ("cluster:get_one_all_projects", "rule:admin_api"),
  ("cluster:get_all", "rule:deny_cluster_user"),
  ("cluster:get_all_all_projects", "rule:admin_api"),
  ("cluster:update", "rule:deny_cluster_user"),
  ("cluster:update_health_status", "rule:admin_or_user or rule:cluster_user"),
  ("cluster:update_all_projects", "rule:admin_api"),
  ("cluster:resize", "rule:deny_cluster_user"),
  ("cluster:resize_all_projects", "rule:admin_api"),
  ("cluster:upgrade", "rule:deny_cluster_user"),
  ("cluster:upgrade_all_projects", "rule:admin_api"),
  ("cluster_template:create", "rule:deny_cluster_user"),
  ("cluster_template:delete", "rule:deny_cluster_user and rule:admin_or_owner"),
  ("cluster_template:delete_all_projects", "rule:admin_api"),
  ("cluster_template:detail", "rule:deny_cluster_user"),
  ("cluster_template:detail_all_projects", "rule:admin_api"),
  ("cluster_template:get", "rule:deny_cluster_user"),
  ("cluster_template:get_one_all_projects", "rule:admin_api"),
  ("cluster_template:get_all", "rule:deny_cluster_user"),
  ("cluster_template:get_all_all_projects", "rule:admin_api"),
  ("cluster_template:update", "rule:deny_cluster_user and rule:admin_or_owner"),
  ("cluster_template:update_all_projects", "rule:admin_api"),
  ("cluster_template:publish", "rule:admin_api"),
  ("credential:rotate", "rule:admin_or_owner"),
  ("federation:create", "rule:deny_cluster_user"),
  ("federation:delete", "rule:deny_cluster_user"),
  ("federation:delete_all_projects", "rule:admin_api"),
  ("federation:detail", "rule:deny_cluster_user"),
  ("federation:get", "rule:deny_cluster_user"),
  ("federation:get_one_all_projects", "rule:admin_api"),
  ("federation:get_all", "rule:deny_cluster_user"),
  ("federation:update", "rule:deny_cluster_user"),
  ("federation:update_all_projects", "rule:admin_api"),
  ("nodegroup:get", "rule:admin_or_owner"),
  ("nodegroup:get_all", "rule:admin_or_owner"),
  ("nodegroup:get_all_all_projects", "rule:admin_api"),
  ("nodegroup:get_one_all_projects", "rule:admin_api"),
  ("nodegroup:create", "rule:admin_or_owner"),
  ("nodegroup:delete", "rule:admin_or_owner"),
  ("nodegroup:update", "rule:admin_or_owner"),
  ("quota:create", "rule:admin_api"),
  ("quota:delete", "rule:admin_api"),
  ("quota:get", "rule:default"),
  ("quota:get_all", "rule:admin_api"),
  ("quota:update", "rule:admin_api"),
  ("stats:get_all", "rule:admin_or_owner"),
  ("x509keypair:create", "rule:default"),
  ("x509keypair:delete", "rule:default"),
  ("x509keypair:detail", "rule:default"),
  ("x509keypair:get", "rule:default"),
  ("x509keypair:get_all", "rule:default"),
];

/// Parsed rule expression
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
  /// `@` or an empty rule
  Allow,
  /// `!`
  Deny,
  Role(String),
  Rule(String),
  /// `<credential field>:<match>`, `match` may reference the target with
  /// `%(key)s`
  Generic { field: String, pattern: String },
  Not(Box<Check>),
  And(Vec<Check>),
  Or(Vec<Check>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Open,
  Close,
  And,
  Or,
  Not,
  Check(String),
}

fn tokenize(rule: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  for raw in rule.split_whitespace() {
    let opened = raw.len() - raw.trim_start_matches('(').len();
    tokens.extend(std::iter::repeat(Token::Open).take(opened));
    let inner = &raw[opened..];
    // `%(key)s` never ends with a paren so trailing ones close groups
    let closed = inner.len() - inner.trim_end_matches(')').len();
    let inner = &inner[..inner.len() - closed];
    if !inner.is_empty() {
      let token = match inner.to_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Check(inner.to_owned()),
      };
      tokens.push(token);
    }
    tokens.extend(std::iter::repeat(Token::Close).take(closed));
  }
  tokens
}

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn parse_or(&mut self) -> Result<Check, String> {
    let mut checks = vec![self.parse_and()?];
    while self.peek() == Some(&Token::Or) {
      self.pos += 1;
      checks.push(self.parse_and()?);
    }
    if checks.len() == 1 {
      return Ok(checks.remove(0));
    }
    Ok(Check::Or(checks))
  }

  fn parse_and(&mut self) -> Result<Check, String> {
    let mut checks = vec![self.parse_not()?];
    while self.peek() == Some(&Token::And) {
      self.pos += 1;
      checks.push(self.parse_not()?);
    }
    if checks.len() == 1 {
      return Ok(checks.remove(0));
    }
    Ok(Check::And(checks))
  }

  fn parse_not(&mut self) -> Result<Check, String> {
    if self.peek() == Some(&Token::Not) {
      self.pos += 1;
      return Ok(Check::Not(Box::new(self.parse_not()?)));
    }
    self.parse_atom()
  }

  fn parse_atom(&mut self) -> Result<Check, String> {
    match self.next() {
      Some(Token::Open) => {
        let check = self.parse_or()?;
        match self.next() {
          Some(Token::Close) => Ok(check),
          _ => Err(String::from("unbalanced parenthesis")),
        }
      }
      Some(Token::Check(raw)) => parse_check(&raw),
      Some(token) => Err(format!("unexpected token {:?}", token)),
      None => Err(String::from("unexpected end of rule")),
    }
  }
}

fn parse_check(raw: &str) -> Result<Check, String> {
  match raw {
    "@" => return Ok(Check::Allow),
    "!" => return Ok(Check::Deny),
    _ => {}
  }
  let (kind, pattern) = raw
    .split_once(':')
    .ok_or_else(|| format!("malformed check {}", raw))?;
  let check = match kind {
    "role" => Check::Role(pattern.to_lowercase()),
    "rule" => Check::Rule(pattern.to_owned()),
    _ => Check::Generic {
      field: kind.to_owned(),
      pattern: pattern.to_owned(),
    },
  };
  Ok(check)
}

/// Parse a rule expression, an empty expression always passes
pub fn parse_rule(rule: &str) -> Result<Check, String> {
  let tokens = tokenize(rule);
  if tokens.is_empty() {
    return Ok(Check::Allow);
  }
  let mut parser = Parser { tokens, pos: 0 };
  let check = parser.parse_or()?;
  if parser.pos != parser.tokens.len() {
    return Err(format!("trailing tokens in rule {}", rule));
  }
  Ok(check)
}

/// Substitute `%(key)s` references with values of the target
fn interpolate(pattern: &str, target: &Value) -> Option<String> {
  let mut out = String::new();
  let mut rest = pattern;
  while let Some(start) = rest.find("%(") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    let end = after.find(")s")?;
    let value = target.get(&after[..end])?;
    out.push_str(&value_to_string(value)?);
    rest = &after[end + 2..];
  }
  out.push_str(rest);
  Some(out)
}

fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::Bool(true) => Some(String::from("True")),
    Value::Bool(false) => Some(String::from("False")),
    Value::String(s) => Some(s.to_owned()),
    other => Some(other.to_string()),
  }
}

/// Every known rule indexed by name
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
  rules: HashMap<String, Check>,
}

impl RuleSet {
  /// Build the default rules overridden by `overrides`
  pub fn with_overrides(
    overrides: &HashMap<String, String>,
  ) -> Result<Self, DaemonError> {
    let mut rules = HashMap::new();
    for (name, rule) in BASE_RULES.iter().chain(RESOURCE_RULES.iter()) {
      let check = parse_rule(rule).map_err(DaemonError::Policy)?;
      rules.insert(name.to_string(), check);
    }
    for (name, rule) in overrides {
      let check = parse_rule(rule)
        .map_err(|err| DaemonError::Policy(format!("{}: {}", name, err)))?;
      rules.insert(name.to_owned(), check);
    }
    Ok(RuleSet { rules })
  }

  pub fn get(&self, name: &str) -> Option<&Check> {
    self.rules.get(name)
  }

  /// Evaluate the named rule, unknown names use the `default` rule
  pub fn authorize(&self, name: &str, target: &Value, creds: &Value) -> bool {
    let check = match self.rules.get(name).or_else(|| self.rules.get("default"))
    {
      None => return false,
      Some(check) => check,
    };
    self.evaluate(check, target, creds, 0)
  }

  fn evaluate(
    &self,
    check: &Check,
    target: &Value,
    creds: &Value,
    depth: usize,
  ) -> bool {
    if depth > MAX_RULE_DEPTH {
      log::warn!("policy rule recursion limit reached");
      return false;
    }
    match check {
      Check::Allow => true,
      Check::Deny => false,
      Check::Role(role) => creds["roles"]
        .as_array()
        .map(|roles| {
          roles
            .iter()
            .filter_map(|r| r.as_str())
            .any(|r| r.eq_ignore_ascii_case(role))
        })
        .unwrap_or(false),
      Check::Rule(name) => match self.rules.get(name) {
        None => false,
        Some(inner) => self.evaluate(inner, target, creds, depth + 1),
      },
      Check::Generic { field, pattern } => {
        let expected = match interpolate(pattern, target) {
          None => return false,
          Some(expected) => expected,
        };
        match creds.get(field) {
          Some(Value::Array(values)) => values
            .iter()
            .filter_map(value_to_string)
            .any(|value| value == expected),
          Some(value) => value_to_string(value)
            .map(|value| value == expected)
            .unwrap_or(false),
          None => false,
        }
      }
      Check::Not(inner) => !self.evaluate(inner, target, creds, depth + 1),
      Check::And(checks) => checks
        .iter()
        .all(|c| self.evaluate(c, target, creds, depth + 1)),
      Check::Or(checks) => checks
        .iter()
        .any(|c| self.evaluate(c, target, creds, depth + 1)),
    }
  }
}

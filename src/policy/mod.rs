//! Policy enforcement
//!
//! Every api action is authorized against a `<resource>:<action>` rule
//! evaluated with the request credentials and a target dict.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};

use crate::context::RequestContext;
use crate::errors::{DaemonError, MagnumError};

pub mod rules;

pub use rules::RuleSet;

/// Process wide rule set, optionally backed by a policy file
#[derive(Clone)]
pub struct PolicyEnforcer {
  rules: Arc<RwLock<RuleSet>>,
  trustee_domain_id: Option<String>,
  watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
}

fn parse_policy_file(content: &str) -> Result<RuleSet, DaemonError> {
  let overrides = if content.trim().is_empty() {
    HashMap::new()
  } else {
    serde_yaml::from_str::<HashMap<String, String>>(content)?
  };
  RuleSet::with_overrides(&overrides)
}

fn reload(path: &Path, rules: &Arc<RwLock<RuleSet>>) {
  let parsed = std::fs::read_to_string(path)
    .map_err(DaemonError::from)
    .and_then(|content| parse_policy_file(&content));
  match parsed {
    Err(err) => {
      log::error!(
        "unable to reload policy file {}, keeping previous rules: {}",
        path.display(),
        err
      );
    }
    Ok(rule_set) => match rules.write() {
      Err(err) => log::error!("policy rules lock poisoned {}", err),
      Ok(mut guard) => {
        *guard = rule_set;
        log::info!("policy file {} reloaded", path.display());
      }
    },
  }
}

impl PolicyEnforcer {
  /// Default rules overridden by `overrides`
  pub fn new(
    overrides: &HashMap<String, String>,
    trustee_domain_id: Option<String>,
  ) -> Result<Self, DaemonError> {
    Ok(PolicyEnforcer {
      rules: Arc::new(RwLock::new(RuleSet::with_overrides(overrides)?)),
      trustee_domain_id,
      watcher: Arc::new(Mutex::new(None)),
    })
  }

  /// Load rules from a yaml policy file and reload them when it changes
  pub async fn load(
    policy_file: Option<&str>,
    trustee_domain_id: Option<String>,
  ) -> Result<Self, DaemonError> {
    let path = match policy_file {
      None => return Self::new(&HashMap::new(), trustee_domain_id),
      Some(path) => PathBuf::from(path),
    };
    if !path.exists() {
      log::warn!(
        "policy file {} not found, using default rules",
        path.display()
      );
      return Self::new(&HashMap::new(), trustee_domain_id);
    }
    let content = tokio::fs::read_to_string(&path).await?;
    let enforcer = PolicyEnforcer {
      rules: Arc::new(RwLock::new(parse_policy_file(&content)?)),
      trustee_domain_id,
      watcher: Arc::new(Mutex::new(None)),
    };
    enforcer.watch(path)?;
    Ok(enforcer)
  }

  fn watch(&self, path: PathBuf) -> Result<(), DaemonError> {
    let rules = self.rules.clone();
    let watched = path.clone();
    let mut watcher = notify::recommended_watcher(
      move |res: notify::Result<notify::Event>| match res {
        Err(err) => log::warn!("policy file watch error {}", err),
        Ok(event) => {
          if event.kind.is_modify() || event.kind.is_create() {
            reload(&watched, &rules);
          }
        }
      },
    )?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    if let Ok(mut guard) = self.watcher.lock() {
      *guard = Some(watcher);
    }
    Ok(())
  }

  /// Default target of a check: the caller itself
  fn default_target(ctx: &RequestContext) -> Value {
    json!({ "project_id": ctx.project_id, "user_id": ctx.user_id })
  }

  fn add_policy_attributes(&self, target: &mut Value) {
    if let Value::Object(map) = target {
      map.insert(
        String::from("trustee_domain_id"),
        json!(self.trustee_domain_id),
      );
    }
  }

  /// Authorize `rule` for the caller.
  ///
  /// Returns `Ok(false)` on denial when `do_raise` is false, a
  /// [`MagnumError::PolicyNotAuthorized`] otherwise.
  pub fn enforce(
    &self,
    ctx: &RequestContext,
    rule: &str,
    target: Option<Value>,
    do_raise: bool,
  ) -> Result<bool, MagnumError> {
    let mut target = target.unwrap_or_else(|| Self::default_target(ctx));
    self.add_policy_attributes(&mut target);
    let creds = ctx.to_policy_values();
    let allowed = self
      .rules
      .read()
      .map_err(|err| MagnumError::internal(format!("policy lock {}", err)))?
      .authorize(rule, &target, &creds);
    if !allowed {
      log::debug!(
        "policy {} denied for user {:?} project {:?}",
        rule,
        ctx.user_id,
        ctx.project_id
      );
      if do_raise {
        return Err(MagnumError::PolicyNotAuthorized(rule.to_owned()));
      }
    }
    Ok(allowed)
  }

  /// Enforce the `<resource>:<action>` rule bound to a handler
  pub fn enforce_wsgi(
    &self,
    ctx: &RequestContext,
    resource: &str,
    action: &str,
  ) -> Result<(), MagnumError> {
    self.enforce(ctx, &format!("{}:{}", resource, action), None, true)?;
    Ok(())
  }

  /// Whether the credentials satisfy `context_is_admin`
  pub fn check_is_admin(&self, ctx: &RequestContext) -> bool {
    let creds = ctx.to_policy_values();
    self
      .rules
      .read()
      .map(|rules| rules.authorize("context_is_admin", &creds, &creds))
      .unwrap_or(false)
  }
}

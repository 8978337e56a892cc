//! Declarative rules evaluated against configured actors.

use crate::config::Actor;
use crate::error::{Error, Result};
use gate::{Callback, Code, Invocation, Response};
use serde::Deserialize;
use std::str::FromStr;

/// What a rule decides for an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Allow,
    Deny,
    Abstain,
    /// Allowed for admins.
    Admin,
    /// Allowed for any present actor.
    Authenticated,
    /// Allowed for actors holding the role.
    Role(String),
}

impl Rule {
    /// The decision for `actor`; `None` means no opinion.
    pub fn decide(&self, actor: Option<&Actor>) -> Option<bool> {
        match self {
            Rule::Allow => Some(true),
            Rule::Deny => Some(false),
            Rule::Abstain => None,
            Rule::Admin => Some(actor.is_some_and(|actor| actor.admin)),
            Rule::Authenticated => Some(actor.is_some()),
            Rule::Role(role) => Some(actor.is_some_and(|actor| actor.has_role(role))),
        }
    }
}

impl FromStr for Rule {
    type Err = Error;

    fn from_str(rule: &str) -> Result<Self> {
        match rule {
            "allow" => Ok(Rule::Allow),
            "deny" => Ok(Rule::Deny),
            "abstain" => Ok(Rule::Abstain),
            "admin" => Ok(Rule::Admin),
            "authenticated" => Ok(Rule::Authenticated),
            _ => match rule.strip_prefix("role:") {
                Some(role) if !role.is_empty() => Ok(Rule::Role(role.to_string())),
                _ => Err(Error::UnknownRule {
                    rule: rule.to_string(),
                }),
            },
        }
    }
}

/// A rule as written in the config: a bare name or a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Name(String),
    Table {
        rule: String,
        message: Option<String>,
        code: Option<Code>,
        #[serde(default)]
        guests: bool,
        #[serde(default)]
        grant_only: bool,
    },
}

/// A parsed rule together with the message and code it reports.
///
/// Unless `guests` is set, the rule needs a present actor and is skipped
/// for guest checks. With `grant_only` a denial becomes no opinion, which
/// lets a before rule allow some actors without denying the rest.
#[derive(Debug, Clone)]
pub struct Decision {
    rule: Rule,
    message: Option<String>,
    code: Option<Code>,
    guests: bool,
    grant_only: bool,
}

impl Decision {
    pub fn response(&self, actor: Option<&Actor>) -> Option<Response> {
        let allowed = self.rule.decide(actor)?;
        if self.grant_only && !allowed {
            return None;
        }

        let mut response = Response::from(allowed);
        if let Some(message) = &self.message {
            response = response.with_message(message.clone());
        }
        if let Some(code) = &self.code {
            response = response.with_code(code.clone());
        }
        Some(response)
    }

    pub fn callback(&self) -> Callback<Actor> {
        let decision = self.clone();
        let respond = move |inv: &Invocation<'_, Actor>| decision.response(inv.actor());
        if self.guests {
            Callback::guest(respond)
        } else {
            Callback::new(respond)
        }
    }
}

impl TryFrom<&RuleSpec> for Decision {
    type Error = Error;

    fn try_from(spec: &RuleSpec) -> Result<Self> {
        match spec {
            RuleSpec::Name(rule) => Ok(Self {
                rule: rule.parse()?,
                message: None,
                code: None,
                guests: false,
                grant_only: false,
            }),
            RuleSpec::Table {
                rule,
                message,
                code,
                guests,
                grant_only,
            } => Ok(Self {
                rule: rule.parse()?,
                message: message.clone(),
                code: code.clone(),
                guests: *guests,
                grant_only: *grant_only,
            }),
        }
    }
}

//! Configuration loading from gatekeeper.toml.

use crate::error::{Error, Result};
use crate::rule::{Decision, Rule, RuleSpec};
use gate::{Argument, Arguments, ClassRegistry, Gate, Handler, Instance, Subject, SubjectType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Class method key that makes a class invokable.
pub const INVOKE_METHOD: &str = "invoke";

/// Placeholder replaced by the subject type in a `guess` pattern.
pub const GUESS_PLACEHOLDER: &str = "{}";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Interceptor rules run before every check.
    #[serde(default)]
    pub before: Vec<RuleSpec>,

    /// Interceptor rules run after every check.
    #[serde(default)]
    pub after: Vec<RuleSpec>,

    /// Pattern used to guess policy classes, e.g. `"{}Policy"`.
    pub guess: Option<String>,

    /// Known actors, selected with `--as`.
    #[serde(default)]
    pub actors: Vec<Actor>,

    /// Subject type hierarchy.
    #[serde(default)]
    pub types: BTreeMap<String, TypeConfig>,

    /// Declarative classes: method name to rule.
    #[serde(default)]
    pub classes: BTreeMap<String, BTreeMap<String, RuleSpec>>,

    /// Subject type (or interface) to policy class.
    #[serde(default)]
    pub policies: BTreeMap<String, String>,

    /// Ability name to rule or handler reference.
    #[serde(default)]
    pub abilities: BTreeMap<String, AbilityConfig>,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// A configured actor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Actor {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TypeConfig {
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub policy: String,
    /// Ability suffix to policy method; the default four when absent.
    pub abilities: Option<BTreeMap<String, String>>,
}

/// An `[abilities]` entry.
///
/// A string that names a rule is a rule; any other string is a
/// `"Class@method"` or `"Class"` reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AbilityConfig {
    Rule(RuleSpec),
    Reference(Vec<String>),
}

impl AbilityConfig {
    fn handler(&self) -> Result<Handler<Actor>> {
        match self {
            AbilityConfig::Rule(RuleSpec::Name(name)) if name.parse::<Rule>().is_err() => {
                Ok(Handler::from_reference(&json!(name))?)
            }
            AbilityConfig::Rule(spec) => Ok(Decision::try_from(spec)?.callback().into()),
            AbilityConfig::Reference(parts) => Ok(Handler::from_reference(&json!(parts))?),
        }
    }
}

/// A subject standing in for a record of a configured type.
struct Record {
    subject_type: SubjectType,
}

impl Subject for Record {
    fn subject_type(&self) -> SubjectType {
        self.subject_type.clone()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    pub fn actor(&self, name: &str) -> Result<Actor> {
        self.actors
            .iter()
            .find(|actor| actor.name == name)
            .cloned()
            .ok_or_else(|| Error::UnknownActor {
                name: name.to_string(),
            })
    }

    /// The subject type `name` with its configured parent and interfaces.
    /// Unconfigured names are plain types.
    pub fn subject_type(&self, name: &str) -> Result<SubjectType> {
        self.resolve_type(name, &mut Vec::new())
    }

    fn resolve_type(&self, name: &str, visiting: &mut Vec<String>) -> Result<SubjectType> {
        if visiting.iter().any(|seen| seen == name) {
            return Err(Error::Config(format!(
                "type '{name}' inherits from itself"
            )));
        }
        let Some(config) = self.types.get(name) else {
            return Ok(SubjectType::new(name));
        };

        visiting.push(name.to_string());
        let mut subject_type = SubjectType::new(name);
        if let Some(parent) = &config.extends {
            subject_type = subject_type.extends(&self.resolve_type(parent, visiting)?);
        }
        for interface in &config.implements {
            subject_type = subject_type.implements(&self.resolve_type(interface, visiting)?);
        }
        visiting.pop();

        Ok(subject_type)
    }

    /// Arguments for a check: nothing, a record of `subject`, or with
    /// `class` set the type itself.
    pub fn arguments(&self, subject: Option<&str>, class: bool) -> Result<Arguments> {
        let Some(name) = subject else {
            return Ok(Arguments::from(()));
        };
        let subject_type = self.subject_type(name)?;
        if class {
            Ok(Argument::Type(subject_type).into())
        } else {
            Ok(Argument::subject(Record { subject_type }).into())
        }
    }

    /// Every declarative class, with its rules parsed up front.
    pub fn classes(&self) -> Result<ClassRegistry<Actor>> {
        let mut classes = ClassRegistry::new();
        for (name, methods) in &self.classes {
            let methods = methods
                .iter()
                .map(|(method, spec)| Ok((method.clone(), Decision::try_from(spec)?)))
                .collect::<Result<Vec<_>>>()?;

            classes.register(name.clone(), move || {
                methods
                    .iter()
                    .fold(Instance::new(), |instance, (method, decision)| {
                        if method == INVOKE_METHOD {
                            instance.invokable(decision.callback())
                        } else {
                            instance.method(method.clone(), decision.callback())
                        }
                    })
            });
        }
        Ok(classes)
    }

    /// Build a gate for `actor` (a guest when `None`).
    pub fn gate(&self, actor: Option<Actor>) -> Result<Gate<Actor>> {
        let gate = Gate::new(self.classes()?, move || actor);

        for (subject_type, policy) in &self.policies {
            gate.policy(subject_type, policy);
        }

        for (ability, config) in &self.abilities {
            gate.define(ability, config.handler()?);
        }

        for resource in &self.resources {
            match &resource.abilities {
                Some(abilities) => gate.resource_with(
                    &resource.name,
                    &resource.policy,
                    abilities
                        .iter()
                        .map(|(ability, method)| (ability.as_str(), method.as_str())),
                ),
                None => gate.resource(&resource.name, &resource.policy),
            };
        }

        for spec in &self.before {
            gate.before(Decision::try_from(spec)?.callback());
        }
        for spec in &self.after {
            gate.after(Decision::try_from(spec)?.callback());
        }

        if let Some(pattern) = &self.guess {
            if !pattern.contains(GUESS_PLACEHOLDER) {
                return Err(Error::Config(format!(
                    "guess pattern '{pattern}' has no '{GUESS_PLACEHOLDER}'"
                )));
            }
            let pattern = pattern.clone();
            gate.guess_policy_names_using(move |subject_type| {
                vec![pattern.replace(GUESS_PLACEHOLDER, subject_type)]
            });
        }

        debug!(
            abilities = gate.abilities().len(),
            policies = self.policies.len(),
            guest = gate.actor().is_none(),
            "gate built from config"
        );
        Ok(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate::Code;
    use std::io::Write;

    const CONFIG: &str = r#"
before = [{ rule = "admin", grant_only = true }]
guess = "{}Policy"

[[actors]]
name = "root"
id = 1
admin = true

[[actors]]
name = "ed"
id = 2
roles = ["editor"]

[types.Content]
implements = ["Publishable"]

[types.Post]
extends = "Content"

[classes.PostPolicy]
view = { rule = "authenticated", guests = true }
update = "role:editor"
createAny = "role:editor"

[classes.CommentPolicy]
view = "allow"

[classes.Publisher]
invoke = { rule = "role:editor", message = "Editors only.", code = "not_editor" }

[classes.Photos]
view = "allow"
update = "deny"

[policies]
Content = "PostPolicy"

[abilities]
"read-docs" = { rule = "allow", guests = true }
publish = "Publisher"
archive = ["Photos", "update"]
export = "Photos@view"

[[resources]]
name = "photo"
policy = "Photos"

[[resources]]
name = "album"
policy = "Photos"
abilities = { show = "view" }
"#;

    fn config() -> Config {
        Config::parse(CONFIG).unwrap()
    }

    fn gate_as(config: &Config, name: Option<&str>) -> Gate<Actor> {
        let actor = name.map(|name| config.actor(name).unwrap());
        config.gate(actor).unwrap()
    }

    #[test]
    fn parse_full_config() {
        let config = config();
        assert_eq!(config.actors.len(), 2);
        assert_eq!(config.guess.as_deref(), Some("{}Policy"));
        assert!(config.actor("ed").unwrap().has_role("editor"));
        assert!(matches!(
            config.actor("nobody"),
            Err(Error::UnknownActor { .. })
        ));
    }

    #[test]
    fn empty_config_denies_everything() {
        let config = Config::parse("").unwrap();
        let gate = config.gate(None).unwrap();
        assert!(gate.abilities().is_empty());
        assert!(!gate.check("anything", ()));
    }

    #[test]
    fn subject_types_follow_configured_hierarchy() {
        let config = config();
        let post = config.subject_type("Post").unwrap();
        assert_eq!(post.ancestors(), vec!["Content"]);
        assert_eq!(post.interfaces(), vec!["Publishable"]);
        assert_eq!(config.subject_type("Other").unwrap().ancestors(), Vec::<&str>::new());
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let config = Config::parse(
            r#"
[types.A]
extends = "B"

[types.B]
extends = "A"
"#,
        )
        .unwrap();
        assert!(matches!(config.subject_type("A"), Err(Error::Config(_))));
    }

    #[test]
    fn policies_apply_through_the_hierarchy() {
        let config = config();
        let post = config.arguments(Some("Post"), false).unwrap();

        let ed = gate_as(&config, Some("ed"));
        assert!(ed.check("update", post.clone()));
        assert!(ed.check("view", post.clone()));

        let guest = gate_as(&config, None);
        assert!(!guest.check("update", post.clone()));
        assert!(!guest.check("view", post));
    }

    #[test]
    fn before_rule_lets_admins_through() {
        let config = config();
        let root = gate_as(&config, Some("root"));
        assert!(root.check(["publish", "archive", "photo.update"], ()));
    }

    #[test]
    fn class_mode_uses_any_methods() {
        let config = config();
        let ed = gate_as(&config, Some("ed"));
        let post_type = config.arguments(Some("Post"), true).unwrap();
        assert!(ed.check("create", post_type));
    }

    #[test]
    fn guessed_policies_cover_unbound_types() {
        let config = config();
        let comment = config.arguments(Some("Comment"), false).unwrap();
        let ed = gate_as(&config, Some("ed"));
        assert!(ed.check("view", comment));
    }

    #[test]
    fn abilities_accept_rules_and_references() {
        let config = config();
        let ed = gate_as(&config, Some("ed"));
        let guest = gate_as(&config, None);

        assert!(guest.check("read-docs", ()));
        assert!(ed.check("publish", ()));
        assert!(!ed.check("archive", ()));
        assert!(ed.check("export", ()));

        let denied = guest.inspect("publish", ());
        assert!(denied.denied());
        assert_eq!(denied.message(), None);

        let stranger = ed.for_user(Actor {
            name: "stranger".into(),
            id: 9,
            admin: false,
            roles: Vec::new(),
        });
        let failure = stranger.authorize("publish", ()).unwrap_err();
        assert_eq!(failure.message(), "Editors only.");
        assert_eq!(failure.code(), &Code::from("not_editor"));
    }

    #[test]
    fn resources_register_default_and_custom_abilities() {
        let config = config();
        let ed = gate_as(&config, Some("ed"));
        assert!(ed.has(["photo.view", "photo.create", "photo.update", "photo.delete"]));
        assert!(ed.has("album.show"));
        assert!(!ed.has("album.view"));
        assert!(ed.check("album.show", ()));
        assert!(!ed.check("photo.update", ()));
    }

    #[test]
    fn invalid_references_are_rejected() {
        let config = Config::parse(
            r#"
[abilities]
broken = ["Photos"]
"#,
        )
        .unwrap();
        assert!(matches!(
            config.gate(None),
            Err(Error::Gate(gate::Error::InvalidArgument(_)))
        ));
    }

    #[test]
    fn unknown_rules_are_rejected() {
        let config = Config::parse(
            r#"
[classes.Broken]
view = { rule = "sometimes" }
"#,
        )
        .unwrap();
        assert!(matches!(
            config.classes(),
            Err(Error::UnknownRule { .. })
        ));
    }

    #[test]
    fn guess_pattern_needs_placeholder() {
        let config = Config::parse(r#"guess = "Policy""#).unwrap();
        assert!(matches!(config.gate(None), Err(Error::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.classes.len(), 4);
        assert!(matches!(
            Config::load(file.path().with_extension("missing")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("actors = 3"),
            Err(Error::Parse(_))
        ));
    }
}

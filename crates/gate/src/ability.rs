//! Ability registry.

use crate::handler::Handler;
use crate::subject::Abilities;
use std::collections::HashMap;

/// Abilities registered by [`AbilityRegistry::resource`] when no map is given.
pub const DEFAULT_RESOURCE_ABILITIES: [(&str, &str); 4] = [
    ("view", "view"),
    ("create", "create"),
    ("update", "update"),
    ("delete", "delete"),
];

/// Ability name to handler.
pub struct AbilityRegistry<A> {
    abilities: HashMap<String, Handler<A>>,
}

impl<A> AbilityRegistry<A> {
    pub fn new() -> Self {
        Self {
            abilities: HashMap::new(),
        }
    }

    /// Register `handler` under `name`, replacing any earlier handler.
    pub fn define(&mut self, name: impl Into<String>, handler: Handler<A>) {
        self.abilities.insert(name.into(), handler);
    }

    /// Register `<name>.<ability>` for each `(ability, method)` pair, each
    /// calling `method` on `policy`.
    ///
    /// Returns the names that were registered.
    pub fn resource<'a>(
        &mut self,
        name: &str,
        policy: &str,
        abilities: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<String> {
        abilities
            .into_iter()
            .map(|(ability, method)| {
                let full = format!("{name}.{ability}");
                self.define(full.clone(), Handler::method(policy, method));
                full
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Handler<A>> {
        self.abilities.get(name)
    }

    /// True when every name is registered. An empty list is trivially true.
    pub fn has(&self, names: &Abilities) -> bool {
        names.iter().all(|name| self.abilities.contains_key(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.abilities.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<A> Default for AbilityRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Callback, Target};

    #[test]
    fn resource_registers_default_abilities() {
        let mut registry = AbilityRegistry::<()>::new();
        let names = registry.resource("photo", "PhotoPolicy", DEFAULT_RESOURCE_ABILITIES);
        assert_eq!(
            names,
            vec!["photo.view", "photo.create", "photo.update", "photo.delete"]
        );

        match registry.get("photo.update") {
            Some(Handler::Method {
                target: Target::Class(class),
                method,
            }) => {
                assert_eq!(class, "PhotoPolicy");
                assert_eq!(method, "update");
            }
            other => panic!("unexpected handler: {other:?}"),
        }
    }

    #[test]
    fn has_requires_every_name() {
        let mut registry = AbilityRegistry::<()>::new();
        registry.resource("test", "Resource", [("foo", "foo"), ("bar", "bar")]);

        assert!(registry.has(&vec!["test.foo", "test.bar"].into()));
        assert!(registry.has(&vec!["test.bar", "test.foo"].into()));
        assert!(!registry.has(&vec!["test.bar", "test.foo", "test.baz"].into()));
        assert!(registry.has(&"test.bar".into()));
        assert!(!registry.has(&vec!["baz"].into()));
        assert!(!registry.has(&vec![""].into()));
        assert!(!registry.has(&"".into()));
        assert!(registry.has(&Vec::<&str>::new().into()));
    }

    #[test]
    fn empty_registry_has_nothing_but_the_empty_list() {
        let registry = AbilityRegistry::<()>::new();
        assert!(!registry.has(&"".into()));
        assert!(registry.has(&Vec::<String>::new().into()));
    }

    #[test]
    fn later_definitions_replace_earlier_ones() {
        let mut registry = AbilityRegistry::<()>::new();
        registry.define("foo", Handler::invokable("First"));
        registry.define("foo", Callback::guest(|_| true).into());
        assert!(matches!(registry.get("foo"), Some(Handler::Inline(_))));
        assert_eq!(registry.names(), vec!["foo"]);
    }
}

//! The gate: orchestrates a single authorization check.

use crate::ability::{AbilityRegistry, DEFAULT_RESOURCE_ABILITIES};
use crate::error::{AuthorizationFailure, Result};
use crate::handler::{Callback, Container, Handler, Instance, Invocation, Outcome, Target};
use crate::interceptor::InterceptorChain;
use crate::naming;
use crate::resolver::{self, PolicyResolver, ResolvedPolicies};
use crate::response::Response;
use crate::subject::{Abilities, Arguments, SubjectType};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Registries shared by a gate and every gate derived from it.
struct Shared<A> {
    abilities: AbilityRegistry<A>,
    resolver: PolicyResolver,
    interceptors: InterceptorChain<A>,
}

/// An authorization gate for one actor.
///
/// Abilities, policy bindings, interceptors and the guess callback are
/// shared with gates produced by [`Gate::for_user`]; constructed policies
/// are cached per gate.
pub struct Gate<A> {
    container: Arc<dyn Container<A>>,
    shared: Arc<RwLock<Shared<A>>>,
    actor: Option<Arc<A>>,
    resolved: ResolvedPolicies<A>,
}

impl<A> Gate<A> {
    /// Create a gate. `actor` is asked once for the current actor; `None`
    /// makes every check a guest check.
    pub fn new<C, F>(container: C, actor: F) -> Self
    where
        C: Container<A> + 'static,
        F: FnOnce() -> Option<A>,
    {
        Self {
            container: Arc::new(container),
            shared: Arc::new(RwLock::new(Shared {
                abilities: AbilityRegistry::new(),
                resolver: PolicyResolver::new(),
                interceptors: InterceptorChain::new(),
            })),
            actor: actor().map(Arc::new),
            resolved: ResolvedPolicies::new(),
        }
    }

    /// A new gate for `actor` sharing this gate's registries.
    pub fn for_user(&self, actor: A) -> Self {
        Self {
            container: Arc::clone(&self.container),
            shared: Arc::clone(&self.shared),
            actor: Some(Arc::new(actor)),
            resolved: ResolvedPolicies::new(),
        }
    }

    pub fn actor(&self) -> Option<&A> {
        self.actor.as_deref()
    }

    /// Register an ability handler, replacing any earlier one.
    pub fn define(&self, ability: impl Into<String>, handler: impl Into<Handler<A>>) -> &Self {
        let ability = ability.into();
        debug!(ability = %ability, "defining ability");
        self.shared
            .write()
            .abilities
            .define(ability, handler.into());
        self
    }

    /// Register an ability from a reference: `"Class@method"`, `"Class"` or
    /// `["Class", "method"]`.
    pub fn define_reference(&self, ability: impl Into<String>, reference: &Value) -> Result<&Self> {
        let handler = Handler::from_reference(reference)?;
        Ok(self.define(ability, handler))
    }

    /// Register `<name>.view`, `.create`, `.update` and `.delete` against
    /// the same-named methods of `policy`.
    pub fn resource(&self, name: &str, policy: &str) -> Vec<String> {
        self.resource_with(name, policy, DEFAULT_RESOURCE_ABILITIES)
    }

    /// Register `<name>.<ability>` for each `(ability, method)` of `policy`.
    pub fn resource_with<'a>(
        &self,
        name: &str,
        policy: &str,
        abilities: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<String> {
        let names = self
            .shared
            .write()
            .abilities
            .resource(name, policy, abilities);
        debug!(resource = name, policy, abilities = ?names, "defining resource");
        names
    }

    /// Bind `policy` to a subject type or interface.
    pub fn policy(&self, subject_type: impl Into<String>, policy: impl Into<String>) -> &Self {
        let (subject_type, policy) = (subject_type.into(), policy.into());
        debug!(subject = %subject_type, policy = %policy, "binding policy");
        self.shared.write().resolver.bind(subject_type, policy);
        self
    }

    /// Register a hook run before every check.
    pub fn before(&self, handler: impl Into<Handler<A>>) -> &Self {
        self.shared.write().interceptors.push_before(handler.into());
        self
    }

    /// Register a hook run after every check.
    pub fn after(&self, handler: impl Into<Handler<A>>) -> &Self {
        self.shared.write().interceptors.push_after(handler.into());
        self
    }

    /// Guess policy identifiers for subject types without a binding.
    pub fn guess_policy_names_using<F>(&self, guesser: F) -> &Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.shared.write().resolver.guess_using(Arc::new(guesser));
        self
    }

    /// True when every named ability is registered.
    pub fn has(&self, abilities: impl Into<Abilities>) -> bool {
        self.shared.read().abilities.has(&abilities.into())
    }

    /// Registered ability names, sorted.
    pub fn abilities(&self) -> Vec<String> {
        self.shared.read().abilities.names()
    }

    /// Policy bindings as `(subject type, policy)`, sorted.
    pub fn policies(&self) -> Vec<(String, String)> {
        self.shared.read().resolver.bindings()
    }

    /// The policy for a subject type: bound (exact, ancestor, interface)
    /// or guessed.
    pub fn policy_for(&self, subject_type: impl Into<SubjectType>) -> Option<Arc<Instance<A>>> {
        let subject_type = subject_type.into();
        let (bound, guesser) = {
            let shared = self.shared.read();
            (
                shared.resolver.bound(&subject_type).map(str::to_string),
                shared.resolver.guesser(),
            )
        };

        if let Some(policy) = bound {
            return self.resolved.get_or_construct(&policy, self.container.as_ref());
        }

        let guesser = guesser?;
        resolver::guess(&guesser, subject_type.name(), self.container.as_ref())
    }

    /// True when every ability is allowed.
    pub fn check(&self, abilities: impl Into<Abilities>, arguments: impl Into<Arguments>) -> bool {
        let abilities: Abilities = abilities.into();
        let arguments = arguments.into();
        abilities
            .iter()
            .all(|ability| self.evaluate(ability, &arguments).allowed())
    }

    pub fn allows(&self, abilities: impl Into<Abilities>, arguments: impl Into<Arguments>) -> bool {
        self.check(abilities, arguments)
    }

    pub fn denies(&self, abilities: impl Into<Abilities>, arguments: impl Into<Arguments>) -> bool {
        !self.check(abilities, arguments)
    }

    /// True when at least one ability is allowed.
    pub fn any(&self, abilities: impl Into<Abilities>, arguments: impl Into<Arguments>) -> bool {
        let abilities: Abilities = abilities.into();
        let arguments = arguments.into();
        abilities
            .iter()
            .any(|ability| self.evaluate(ability, &arguments).allowed())
    }

    /// True when no ability is allowed.
    pub fn none(&self, abilities: impl Into<Abilities>, arguments: impl Into<Arguments>) -> bool {
        !self.any(abilities, arguments)
    }

    /// The response for `ability`. Never fails; unknown abilities are denied.
    pub fn inspect(&self, ability: &str, arguments: impl Into<Arguments>) -> Response {
        self.evaluate(ability, &arguments.into())
    }

    /// The response for `ability`, or the failure when it is denied.
    pub fn authorize(
        &self,
        ability: &str,
        arguments: impl Into<Arguments>,
    ) -> std::result::Result<Response, AuthorizationFailure> {
        self.inspect(ability, arguments).authorize()
    }

    /// The undecided result: `None` when nothing had an opinion.
    pub fn raw(&self, ability: &str, arguments: impl Into<Arguments>) -> Option<Response> {
        self.raw_with(ability, &arguments.into())
    }

    fn evaluate(&self, ability: &str, arguments: &Arguments) -> Response {
        let response = self.raw_with(ability, arguments).unwrap_or_else(Response::deny);
        debug!(
            ability,
            allowed = response.allowed(),
            guest = self.actor.is_none(),
            "authorization decided"
        );
        response
    }

    fn raw_with(&self, ability: &str, arguments: &Arguments) -> Option<Response> {
        let interceptors = self.shared.read().interceptors.clone();
        let invocation = Invocation::new(self.actor(), ability, arguments.as_slice());

        let result = match interceptors.run_before(&invocation, |handler, invocation| {
            self.call(handler, invocation)
        }) {
            Some(response) => Some(response),
            None => self.dispatch(&invocation, arguments),
        };

        interceptors.run_after(&invocation, result, |handler, invocation| {
            self.call(handler, invocation)
        })
    }

    /// Policy before hook, then policy method, then the registered handler.
    fn dispatch(&self, invocation: &Invocation<'_, A>, arguments: &Arguments) -> Option<Response> {
        let ability = invocation.ability();

        if let Some(policy) = arguments
            .subject_type()
            .and_then(|subject_type| self.policy_for(subject_type))
        {
            if let Some(response) = policy.call_before(invocation).into_response() {
                trace!(ability, "policy before hook decided");
                return Some(response);
            }

            let method = naming::policy_methods(ability, arguments.is_class_mode())
                .into_iter()
                .find_map(|name| policy.get(&name).cloned());
            if let Some(method) = method {
                let invocation = Invocation::new(self.actor(), ability, arguments.for_policy_method());
                return method.call(&invocation).into_response();
            }
        }

        let handler = self.shared.read().abilities.get(ability).cloned()?;
        self.call(&handler, invocation).into_response()
    }

    /// Invoke any handler shape, constructing class targets as needed.
    fn call(&self, handler: &Handler<A>, invocation: &Invocation<'_, A>) -> Outcome {
        match handler {
            Handler::Inline(callback) => callback.call(invocation),
            Handler::Method { target, method } => {
                self.call_target(target, invocation, |instance| instance.get(method).cloned())
            }
            Handler::Invokable(target) => {
                self.call_target(target, invocation, |instance| instance.invoke().cloned())
            }
        }
    }

    fn call_target<F>(&self, target: &Target<A>, invocation: &Invocation<'_, A>, select: F) -> Outcome
    where
        F: FnOnce(&Instance<A>) -> Option<Callback<A>>,
    {
        let instance = match target {
            Target::Instance(instance) => Arc::clone(instance),
            Target::Class(class) => {
                let Some(instance) = self.resolved.get_or_construct(class, self.container.as_ref())
                else {
                    return Outcome::abstain();
                };
                let before = instance.call_before(invocation);
                if !before.is_abstain() {
                    return before;
                }
                instance
            }
        };

        match select(&instance) {
            Some(callback) => callback.call(invocation),
            None => {
                trace!(ability = invocation.ability(), ?target, "target has no such method");
                Outcome::abstain()
            }
        }
    }
}

impl<A> fmt::Debug for Gate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.read();
        f.debug_struct("Gate")
            .field("guest", &self.actor.is_none())
            .field("abilities", &shared.abilities.names())
            .field("resolver", &shared.resolver)
            .field("resolved", &self.resolved.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ClassRegistry;

    struct User {
        id: u32,
    }

    fn gate() -> Gate<User> {
        Gate::new(ClassRegistry::new(), || Some(User { id: 1 }))
    }

    #[test]
    fn empty_gate_denies_and_has_nothing() {
        let gate = gate();
        assert!(!gate.check("anything", ()));
        assert!(!gate.has("anything"));
        assert_eq!(gate.raw("anything", ()), None);
    }

    #[test]
    fn closures_receive_the_current_actor() {
        let gate = gate();
        gate.define(
            "foo",
            Callback::new(|inv: &Invocation<'_, User>| inv.actor().map(|user| user.id == 1)),
        );
        assert!(gate.check("foo", ()));
    }

    #[test]
    fn for_user_fixes_a_new_actor_and_shares_abilities() {
        let gate = gate();
        gate.define(
            "foo",
            Callback::new(|inv: &Invocation<'_, User>| inv.actor().map(|user| user.id == 2)),
        );
        let other = gate.for_user(User { id: 2 });
        assert!(other.check("foo", ()));
        assert!(!gate.check("foo", ()));

        other.define("bar", Callback::guest(|_| true));
        assert!(gate.has("bar"));
    }

    #[test]
    fn define_reference_rejects_non_callables() {
        let gate = gate();
        assert!(gate.define_reference("foo", &serde_json::json!(1)).is_err());
        assert!(gate.define_reference("foo", &serde_json::json!("Posts@view")).is_ok());
        assert_eq!(gate.abilities(), vec!["foo"]);
    }

    #[test]
    fn debug_shows_actor_presence_and_registrations() {
        let gate = gate();
        gate.define("foo", Callback::guest(|_| true));
        gate.policy("Post", "PostPolicy");

        let debug = format!("{gate:?}");
        assert!(debug.contains("guest: false"), "{debug}");
        assert!(debug.contains("\"foo\""), "{debug}");
        assert!(debug.contains("PostPolicy"), "{debug}");
        assert!(debug.contains("resolved: 0"), "{debug}");

        let guest = Gate::<User>::new(ClassRegistry::new(), || None);
        assert!(format!("{guest:?}").contains("guest: true"));
    }
}

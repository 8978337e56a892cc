//! Callables: callbacks, constructed instances and handler references.

use crate::error::{AuthorizationFailure, Error, Result};
use crate::response::Response;
use crate::subject::{Argument, Subject};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a callable sees when it is invoked.
pub struct Invocation<'a, A> {
    actor: Option<&'a A>,
    ability: &'a str,
    arguments: &'a [Argument],
    result: Option<&'a Response>,
}

impl<'a, A> Invocation<'a, A> {
    pub(crate) fn new(actor: Option<&'a A>, ability: &'a str, arguments: &'a [Argument]) -> Self {
        Self {
            actor,
            ability,
            arguments,
            result: None,
        }
    }

    pub(crate) fn with_result(self, result: Option<&'a Response>) -> Self {
        Self { result, ..self }
    }

    pub fn actor(&self) -> Option<&'a A> {
        self.actor
    }

    pub fn ability(&self) -> &'a str {
        self.ability
    }

    pub fn arguments(&self) -> &'a [Argument] {
        self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&'a Argument> {
        self.arguments.get(index)
    }

    /// The argument at `index` downcast to a concrete subject.
    pub fn subject<T: Subject>(&self, index: usize) -> Option<&'a T> {
        self.argument(index)?.downcast_ref()
    }

    /// The plain value argument at `index`.
    pub fn value(&self, index: usize) -> Option<&'a Value> {
        self.argument(index)?.as_value()
    }

    /// The result reached so far; only set for after-interceptors.
    pub fn result(&self) -> Option<&'a Response> {
        self.result
    }

    pub fn allowed(&self) -> Option<bool> {
        self.result.map(Response::allowed)
    }
}

/// What a callable returns: no opinion, a response, or a raised failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome(std::result::Result<Option<Response>, AuthorizationFailure>);

impl Outcome {
    pub fn abstain() -> Self {
        Self(Ok(None))
    }

    /// The response this outcome stands for. A raised failure becomes its
    /// deny response.
    pub fn into_response(self) -> Option<Response> {
        match self.0 {
            Ok(response) => response,
            Err(failure) => Some(failure.into_response()),
        }
    }

    pub fn is_abstain(&self) -> bool {
        matches!(self.0, Ok(None))
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Self::abstain()
    }
}

impl From<bool> for Outcome {
    fn from(allowed: bool) -> Self {
        Self(Ok(Some(allowed.into())))
    }
}

impl From<Option<bool>> for Outcome {
    fn from(allowed: Option<bool>) -> Self {
        Self(Ok(allowed.map(Response::from)))
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self(Ok(Some(response)))
    }
}

impl From<Option<Response>> for Outcome {
    fn from(response: Option<Response>) -> Self {
        Self(Ok(response))
    }
}

impl From<AuthorizationFailure> for Outcome {
    fn from(failure: AuthorizationFailure) -> Self {
        Self(Err(failure))
    }
}

impl<T: Into<Outcome>> From<std::result::Result<T, AuthorizationFailure>> for Outcome {
    fn from(result: std::result::Result<T, AuthorizationFailure>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(failure) => failure.into(),
        }
    }
}

type CallbackFn<A> = dyn Fn(&Invocation<'_, A>) -> Outcome + Send + Sync;

/// A shared callable plus whether it needs a present actor.
pub struct Callback<A> {
    func: Arc<CallbackFn<A>>,
    requires_actor: bool,
}

impl<A> Callback<A> {
    /// A callable that is skipped when checks run for a guest.
    pub fn new<F, R>(func: F) -> Self
    where
        A: 'static,
        F: Fn(&Invocation<'_, A>) -> R + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        Self {
            func: Arc::new(move |invocation: &Invocation<'_, A>| func(invocation).into()),
            requires_actor: true,
        }
    }

    /// A callable that also runs when the actor is absent.
    pub fn guest<F, R>(func: F) -> Self
    where
        A: 'static,
        F: Fn(&Invocation<'_, A>) -> R + Send + Sync + 'static,
        R: Into<Outcome>,
    {
        Self {
            requires_actor: false,
            ..Self::new(func)
        }
    }

    pub fn requires_actor(&self) -> bool {
        self.requires_actor
    }

    /// Whether this callable may run for the invocation's actor.
    pub fn accepts(&self, invocation: &Invocation<'_, A>) -> bool {
        invocation.actor.is_some() || !self.requires_actor
    }

    /// Call unless the guest rule skips it; a skipped call has no opinion.
    pub fn call(&self, invocation: &Invocation<'_, A>) -> Outcome {
        if self.accepts(invocation) {
            (self.func)(invocation)
        } else {
            Outcome::abstain()
        }
    }
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            requires_actor: self.requires_actor,
        }
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("requires_actor", &self.requires_actor)
            .finish_non_exhaustive()
    }
}

/// Name of the policy-level before hook.
pub const BEFORE_METHOD: &str = "before";

/// A constructed object: named methods and an optional invoke entry point.
pub struct Instance<A> {
    methods: HashMap<String, Callback<A>>,
    invoke: Option<Callback<A>>,
}

impl<A> Instance<A> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            invoke: None,
        }
    }

    pub fn method(mut self, name: impl Into<String>, callback: Callback<A>) -> Self {
        self.methods.insert(name.into(), callback);
        self
    }

    /// Shorthand for the `before` method.
    pub fn before(self, callback: Callback<A>) -> Self {
        self.method(BEFORE_METHOD, callback)
    }

    pub fn invokable(mut self, callback: Callback<A>) -> Self {
        self.invoke = Some(callback);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Callback<A>> {
        self.methods.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn invoke(&self) -> Option<&Callback<A>> {
        self.invoke.as_ref()
    }

    /// Run the before hook, if there is one.
    pub fn call_before(&self, invocation: &Invocation<'_, A>) -> Outcome {
        self.get(BEFORE_METHOD)
            .map(|before| before.call(invocation))
            .unwrap_or_else(Outcome::abstain)
    }
}

impl<A> Default for Instance<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Instance<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Instance")
            .field("methods", &methods)
            .field("invokable", &self.invoke.is_some())
            .finish()
    }
}

/// The object-construction capability the gate delegates to.
pub trait Container<A>: Send + Sync {
    /// Build the instance registered under `identifier`.
    fn construct(&self, identifier: &str) -> Option<Arc<Instance<A>>>;
}

impl<A, F> Container<A> for F
where
    F: Fn(&str) -> Option<Arc<Instance<A>>> + Send + Sync,
{
    fn construct(&self, identifier: &str) -> Option<Arc<Instance<A>>> {
        self(identifier)
    }
}

type Constructor<A> = dyn Fn() -> Instance<A> + Send + Sync;

/// A container backed by a map of class identifiers to constructors.
pub struct ClassRegistry<A> {
    classes: HashMap<String, Arc<Constructor<A>>>,
}

impl<A> ClassRegistry<A> {
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, identifier: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Instance<A> + Send + Sync + 'static,
    {
        self.classes.insert(identifier.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.classes.contains_key(identifier)
    }
}

impl<A> Default for ClassRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Container<A> for ClassRegistry<A> {
    fn construct(&self, identifier: &str) -> Option<Arc<Instance<A>>> {
        self.classes
            .get(identifier)
            .map(|constructor| Arc::new(constructor()))
    }
}

/// The object a reference handler calls into.
pub enum Target<A> {
    /// A class identifier, constructed through the container at check time.
    Class(String),
    /// An already constructed instance.
    Instance(Arc<Instance<A>>),
}

impl<A> Clone for Target<A> {
    fn clone(&self) -> Self {
        match self {
            Target::Class(class) => Target::Class(class.clone()),
            Target::Instance(instance) => Target::Instance(Arc::clone(instance)),
        }
    }
}

impl<A> fmt::Debug for Target<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Class(class) => f.debug_tuple("Class").field(class).finish(),
            Target::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
        }
    }
}

/// A registered ability handler or interceptor.
pub enum Handler<A> {
    Inline(Callback<A>),
    Method { target: Target<A>, method: String },
    Invokable(Target<A>),
}

impl<A> Handler<A> {
    /// `"Class@method"` reference.
    pub fn method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Handler::Method {
            target: Target::Class(class.into()),
            method: method.into(),
        }
    }

    /// `[instance, method]` reference.
    pub fn instance_method(instance: Arc<Instance<A>>, method: impl Into<String>) -> Self {
        Handler::Method {
            target: Target::Instance(instance),
            method: method.into(),
        }
    }

    /// Invokable class reference.
    pub fn invokable(class: impl Into<String>) -> Self {
        Handler::Invokable(Target::Class(class.into()))
    }

    /// Parse a handler reference: `"Class@method"`, `"Class"` (invokable)
    /// or `["Class", "method"]`.
    pub fn from_reference(reference: &Value) -> Result<Self> {
        match reference {
            Value::String(reference) => Self::parse(reference),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(class), Value::String(method)]
                    if !class.is_empty() && !method.is_empty() =>
                {
                    Ok(Self::method(class.as_str(), method.as_str()))
                }
                _ => Err(invalid(reference)),
            },
            other => Err(invalid(other)),
        }
    }

    fn parse(reference: &str) -> Result<Self> {
        match reference.split_once('@') {
            Some((class, method))
                if !class.is_empty() && !method.is_empty() =>
            {
                Ok(Self::method(class, method))
            }
            None if !reference.is_empty() => Ok(Self::invokable(reference)),
            _ => Err(invalid(&Value::String(reference.to_string()))),
        }
    }
}

fn invalid(reference: &Value) -> Error {
    Error::InvalidArgument(format!(
        "callback must be a callable, a \"Class@method\" string or a [class, method] pair, got {reference}"
    ))
}

impl<A> From<Callback<A>> for Handler<A> {
    fn from(callback: Callback<A>) -> Self {
        Handler::Inline(callback)
    }
}

impl<A> Clone for Handler<A> {
    fn clone(&self) -> Self {
        match self {
            Handler::Inline(callback) => Handler::Inline(callback.clone()),
            Handler::Method { target, method } => Handler::Method {
                target: target.clone(),
                method: method.clone(),
            },
            Handler::Invokable(target) => Handler::Invokable(target.clone()),
        }
    }
}

impl<A> fmt::Debug for Handler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Inline(callback) => f.debug_tuple("Inline").field(callback).finish(),
            Handler::Method { target, method } => f
                .debug_struct("Method")
                .field("target", target)
                .field("method", method)
                .finish(),
            Handler::Invokable(target) => f.debug_tuple("Invokable").field(target).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn references_parse_into_handler_shapes() {
        let handler = Handler::<()>::from_reference(&json!("Posts@update")).unwrap();
        assert!(matches!(
            handler,
            Handler::Method { target: Target::Class(ref class), ref method }
                if class == "Posts" && method == "update"
        ));

        let handler = Handler::<()>::from_reference(&json!(["Posts", "view"])).unwrap();
        assert!(matches!(handler, Handler::Method { ref method, .. } if method == "view"));

        let handler = Handler::<()>::from_reference(&json!("a@b@c")).unwrap();
        assert!(matches!(
            handler,
            Handler::Method { target: Target::Class(ref class), ref method }
                if class == "a" && method == "b@c"
        ));

        let handler = Handler::<()>::from_reference(&json!("Invokable")).unwrap();
        assert!(matches!(handler, Handler::Invokable(Target::Class(ref class)) if class == "Invokable"));
    }

    #[test]
    fn non_callable_references_are_rejected() {
        for reference in [
            json!(1),
            json!(1.1),
            json!({}),
            json!([]),
            json!(""),
            json!("@update"),
            json!("Posts@"),
            json!(["Posts"]),
            json!(["Posts", 1]),
        ] {
            let err = Handler::<()>::from_reference(&reference).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{reference}");
        }
    }

    #[test]
    fn guest_rule_skips_actor_only_callbacks() {
        let strict = Callback::<u32>::new(|_| true);
        let guest = Callback::<u32>::guest(|_| true);
        let invocation = Invocation::new(None, "foo", &[]);

        assert!(strict.call(&invocation).is_abstain());
        assert_eq!(guest.call(&invocation).into_response(), Some(Response::allow()));

        let actor = 1;
        let invocation = Invocation::new(Some(&actor), "foo", &[]);
        assert_eq!(strict.call(&invocation).into_response(), Some(Response::allow()));
    }

    #[test]
    fn failures_read_as_denials() {
        let callback = Callback::<u32>::guest(|_| {
            Err::<bool, _>(AuthorizationFailure::new("Not allowed.", "some_code"))
        });
        let response = callback
            .call(&Invocation::new(None, "create", &[]))
            .into_response()
            .unwrap();
        assert!(response.denied());
        assert_eq!(response.message(), Some("Not allowed."));
    }

    #[test]
    fn class_registry_constructs_fresh_instances() {
        let mut classes = ClassRegistry::<u32>::new();
        classes.register("Posts", || Instance::new().method("view", Callback::new(|_| true)));

        let instance = classes.construct("Posts").unwrap();
        assert!(instance.has("view"));
        assert!(classes.construct("Missing").is_none());
    }
}

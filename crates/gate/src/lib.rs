//! In-process authorization gate.
//!
//! Given an actor (or a guest), an ability name and zero or more subject
//! arguments, a [`Gate`] decides allow or deny and produces a [`Response`]
//! carrying an optional message and code.
//!
//! # Overview
//!
//! A check runs through these stages:
//!
//! 1. **Before interceptors**: the first one with an opinion decides and
//!    the ability itself is never consulted.
//! 2. **Policy**: when the first argument is a subject (or a subject type),
//!    the policy bound to its type, an ancestor or an interface (or a
//!    guessed one) is asked: its `before` method first, then the method
//!    named after the ability.
//! 3. **Ability handler**: the handler registered with [`Gate::define`],
//!    used when no policy method applies.
//! 4. **After interceptors**: they see the result and may only decide
//!    when nothing has yet.
//!
//! Nothing deciding means deny.
//!
//! # Core Concepts
//!
//! ## Callbacks and guests
//!
//! Every callable is a [`Callback`] receiving an [`Invocation`]. Callbacks
//! built with [`Callback::new`] need a present actor and are skipped for
//! guests; [`Callback::guest`] also runs without one.
//!
//! ## Instances and the container
//!
//! Policies and class-style handlers are [`Instance`]s: tables of named
//! methods. The gate never builds them itself but asks a [`Container`],
//! such as a [`ClassRegistry`].
//!
//! # Example
//!
//! ```
//! use gate::{Argument, Callback, ClassRegistry, Gate, Instance, Subject, SubjectType};
//!
//! struct User { admin: bool }
//! struct Post;
//!
//! impl Subject for Post {
//!     fn subject_type(&self) -> SubjectType {
//!         SubjectType::new("Post")
//!     }
//! }
//!
//! let mut classes = ClassRegistry::<User>::new();
//! classes.register("PostPolicy", || {
//!     Instance::new().method(
//!         "update",
//!         Callback::new(|inv| inv.actor().map(|user: &User| user.admin)),
//!     )
//! });
//!
//! let gate = Gate::new(classes, || Some(User { admin: true }));
//! gate.policy("Post", "PostPolicy");
//! gate.define("publish", Callback::guest(|_| false));
//!
//! assert!(gate.check("update", Argument::subject(Post)));
//! assert!(gate.denies("publish", ()));
//! assert!(gate.authorize("publish", ()).is_err());
//! ```

mod ability;
mod error;
mod gate;
mod handler;
mod interceptor;
pub mod naming;
mod resolver;
mod response;
mod subject;

pub use ability::{AbilityRegistry, DEFAULT_RESOURCE_ABILITIES};
pub use error::{AuthorizationFailure, DEFAULT_DENIAL_MESSAGE, Error, Result};
pub use gate::Gate;
pub use handler::{
    BEFORE_METHOD, Callback, ClassRegistry, Container, Handler, Instance, Invocation, Outcome,
    Target,
};
pub use interceptor::InterceptorChain;
pub use resolver::{Guesser, PolicyResolver, ResolvedPolicies};
pub use response::{Code, Response};
pub use subject::{Abilities, Argument, Arguments, Subject, SubjectType};

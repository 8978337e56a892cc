//! Subject type to policy resolution.

use crate::handler::{Container, Instance};
use crate::subject::SubjectType;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Produces candidate policy identifiers for an unbound subject type.
pub type Guesser = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Policy bindings plus the optional guess strategy.
#[derive(Default)]
pub struct PolicyResolver {
    bindings: HashMap<String, String>,
    guesser: Option<Guesser>,
}

impl PolicyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `policy` to `subject_type` (a type or an interface). Last write wins.
    pub fn bind(&mut self, subject_type: impl Into<String>, policy: impl Into<String>) {
        self.bindings.insert(subject_type.into(), policy.into());
    }

    pub fn guess_using(&mut self, guesser: Guesser) {
        self.guesser = Some(guesser);
    }

    pub fn guesser(&self) -> Option<Guesser> {
        self.guesser.clone()
    }

    /// The bound policy for `subject_type`: exact type first, then its
    /// ancestors most-derived first, then its interfaces.
    pub fn bound(&self, subject_type: &SubjectType) -> Option<&str> {
        if let Some(policy) = self.bindings.get(subject_type.name()) {
            return Some(policy);
        }

        for ancestor in subject_type.ancestors() {
            if let Some(policy) = self.bindings.get(ancestor) {
                trace!(subject = %subject_type, ancestor, %policy, "policy bound through ancestor");
                return Some(policy);
            }
        }

        for interface in subject_type.interfaces() {
            if let Some(policy) = self.bindings.get(interface) {
                trace!(subject = %subject_type, interface, %policy, "policy bound through interface");
                return Some(policy);
            }
        }

        None
    }

    /// All bindings as `(subject type, policy)`, sorted by subject type.
    pub fn bindings(&self) -> Vec<(String, String)> {
        let mut bindings: Vec<_> = self
            .bindings
            .iter()
            .map(|(ty, policy)| (ty.clone(), policy.clone()))
            .collect();
        bindings.sort();
        bindings
    }
}

impl fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("bindings", &self.bindings)
            .field("guesser", &self.guesser.is_some())
            .finish()
    }
}

/// Run `guesser` and construct the first candidate the container knows.
///
/// Never cached: every unresolved lookup guesses again.
pub fn guess<A>(
    guesser: &Guesser,
    subject_type: &str,
    container: &dyn Container<A>,
) -> Option<Arc<Instance<A>>> {
    let candidates = guesser(subject_type);
    trace!(subject = subject_type, ?candidates, "guessing policy");
    candidates
        .iter()
        .find_map(|candidate| container.construct(candidate))
}

/// Instances constructed for one gate, keyed by class identifier.
pub struct ResolvedPolicies<A> {
    instances: Mutex<HashMap<String, Arc<Instance<A>>>>,
}

impl<A> ResolvedPolicies<A> {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The cached instance of `class`, constructing it on first use.
    pub fn get_or_construct(
        &self,
        class: &str,
        container: &dyn Container<A>,
    ) -> Option<Arc<Instance<A>>> {
        if let Some(instance) = self.instances.lock().get(class) {
            return Some(Arc::clone(instance));
        }

        // Construct without holding the lock; constructors are host code.
        let Some(instance) = container.construct(class) else {
            warn!(class, "class could not be constructed");
            return None;
        };

        let mut instances = self.instances.lock();
        Some(Arc::clone(
            instances.entry(class.to_string()).or_insert(instance),
        ))
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A> Default for ResolvedPolicies<A> {
    fn default() -> Self {
        Self::new()
    }
}

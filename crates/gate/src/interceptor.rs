//! Before/after interceptors.

use crate::handler::{Handler, Invocation, Outcome};
use crate::response::Response;
use tracing::trace;

/// Ordered before and after hooks run around every check.
pub struct InterceptorChain<A> {
    before: Vec<Handler<A>>,
    after: Vec<Handler<A>>,
}

impl<A> InterceptorChain<A> {
    pub fn new() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn push_before(&mut self, handler: Handler<A>) {
        self.before.push(handler);
    }

    pub fn push_after(&mut self, handler: Handler<A>) {
        self.after.push(handler);
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run before hooks in order until one has an opinion.
    ///
    /// `call` invokes a handler, applying the guest rule.
    pub fn run_before<F>(&self, invocation: &Invocation<'_, A>, call: F) -> Option<Response>
    where
        F: Fn(&Handler<A>, &Invocation<'_, A>) -> Outcome,
    {
        for (index, handler) in self.before.iter().enumerate() {
            if let Some(response) = call(handler, invocation).into_response() {
                trace!(
                    ability = invocation.ability(),
                    index,
                    allowed = response.allowed(),
                    "before interceptor decided"
                );
                return Some(response);
            }
        }
        None
    }

    /// Run every after hook in order. Only the first opinion reached while
    /// the result is still unknown is kept; later hooks only observe.
    pub fn run_after<F>(
        &self,
        invocation: &Invocation<'_, A>,
        mut result: Option<Response>,
        call: F,
    ) -> Option<Response>
    where
        F: Fn(&Handler<A>, &Invocation<'_, A>) -> Outcome,
    {
        for (index, handler) in self.after.iter().enumerate() {
            let seen = Invocation::new(invocation.actor(), invocation.ability(), invocation.arguments())
                .with_result(result.as_ref());
            let outcome = call(handler, &seen).into_response();
            if result.is_none() {
                if let Some(response) = outcome {
                    trace!(
                        ability = invocation.ability(),
                        index,
                        allowed = response.allowed(),
                        "after interceptor decided"
                    );
                    result = Some(response);
                }
            }
        }
        result
    }
}

impl<A> Clone for InterceptorChain<A> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<A> Default for InterceptorChain<A> {
    fn default() -> Self {
        Self::new()
    }
}

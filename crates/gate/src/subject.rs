//! Subject types and check arguments.

use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Runtime descriptor of a subject type: its name, parent and interfaces.
///
/// Interfaces are themselves `SubjectType`s, so an interface may extend
/// another interface.
#[derive(Clone, PartialEq, Eq)]
pub struct SubjectType(Arc<TypeInner>);

#[derive(PartialEq, Eq)]
struct TypeInner {
    name: String,
    parent: Option<SubjectType>,
    interfaces: Vec<SubjectType>,
}

impl SubjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(TypeInner {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
        }))
    }

    /// Set the parent type.
    pub fn extends(self, parent: &SubjectType) -> Self {
        let mut inner = self.into_inner();
        inner.parent = Some(parent.clone());
        Self(Arc::new(inner))
    }

    /// Add an implemented interface.
    pub fn implements(self, interface: &SubjectType) -> Self {
        let mut inner = self.into_inner();
        inner.interfaces.push(interface.clone());
        Self(Arc::new(inner))
    }

    fn into_inner(self) -> TypeInner {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| TypeInner {
            name: shared.name.clone(),
            parent: shared.parent.clone(),
            interfaces: shared.interfaces.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&SubjectType> {
        self.0.parent.as_ref()
    }

    /// Names of all ancestors, most-derived first.
    pub fn ancestors(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self.parent();
        while let Some(ty) = current {
            names.push(ty.name());
            current = ty.parent();
        }
        names
    }

    /// Names of every interface reachable from this type, including those
    /// inherited from ancestors and extended by other interfaces.
    pub fn interfaces(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            for interface in &ty.0.interfaces {
                collect_interface(interface, &mut names);
            }
            current = ty.parent();
        }
        names
    }
}

fn collect_interface<'a>(interface: &'a SubjectType, names: &mut Vec<&'a str>) {
    if !names.contains(&interface.name()) {
        names.push(interface.name());
    }
    for parent in interface.parent().into_iter().chain(&interface.0.interfaces) {
        collect_interface(parent, names);
    }
}

impl fmt::Debug for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubjectType").field(&self.0.name).finish()
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for SubjectType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SubjectType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A value that can be checked against policies.
pub trait Subject: Any + Send + Sync {
    fn subject_type(&self) -> SubjectType;
}

/// A single argument passed to a check.
#[derive(Clone)]
pub enum Argument {
    /// A subject type rather than an instance (a class-mode check).
    Type(SubjectType),
    /// A subject instance.
    Subject(Arc<dyn Subject>),
    /// Plain data.
    Value(Value),
}

impl Argument {
    pub fn subject(subject: impl Subject) -> Self {
        Argument::Subject(Arc::new(subject))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Argument::Value(value.into())
    }

    /// The subject type this argument names or carries, if any.
    pub fn subject_type(&self) -> Option<SubjectType> {
        match self {
            Argument::Type(ty) => Some(ty.clone()),
            Argument::Subject(subject) => Some(subject.subject_type()),
            Argument::Value(_) => None,
        }
    }

    /// Downcast a subject argument to its concrete type.
    pub fn downcast_ref<T: Subject>(&self) -> Option<&T> {
        match self {
            Argument::Subject(subject) => {
                let subject: &dyn Subject = &**subject;
                let any: &dyn Any = subject;
                any.downcast_ref::<T>()
            }
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            Argument::Subject(subject) => f
                .debug_tuple("Subject")
                .field(&subject.subject_type())
                .finish(),
            Argument::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

impl From<SubjectType> for Argument {
    fn from(ty: SubjectType) -> Self {
        Argument::Type(ty)
    }
}

impl From<Arc<dyn Subject>> for Argument {
    fn from(subject: Arc<dyn Subject>) -> Self {
        Argument::Subject(subject)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// The normalized argument list of a check.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    /// A check is in class mode when its first argument is a type.
    pub fn is_class_mode(&self) -> bool {
        matches!(self.0.first(), Some(Argument::Type(_)))
    }

    /// Subject type of the first argument.
    pub fn subject_type(&self) -> Option<SubjectType> {
        self.0.first().and_then(Argument::subject_type)
    }

    /// Arguments handed to a policy method: the leading type is dropped in
    /// class mode.
    pub fn for_policy_method(&self) -> &[Argument] {
        if self.is_class_mode() {
            &self.0[1..]
        } else {
            &self.0
        }
    }

    pub fn as_slice(&self) -> &[Argument] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<()> for Arguments {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Argument> for Arguments {
    fn from(argument: Argument) -> Self {
        Self(vec![argument])
    }
}

impl From<SubjectType> for Arguments {
    fn from(ty: SubjectType) -> Self {
        Self(vec![Argument::Type(ty)])
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(arguments: Vec<Argument>) -> Self {
        Self(arguments)
    }
}

impl<const N: usize> From<[Argument; N]> for Arguments {
    fn from(arguments: [Argument; N]) -> Self {
        Self(arguments.into())
    }
}

impl From<&[Argument]> for Arguments {
    fn from(arguments: &[Argument]) -> Self {
        Self(arguments.to_vec())
    }
}

/// One or more ability names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abilities(Vec<String>);

impl Abilities {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Abilities {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for Abilities {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for Abilities {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for Abilities {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Abilities {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Abilities {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|name| name.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl Subject for Dummy {
        fn subject_type(&self) -> SubjectType {
            SubjectType::new("Dummy")
        }
    }

    #[test]
    fn ancestors_are_most_derived_first() {
        let base = SubjectType::new("Model");
        let dummy = SubjectType::new("Dummy").extends(&base);
        let sub = SubjectType::new("SubDummy").extends(&dummy);
        assert_eq!(sub.ancestors(), vec!["Dummy", "Model"]);
        assert!(base.ancestors().is_empty());
    }

    #[test]
    fn interfaces_include_inherited_and_extended() {
        let arrayable = SubjectType::new("Arrayable");
        let jsonable = SubjectType::new("Jsonable").extends(&arrayable);
        let contract = SubjectType::new("DummyInterface");
        let dummy = SubjectType::new("Dummy")
            .implements(&contract)
            .implements(&jsonable);
        let sub = SubjectType::new("SubDummy")
            .implements(&arrayable)
            .extends(&dummy);

        assert_eq!(
            sub.interfaces(),
            vec!["Arrayable", "DummyInterface", "Jsonable"]
        );
    }

    #[test]
    fn class_mode_drops_leading_type_for_policy_methods() {
        let args = Arguments::from(vec![
            Argument::Type(SubjectType::new("Dummy")),
            Argument::value(true),
        ]);
        assert!(args.is_class_mode());
        assert_eq!(args.for_policy_method().len(), 1);

        let args = Arguments::from(Argument::subject(Dummy));
        assert!(!args.is_class_mode());
        assert_eq!(args.for_policy_method().len(), 1);
        assert_eq!(args.subject_type().unwrap().name(), "Dummy");
    }

    #[test]
    fn subject_arguments_downcast() {
        let arg = Argument::subject(Dummy);
        assert!(arg.downcast_ref::<Dummy>().is_some());
        assert!(Argument::value(1).downcast_ref::<Dummy>().is_none());
    }
}

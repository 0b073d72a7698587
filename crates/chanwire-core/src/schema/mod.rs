//! Field binding tables.
//!
//! A message type lists its serializable fields explicitly through
//! [`Schema::declare`]. The resolved order is the wire format:
//!
//! 1. the type's own fields, in declaration order;
//! 2. then the fields of the embedded ancestor named by [`FieldList::inherit`],
//!    resolved the same way (its own fields, then its ancestor, ...).
//!
//! Resolution happens once, at registration; errors abort that registration.

mod accessor;
mod marshal;

use std::any::type_name;
use std::collections::HashSet;

use crate::error::{ChanwireError, Result};
use crate::protocol::WireType;

pub use accessor::{Accessor, FieldStorage};
pub use marshal::WireField;

/// A type with a declared field layout.
///
/// ```ignore
/// impl Schema for Move {
///     fn declare(f: &mut FieldList<Self>) {
///         f.field("dx", |m: &Self| &m.dx, |m| &mut m.dx).marshalled_as("i8");
///         f.field("sprint", |m: &Self| &m.sprint, |m| &mut m.sprint);
///         f.inherit(|m: &Self| &m.base, |m| &mut m.base);
///     }
/// }
/// ```
pub trait Schema: Sized + Send + Sync + 'static {
    fn declare(fields: &mut FieldList<Self>);
}

/// One declared field, before its wire type is resolved.
pub struct FieldDecl<M> {
    accessor: Accessor<M>,
    default_wire: WireType,
    accepts: fn(WireType) -> bool,
    storage: &'static str,
    tag: Option<&'static str>,
    conflicting_tag: Option<&'static str>,
}

impl<M> FieldDecl<M> {
    /// Override the wire type (`"u8"`, `"i8"`, `"varint"`, ...).
    pub fn marshalled_as(&mut self, tag: &'static str) -> &mut Self {
        match self.tag {
            Some(prev) if prev != tag => self.conflicting_tag = Some(tag),
            _ => self.tag = Some(tag),
        }
        self
    }
}

type AncestorFields<M> = Box<dyn FnOnce() -> Result<Vec<WireField<M>>>>;

/// Collects a type's field declarations.
pub struct FieldList<M> {
    own: Vec<FieldDecl<M>>,
    ancestor: Option<AncestorFields<M>>,
    ancestors_declared: usize,
}

impl<M: 'static> FieldList<M> {
    fn new() -> Self {
        Self {
            own: Vec::new(),
            ancestor: None,
            ancestors_declared: 0,
        }
    }

    /// Declare a read/write field.
    pub fn field<T: FieldStorage>(
        &mut self,
        name: &'static str,
        get: fn(&M) -> &T,
        get_mut: fn(&mut M) -> &mut T,
    ) -> &mut FieldDecl<M> {
        self.push::<T>(Accessor::new(name, get, get_mut))
    }

    /// Declare a field without a setter. Registration rejects it.
    pub fn read_only<T: FieldStorage>(
        &mut self,
        name: &'static str,
        get: fn(&M) -> &T,
    ) -> &mut FieldDecl<M> {
        self.push::<T>(Accessor::read_only(name, get))
    }

    /// Append the fields of the embedded ancestor `P` after this type's own.
    pub fn inherit<P: Schema>(&mut self, inner: fn(&M) -> &P, inner_mut: fn(&mut M) -> &mut P) {
        self.ancestors_declared += 1;
        self.ancestor = Some(Box::new(move || {
            Ok(resolve::<P>()?
                .into_iter()
                .map(|f| f.project(inner, inner_mut))
                .collect())
        }));
    }

    fn push<T: FieldStorage>(&mut self, accessor: Accessor<M>) -> &mut FieldDecl<M> {
        let idx = self.own.len();
        self.own.push(FieldDecl {
            accessor,
            default_wire: T::DEFAULT_WIRE,
            accepts: T::accepts,
            storage: type_name::<T>(),
            tag: None,
            conflicting_tag: None,
        });
        &mut self.own[idx]
    }

    fn resolve(self) -> Result<Vec<WireField<M>>> {
        let message = type_name::<M>();
        if self.ancestors_declared > 1 {
            return Err(ChanwireError::MarshalSpec {
                message,
                field: "<ancestor>",
                reason: format!("{} ancestors declared, at most one", self.ancestors_declared),
            });
        }

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.own.len());
        for decl in self.own {
            let field = decl.accessor.name();
            let access = |reason: &str| ChanwireError::Access {
                message,
                field,
                reason: reason.to_string(),
            };
            if field.is_empty() {
                return Err(access("empty field name"));
            }
            if !seen.insert(field) {
                return Err(access("field declared twice"));
            }
            if !decl.accessor.is_writable() {
                return Err(access("field has no setter"));
            }

            let marshal_err = |reason: String| ChanwireError::MarshalSpec {
                message,
                field,
                reason,
            };
            if let (Some(a), Some(b)) = (decl.tag, decl.conflicting_tag) {
                return Err(marshal_err(format!("declared as both `{a}` and `{b}`")));
            }
            let wire = match decl.tag {
                Some(tag) => tag.parse::<WireType>().map_err(marshal_err)?,
                None => decl.default_wire,
            };
            if !(decl.accepts)(wire) {
                return Err(marshal_err(format!("{} storage cannot travel as {wire}", decl.storage)));
            }
            out.push(WireField::new(decl.accessor, wire));
        }

        if let Some(ancestor) = self.ancestor {
            out.extend(ancestor()?);
        }
        Ok(out)
    }
}

/// Resolve the full ordered field list of `M`.
pub fn resolve<M: Schema>() -> Result<Vec<WireField<M>>> {
    let mut list = FieldList::new();
    M::declare(&mut list);
    list.resolve()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[derive(Default)]
    struct Root {
        w: u16,
    }

    impl Schema for Root {
        fn declare(f: &mut FieldList<Self>) {
            f.field("w", |m: &Self| &m.w, |m| &mut m.w);
        }
    }

    #[derive(Default)]
    struct Mid {
        z: i32,
        root: Root,
    }

    impl Schema for Mid {
        fn declare(f: &mut FieldList<Self>) {
            f.inherit(|m: &Self| &m.root, |m| &mut m.root);
            f.field("z", |m: &Self| &m.z, |m| &mut m.z);
        }
    }

    #[derive(Default)]
    struct Leaf {
        x: u8,
        y: String,
        mid: Mid,
    }

    impl Schema for Leaf {
        fn declare(f: &mut FieldList<Self>) {
            f.field("x", |m: &Self| &m.x, |m| &mut m.x);
            f.inherit(|m: &Self| &m.mid, |m| &mut m.mid);
            f.field("y", |m: &Self| &m.y, |m| &mut m.y);
        }
    }

    fn names<M: Schema>() -> Vec<&'static str> {
        resolve::<M>().unwrap().iter().map(|f| f.name()).collect()
    }

    #[test]
    fn own_fields_then_ancestors_regardless_of_call_order() {
        assert_eq!(names::<Leaf>(), vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn default_wire_types_follow_storage() {
        let fields = resolve::<Leaf>().unwrap();
        let wires: Vec<_> = fields.iter().map(|f| f.wire_type()).collect();
        assert_eq!(
            wires,
            vec![WireType::U8, WireType::Str, WireType::I32, WireType::U16]
        );
    }

    struct BadTag {
        s: String,
    }

    impl Schema for BadTag {
        fn declare(f: &mut FieldList<Self>) {
            f.field("s", |m: &Self| &m.s, |m| &mut m.s).marshalled_as("u8");
        }
    }

    struct UnknownTag {
        n: i32,
    }

    impl Schema for UnknownTag {
        fn declare(f: &mut FieldList<Self>) {
            f.field("n", |m: &Self| &m.n, |m| &mut m.n).marshalled_as("u24");
        }
    }

    struct Contradiction {
        n: i32,
    }

    impl Schema for Contradiction {
        fn declare(f: &mut FieldList<Self>) {
            f.field("n", |m: &Self| &m.n, |m| &mut m.n)
                .marshalled_as("u8")
                .marshalled_as("i8");
        }
    }

    #[test]
    fn incompatible_or_unknown_tags_are_marshal_errors() {
        for err in [
            resolve::<BadTag>().err().unwrap(),
            resolve::<UnknownTag>().err().unwrap(),
            resolve::<Contradiction>().err().unwrap(),
        ] {
            assert!(matches!(err, ChanwireError::MarshalSpec { .. }), "{err}");
        }
    }

    struct NoSetter {
        n: i32,
    }

    impl Schema for NoSetter {
        fn declare(f: &mut FieldList<Self>) {
            f.read_only("n", |m: &Self| &m.n);
        }
    }

    struct Twice {
        n: i32,
    }

    impl Schema for Twice {
        fn declare(f: &mut FieldList<Self>) {
            f.field("n", |m: &Self| &m.n, |m| &mut m.n);
            f.field("n", |m: &Self| &m.n, |m| &mut m.n);
        }
    }

    #[test]
    fn unbindable_fields_are_access_errors() {
        let err = resolve::<NoSetter>().err().unwrap();
        assert!(matches!(err, ChanwireError::Access { field: "n", .. }));
        let err = resolve::<Twice>().err().unwrap();
        assert!(matches!(err, ChanwireError::Access { .. }));
    }

    struct TwoParents {
        a: Root,
        b: Root,
    }

    impl Schema for TwoParents {
        fn declare(f: &mut FieldList<Self>) {
            f.inherit(|m: &Self| &m.a, |m| &mut m.a);
            f.inherit(|m: &Self| &m.b, |m| &mut m.b);
        }
    }

    #[test]
    fn second_ancestor_is_rejected() {
        let err = resolve::<TwoParents>().err().unwrap();
        assert!(matches!(err, ChanwireError::MarshalSpec { .. }));
    }
}

//! Tag-driven storage column lists.
//!
//! A type describes its fields once, as a static table of
//! [`FieldDescriptor`]s (normally generated by `#[derive(Columns)]`), and
//! hands out its nested struct / pointer fields on demand. [`collect_columns`]
//! walks that description depth-first:
//!
//! - nested fields are walked before the field's own column is considered,
//!   so a container's descendants always precede its own column;
//! - a field contributes a column only when it is exported or embedded, has a
//!   column name other than `""` / `"-"`, and is not marked ignore;
//! - absent pointers (`None`) contribute nothing and are not descended into.
//!
//! The walk never fails. Anything it cannot descend into simply contributes
//! zero columns.

use std::sync::Arc;

/// Column name that explicitly excludes a field.
pub const SKIP_COLUMN: &str = "-";

/// Declared shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Leaf value; never descended into.
    Scalar,
    /// Inline struct.
    Struct,
    /// Owning pointer (`Box<T>`, `Option<T>`, `Option<Box<T>>`); may be absent.
    Pointer,
}

impl FieldKind {
    pub fn is_nested(&self) -> bool {
        !matches!(self, Self::Scalar)
    }
}

/// Static description of one struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name (or tuple index).
    pub name: &'static str,
    /// Storage column name, `""` when the field carries none.
    pub column: &'static str,
    /// `#[sql(ignore)]`
    pub ignore: bool,
    /// Field is `pub`.
    pub exported: bool,
    /// Field is embedded (its columns are promoted into the parent).
    pub embedded: bool,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// The column this field contributes by itself, if any.
    pub fn own_column(&self) -> Option<&'static str> {
        if !self.exported && !self.embedded {
            return None;
        }
        if self.column.is_empty() || self.column == SKIP_COLUMN || self.ignore {
            return None;
        }
        Some(self.column)
    }
}

/// A value whose storage columns can be listed.
///
/// Implement with `#[derive(Columns)]`:
///
/// ```
/// use redops::db::{Columns, collect_columns};
///
/// #[derive(Columns, Default)]
/// pub struct Audit {
///     #[db(column = "created_at")]
///     pub created_at: i64,
/// }
///
/// #[derive(Columns, Default)]
/// pub struct User {
///     #[db(column = "id")]
///     pub id: i64,
///     #[db(column = "name")]
///     pub name: String,
///     #[db(embed)]
///     pub audit: Audit,
/// }
///
/// assert_eq!(collect_columns(&User::default()), ["id", "name", "created_at"]);
/// ```
pub trait Columns {
    /// Field table for the value's current shape, in declaration order.
    fn fields(&self) -> &'static [FieldDescriptor];

    /// The value held by the nested field at `index`, or `None` when the
    /// field is a scalar or an absent pointer.
    fn nested(&self, index: usize) -> Option<&dyn Columns>;
}

impl<T: Columns + ?Sized> Columns for &T {
    fn fields(&self) -> &'static [FieldDescriptor] {
        (**self).fields()
    }

    fn nested(&self, index: usize) -> Option<&dyn Columns> {
        (**self).nested(index)
    }
}

impl<T: Columns + ?Sized> Columns for Box<T> {
    fn fields(&self) -> &'static [FieldDescriptor] {
        (**self).fields()
    }

    fn nested(&self, index: usize) -> Option<&dyn Columns> {
        (**self).nested(index)
    }
}

impl<T: Columns + ?Sized> Columns for Arc<T> {
    fn fields(&self) -> &'static [FieldDescriptor] {
        (**self).fields()
    }

    fn nested(&self, index: usize) -> Option<&dyn Columns> {
        (**self).nested(index)
    }
}

/// `None` is the nil pointer: no fields, no columns.
impl<T: Columns> Columns for Option<T> {
    fn fields(&self) -> &'static [FieldDescriptor] {
        match self {
            Some(value) => value.fields(),
            None => &[],
        }
    }

    fn nested(&self, index: usize) -> Option<&dyn Columns> {
        self.as_ref().and_then(|value| value.nested(index))
    }
}

/// Unit has no fields; it stands in for "not a struct".
impl Columns for () {
    fn fields(&self) -> &'static [FieldDescriptor] {
        &[]
    }

    fn nested(&self, _index: usize) -> Option<&dyn Columns> {
        None
    }
}

/// Collect the storage columns of `value` in binding order.
pub fn collect_columns<T: Columns + ?Sized>(value: &T) -> Vec<&'static str> {
    let mut columns = Vec::new();
    walk(value, &mut columns);
    columns
}

fn walk<T: Columns + ?Sized>(value: &T, columns: &mut Vec<&'static str>) {
    for (index, field) in value.fields().iter().enumerate() {
        if field.kind.is_nested() {
            if let Some(inner) = value.nested(index) {
                walk(inner, columns);
            }
        }
        if let Some(column) = field.own_column() {
            columns.push(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Columns;

    #[derive(Columns, Default)]
    pub struct A {
        #[db(column = "b")]
        pub b: i64,
        pub c: i64,
        pub d: i64,
        #[db(embed)]
        pub e: E,
    }

    #[derive(Columns, Default)]
    pub struct E {
        #[db(column = "i")]
        #[sql(ignore)]
        pub i: i64,
        #[db(embed)]
        pub f: F,
    }

    #[derive(Columns, Default)]
    pub struct F {
        #[db(column = "e")]
        pub f: i64,
    }

    #[derive(Columns, Default)]
    pub struct G {
        #[db(nested)]
        pub f: Option<Box<F>>,
    }

    #[derive(Columns, Default)]
    #[allow(dead_code)]
    pub struct Mixed {
        #[db(column = "id")]
        pub id: i64,
        #[db(column = "secret")]
        secret: String,
        #[db(column = "-")]
        pub skipped: i64,
        #[db(column = "")]
        pub empty: i64,
        #[db(embed, column = "hidden_embed")]
        hidden: F,
    }

    #[derive(Columns, Default)]
    pub struct Container {
        #[db(nested, column = "payload")]
        pub inner: F,
        #[db(column = "tail")]
        pub tail: i64,
    }

    #[derive(Columns, Default)]
    pub struct IgnoredWithoutColumn {
        #[sql(ignore)]
        pub note: String,
        #[db(column = "kept")]
        pub kept: i64,
    }

    #[derive(Columns, Default)]
    pub struct Tuple(#[db(column = "first")] pub i64, pub i64);

    #[test]
    fn test_embedded_and_ignored_fields() {
        assert_eq!(collect_columns(&A::default()), ["b", "e"]);
    }

    #[test]
    fn test_pointer_to_struct() {
        let a = Box::new(A::default());
        assert_eq!(collect_columns(&a), ["b", "e"]);
    }

    #[test]
    fn test_nil_values_yield_nothing() {
        assert!(collect_columns(&()).is_empty());
        assert!(collect_columns(&None::<Box<A>>).is_empty());
        assert!(collect_columns(&None::<A>).is_empty());
    }

    #[test]
    fn test_pointer_fields() {
        let g = G {
            f: Some(Box::new(F { f: 1 })),
        };
        assert_eq!(collect_columns(&g), ["e"]);
        assert!(collect_columns(&G::default()).is_empty());
    }

    #[test]
    fn test_visibility_and_sentinels() {
        // private fields only count when embedded
        assert_eq!(collect_columns(&Mixed::default()), ["id", "e", "hidden_embed"]);
    }

    #[test]
    fn test_nested_before_own_column() {
        assert_eq!(collect_columns(&Container::default()), ["e", "payload", "tail"]);
    }

    #[test]
    fn test_ignore_without_column_is_a_no_op() {
        assert_eq!(collect_columns(&IgnoredWithoutColumn::default()), ["kept"]);
        assert!(IgnoredWithoutColumn::default().fields()[0].ignore);
    }

    #[test]
    fn test_tuple_struct() {
        assert_eq!(collect_columns(&Tuple(1, 2)), ["first"]);
    }

    #[test]
    fn test_descriptor_table() {
        let fields = A::default().fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].name, "b");
        assert_eq!(fields[0].kind, FieldKind::Scalar);
        assert!(fields[3].embedded);
        assert_eq!(fields[3].kind, FieldKind::Struct);
        assert_eq!(G::default().fields()[0].kind, FieldKind::Pointer);
    }

    #[test]
    fn test_own_column_rules() {
        let field = FieldDescriptor {
            name: "x",
            column: "x",
            ignore: false,
            exported: false,
            embedded: false,
            kind: FieldKind::Scalar,
        };
        assert_eq!(field.own_column(), None);
        assert_eq!(
            FieldDescriptor {
                exported: true,
                ..field
            }
            .own_column(),
            Some("x")
        );
        assert_eq!(
            FieldDescriptor {
                exported: true,
                ignore: true,
                ..field
            }
            .own_column(),
            None
        );
    }
}

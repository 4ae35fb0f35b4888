// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`define_id!`] — string-backed newtype ID with an optional generated prefix
//! - [`wire_display!`] — `as_str` label accessor plus a forwarding `Display` impl
//! - [`test_builder!`] — test-data builder gated behind `test-support`

/// Define a newtype ID wrapper around `String`.
///
/// Generates `generate()` for random IDs (`{prefix}{nanoid}`), `new()` for
/// wrapping externally supplied IDs, `as_str()`, `Display`, `From`,
/// `PartialEq<str>`, `Borrow<str>`, and `Deref` implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct SheetId("sht-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random ID with the type prefix.
            pub fn generate() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
            }

            /// Wrap an existing ID string (externally generated or parsed).
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Map each unit variant of an enum to its stable wire label.
///
/// Generates a `pub fn as_str(&self) -> &'static str` returning the label
/// and a `Display` impl that forwards to it, so logs and wire formats agree.
///
/// ```ignore
/// crate::wire_display! {
///     MyStatus {
///         Pending => "pending",
///         Done => "done",
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_display {
    ($enum:ident { $( $variant:ident => $label:literal ),+ $(,)? }) => {
        impl $enum {
            /// Stable label for logs and wire formats.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Generate a test-data builder: `$target::builder()` hands out `$builder`
/// pre-filled with defaults, with one setter per field and a `build()` that
/// assembles the target. Everything is gated behind `test-support`.
///
/// Field groups:
/// - `text { field: Type = default }` — setter takes `impl Into<Type>`
/// - `plain { field: Type = default }` — setter takes the type directly
/// - `maybe { field: Type }` — stored as `Option<Type>`, `None` until set;
///   the setter wraps `Some(value.into())`
///
/// ```ignore
/// crate::test_builder! {
///     Widget via WidgetBuilder {
///         text { name: String = "test-widget" }
///         plain { size: u32 = 1 }
///         maybe { label: String }
///     }
/// }
/// ```
#[macro_export]
macro_rules! test_builder {
    (
        $target:ident via $builder:ident {
            $(text { $( $text_field:ident : $text_ty:ty = $text_default:expr ),* $(,)? })?
            $(plain { $( $plain_field:ident : $plain_ty:ty = $plain_default:expr ),* $(,)? })?
            $(maybe { $( $maybe_field:ident : $maybe_ty:ty ),* $(,)? })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $text_field: $text_ty, )*)?
            $($( $plain_field: $plain_ty, )*)?
            $($( $maybe_field: Option<$maybe_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            fn fresh() -> Self {
                Self {
                    $($( $text_field: $text_default.into(), )*)?
                    $($( $plain_field: $plain_default, )*)?
                    $($( $maybe_field: None, )*)?
                }
            }

            $($(
                pub fn $text_field(mut self, value: impl Into<$text_ty>) -> Self {
                    self.$text_field = value.into();
                    self
                }
            )*)?

            $($(
                pub fn $plain_field(mut self, value: $plain_ty) -> Self {
                    self.$plain_field = value;
                    self
                }
            )*)?

            $($(
                pub fn $maybe_field(mut self, value: impl Into<$maybe_ty>) -> Self {
                    self.$maybe_field = Some(value.into());
                    self
                }
            )*)?

            pub fn build(self) -> $target {
                $target {
                    $($( $text_field: self.$text_field, )*)?
                    $($( $plain_field: self.$plain_field, )*)?
                    $($( $maybe_field: self.$maybe_field, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Builder pre-filled with test defaults.
            pub fn builder() -> $builder {
                $builder::fresh()
            }
        }
    };
}

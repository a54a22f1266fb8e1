//! Shared serde helpers for identifiers that round-trip through their display string.

/// Implements `Deserialize` and `Serialize` for a type whose YAML form is its
/// `Display` string and which is parsed back through `FromStr`.
///
/// Parse failures are reported as serde custom errors carrying the
/// `FromStr` error message, so unknown identifiers surface with the field
/// location reported by `serde_yaml`.
///
/// # Parameters
///
/// - `$type`: The identifier type
/// - `$expecting`: A human-readable description for error messages
macro_rules! impl_display_fromstr_serde {
    ($type:ident, expecting: $expecting:expr) => {
        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                use ::serde::de;

                struct IdentifierVisitor;

                impl<'de> de::Visitor<'de> for IdentifierVisitor {
                    type Value = $type;

                    fn expecting(
                        &self,
                        formatter: &mut ::std::fmt::Formatter<'_>,
                    ) -> ::std::fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E>(self, v: &str) -> ::std::result::Result<Self::Value, E>
                    where
                        E: de::Error,
                    {
                        <$type as ::std::str::FromStr>::from_str(v).map_err(E::custom)
                    }
                }

                deserializer.deserialize_str(IdentifierVisitor)
            }
        }

        impl ::serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }
    };
}

pub(crate) use impl_display_fromstr_serde;

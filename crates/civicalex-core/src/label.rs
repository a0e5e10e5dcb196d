//! Closed enumerations whose wire form is a human-readable label.
//!
//! The labels are what users see in forms and what is stored in the database
//! (e.g. `"Under Review"`). Serde renames each variant to its label;
//! `Display` and `FromStr` read the same table.

macro_rules! labelled_enum {
  (
    $(#[$meta:meta])*
    pub enum $name:ident {
      $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
    }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub enum $name {
      $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
    }

    impl $name {
      /// Every variant, in declaration order.
      pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

      pub fn as_str(self) -> &'static str {
        match self {
          $( $name::$variant => $label ),+
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl std::str::FromStr for $name {
      type Err = $crate::Error;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $( $label => Ok($name::$variant), )+
          other => Err($crate::Error::UnknownLabel {
            kind:  stringify!($name),
            value: other.to_owned(),
          }),
        }
      }
    }
  };
}

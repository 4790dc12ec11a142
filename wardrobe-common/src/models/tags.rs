//! Closed tag vocabularies attached to wardrobe items and outfits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a lowercase string-backed enum with `ALL`, `as_str`,
/// `Display` and `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every value, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {} '{}'", stringify!($name), s))
            }
        }
    };
}

string_enum! {
    /// Garment category; every item has exactly one
    Category {
        Tops => "tops",
        Bottoms => "bottoms",
        Shoes => "shoes",
        Accessories => "accessories",
        Outerwear => "outerwear",
        Dresses => "dresses",
    }
}

string_enum! {
    /// Color tag vocabulary (`Multi` marks patterned or untagged items)
    ColorTag {
        Black => "black",
        White => "white",
        Gray => "gray",
        Red => "red",
        Orange => "orange",
        Yellow => "yellow",
        Green => "green",
        Blue => "blue",
        Purple => "purple",
        Brown => "brown",
        Pink => "pink",
        Beige => "beige",
        Multi => "multi",
    }
}

string_enum! {
    Season {
        Spring => "spring",
        Summer => "summer",
        Autumn => "autumn",
        Winter => "winter",
    }
}

string_enum! {
    /// Occasions an item can be tagged with
    Occasion {
        Casual => "casual",
        Formal => "formal",
        Party => "party",
        Work => "work",
        Sport => "sport",
    }
}

string_enum! {
    /// Requested mood of a generated outfit
    Mood {
        Professional => "professional",
        Casual => "casual",
        Elegant => "elegant",
        Sporty => "sporty",
        Edgy => "edgy",
        Romantic => "romantic",
    }
}

/// Occasion suggestions offered to the user. Generation accepts any string;
/// these are the conventional values.
pub const OCCASION_SUGGESTIONS: &[(&str, &str)] = &[
    ("work", "Work"),
    ("casual", "Casual Day Out"),
    ("date", "Date Night"),
    ("party", "Party"),
    ("formal", "Formal Event"),
    ("gym", "Gym/Sports"),
    ("travel", "Travel"),
    ("brunch", "Brunch"),
];

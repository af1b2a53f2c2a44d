//! Static layer catalog.
//!
//! Maps each user-facing layer name to the OpenStreetMap tag predicate used
//! to query it, the thematic domain its features are grouped under, and the
//! icon the rendering surface shows for it.
//!
//! ```
//! use cityscope::catalog::LayerCatalog;
//!
//! let catalog = LayerCatalog::builtin();
//! assert_eq!(catalog.domain_of("hospitals"), Some("health"));
//! assert_eq!(catalog.get("roads").unwrap().predicate.to_overpass(), "[\"highway\"]");
//! ```

use std::fmt;

/// Tag filter applied to map-source elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPredicate {
    /// Tag present with any value (`[key]`).
    Any(&'static str),
    /// Tag equal to a value (`[key=value]`).
    Equals(&'static str, &'static str),
    /// Tag equal to one of several values (`[key~"^(a|b)$"]`).
    OneOf(&'static str, &'static [&'static str]),
}

impl TagPredicate {
    /// Renders the predicate as an Overpass QL tag filter.
    pub fn to_overpass(&self) -> String {
        match self {
            TagPredicate::Any(key) => format!("[\"{}\"]", key),
            TagPredicate::Equals(key, value) => format!("[\"{}\"=\"{}\"]", key, value),
            TagPredicate::OneOf(key, values) => {
                format!("[\"{}\"~\"^({})$\"]", key, values.join("|"))
            }
        }
    }

    /// The tag key this predicate inspects.
    pub fn key(&self) -> &'static str {
        match self {
            TagPredicate::Any(key) | TagPredicate::Equals(key, _) | TagPredicate::OneOf(key, _) => {
                key
            }
        }
    }
}

impl fmt::Display for TagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_overpass())
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDefinition {
    pub name: &'static str,
    pub domain: &'static str,
    pub icon: &'static str,
    pub predicate: TagPredicate,
}

const BUILTIN_LAYERS: &[LayerDefinition] = &[
    LayerDefinition {
        name: "roads",
        domain: "mobility",
        icon: "road",
        predicate: TagPredicate::Any("highway"),
    },
    LayerDefinition {
        name: "bus_stops",
        domain: "mobility",
        icon: "bus",
        predicate: TagPredicate::Equals("highway", "bus_stop"),
    },
    LayerDefinition {
        name: "train_stations",
        domain: "mobility",
        icon: "train",
        predicate: TagPredicate::Equals("railway", "station"),
    },
    LayerDefinition {
        name: "bicycle_parking",
        domain: "mobility",
        icon: "bicycle",
        predicate: TagPredicate::Equals("amenity", "bicycle_parking"),
    },
    LayerDefinition {
        name: "hospitals",
        domain: "health",
        icon: "hospital",
        predicate: TagPredicate::Equals("amenity", "hospital"),
    },
    LayerDefinition {
        name: "clinics",
        domain: "health",
        icon: "stethoscope",
        predicate: TagPredicate::OneOf("amenity", &["clinic", "doctors"]),
    },
    LayerDefinition {
        name: "pharmacies",
        domain: "health",
        icon: "pills",
        predicate: TagPredicate::Equals("amenity", "pharmacy"),
    },
    LayerDefinition {
        name: "schools",
        domain: "education",
        icon: "school",
        predicate: TagPredicate::Equals("amenity", "school"),
    },
    LayerDefinition {
        name: "universities",
        domain: "education",
        icon: "graduation-cap",
        predicate: TagPredicate::OneOf("amenity", &["university", "college"]),
    },
    LayerDefinition {
        name: "libraries",
        domain: "education",
        icon: "book",
        predicate: TagPredicate::Equals("amenity", "library"),
    },
    LayerDefinition {
        name: "parks",
        domain: "environment",
        icon: "tree",
        predicate: TagPredicate::Equals("leisure", "park"),
    },
    LayerDefinition {
        name: "playgrounds",
        domain: "environment",
        icon: "child",
        predicate: TagPredicate::Equals("leisure", "playground"),
    },
    LayerDefinition {
        name: "water",
        domain: "environment",
        icon: "water",
        predicate: TagPredicate::Equals("natural", "water"),
    },
    LayerDefinition {
        name: "supermarkets",
        domain: "economy",
        icon: "cart",
        predicate: TagPredicate::Equals("shop", "supermarket"),
    },
    LayerDefinition {
        name: "markets",
        domain: "economy",
        icon: "store",
        predicate: TagPredicate::Equals("amenity", "marketplace"),
    },
    LayerDefinition {
        name: "restaurants",
        domain: "economy",
        icon: "utensils",
        predicate: TagPredicate::OneOf("amenity", &["restaurant", "cafe", "fast_food"]),
    },
    LayerDefinition {
        name: "police",
        domain: "safety",
        icon: "shield",
        predicate: TagPredicate::Equals("amenity", "police"),
    },
    LayerDefinition {
        name: "fire_stations",
        domain: "safety",
        icon: "fire",
        predicate: TagPredicate::Equals("amenity", "fire_station"),
    },
    LayerDefinition {
        name: "community_centres",
        domain: "community",
        icon: "users",
        predicate: TagPredicate::Equals("amenity", "community_centre"),
    },
    LayerDefinition {
        name: "places_of_worship",
        domain: "community",
        icon: "place-of-worship",
        predicate: TagPredicate::Equals("amenity", "place_of_worship"),
    },
];

/// Lookup table from layer name to its definition.
#[derive(Debug, Clone, Copy)]
pub struct LayerCatalog {
    layers: &'static [LayerDefinition],
}

impl LayerCatalog {
    /// The catalog compiled into the crate.
    pub const fn builtin() -> Self {
        Self {
            layers: BUILTIN_LAYERS,
        }
    }

    /// Looks up a layer by name.
    pub fn get(&self, name: &str) -> Option<&'static LayerDefinition> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Domain the layer's features belong to.
    pub fn domain_of(&self, name: &str) -> Option<&'static str> {
        self.get(name).map(|layer| layer.domain)
    }

    /// All layers in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &'static LayerDefinition> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

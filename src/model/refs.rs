//! Element identity: types, refs, versioned refs and the packed id form.

use std::fmt;
use std::str::FromStr;

use crate::error::MapError;

/// The three element kinds of the map graph.
///
/// Nodes carry geometry, ways carry an ordered node list, relations carry
/// an ordered member list with roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub const ALL: [ElementType; 3] = [ElementType::Node, ElementType::Way, ElementType::Relation];

    /// Full lowercase name, as used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }

    /// Single-letter form used by compact ref strings.
    pub fn letter(self) -> char {
        match self {
            ElementType::Node => 'n',
            ElementType::Way => 'w',
            ElementType::Relation => 'r',
        }
    }

    fn from_letter(c: char) -> Option<ElementType> {
        match c {
            'n' => Some(ElementType::Node),
            'w' => Some(ElementType::Way),
            'r' => Some(ElementType::Relation),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ElementType::Node => 0,
            ElementType::Way => 1,
            ElementType::Relation => 2,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementType::Node),
            "way" => Ok(ElementType::Way),
            "relation" => Ok(ElementType::Relation),
            _ => Err(MapError::MalformedDocument(format!(
                "unknown element type: {s}"
            ))),
        }
    }
}

/// Reference to one logical element, irrespective of version.
///
/// Negative ids are placeholders, valid only inside a single unapplied
/// diff. Id zero is invalid everywhere.
///
/// ```
/// use meridian::{ElementRef, ElementType};
///
/// let reff: ElementRef = "n123".parse().unwrap();
/// assert_eq!(reff, ElementRef::new(ElementType::Node, 123));
/// assert_eq!(reff.to_string(), "n123");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementRef {
    pub kind: ElementType,
    pub id: i64,
}

impl ElementRef {
    pub fn new(kind: ElementType, id: i64) -> Self {
        Self { kind, id }
    }

    /// Whether this ref denotes a placeholder created within the current diff.
    pub fn is_placeholder(&self) -> bool {
        self.id < 0
    }

    pub fn versioned(&self, version: u64) -> VersionedElementRef {
        VersionedElementRef {
            kind: self.kind,
            id: self.id,
            version,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.id)
    }
}

impl FromStr for ElementRef {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MapError::MalformedDocument(format!("invalid element ref: {s}"));
        let mut chars = s.chars();
        let kind = chars.next().and_then(ElementType::from_letter).ok_or_else(bad)?;
        let id: i64 = s[1..].parse().map_err(|_| bad())?;
        if id == 0 {
            return Err(bad());
        }
        Ok(ElementRef { kind, id })
    }
}

/// Reference to one specific version of an element.
///
/// ```
/// use meridian::VersionedElementRef;
///
/// let reff: VersionedElementRef = "w5v2".parse().unwrap();
/// assert_eq!((reff.id, reff.version), (5, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionedElementRef {
    pub kind: ElementType,
    pub id: i64,
    pub version: u64,
}

impl VersionedElementRef {
    pub fn new(kind: ElementType, id: i64, version: u64) -> Self {
        Self { kind, id, version }
    }

    pub fn unversioned(&self) -> ElementRef {
        ElementRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

impl fmt::Display for VersionedElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}v{}", self.kind.letter(), self.id, self.version)
    }
}

impl FromStr for VersionedElementRef {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MapError::MalformedDocument(format!("invalid versioned element ref: {s}"));
        let v_idx = s.rfind('v').ok_or_else(bad)?;
        if v_idx < 2 {
            return Err(bad());
        }
        let reff: ElementRef = s[..v_idx].parse()?;
        let version: u64 = s[v_idx + 1..].parse().map_err(|_| bad())?;
        if version == 0 {
            return Err(bad());
        }
        Ok(reff.versioned(version))
    }
}

/// A mixed element reference: either the current version or a specific one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyElementRef {
    Current(ElementRef),
    Versioned(VersionedElementRef),
}

impl AnyElementRef {
    pub fn unversioned(&self) -> ElementRef {
        match self {
            AnyElementRef::Current(r) => *r,
            AnyElementRef::Versioned(r) => r.unversioned(),
        }
    }
}

const TYPED_ID_BITS: u32 = 60;
const TYPED_ID_MASK: u64 = (1 << TYPED_ID_BITS) - 1;

/// Packed element identity used as the store index key.
///
/// The element type occupies the top bits, the (positive) id the low 60.
/// Placeholder refs have no packed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedId(u64);

impl TypedId {
    pub fn pack(reff: ElementRef) -> Option<TypedId> {
        if reff.id <= 0 || (reff.id as u64) > TYPED_ID_MASK {
            return None;
        }
        let tag = (reff.kind.index() as u64 + 1) << TYPED_ID_BITS;
        Some(TypedId(tag | reff.id as u64))
    }

    pub fn unpack(self) -> ElementRef {
        let kind = match self.0 >> TYPED_ID_BITS {
            1 => ElementType::Node,
            2 => ElementType::Way,
            _ => ElementType::Relation,
        };
        ElementRef {
            kind,
            id: (self.0 & TYPED_ID_MASK) as i64,
        }
    }
}

// Map entities and variable overrides.

/// Entity type tags. Values below `GAMESPECIFIC` have engine-wide meaning;
/// the rest are interpreted by the game that wrote the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKind(pub u8);

impl EntityKind {
    pub const EMPTY: Self = Self(0);
    pub const LIGHT: Self = Self(1);
    pub const MAPMODEL: Self = Self(2);
    pub const PLAYERSTART: Self = Self(3);
    pub const ENVMAP: Self = Self(4);
    pub const PARTICLES: Self = Self(5);
    pub const SOUND: Self = Self(6);
    pub const SPOTLIGHT: Self = Self(7);
    pub const DECAL: Self = Self(8);
    pub const GAMESPECIFIC: Self = Self(9);

    #[inline]
    pub fn is_game_specific(self) -> bool {
        self >= Self::GAMESPECIFIC
    }

    /// Lights may legitimately sit outside the world cube.
    #[inline]
    pub fn is_light(self) -> bool {
        self == Self::LIGHT || self == Self::SPOTLIGHT
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "empty",
            1 => "light",
            2 => "mapmodel",
            3 => "playerstart",
            4 => "envmap",
            5 => "particles",
            6 => "sound",
            7 => "spotlight",
            8 => "decal",
            _ => "gamespecific",
        }
    }
}

/// A placed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub o: [f32; 3],
    pub attr: [i16; 5],
    pub kind: EntityKind,
    pub reserved: u8,
    /// Game-specific payload, exactly as long as the file's per-entity
    /// extra size.
    pub extra: Vec<u8>,
}

impl Entity {
    pub fn new(kind: EntityKind, o: [f32; 3]) -> Self {
        Self {
            o,
            attr: [0; 5],
            kind,
            reserved: 0,
            extra: Vec::new(),
        }
    }

    pub fn with_attrs(mut self, attr: [i16; 5]) -> Self {
        self.attr = attr;
        self
    }
}

/// Typed value of a map variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Int(i32),
    Float(f32),
    Str(String),
}

impl VarValue {
    /// On-disk type tag.
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Str(_) => 2,
        }
    }
}

/// A named variable override stored with the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapVar {
    pub name: String,
    pub value: VarValue,
}

impl MapVar {
    pub fn int(name: impl Into<String>, v: i32) -> Self {
        Self {
            name: name.into(),
            value: VarValue::Int(v),
        }
    }

    pub fn float(name: impl Into<String>, v: f32) -> Self {
        Self {
            name: name.into(),
            value: VarValue::Float(v),
        }
    }

    pub fn string(name: impl Into<String>, v: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VarValue::Str(v.into()),
        }
    }
}

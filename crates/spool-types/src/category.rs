use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// XML Schema namespace shared by every registered datatype URI.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Type id carried by values outside the typed-literal category.
pub const NONE_TYPE_ID: u8 = 0;

/// Top-level partition of the value space.
///
/// Categories order by id, so every URI sorts before every untyped literal,
/// which sorts before every typed literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    /// Free slot / blank node. Never written to the value log.
    Blank = 0,
    Uri = 1,
    UntypedLiteral = 2,
    TypedLiteral = 3,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Blank,
        Category::Uri,
        Category::UntypedLiteral,
        Category::TypedLiteral,
    ];

    /// The on-disk id.
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self, TypeError> {
        match id {
            0 => Ok(Category::Blank),
            1 => Ok(Category::Uri),
            2 => Ok(Category::UntypedLiteral),
            3 => Ok(Category::TypedLiteral),
            other => Err(TypeError::InvalidCategory(other)),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Category::Blank => "blank",
            Category::Uri => "uri",
            Category::UntypedLiteral => "literal",
            Category::TypedLiteral => "typed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::Parse {
                input: s.to_string(),
                reason: "expected one of blank, uri, literal, typed".into(),
            })
    }
}

/// Width variants of `xsd:integer`. They share one type id and differ only
/// in subtype id, which breaks ties between numerically equal values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegerKind {
    Integer,
    Long,
    Int,
    Short,
    Byte,
}

impl IntegerKind {
    const ALL: [IntegerKind; 5] = [
        IntegerKind::Integer,
        IntegerKind::Long,
        IntegerKind::Int,
        IntegerKind::Short,
        IntegerKind::Byte,
    ];

    fn local_name(self) -> &'static str {
        match self {
            IntegerKind::Integer => "integer",
            IntegerKind::Long => "long",
            IntegerKind::Int => "int",
            IntegerKind::Short => "short",
            IntegerKind::Byte => "byte",
        }
    }

    /// Inclusive value range accepted for this width.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            IntegerKind::Integer | IntegerKind::Long => (i64::MIN, i64::MAX),
            IntegerKind::Int => (i32::MIN as i64, i32::MAX as i64),
            IntegerKind::Short => (i16::MIN as i64, i16::MAX as i64),
            IntegerKind::Byte => (i8::MIN as i64, i8::MAX as i64),
        }
    }
}

/// Calendar fragments. Each has its own type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GregorianKind {
    Year,
    YearMonth,
    Month,
    Day,
    MonthDay,
}

impl GregorianKind {
    pub const ALL: [GregorianKind; 5] = [
        GregorianKind::Year,
        GregorianKind::YearMonth,
        GregorianKind::Month,
        GregorianKind::Day,
        GregorianKind::MonthDay,
    ];

    fn local_name(self) -> &'static str {
        match self {
            GregorianKind::Year => "gYear",
            GregorianKind::YearMonth => "gYearMonth",
            GregorianKind::Month => "gMonth",
            GregorianKind::Day => "gDay",
            GregorianKind::MonthDay => "gMonthDay",
        }
    }
}

/// First type id of the [`GregorianKind`] block.
const GREGORIAN_BASE: u8 = 10;

/// Registry of typed-literal datatypes.
///
/// | type id | datatype | payload |
/// |---|---|---|
/// | 1 | unknown | datatype URI, NUL, lexical form |
/// | 2 | `xsd:string` | UTF-8 |
/// | 3 | `xsd:boolean` | 1 byte |
/// | 4 | `xsd:integer` (+ subtypes) | i64 big-endian |
/// | 5 | `xsd:double` | f64 bits big-endian |
/// | 6 | `xsd:float` | f32 bits big-endian |
/// | 7 | `xsd:dateTime` | epoch millis, i64 big-endian |
/// | 8 | `xsd:decimal` | canonical lexical form |
/// | 9 | `xsd:date` | epoch millis of the day's start, i64; zone minutes, i16 |
/// | 10-14 | `xsd:gYear` .. `xsd:gMonthDay` | packed calendar value, i64; zone minutes, i16 |
/// | 15 | `xsd:base64Binary` | decoded bytes |
/// | 16 | `xsd:hexBinary` | decoded bytes |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    Unknown,
    String,
    Boolean,
    Integer(IntegerKind),
    Double,
    Float,
    DateTime,
    Decimal,
    Date,
    Gregorian(GregorianKind),
    Base64Binary,
    HexBinary,
}

impl Datatype {
    pub const fn type_id(self) -> u8 {
        match self {
            Datatype::Unknown => 1,
            Datatype::String => 2,
            Datatype::Boolean => 3,
            Datatype::Integer(_) => 4,
            Datatype::Double => 5,
            Datatype::Float => 6,
            Datatype::DateTime => 7,
            Datatype::Decimal => 8,
            Datatype::Date => 9,
            Datatype::Gregorian(kind) => GREGORIAN_BASE + kind as u8,
            Datatype::Base64Binary => 15,
            Datatype::HexBinary => 16,
        }
    }

    pub const fn subtype_id(self) -> u8 {
        match self {
            Datatype::Integer(kind) => kind as u8,
            _ => 0,
        }
    }

    pub fn from_ids(type_id: u8, subtype_id: u8) -> Result<Self, TypeError> {
        let unknown = || TypeError::UnknownDatatype {
            type_id,
            subtype_id,
        };
        let dt = match type_id {
            1 => Datatype::Unknown,
            2 => Datatype::String,
            3 => Datatype::Boolean,
            4 => Datatype::Integer(
                *IntegerKind::ALL
                    .get(subtype_id as usize)
                    .ok_or_else(unknown)?,
            ),
            5 => Datatype::Double,
            6 => Datatype::Float,
            7 => Datatype::DateTime,
            8 => Datatype::Decimal,
            9 => Datatype::Date,
            10..=14 => Datatype::Gregorian(GregorianKind::ALL[(type_id - GREGORIAN_BASE) as usize]),
            15 => Datatype::Base64Binary,
            16 => Datatype::HexBinary,
            _ => return Err(unknown()),
        };
        if dt.subtype_id() != subtype_id {
            return Err(unknown());
        }
        Ok(dt)
    }

    /// Look up a registered datatype by its full URI.
    ///
    /// Returns `None` for URIs outside the registry; such literals are stored
    /// under [`Datatype::Unknown`].
    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(XSD_NS)?;
        let dt = match local {
            "string" => Datatype::String,
            "boolean" => Datatype::Boolean,
            "double" => Datatype::Double,
            "float" => Datatype::Float,
            "dateTime" => Datatype::DateTime,
            "decimal" => Datatype::Decimal,
            "date" => Datatype::Date,
            "base64Binary" => Datatype::Base64Binary,
            "hexBinary" => Datatype::HexBinary,
            other => {
                if let Some(kind) = GregorianKind::ALL
                    .into_iter()
                    .find(|k| k.local_name() == other)
                {
                    return Some(Datatype::Gregorian(kind));
                }
                Datatype::Integer(
                    IntegerKind::ALL
                        .into_iter()
                        .find(|k| k.local_name() == other)?,
                )
            }
        };
        Some(dt)
    }

    /// The datatype URI, or `None` for [`Datatype::Unknown`] (whose URI lives
    /// in the payload).
    pub fn uri(self) -> Option<String> {
        let local = match self {
            Datatype::Unknown => return None,
            Datatype::String => "string",
            Datatype::Boolean => "boolean",
            Datatype::Integer(kind) => kind.local_name(),
            Datatype::Double => "double",
            Datatype::Float => "float",
            Datatype::DateTime => "dateTime",
            Datatype::Decimal => "decimal",
            Datatype::Date => "date",
            Datatype::Gregorian(kind) => kind.local_name(),
            Datatype::Base64Binary => "base64Binary",
            Datatype::HexBinary => "hexBinary",
        };
        Some(format!("{XSD_NS}{local}"))
    }

    /// Fixed payload width, for datatypes that have one.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Datatype::Boolean => Some(1),
            Datatype::Integer(_) | Datatype::Double | Datatype::DateTime => Some(8),
            Datatype::Float => Some(4),
            Datatype::Date | Datatype::Gregorian(_) => Some(10),
            Datatype::Unknown
            | Datatype::String
            | Datatype::Decimal
            | Datatype::Base64Binary
            | Datatype::HexBinary => None,
        }
    }
}

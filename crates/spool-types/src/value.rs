use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{Category, Datatype, GregorianKind, IntegerKind, NONE_TYPE_ID};
use crate::comparator::{comparator_for, ValueComparator};
use crate::error::TypeError;

/// Separator between the parts of a composite payload (lexical form and
/// language tag, or datatype URI and lexical form).
const SEP: u8 = 0;

/// Subtype of an untyped literal that carries a language tag.
const LANG_SUBTYPE: u8 = 1;

/// Zone offset stored for calendar values written without a timezone.
const NO_ZONE: i16 = i16::MIN;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// A value as the pool stores it: category, type and subtype ids, and the
/// encoded payload.
///
/// Constructors parse lexical forms into canonical payloads, so two values
/// are equal exactly when their stored records would be equal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedValue {
    category: Category,
    type_id: u8,
    subtype_id: u8,
    data: Vec<u8>,
}

impl TypedValue {
    pub fn uri(uri: impl AsRef<str>) -> Self {
        Self::untyped(Category::Uri, 0, uri.as_ref().as_bytes().to_vec())
    }

    /// A plain literal without a language tag.
    pub fn literal(lexical: impl AsRef<str>) -> Self {
        Self::untyped(
            Category::UntypedLiteral,
            0,
            lexical.as_ref().as_bytes().to_vec(),
        )
    }

    pub fn lang_literal(lexical: impl AsRef<str>, lang: impl AsRef<str>) -> Self {
        let mut data = lexical.as_ref().as_bytes().to_vec();
        data.push(SEP);
        data.extend_from_slice(lang.as_ref().as_bytes());
        Self::untyped(Category::UntypedLiteral, LANG_SUBTYPE, data)
    }

    /// A typed literal.
    ///
    /// Registered datatypes are parsed into their binary payload. A lexical
    /// form that does not parse, or a datatype outside the registry, is kept
    /// verbatim under [`Datatype::Unknown`].
    pub fn typed(lexical: impl AsRef<str>, datatype_uri: impl AsRef<str>) -> Self {
        let lexical = lexical.as_ref();
        let uri = datatype_uri.as_ref();
        match Datatype::from_uri(uri).and_then(|dt| parse_lexical(dt, lexical)) {
            Some(value) => value,
            None => {
                let mut data = uri.as_bytes().to_vec();
                data.push(SEP);
                data.extend_from_slice(lexical.as_bytes());
                Self::of(Datatype::Unknown, data)
            }
        }
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Self::of(Datatype::String, s.as_ref().as_bytes().to_vec())
    }

    pub fn boolean(b: bool) -> Self {
        Self::of(Datatype::Boolean, vec![b as u8])
    }

    pub fn integer(i: i64) -> Self {
        Self::of(Datatype::Integer(IntegerKind::Integer), i.to_be_bytes().to_vec())
    }

    pub fn double(d: f64) -> Self {
        Self::of(Datatype::Double, d.to_be_bytes().to_vec())
    }

    pub fn float(f: f32) -> Self {
        Self::of(Datatype::Float, f.to_be_bytes().to_vec())
    }

    /// An `xsd:dateTime` at the given milliseconds since the Unix epoch (UTC).
    pub fn date_time_millis(millis: i64) -> Self {
        Self::of(Datatype::DateTime, millis.to_be_bytes().to_vec())
    }

    /// Rebuild a value from its stored parts, validating ids and payload width.
    pub fn from_parts(
        category: Category,
        type_id: u8,
        subtype_id: u8,
        data: Vec<u8>,
    ) -> Result<Self, TypeError> {
        match category {
            Category::TypedLiteral => {
                let dt = Datatype::from_ids(type_id, subtype_id)?;
                if let Some(width) = dt.fixed_width() {
                    if data.len() != width {
                        return Err(TypeError::InvalidLength {
                            datatype: "fixed-width literal",
                            expected: width,
                            actual: data.len(),
                        });
                    }
                }
            }
            Category::Blank => return Err(TypeError::InvalidCategory(category.id())),
            _ => {
                let subtype_ok = subtype_id == 0
                    || (category == Category::UntypedLiteral && subtype_id == LANG_SUBTYPE);
                if type_id != NONE_TYPE_ID || !subtype_ok {
                    return Err(TypeError::UnknownDatatype {
                        type_id,
                        subtype_id,
                    });
                }
            }
        }
        Ok(Self {
            category,
            type_id,
            subtype_id,
            data,
        })
    }

    fn untyped(category: Category, subtype_id: u8, data: Vec<u8>) -> Self {
        Self {
            category,
            type_id: NONE_TYPE_ID,
            subtype_id,
            data,
        }
    }

    fn of(dt: Datatype, data: Vec<u8>) -> Self {
        Self {
            category: Category::TypedLiteral,
            type_id: dt.type_id(),
            subtype_id: dt.subtype_id(),
            data,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    pub fn subtype_id(&self) -> u8 {
        self.subtype_id
    }

    /// The encoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The registered datatype of a typed literal.
    pub fn datatype(&self) -> Option<Datatype> {
        if self.category != Category::TypedLiteral {
            return None;
        }
        Datatype::from_ids(self.type_id, self.subtype_id).ok()
    }

    /// The full datatype URI of a typed literal, including unregistered ones.
    pub fn datatype_uri(&self) -> Option<String> {
        match self.datatype()? {
            Datatype::Unknown => {
                let (uri, _) = split_first(&self.data);
                Some(String::from_utf8_lossy(uri).into_owned())
            }
            dt => dt.uri(),
        }
    }

    pub fn language(&self) -> Option<&str> {
        if self.category != Category::UntypedLiteral || self.subtype_id != LANG_SUBTYPE {
            return None;
        }
        let (_, lang) = split_last(&self.data);
        std::str::from_utf8(lang).ok()
    }

    /// The lexical form: URI text, literal text, or the canonical lexical
    /// form of a typed literal.
    pub fn lexical_form(&self) -> String {
        let text = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
        match self.category {
            Category::Blank => String::new(),
            Category::Uri => text(&self.data),
            Category::UntypedLiteral if self.subtype_id == LANG_SUBTYPE => {
                text(split_last(&self.data).0)
            }
            Category::UntypedLiteral => text(&self.data),
            Category::TypedLiteral => match self.datatype() {
                Some(Datatype::Unknown) => text(split_first(&self.data).1),
                Some(dt) => format_payload(dt, &self.data).unwrap_or_else(|| hex::encode(&self.data)),
                None => hex::encode(&self.data),
            },
        }
    }

    /// The payload comparator for this value's category and type.
    pub fn comparator(&self) -> &'static dyn ValueComparator {
        comparator_for(self.category, self.type_id)
    }
}

fn split_first(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&b| b == SEP) {
        Some(i) => (&data[..i], &data[i + 1..]),
        None => (data, &[]),
    }
}

fn split_last(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().rposition(|&b| b == SEP) {
        Some(i) => (&data[..i], &data[i + 1..]),
        None => (data, &[]),
    }
}

fn parse_lexical(dt: Datatype, lexical: &str) -> Option<TypedValue> {
    let s = lexical.trim();
    let value = match dt {
        Datatype::Unknown => return None,
        Datatype::String => TypedValue::string(lexical),
        Datatype::Boolean => match s {
            "true" | "1" => TypedValue::boolean(true),
            "false" | "0" => TypedValue::boolean(false),
            _ => return None,
        },
        Datatype::Integer(kind) => {
            let i: i64 = s.strip_prefix('+').unwrap_or(s).parse().ok()?;
            let (lo, hi) = kind.bounds();
            if i < lo || i > hi {
                return None;
            }
            TypedValue::of(dt, i.to_be_bytes().to_vec())
        }
        Datatype::Double => TypedValue::double(parse_float(s)?),
        Datatype::Float => TypedValue::float(parse_float(s)? as f32),
        Datatype::DateTime => TypedValue::date_time_millis(parse_date_time(s)?),
        Datatype::Decimal => TypedValue::of(dt, canonical_decimal(s)?.into_bytes()),
        Datatype::Date => {
            let (day, zone) = split_zone(s)?;
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
            let start = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
            let offset = zone.map_or(0, i64::from) * MILLIS_PER_MINUTE;
            TypedValue::of(dt, calendar_payload(start - offset, zone))
        }
        Datatype::Gregorian(kind) => {
            let (body, zone) = split_zone(s)?;
            TypedValue::of(dt, calendar_payload(parse_gregorian(kind, body)?, zone))
        }
        Datatype::Base64Binary => {
            let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            TypedValue::of(dt, BASE64.decode(compact).ok()?)
        }
        Datatype::HexBinary => TypedValue::of(dt, hex::decode(s).ok()?),
    };
    Some(value)
}

/// The canonical `xsd:decimal` form: no leading integer zeros, no trailing
/// fraction zeros, no sign on zero, no exponent.
fn canonical_decimal(s: &str) -> Option<String> {
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int = match int.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    let frac = frac.trim_end_matches('0');
    let mut out = String::with_capacity(int.len() + frac.len() + 2);
    if negative && !(int == "0" && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(int);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    Some(out)
}

/// Split a trailing `Z` or `±hh:mm` off a calendar lexical form.
fn split_zone(s: &str) -> Option<(&str, Option<i16>)> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Some((rest, Some(0)));
    }
    if s.len() > 6 && s.is_char_boundary(s.len() - 6) {
        let (body, zone) = s.split_at(s.len() - 6);
        let b = zone.as_bytes();
        if matches!(b[0], b'+' | b'-') && b[3] == b':' {
            let hh = two_digits(&zone[1..3], 0, 14)?;
            let mm = two_digits(&zone[4..6], 0, 59)?;
            let minutes = (hh * 60 + mm) as i16;
            return Some((body, Some(if b[0] == b'-' { -minutes } else { minutes })));
        }
    }
    Some((s, None))
}

fn two_digits(s: &str, lo: i64, hi: i64) -> Option<i64> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = s.parse().ok()?;
    (lo..=hi).contains(&n).then_some(n)
}

fn year(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Pack a calendar fragment into one ordered integer.
fn parse_gregorian(kind: GregorianKind, s: &str) -> Option<i64> {
    match kind {
        GregorianKind::Year => year(s),
        GregorianKind::YearMonth => {
            let (y, m) = s.rsplit_once('-')?;
            Some(year(y)? * 12 + two_digits(m, 1, 12)? - 1)
        }
        GregorianKind::Month => two_digits(s.strip_prefix("--")?, 1, 12),
        GregorianKind::Day => two_digits(s.strip_prefix("---")?, 1, 31),
        GregorianKind::MonthDay => {
            let (m, d) = s.strip_prefix("--")?.split_once('-')?;
            Some((two_digits(m, 1, 12)? - 1) * 31 + two_digits(d, 1, 31)? - 1)
        }
    }
}

fn calendar_payload(value: i64, zone: Option<i16>) -> Vec<u8> {
    let mut data = value.to_be_bytes().to_vec();
    data.extend_from_slice(&zone.unwrap_or(NO_ZONE).to_be_bytes());
    data
}

fn split_calendar(data: &[u8]) -> Option<(i64, Option<i16>)> {
    let value = i64::from_be_bytes(data.get(..8)?.try_into().ok()?);
    let zone = i16::from_be_bytes(data.get(8..10)?.try_into().ok()?);
    Some((value, (zone != NO_ZONE).then_some(zone)))
}

fn format_zone(zone: Option<i16>) -> String {
    match zone {
        None => String::new(),
        Some(0) => "Z".into(),
        Some(m) => {
            let sign = if m < 0 { '-' } else { '+' };
            let m = m.unsigned_abs();
            format!("{sign}{:02}:{:02}", m / 60, m % 60)
        }
    }
}

fn format_year(y: i64) -> String {
    if y < 0 {
        format!("-{:04}", y.unsigned_abs())
    } else {
        format!("{y:04}")
    }
}

fn format_gregorian(kind: GregorianKind, v: i64) -> String {
    match kind {
        GregorianKind::Year => format_year(v),
        GregorianKind::YearMonth => {
            format!("{}-{:02}", format_year(v.div_euclid(12)), v.rem_euclid(12) + 1)
        }
        GregorianKind::Month => format!("--{v:02}"),
        GregorianKind::Day => format!("---{v:02}"),
        GregorianKind::MonthDay => format!("--{:02}-{:02}", v / 31 + 1, v % 31 + 1),
    }
}

fn parse_float(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => None,
        _ => s.parse().ok(),
    }
}

fn parse_date_time(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn format_payload(dt: Datatype, data: &[u8]) -> Option<String> {
    let s = match dt {
        Datatype::Unknown => return None,
        Datatype::String => String::from_utf8_lossy(data).into_owned(),
        Datatype::Boolean => (data.first()? != &0).to_string(),
        Datatype::Integer(_) => i64::from_be_bytes(data.try_into().ok()?).to_string(),
        Datatype::Double => format_float(f64::from_be_bytes(data.try_into().ok()?)),
        Datatype::Float => format_float(f32::from_be_bytes(data.try_into().ok()?) as f64),
        Datatype::DateTime => {
            let millis = i64::from_be_bytes(data.try_into().ok()?);
            DateTime::<Utc>::from_timestamp_millis(millis)?
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string()
        }
        Datatype::Decimal => String::from_utf8_lossy(data).into_owned(),
        Datatype::Date => {
            let (start, zone) = split_calendar(data)?;
            let local = start + zone.map_or(0, i64::from) * MILLIS_PER_MINUTE;
            let day = DateTime::<Utc>::from_timestamp_millis(local)?.date_naive();
            format!("{}{}", day.format("%Y-%m-%d"), format_zone(zone))
        }
        Datatype::Gregorian(kind) => {
            let (v, zone) = split_calendar(data)?;
            format!("{}{}", format_gregorian(kind, v), format_zone(zone))
        }
        Datatype::Base64Binary => BASE64.encode(data),
        Datatype::HexBinary => hex::encode_upper(data),
    };
    Some(s)
}

fn format_float(x: f64) -> String {
    if x.is_nan() {
        "NaN".into()
    } else if x == f64::INFINITY {
        "INF".into()
    } else if x == f64::NEG_INFINITY {
        "-INF".into()
    } else {
        x.to_string()
    }
}

impl Ord for TypedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then(self.type_id.cmp(&other.type_id))
            .then_with(|| {
                self.comparator()
                    .compare(&self.data, self.subtype_id, &other.data, other.subtype_id)
            })
    }
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Encoded form: `<uri>`, `"text"`, `"text"@lang`, or `"text"^^<datatype>`.
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Category::Blank => f.write_str("_:"),
            Category::Uri => write!(f, "<{}>", self.lexical_form()),
            Category::UntypedLiteral => {
                write!(f, "\"{}\"", escape(&self.lexical_form()))?;
                match self.language() {
                    Some(lang) => write!(f, "@{lang}"),
                    None => Ok(()),
                }
            }
            Category::TypedLiteral => write!(
                f,
                "\"{}\"^^<{}>",
                escape(&self.lexical_form()),
                self.datatype_uri().unwrap_or_default()
            ),
        }
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedValue({self})")
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl FromStr for TypedValue {
    type Err = TypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| TypeError::Parse {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let s = input.trim();
        if let Some(rest) = s.strip_prefix('<') {
            let uri = rest.strip_suffix('>').ok_or_else(|| err("unterminated URI"))?;
            return Ok(TypedValue::uri(uri));
        }
        let rest = s
            .strip_prefix('"')
            .ok_or_else(|| err("expected '<' or '\"'"))?;

        let mut lexical = String::new();
        let mut chars = rest.char_indices();
        let mut tail = None;
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, e @ ('"' | '\\'))) => lexical.push(e),
                    Some((_, 'n')) => lexical.push('\n'),
                    Some((_, 't')) => lexical.push('\t'),
                    _ => return Err(err("bad escape")),
                },
                '"' => {
                    tail = Some(&rest[i + 1..]);
                    break;
                }
                c => lexical.push(c),
            }
        }
        let tail = tail.ok_or_else(|| err("unterminated literal"))?;

        if tail.is_empty() {
            Ok(TypedValue::literal(lexical))
        } else if let Some(lang) = tail.strip_prefix('@') {
            if lang.is_empty() {
                return Err(err("empty language tag"));
            }
            Ok(TypedValue::lang_literal(lexical, lang))
        } else if let Some(dt) = tail.strip_prefix("^^<") {
            let uri = dt.strip_suffix('>').ok_or_else(|| err("unterminated datatype"))?;
            Ok(TypedValue::typed(lexical, uri))
        } else {
            Err(err("unexpected text after literal"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::XSD_NS;
    use proptest::prelude::*;

    fn xsd(local: &str) -> String {
        format!("{XSD_NS}{local}")
    }

    #[test]
    fn literal_with_language() {
        let v = TypedValue::lang_literal("chat", "fr");
        assert_eq!(v.language(), Some("fr"));
        assert_eq!(v.lexical_form(), "chat");
        assert_ne!(v, TypedValue::literal("chat"));
    }

    #[test]
    fn typed_parses_registered_datatypes() {
        let d = TypedValue::typed("42", xsd("double"));
        assert_eq!(d, TypedValue::double(42.0));
        assert_eq!(d.datatype(), Some(Datatype::Double));
        assert_eq!(d.datatype_uri(), Some(xsd("double")));

        let i = TypedValue::typed("+17", xsd("int"));
        assert_eq!(i.datatype(), Some(Datatype::Integer(IntegerKind::Int)));
        assert_eq!(i.lexical_form(), "17");

        assert_eq!(TypedValue::typed("1", xsd("boolean")), TypedValue::boolean(true));
    }

    #[test]
    fn unparseable_lexical_kept_verbatim() {
        let v = TypedValue::typed("not a number", xsd("double"));
        assert_eq!(v.datatype(), Some(Datatype::Unknown));
        assert_eq!(v.datatype_uri(), Some(xsd("double")));
        assert_eq!(v.lexical_form(), "not a number");

        let byte = TypedValue::typed("300", xsd("byte"));
        assert_eq!(byte.datatype(), Some(Datatype::Unknown));
    }

    #[test]
    fn unregistered_datatype() {
        let v = TypedValue::typed("12.50", "http://example.org/usd");
        assert_eq!(v.datatype_uri().as_deref(), Some("http://example.org/usd"));
        assert_eq!(v.lexical_form(), "12.50");
    }

    #[test]
    fn date_time_forms() {
        let zoned = TypedValue::typed("1970-01-01T00:00:01Z", xsd("dateTime"));
        assert_eq!(zoned, TypedValue::date_time_millis(1000));
        let naive = TypedValue::typed("1970-01-01T00:00:01", xsd("dateTime"));
        assert_eq!(naive, zoned);
        assert_eq!(zoned.lexical_form(), "1970-01-01T00:00:01.000Z");
    }

    #[test]
    fn decimal_canonical_form() {
        let d = |s: &str| TypedValue::typed(s, xsd("decimal"));
        assert_eq!(d("+01.50"), d("1.5"));
        assert_eq!(d("1.5").lexical_form(), "1.5");
        assert_eq!(d("-0.0").lexical_form(), "0");
        assert_eq!(d("007").lexical_form(), "7");
        assert_eq!(d(".25").lexical_form(), "0.25");
        assert_eq!(d("-3.").lexical_form(), "-3");
        assert_eq!(d("1e5").datatype(), Some(Datatype::Unknown));
        assert_eq!(d(".").datatype(), Some(Datatype::Unknown));
        assert!(d("9") < d("10"));
        assert!(d("-10") < d("-9.5"));
    }

    #[test]
    fn date_forms() {
        let date = |s: &str| TypedValue::typed(s, xsd("date"));
        let plain = date("2024-05-01");
        assert_eq!(plain.datatype(), Some(Datatype::Date));
        assert_eq!(plain.lexical_form(), "2024-05-01");
        assert_eq!(date("2024-05-01Z").lexical_form(), "2024-05-01Z");
        assert_eq!(date("2024-05-01+02:00").lexical_form(), "2024-05-01+02:00");
        assert_eq!(date("2024-05-01-05:30").lexical_form(), "2024-05-01-05:30");
        assert!(date("2024-04-30") < date("2024-05-01"));
        // The day starts two hours earlier at +02:00.
        assert!(date("2024-05-01+02:00") < date("2024-05-01Z"));
        assert_eq!(date("2024-13-01").datatype(), Some(Datatype::Unknown));
        assert_eq!(date("2024-05-01+15:00").datatype(), Some(Datatype::Unknown));
    }

    #[test]
    fn gregorian_forms() {
        let g = |s: &str, local: &str| TypedValue::typed(s, xsd(local));
        let cases = [
            ("2024", "gYear"),
            ("-0044", "gYear"),
            ("2024-05", "gYearMonth"),
            ("-0044-03", "gYearMonth"),
            ("--05", "gMonth"),
            ("---15", "gDay"),
            ("--05-15", "gMonthDay"),
            ("--12-31Z", "gMonthDay"),
            ("2024+05:00", "gYear"),
        ];
        for (lexical, local) in cases {
            let v = g(lexical, local);
            assert!(matches!(v.datatype(), Some(Datatype::Gregorian(_))), "{lexical}");
            assert_eq!(v.lexical_form(), lexical);
        }
        assert!(g("-0044", "gYear") < g("2024", "gYear"));
        assert!(g("2023-12", "gYearMonth") < g("2024-01", "gYearMonth"));
        assert!(g("--01-31", "gMonthDay") < g("--02-01", "gMonthDay"));
        assert_eq!(g("24", "gYear").datatype(), Some(Datatype::Unknown));
        assert_eq!(g("--13", "gMonth").datatype(), Some(Datatype::Unknown));
        assert_eq!(g("---32", "gDay").datatype(), Some(Datatype::Unknown));
    }

    #[test]
    fn binary_forms() {
        let b64 = TypedValue::typed("aGVs bG8=", xsd("base64Binary"));
        assert_eq!(b64.datatype(), Some(Datatype::Base64Binary));
        assert_eq!(b64.data(), b"hello");
        assert_eq!(b64.lexical_form(), "aGVsbG8=");
        assert_eq!(
            TypedValue::typed("!!", xsd("base64Binary")).datatype(),
            Some(Datatype::Unknown)
        );

        let hex = TypedValue::typed("0aff", xsd("hexBinary"));
        assert_eq!(hex.data(), &[0x0a, 0xff]);
        assert_eq!(hex.lexical_form(), "0AFF");
        assert_eq!(hex, TypedValue::typed("0AFF", xsd("hexBinary")));
        assert_eq!(
            TypedValue::typed("abc", xsd("hexBinary")).datatype(),
            Some(Datatype::Unknown)
        );
    }

    #[test]
    fn special_floats() {
        assert_eq!(TypedValue::typed("INF", xsd("double")).lexical_form(), "INF");
        assert_eq!(TypedValue::typed("-INF", xsd("float")).lexical_form(), "-INF");
        assert!(TypedValue::typed("NaN", xsd("double")).datatype() == Some(Datatype::Double));
        assert_eq!(
            TypedValue::typed("infinity", xsd("double")).datatype(),
            Some(Datatype::Unknown)
        );
    }

    #[test]
    fn from_parts_validates() {
        assert!(TypedValue::from_parts(Category::TypedLiteral, 5, 0, vec![0; 8]).is_ok());
        assert!(TypedValue::from_parts(Category::TypedLiteral, 5, 0, vec![0; 3]).is_err());
        assert!(TypedValue::from_parts(Category::TypedLiteral, 9, 0, vec![0; 10]).is_ok());
        assert!(TypedValue::from_parts(Category::TypedLiteral, 11, 0, vec![0; 8]).is_err());
        assert!(TypedValue::from_parts(Category::Uri, 2, 0, vec![]).is_err());
        assert!(TypedValue::from_parts(Category::Blank, 0, 0, vec![]).is_err());
        assert!(TypedValue::from_parts(Category::UntypedLiteral, 0, 1, b"a\0en".to_vec()).is_ok());
    }

    #[test]
    fn ordering_category_then_type_then_payload() {
        let mut values = vec![
            TypedValue::double(123.0),
            TypedValue::literal("bravo"),
            TypedValue::integer(-3),
            TypedValue::uri("http://z"),
            TypedValue::double(-42.0),
            TypedValue::literal("alpha"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                TypedValue::uri("http://z"),
                TypedValue::literal("alpha"),
                TypedValue::literal("bravo"),
                TypedValue::integer(-3),
                TypedValue::double(-42.0),
                TypedValue::double(123.0),
            ]
        );
    }

    #[test]
    fn encoded_form_roundtrip() {
        let cases = [
            TypedValue::uri("http://example.org/a"),
            TypedValue::literal("say \"hi\" \\ bye"),
            TypedValue::lang_literal("hola", "es"),
            TypedValue::double(2.5),
            TypedValue::typed("x", "http://example.org/dt"),
            TypedValue::typed("-12.5", xsd("decimal")),
            TypedValue::typed("2024-02-29-08:00", xsd("date")),
            TypedValue::typed("--02-29", xsd("gMonthDay")),
            TypedValue::typed("CAFE", xsd("hexBinary")),
        ];
        for v in cases {
            let text = v.to_string();
            assert_eq!(text.parse::<TypedValue>().unwrap(), v, "{text}");
        }
    }

    #[test]
    fn encoded_form_errors() {
        assert!("<open".parse::<TypedValue>().is_err());
        assert!("\"open".parse::<TypedValue>().is_err());
        assert!("\"x\"@".parse::<TypedValue>().is_err());
        assert!("\"x\"junk".parse::<TypedValue>().is_err());
        assert!("plain".parse::<TypedValue>().is_err());
    }

    fn arb_value() -> impl Strategy<Value = TypedValue> {
        prop_oneof![
            "[a-z]{0,80}".prop_map(TypedValue::uri),
            "[a-z ]{0,80}".prop_map(TypedValue::literal),
            ("[a-z]{0,10}", "[a-z]{2}").prop_map(|(l, g)| TypedValue::lang_literal(l, g)),
            any::<i64>().prop_map(TypedValue::integer),
            any::<f64>().prop_map(TypedValue::double),
            any::<bool>().prop_map(TypedValue::boolean),
        ]
    }

    proptest! {
        #[test]
        fn ord_is_consistent_with_eq(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a == b);
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn from_parts_accepts_constructed(v in arb_value()) {
            let rebuilt = TypedValue::from_parts(
                v.category(), v.type_id(), v.subtype_id(), v.data().to_vec()).unwrap();
            prop_assert_eq!(rebuilt, v);
        }
    }
}

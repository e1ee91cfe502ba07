//! Leaf value types.
//!
//! Every leaf and leaf-list schema node declares a [`LeafType`]. The type is
//! the [`ValueCodec`] used to print a [`Value`] into its LYB bytes (or its
//! canonical text, used for metadata and diagnostics) and to parse it back.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Error printing or parsing a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {type_name} value: {reason}")]
pub struct ValueError {
    pub type_name: &'static str,
    pub reason: String,
}

impl ValueError {
    pub fn new(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            type_name,
            reason: reason.into(),
        }
    }
}

/// Value representation formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// LYB binary form.
    Lyb,
    /// Canonical text form as UTF-8 bytes.
    Canonical,
}

/// A typed leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    /// decimal64 scaled by `10^fraction-digits` of its type.
    Decimal64(i64),
    String(String),
    Binary(Vec<u8>),
    Empty,
    /// Enumeration member name.
    Enum(String),
    /// Names of the set bits, in position order.
    Bits(Vec<String>),
    /// Identity qualified as `module:name`.
    IdentityRef(String),
    InstanceIdentifier(String),
    /// Canonical text accepted by one of the member types.
    Union(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from_int! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
}

/// Capability to print and parse values of one type.
///
/// Implemented by [`LeafType`]; custom types plug in through
/// [`LeafType::Custom`].
pub trait ValueCodec: fmt::Debug + Send + Sync {
    /// Type name used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Fixed LYB length in bytes, `None` for variable-length values.
    fn lyb_len(&self) -> Option<usize>;

    /// Prints a value in the requested format.
    fn print<'v>(&self, value: &'v Value, format: ValueFormat) -> Result<Cow<'v, [u8]>, ValueError>;

    /// Parses a value from the requested format.
    fn parse(&self, data: &[u8], format: ValueFormat) -> Result<Value, ValueError>;

    /// Checks that a value belongs to this type.
    fn check(&self, value: &Value) -> Result<(), ValueError> {
        self.print(value, ValueFormat::Lyb).map(|_| ())
    }
}

/// One member of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i32,
}

impl EnumMember {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One bit of a bits type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMember {
    pub name: String,
    pub position: u32,
}

impl BitMember {
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Built-in leaf types.
#[derive(Debug, Clone)]
pub enum LeafType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64 { fraction_digits: u8 },
    String,
    Binary,
    Empty,
    Enumeration(Vec<EnumMember>),
    /// Packed bitfield, one bit per position.
    Bits(Vec<BitMember>),
    /// Allowed identities as `module:name`, any identity when empty.
    IdentityRef(Vec<String>),
    InstanceIdentifier,
    /// Values are stored as text accepted by the first matching member.
    Union(Vec<LeafType>),
    /// Values have the type of the referenced leaf.
    LeafRef(Box<LeafType>),
    /// A type provided by the application.
    Custom(Arc<dyn ValueCodec>),
}

impl LeafType {
    /// Checks the type definition itself, called when a schema node is added.
    pub fn check_definition(&self) -> Result<(), ValueError> {
        let name = self.type_name();
        match self {
            LeafType::Decimal64 { fraction_digits } if !(1..=18).contains(fraction_digits) => Err(ValueError::new(
                name,
                format!("fraction-digits {} is not in 1..=18", fraction_digits),
            )),
            LeafType::Enumeration(members) => {
                for (i, m) in members.iter().enumerate() {
                    if members[..i].iter().any(|o| o.name == m.name || o.value == m.value) {
                        return Err(ValueError::new(name, format!("member \"{}\" is not unique", m.name)));
                    }
                }
                Ok(())
            }
            LeafType::Bits(members) => {
                for (i, m) in members.iter().enumerate() {
                    if members[..i].iter().any(|o| o.name == m.name || o.position == m.position) {
                        return Err(ValueError::new(name, format!("bit \"{}\" is not unique", m.name)));
                    }
                }
                Ok(())
            }
            LeafType::Union(members) if members.is_empty() => Err(ValueError::new(name, "union has no member types")),
            LeafType::Union(members) => members.iter().try_for_each(|m| m.check_definition()),
            LeafType::LeafRef(target) => target.check_definition(),
            _ => Ok(()),
        }
    }

    fn mismatch(&self, value: &Value) -> ValueError {
        ValueError::new(self.type_name(), format!("{:?} has a different type", value))
    }

    fn enum_value(&self, members: &[EnumMember], name: &str) -> Result<i32, ValueError> {
        members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
            .ok_or_else(|| ValueError::new(self.type_name(), format!("unknown member \"{}\"", name)))
    }

    fn enum_name(&self, members: &[EnumMember], value: i32) -> Result<Value, ValueError> {
        members
            .iter()
            .find(|m| m.value == value)
            .map(|m| Value::Enum(m.name.clone()))
            .ok_or_else(|| ValueError::new(self.type_name(), format!("unknown member value {}", value)))
    }

    /// Positions of the named bits, which must be listed in position order.
    fn bit_positions(&self, members: &[BitMember], names: &[String]) -> Result<Vec<u32>, ValueError> {
        let mut positions = Vec::with_capacity(names.len());
        for bit in names {
            let position = members
                .iter()
                .find(|m| &m.name == bit)
                .map(|m| m.position)
                .ok_or_else(|| ValueError::new(self.type_name(), format!("unknown bit \"{}\"", bit)))?;
            if positions.last().is_some_and(|&last| last >= position) {
                return Err(ValueError::new(
                    self.type_name(),
                    format!("bit \"{}\" is repeated or out of position order", bit),
                ));
            }
            positions.push(position);
        }
        Ok(positions)
    }

    fn bit_names(&self, members: &[BitMember], mut positions: Vec<u32>) -> Result<Value, ValueError> {
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .map(|position| {
                members
                    .iter()
                    .find(|m| m.position == position)
                    .map(|m| m.name.clone())
                    .ok_or_else(|| ValueError::new(self.type_name(), format!("no bit at position {}", position)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Bits)
    }

    fn check_identity(&self, allowed: &[String], identity: &str) -> Result<(), ValueError> {
        let qualified = identity
            .split_once(':')
            .is_some_and(|(module, name)| !module.is_empty() && !name.is_empty());
        if !qualified {
            return Err(ValueError::new(
                self.type_name(),
                format!("\"{}\" is not a module-qualified identity", identity),
            ));
        }
        if !allowed.is_empty() && !allowed.iter().any(|a| a == identity) {
            return Err(ValueError::new(
                self.type_name(),
                format!("identity \"{}\" is not allowed", identity),
            ));
        }
        Ok(())
    }

    fn check_instance(&self, path: &str) -> Result<(), ValueError> {
        if !path.starts_with('/') {
            return Err(ValueError::new(self.type_name(), format!("\"{}\" is not an absolute path", path)));
        }
        Ok(())
    }

    fn check_union(&self, members: &[LeafType], text: &str) -> Result<(), ValueError> {
        if members
            .iter()
            .any(|m| m.parse(text.as_bytes(), ValueFormat::Canonical).is_ok())
        {
            Ok(())
        } else {
            Err(ValueError::new(
                self.type_name(),
                format!("\"{}\" matches no member type", text),
            ))
        }
    }

    fn print_lyb<'v>(&self, value: &'v Value) -> Result<Cow<'v, [u8]>, ValueError> {
        let bytes = match (self, value) {
            (LeafType::Boolean, Value::Bool(b)) => vec![u8::from(*b)],
            (LeafType::Int8, Value::Int8(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Int16, Value::Int16(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Int32, Value::Int32(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Int64, Value::Int64(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Uint8, Value::Uint8(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Uint16, Value::Uint16(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Uint32, Value::Uint32(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Uint64, Value::Uint64(v)) => v.to_le_bytes().to_vec(),
            (LeafType::Decimal64 { .. }, Value::Decimal64(v)) => v.to_le_bytes().to_vec(),
            (LeafType::String, Value::String(s)) => return Ok(Cow::Borrowed(s.as_bytes())),
            (LeafType::Binary, Value::Binary(b)) => return Ok(Cow::Borrowed(b.as_slice())),
            (LeafType::Empty, Value::Empty) => Vec::new(),
            (LeafType::Enumeration(members), Value::Enum(name)) => {
                self.enum_value(members, name)?.to_le_bytes().to_vec()
            }
            (LeafType::Bits(members), Value::Bits(names)) => {
                let mut field = vec![0u8; bits_len(members)];
                for position in self.bit_positions(members, names)? {
                    let p = position as usize;
                    field[p / 8] |= 1 << (p % 8);
                }
                field
            }
            (LeafType::IdentityRef(allowed), Value::IdentityRef(identity)) => {
                self.check_identity(allowed, identity)?;
                return Ok(Cow::Borrowed(identity.as_bytes()));
            }
            (LeafType::InstanceIdentifier, Value::InstanceIdentifier(path)) => {
                self.check_instance(path)?;
                return Ok(Cow::Borrowed(path.as_bytes()));
            }
            (LeafType::Union(members), Value::Union(text)) => {
                self.check_union(members, text)?;
                return Ok(Cow::Borrowed(text.as_bytes()));
            }
            _ => return Err(self.mismatch(value)),
        };
        Ok(Cow::Owned(bytes))
    }

    fn parse_lyb(&self, data: &[u8]) -> Result<Value, ValueError> {
        let name = self.type_name();
        if let Some(len) = self.lyb_len() {
            if data.len() != len {
                return Err(ValueError::new(
                    name,
                    format!("expected {} bytes, found {}", len, data.len()),
                ));
            }
        }

        let value = match self {
            LeafType::Boolean => match data[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => return Err(ValueError::new(name, format!("invalid boolean byte {:#04x}", b))),
            },
            LeafType::Int8 => Value::Int8(i8::from_le_bytes(array(name, data)?)),
            LeafType::Int16 => Value::Int16(i16::from_le_bytes(array(name, data)?)),
            LeafType::Int32 => Value::Int32(i32::from_le_bytes(array(name, data)?)),
            LeafType::Int64 => Value::Int64(i64::from_le_bytes(array(name, data)?)),
            LeafType::Uint8 => Value::Uint8(data[0]),
            LeafType::Uint16 => Value::Uint16(u16::from_le_bytes(array(name, data)?)),
            LeafType::Uint32 => Value::Uint32(u32::from_le_bytes(array(name, data)?)),
            LeafType::Uint64 => Value::Uint64(u64::from_le_bytes(array(name, data)?)),
            LeafType::Decimal64 { .. } => Value::Decimal64(i64::from_le_bytes(array(name, data)?)),
            LeafType::String => Value::String(
                std::str::from_utf8(data)
                    .map_err(|_| ValueError::new(name, "invalid UTF-8"))?
                    .to_string(),
            ),
            LeafType::Binary => Value::Binary(data.to_vec()),
            LeafType::Empty => Value::Empty,
            LeafType::Enumeration(members) => {
                self.enum_name(members, i32::from_le_bytes(array(name, data)?))?
            }
            LeafType::Bits(members) => {
                let positions = data
                    .iter()
                    .enumerate()
                    .flat_map(|(i, byte)| {
                        (0..8u32)
                            .filter(move |&bit| byte & (1u8 << bit) != 0)
                            .map(move |bit| i as u32 * 8 + bit)
                    })
                    .collect();
                self.bit_names(members, positions)?
            }
            LeafType::IdentityRef(_) | LeafType::InstanceIdentifier | LeafType::Union(_) => {
                let text = std::str::from_utf8(data).map_err(|_| ValueError::new(name, "invalid UTF-8"))?;
                self.parse_text(text)?
            }
            LeafType::LeafRef(target) => target.parse_lyb(data)?,
            LeafType::Custom(codec) => codec.parse(data, ValueFormat::Lyb)?,
        };
        Ok(value)
    }

    fn print_canonical(&self, value: &Value) -> Result<String, ValueError> {
        let text = match (self, value) {
            (LeafType::Boolean, Value::Bool(b)) => b.to_string(),
            (LeafType::Int8, Value::Int8(v)) => v.to_string(),
            (LeafType::Int16, Value::Int16(v)) => v.to_string(),
            (LeafType::Int32, Value::Int32(v)) => v.to_string(),
            (LeafType::Int64, Value::Int64(v)) => v.to_string(),
            (LeafType::Uint8, Value::Uint8(v)) => v.to_string(),
            (LeafType::Uint16, Value::Uint16(v)) => v.to_string(),
            (LeafType::Uint32, Value::Uint32(v)) => v.to_string(),
            (LeafType::Uint64, Value::Uint64(v)) => v.to_string(),
            (LeafType::Decimal64 { fraction_digits }, Value::Decimal64(v)) => {
                format_decimal64(*v, *fraction_digits)
            }
            (LeafType::String, Value::String(s)) => s.clone(),
            (LeafType::Binary, Value::Binary(b)) => STANDARD.encode(b),
            (LeafType::Empty, Value::Empty) => String::new(),
            (LeafType::Enumeration(members), Value::Enum(name)) => {
                self.enum_value(members, name)?;
                name.clone()
            }
            (LeafType::Bits(members), Value::Bits(names)) => {
                self.bit_positions(members, names)?;
                names.join(" ")
            }
            (LeafType::IdentityRef(allowed), Value::IdentityRef(identity)) => {
                self.check_identity(allowed, identity)?;
                identity.clone()
            }
            (LeafType::InstanceIdentifier, Value::InstanceIdentifier(path)) => {
                self.check_instance(path)?;
                path.clone()
            }
            (LeafType::Union(members), Value::Union(text)) => {
                self.check_union(members, text)?;
                text.clone()
            }
            _ => return Err(self.mismatch(value)),
        };
        Ok(text)
    }

    fn parse_canonical(&self, data: &[u8]) -> Result<Value, ValueError> {
        let name = self.type_name();
        let text = std::str::from_utf8(data).map_err(|_| ValueError::new(name, "invalid UTF-8"))?;
        let number_err = |_| ValueError::new(name, format!("\"{}\" is not a valid number", text));

        let value = match self {
            LeafType::Boolean => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(ValueError::new(name, format!("\"{}\" is not a boolean", text))),
            },
            LeafType::Int8 => Value::Int8(text.parse().map_err(number_err)?),
            LeafType::Int16 => Value::Int16(text.parse().map_err(number_err)?),
            LeafType::Int32 => Value::Int32(text.parse().map_err(number_err)?),
            LeafType::Int64 => Value::Int64(text.parse().map_err(number_err)?),
            LeafType::Uint8 => Value::Uint8(text.parse().map_err(number_err)?),
            LeafType::Uint16 => Value::Uint16(text.parse().map_err(number_err)?),
            LeafType::Uint32 => Value::Uint32(text.parse().map_err(number_err)?),
            LeafType::Uint64 => Value::Uint64(text.parse().map_err(number_err)?),
            LeafType::Decimal64 { fraction_digits } => {
                Value::Decimal64(parse_decimal64(text, *fraction_digits).map_err(|reason| ValueError::new(name, reason))?)
            }
            LeafType::String => Value::String(text.to_string()),
            LeafType::Binary => Value::Binary(
                STANDARD
                    .decode(text)
                    .map_err(|e| ValueError::new(name, e.to_string()))?,
            ),
            LeafType::Empty if text.is_empty() => Value::Empty,
            LeafType::Empty => return Err(ValueError::new(name, "empty type has no value")),
            LeafType::Enumeration(members) => {
                self.enum_value(members, text)?;
                Value::Enum(text.to_string())
            }
            LeafType::Bits(members) => {
                let mut positions = Vec::new();
                for bit in text.split_whitespace() {
                    let position = members
                        .iter()
                        .find(|m| m.name == bit)
                        .map(|m| m.position)
                        .ok_or_else(|| ValueError::new(name, format!("unknown bit \"{}\"", bit)))?;
                    if positions.contains(&position) {
                        return Err(ValueError::new(name, format!("bit \"{}\" is repeated", bit)));
                    }
                    positions.push(position);
                }
                self.bit_names(members, positions)?
            }
            LeafType::IdentityRef(_) | LeafType::InstanceIdentifier | LeafType::Union(_) => self.parse_text(text)?,
            LeafType::LeafRef(target) => target.parse_canonical(data)?,
            LeafType::Custom(codec) => codec.parse(data, ValueFormat::Canonical)?,
        };
        Ok(value)
    }

    /// Parses a string-backed value, the same in both formats.
    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        match self {
            LeafType::IdentityRef(allowed) => {
                self.check_identity(allowed, text)?;
                Ok(Value::IdentityRef(text.to_string()))
            }
            LeafType::InstanceIdentifier => {
                self.check_instance(text)?;
                Ok(Value::InstanceIdentifier(text.to_string()))
            }
            LeafType::Union(members) => {
                self.check_union(members, text)?;
                Ok(Value::Union(text.to_string()))
            }
            _ => Err(ValueError::new(self.type_name(), "not a string-backed type")),
        }
    }
}

impl ValueCodec for LeafType {
    fn type_name(&self) -> &'static str {
        match self {
            LeafType::Boolean => "boolean",
            LeafType::Int8 => "int8",
            LeafType::Int16 => "int16",
            LeafType::Int32 => "int32",
            LeafType::Int64 => "int64",
            LeafType::Uint8 => "uint8",
            LeafType::Uint16 => "uint16",
            LeafType::Uint32 => "uint32",
            LeafType::Uint64 => "uint64",
            LeafType::Decimal64 { .. } => "decimal64",
            LeafType::String => "string",
            LeafType::Binary => "binary",
            LeafType::Empty => "empty",
            LeafType::Enumeration(_) => "enumeration",
            LeafType::Bits(_) => "bits",
            LeafType::IdentityRef(_) => "identityref",
            LeafType::InstanceIdentifier => "instance-identifier",
            LeafType::Union(_) => "union",
            LeafType::LeafRef(_) => "leafref",
            LeafType::Custom(codec) => codec.type_name(),
        }
    }

    fn lyb_len(&self) -> Option<usize> {
        match self {
            LeafType::Boolean | LeafType::Int8 | LeafType::Uint8 => Some(1),
            LeafType::Int16 | LeafType::Uint16 => Some(2),
            LeafType::Int32 | LeafType::Uint32 | LeafType::Enumeration(_) => Some(4),
            LeafType::Int64 | LeafType::Uint64 | LeafType::Decimal64 { .. } => Some(8),
            LeafType::Empty => Some(0),
            LeafType::Bits(members) => Some(bits_len(members)),
            LeafType::String
            | LeafType::Binary
            | LeafType::IdentityRef(_)
            | LeafType::InstanceIdentifier
            | LeafType::Union(_) => None,
            LeafType::LeafRef(target) => target.lyb_len(),
            LeafType::Custom(codec) => codec.lyb_len(),
        }
    }

    fn print<'v>(&self, value: &'v Value, format: ValueFormat) -> Result<Cow<'v, [u8]>, ValueError> {
        match self {
            LeafType::Custom(codec) => return codec.print(value, format),
            LeafType::LeafRef(target) => return target.print(value, format),
            _ => {}
        }
        match format {
            ValueFormat::Lyb => self.print_lyb(value),
            ValueFormat::Canonical => self
                .print_canonical(value)
                .map(|text| Cow::Owned(text.into_bytes())),
        }
    }

    fn parse(&self, data: &[u8], format: ValueFormat) -> Result<Value, ValueError> {
        match format {
            ValueFormat::Lyb => self.parse_lyb(data),
            ValueFormat::Canonical => self.parse_canonical(data),
        }
    }
}

/// Bytes of a packed bitfield covering the highest bit position.
fn bits_len(members: &[BitMember]) -> usize {
    members
        .iter()
        .map(|m| m.position as usize / 8 + 1)
        .max()
        .unwrap_or(0)
}

fn array<const N: usize>(type_name: &'static str, data: &[u8]) -> Result<[u8; N], ValueError> {
    data.try_into()
        .map_err(|_| ValueError::new(type_name, format!("expected {} bytes, found {}", N, data.len())))
}

/// Formats a scaled decimal64 value, keeping at least one fraction digit.
pub fn format_decimal64(value: i64, fraction_digits: u8) -> String {
    let abs = value.unsigned_abs();
    // every i64 is below 10^19
    let (int, frac) = match 10u64.checked_pow(u32::from(fraction_digits)) {
        Some(scale) => (abs / scale, abs % scale),
        None => (0, abs),
    };
    let mut frac = format!("{:0width$}", frac, width = usize::from(fraction_digits));
    while frac.len() > 1 && frac.ends_with('0') {
        frac.pop();
    }
    if frac.is_empty() {
        frac.push('0');
    }
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}.{}", sign, int, frac)
}

/// Parses decimal64 text into its scaled integer.
pub fn parse_decimal64(text: &str, fraction_digits: u8) -> Result<i64, String> {
    let invalid = || format!("\"{}\" is not a valid decimal64", text);

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac_part.len() > usize::from(fraction_digits) {
        return Err(format!(
            "\"{}\" has more than {} fraction digits",
            text, fraction_digits
        ));
    }

    let int: i128 = int_part.parse().map_err(|_| invalid())?;
    let frac: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| invalid())?
    };
    let missing = u32::from(fraction_digits) - frac_part.len() as u32;
    let scaled = 10i128
        .checked_pow(u32::from(fraction_digits))
        .and_then(|scale| int.checked_mul(scale))
        .zip(10i128.checked_pow(missing).and_then(|m| frac.checked_mul(m)))
        .and_then(|(int, frac)| int.checked_add(frac))
        .ok_or_else(invalid)?;
    let scaled = if negative { -scaled } else { scaled };
    i64::try_from(scaled).map_err(|_| format!("\"{}\" is out of decimal64 range", text))
}

//! Conversion between views and a language-neutral object representation.
//!
//! The representation is `serde_json::Value`: numbers for the narrow uints,
//! decimal strings for `uint128`/`uint256`, `0x`-prefixed hex for byte types,
//! bool arrays for bitfields, arrays for collections, objects for containers
//! and `{"selector", "value"}` objects for unions.

use crate::error::{Error, Result};
use crate::types::SszType;
use crate::view::View;
use ethereum_types::U256;
use serde_json::{json, Map, Value};

impl View {
    /// Build a value of type `ty` from its object representation.
    pub fn from_obj(ty: &SszType, obj: &Value) -> Result<View> {
        match ty {
            SszType::Bool => Ok(View::boolean(expect_bool(obj)?)),
            SszType::Uint(_) => uint_from_obj(ty, obj),
            SszType::Container(c) => {
                let map = obj
                    .as_object()
                    .ok_or_else(|| Error::type_mismatch("object", kind(obj)))?;
                for key in map.keys() {
                    if c.field_index(key).is_none() {
                        return Err(Error::UnknownField(key.clone()));
                    }
                }
                let value = ty.default_view();
                for (i, (name, fty)) in c.fields.iter().enumerate() {
                    let field = map
                        .get(name)
                        .ok_or_else(|| Error::MissingField(name.clone()))?;
                    value.set(i, &View::from_obj(fty, field)?)?;
                }
                Ok(value)
            }
            SszType::Vector(v) => {
                let items = expect_array(obj)?;
                if items.len() != v.length {
                    return Err(Error::LengthMismatch {
                        len: items.len(),
                        expected: v.length,
                    });
                }
                let value = ty.default_view();
                for (i, item) in items.iter().enumerate() {
                    value.set(i, &View::from_obj(&v.elem, item)?)?;
                }
                Ok(value)
            }
            SszType::List(l) => {
                let items = expect_array(obj)?;
                let value = ty.default_view();
                for item in items {
                    value.append(&View::from_obj(&l.elem, item)?)?;
                }
                Ok(value)
            }
            SszType::Bitvector(n) => {
                let bits = expect_array(obj)?;
                if bits.len() != *n {
                    return Err(Error::LengthMismatch {
                        len: bits.len(),
                        expected: *n,
                    });
                }
                let value = ty.default_view();
                for (i, bit) in bits.iter().enumerate() {
                    value.set(i, &View::boolean(expect_bool(bit)?))?;
                }
                Ok(value)
            }
            SszType::Bitlist(_) => {
                let bits = expect_array(obj)?;
                let value = ty.default_view();
                for bit in bits {
                    value.append(&View::boolean(expect_bool(bit)?))?;
                }
                Ok(value)
            }
            SszType::ByteVector(_) | SszType::ByteList(_) => {
                // Raw bytes are their own wire encoding.
                View::decode_bytes(ty, &expect_bytes(obj)?)
            }
            SszType::Union(u) => {
                let map = obj
                    .as_object()
                    .ok_or_else(|| Error::type_mismatch("object", kind(obj)))?;
                let selector = map
                    .get("selector")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::type_mismatch("selector number", kind(obj)))?;
                let selector = u8::try_from(selector)
                    .map_err(|_| Error::type_mismatch("one-byte selector", selector))?;
                let value = ty.default_view();
                match u.variants.get(selector as usize) {
                    Some(Some(vty)) => {
                        let body = map
                            .get("value")
                            .ok_or_else(|| Error::MissingField("value".into()))?;
                        value.change(selector, Some(&View::from_obj(vty, body)?))?;
                    }
                    Some(None) => value.change(selector, None)?,
                    None => {
                        return Err(Error::type_mismatch(
                            format!("selector below {}", u.variants.len()),
                            selector,
                        ))
                    }
                }
                Ok(value)
            }
        }
    }

    /// The object representation of this value.
    pub fn to_obj(&self) -> Result<Value> {
        match self.ty() {
            SszType::Bool => Ok(Value::Bool(self.as_bool()?)),
            SszType::Uint(size) => match size.byte_len() {
                1 => Ok(json!(self.as_u8()?)),
                2 => Ok(json!(self.as_u16()?)),
                4 => Ok(json!(self.as_u32()?)),
                8 => Ok(json!(self.as_u64()?)),
                16 => Ok(Value::String(self.as_u128()?.to_string())),
                _ => Ok(Value::String(self.as_u256()?.to_string())),
            },
            SszType::Container(c) => {
                let mut map = Map::new();
                for (i, (name, _)) in c.fields.iter().enumerate() {
                    map.insert(name.clone(), self.get(i)?.to_obj()?);
                }
                Ok(Value::Object(map))
            }
            SszType::Vector(_) | SszType::List(_) => {
                let mut items = Vec::with_capacity(self.len()?);
                for i in 0..self.len()? {
                    items.push(self.get(i)?.to_obj()?);
                }
                Ok(Value::Array(items))
            }
            SszType::Bitvector(_) | SszType::Bitlist(_) => {
                let mut bits = Vec::with_capacity(self.len()?);
                for i in 0..self.len()? {
                    bits.push(Value::Bool(self.get(i)?.as_bool()?));
                }
                Ok(Value::Array(bits))
            }
            SszType::ByteVector(_) | SszType::ByteList(_) => {
                Ok(Value::String(format!("0x{}", hex::encode(self.encode_bytes()?))))
            }
            SszType::Union(_) => {
                let value = match self.selected()? {
                    Some(selected) => selected.to_obj()?,
                    None => Value::Null,
                };
                Ok(json!({ "selector": self.selector()?, "value": value }))
            }
        }
    }
}

fn uint_from_obj(ty: &SszType, obj: &Value) -> Result<View> {
    let mismatch = || Error::type_mismatch(ty, kind(obj));
    match ty {
        SszType::Uint(size) => match size.byte_len() {
            1 => as_u64(obj)
                .and_then(|n| u8::try_from(n).ok())
                .map(View::uint8)
                .ok_or_else(mismatch),
            2 => as_u64(obj)
                .and_then(|n| u16::try_from(n).ok())
                .map(View::uint16)
                .ok_or_else(mismatch),
            4 => as_u64(obj)
                .and_then(|n| u32::try_from(n).ok())
                .map(View::uint32)
                .ok_or_else(mismatch),
            8 => as_u64(obj).map(View::uint64).ok_or_else(mismatch),
            16 => match obj {
                Value::Number(_) => as_u64(obj).map(|n| View::uint128(n as u128)),
                Value::String(s) => s.parse::<u128>().ok().map(View::uint128),
                _ => None,
            }
            .ok_or_else(mismatch),
            _ => match obj {
                Value::Number(_) => as_u64(obj).map(|n| View::uint256(U256::from(n))),
                Value::String(s) => U256::from_dec_str(s).ok().map(View::uint256),
                _ => None,
            }
            .ok_or_else(mismatch),
        },
        _ => unreachable!("only called for uint types"),
    }
}

/// Numbers are accepted directly; decimal strings are accepted everywhere so
/// wide values survive JSON readers that clamp to f64.
fn as_u64(obj: &Value) -> Option<u64> {
    match obj {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn expect_bool(obj: &Value) -> Result<bool> {
    obj.as_bool()
        .ok_or_else(|| Error::type_mismatch("bool", kind(obj)))
}

fn expect_array(obj: &Value) -> Result<&Vec<Value>> {
    obj.as_array()
        .ok_or_else(|| Error::type_mismatch("array", kind(obj)))
}

/// Byte payloads: a `0x`-prefixed hex string, or an array of byte numbers.
fn expect_bytes(obj: &Value) -> Result<Vec<u8>> {
    match obj {
        Value::String(s) => {
            let stripped = s
                .strip_prefix("0x")
                .ok_or_else(|| Error::type_mismatch("0x-prefixed hex", "bare string"))?;
            hex::decode(stripped).map_err(|_| Error::type_mismatch("hex string", "malformed hex"))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| Error::type_mismatch("byte", kind(item)))
            })
            .collect(),
        other => Err(Error::type_mismatch("hex string or byte array", kind(other))),
    }
}

fn kind(obj: &Value) -> &'static str {
    match obj {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj_round_trip(view: &View) {
        let obj = view.to_obj().unwrap();
        let rebuilt = View::from_obj(view.ty(), &obj).unwrap();
        assert_eq!(&rebuilt, view);
    }

    #[test]
    fn basic_objects() {
        assert_eq!(View::boolean(true).to_obj().unwrap(), json!(true));
        assert_eq!(View::uint64(42).to_obj().unwrap(), json!(42));
        assert_eq!(
            View::uint128(1 << 90).to_obj().unwrap(),
            json!((1u128 << 90).to_string())
        );

        obj_round_trip(&View::uint8(7));
        obj_round_trip(&View::uint256(U256::MAX));
    }

    #[test]
    fn container_objects() {
        let ty = SszType::container("Pair")
            .field("a", SszType::uint8())
            .field("b", SszType::list(SszType::uint8(), 4))
            .build()
            .unwrap();

        let value = View::from_obj(&ty, &json!({"a": 1, "b": [2, 3]})).unwrap();
        assert_eq!(value.field("a").unwrap().as_u8().unwrap(), 1);
        assert_eq!(value.field("b").unwrap().len().unwrap(), 2);
        obj_round_trip(&value);
    }

    #[test]
    fn unknown_and_missing_fields() {
        let ty = SszType::container("One")
            .field("a", SszType::uint8())
            .build()
            .unwrap();

        assert_eq!(
            View::from_obj(&ty, &json!({"a": 1, "z": 2})).err(),
            Some(Error::UnknownField("z".into()))
        );
        assert_eq!(
            View::from_obj(&ty, &json!({})).err(),
            Some(Error::MissingField("a".into()))
        );
    }

    #[test]
    fn byte_types_render_as_hex() {
        let ty = SszType::byte_vector(4).unwrap();
        let value = View::from_obj(&ty, &json!("0x01020304")).unwrap();
        assert_eq!(value.to_obj().unwrap(), json!("0x01020304"));

        // A byte array spells the same value.
        let from_array = View::from_obj(&ty, &json!([1, 2, 3, 4])).unwrap();
        assert_eq!(from_array, value);

        assert!(matches!(
            View::from_obj(&ty, &json!("01020304")),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(
            View::from_obj(&ty, &json!("0x0102")).err(),
            Some(Error::LengthMismatch {
                len: 2,
                expected: 4
            })
        );
    }

    #[test]
    fn bitfield_objects() {
        let ty = SszType::bitlist(8);
        let value = View::from_obj(&ty, &json!([true, false, true])).unwrap();
        assert_eq!(value.to_obj().unwrap(), json!([true, false, true]));
        obj_round_trip(&value);

        let vec_ty = SszType::bitvector(3).unwrap();
        assert_eq!(
            View::from_obj(&vec_ty, &json!([true])).err(),
            Some(Error::LengthMismatch {
                len: 1,
                expected: 3
            })
        );
    }

    #[test]
    fn union_objects() {
        let ty = SszType::union(vec![None, Some(SszType::uint32())]).unwrap();

        let none = View::from_obj(&ty, &json!({"selector": 0, "value": null})).unwrap();
        assert_eq!(none.to_obj().unwrap(), json!({"selector": 0, "value": null}));

        let some = View::from_obj(&ty, &json!({"selector": 1, "value": 7})).unwrap();
        assert_eq!(some.selected().unwrap().unwrap().as_u32().unwrap(), 7);
        obj_round_trip(&some);
    }

    #[test]
    fn vector_length_is_checked() {
        let ty = SszType::vector(SszType::uint16(), 3).unwrap();
        assert_eq!(
            View::from_obj(&ty, &json!([1, 2])).err(),
            Some(Error::LengthMismatch {
                len: 2,
                expected: 3
            })
        );
        obj_round_trip(&View::from_obj(&ty, &json!([1, 2, 3])).unwrap());
    }
}

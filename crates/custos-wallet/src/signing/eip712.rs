//! Typed structured data hashing and signing (EIP-712)
//!
//! A payload carries its own struct type declarations, a signing domain,
//! and the message values as JSON. The digest is
//! `keccak256(0x19 0x01 || domainSeparator || hashStruct(primaryType, message))`
//! with struct hashing per the typed-data encoding: atomic values occupy
//! one 32-byte word, dynamic values and nested structs are hashed, arrays
//! are the hash of their concatenated element encodings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use custos_core::{keccak256, WalletAddress};

use super::sign_digest;
use crate::error::{CustodyError, Result};
use crate::handle::RecoveredKeyHandle;

/// One field of a struct type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
    pub name: String,
    pub r#type: String,
}

impl TypedDataField {
    pub fn new(name: &str, r#type: &str) -> Self {
        Self {
            name: name.to_string(),
            r#type: r#type.to_string(),
        }
    }
}

/// EIP-712 signing domain; unset fields stay out of the separator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// A complete typed-data payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedData {
    pub types: BTreeMap<String, Vec<TypedDataField>>,
    #[serde(rename = "primaryType")]
    pub primary_type: String,
    pub domain: Eip712Domain,
    pub message: Value,
}

/// Digest construction failures; surfaced at the boundary as
/// `InvalidTypedDataSignature`
#[derive(Debug, Error)]
pub enum TypedDataError {
    #[error("unknown type {0}")]
    UnknownType(String),

    #[error("type {0} expects an object value")]
    NotAnObject(String),

    #[error("missing field {0}")]
    MissingField(String),

    #[error("invalid value for type {0}")]
    InvalidValue(String),

    #[error("invalid domain: {0}")]
    Domain(String),
}

impl TypedData {
    /// The digest that gets signed
    pub fn digest(&self) -> std::result::Result<[u8; 32], TypedDataError> {
        let domain_separator = self.domain_separator()?;
        let message_hash = self.hash_struct(&self.primary_type, &self.message)?;

        let mut data = Vec::with_capacity(2 + 32 + 32);
        data.extend_from_slice(&[0x19, 0x01]);
        data.extend_from_slice(&domain_separator);
        data.extend_from_slice(&message_hash);
        Ok(keccak256(&data))
    }

    /// Hash of the signing domain under its declared `EIP712Domain` type
    pub fn domain_separator(&self) -> std::result::Result<[u8; 32], TypedDataError> {
        let domain_value =
            serde_json::to_value(&self.domain).map_err(|e| TypedDataError::Domain(e.to_string()))?;
        self.hash_struct("EIP712Domain", &domain_value)
    }

    /// Canonical type encoding: the primary type followed by every struct
    /// type it references, alphabetically
    pub fn encode_type(&self, primary: &str) -> std::result::Result<String, TypedDataError> {
        if !self.types.contains_key(primary) {
            return Err(TypedDataError::UnknownType(primary.to_string()));
        }

        let mut referenced = BTreeSet::new();
        self.collect_struct_types(primary, &mut referenced);
        referenced.remove(primary);

        let mut ordered: Vec<&str> = vec![primary];
        ordered.extend(referenced.iter().map(String::as_str));

        let mut out = String::new();
        for name in ordered {
            let fields = self
                .types
                .get(name)
                .ok_or_else(|| TypedDataError::UnknownType(name.to_string()))?;
            out.push_str(name);
            out.push('(');
            let rendered: Vec<String> = fields
                .iter()
                .map(|f| format!("{} {}", f.r#type, f.name))
                .collect();
            out.push_str(&rendered.join(","));
            out.push(')');
        }
        Ok(out)
    }

    pub fn type_hash(&self, name: &str) -> std::result::Result<[u8; 32], TypedDataError> {
        Ok(keccak256(self.encode_type(name)?.as_bytes()))
    }

    /// `keccak256(typeHash || encoded fields)`
    pub fn hash_struct(
        &self,
        name: &str,
        value: &Value,
    ) -> std::result::Result<[u8; 32], TypedDataError> {
        Ok(keccak256(&self.encode_data(name, value)?))
    }

    fn collect_struct_types(&self, type_name: &str, found: &mut BTreeSet<String>) {
        let base = base_type(type_name);
        if !self.types.contains_key(base) || found.contains(base) {
            return;
        }
        found.insert(base.to_string());
        for field in &self.types[base] {
            self.collect_struct_types(&field.r#type, found);
        }
    }

    fn encode_data(&self, name: &str, value: &Value) -> std::result::Result<Vec<u8>, TypedDataError> {
        let fields = self
            .types
            .get(name)
            .ok_or_else(|| TypedDataError::UnknownType(name.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| TypedDataError::NotAnObject(name.to_string()))?;

        let mut out = Vec::with_capacity(32 * (fields.len() + 1));
        out.extend_from_slice(&self.type_hash(name)?);
        for field in fields {
            let field_value = object
                .get(&field.name)
                .ok_or_else(|| TypedDataError::MissingField(field.name.clone()))?;
            out.extend_from_slice(&self.encode_value(&field.r#type, field_value)?);
        }
        Ok(out)
    }

    /// Encode one value into its 32-byte word
    fn encode_value(
        &self,
        type_name: &str,
        value: &Value,
    ) -> std::result::Result<[u8; 32], TypedDataError> {
        if let Some(element_type) = array_element_type(type_name) {
            let items = value
                .as_array()
                .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;
            if let Some(expected) = fixed_array_len(type_name) {
                if items.len() != expected {
                    return Err(TypedDataError::InvalidValue(type_name.to_string()));
                }
            }
            let mut buffer = Vec::with_capacity(32 * items.len());
            for item in items {
                buffer.extend_from_slice(&self.encode_value(element_type, item)?);
            }
            return Ok(keccak256(&buffer));
        }

        if self.types.contains_key(type_name) {
            return self.hash_struct(type_name, value);
        }

        match type_name {
            "string" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;
                Ok(keccak256(s.as_bytes()))
            }
            "bytes" => {
                let bytes = decode_hex_bytes(value)
                    .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;
                Ok(keccak256(&bytes))
            }
            "bool" => {
                let flag = value
                    .as_bool()
                    .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;
                let mut word = [0u8; 32];
                word[31] = flag as u8;
                Ok(word)
            }
            "address" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;
                let address = WalletAddress::from_hex(s)
                    .map_err(|_| TypedDataError::InvalidValue(type_name.to_string()))?;
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_bytes());
                Ok(word)
            }
            t if t.starts_with("bytes") => encode_fixed_bytes(t, value),
            t if t.starts_with("uint") || t.starts_with("int") => encode_integer(t, value),
            other => Err(TypedDataError::UnknownType(other.to_string())),
        }
    }
}

/// Sign a typed-data payload with a reconstructed key, consuming the handle
pub fn sign_typed_data(handle: RecoveredKeyHandle, typed: &TypedData) -> Result<String> {
    let digest = typed
        .digest()
        .map_err(|e| CustodyError::InvalidTypedDataSignature(e.to_string()))?;
    sign_digest(handle.signing_key(), &digest)
}

/// Strip every array suffix: `Person[3][]` -> `Person`
fn base_type(type_name: &str) -> &str {
    match type_name.find('[') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    }
}

/// Element type of an array, stripping one suffix from the end:
/// `uint8[2][3]` -> `uint8[2]`
fn array_element_type(type_name: &str) -> Option<&str> {
    if !type_name.ends_with(']') {
        return None;
    }
    type_name.rfind('[').map(|idx| &type_name[..idx])
}

/// Declared length of a fixed-size array suffix, if any
fn fixed_array_len(type_name: &str) -> Option<usize> {
    let open = type_name.rfind('[')?;
    let inner = &type_name[open + 1..type_name.len() - 1];
    if inner.is_empty() {
        return None;
    }
    inner.parse().ok()
}

fn decode_hex_bytes(value: &Value) -> Option<Vec<u8>> {
    let s = value.as_str()?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()
}

/// `bytesN` values are left-aligned in their word
fn encode_fixed_bytes(
    type_name: &str,
    value: &Value,
) -> std::result::Result<[u8; 32], TypedDataError> {
    let size: usize = type_name[5..]
        .parse()
        .map_err(|_| TypedDataError::UnknownType(type_name.to_string()))?;
    if size == 0 || size > 32 {
        return Err(TypedDataError::UnknownType(type_name.to_string()));
    }

    let bytes = decode_hex_bytes(value)
        .filter(|b| b.len() == size)
        .ok_or_else(|| TypedDataError::InvalidValue(type_name.to_string()))?;

    let mut word = [0u8; 32];
    word[..size].copy_from_slice(&bytes);
    Ok(word)
}

/// `uintN`/`intN` values accept JSON numbers, decimal strings, and 0x-hex
/// strings; negatives are two's-complement sign-extended
fn encode_integer(type_name: &str, value: &Value) -> std::result::Result<[u8; 32], TypedDataError> {
    let bits: usize = type_name
        .trim_start_matches("uint")
        .trim_start_matches("int")
        .parse()
        .unwrap_or(256);
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(TypedDataError::UnknownType(type_name.to_string()));
    }

    let invalid = || TypedDataError::InvalidValue(type_name.to_string());

    let mut word = [0u8; 32];
    match value {
        Value::Number(n) => {
            if let Some(unsigned) = n.as_u64() {
                word[24..].copy_from_slice(&unsigned.to_be_bytes());
            } else if let Some(signed) = n.as_i64() {
                if signed < 0 {
                    word = [0xff; 32];
                }
                word[24..].copy_from_slice(&signed.to_be_bytes());
            } else {
                return Err(invalid());
            }
        }
        Value::String(s) => {
            if let Some(hex_digits) = s.strip_prefix("0x") {
                let padded = if hex_digits.len() % 2 == 0 {
                    hex_digits.to_string()
                } else {
                    format!("0{}", hex_digits)
                };
                let bytes = hex::decode(&padded).map_err(|_| invalid())?;
                if bytes.len() > 32 {
                    return Err(invalid());
                }
                word[32 - bytes.len()..].copy_from_slice(&bytes);
            } else {
                let parsed: u128 = s.parse().map_err(|_| invalid())?;
                word[16..].copy_from_slice(&parsed.to_be_bytes());
            }
        }
        _ => return Err(invalid()),
    }
    Ok(word)
}

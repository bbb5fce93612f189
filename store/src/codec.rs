//! Key layout and value encoding for key-value backends.
//!
//! Keys are a one-byte table prefix followed by length-prefixed components,
//! so that one asset's key range never contains another asset whose name it
//! prefixes, and snapshot periods sort numerically (big-endian).

use crate::StoreError;
use farm_types::{Address, Denom};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const POOL_PREFIX: u8 = 0x01;
pub const SNAPSHOT_PREFIX: u8 = 0x02;
pub const POSITION_PREFIX: u8 = 0x03;

fn push_component(key: &mut Vec<u8>, component: &str) {
    // Addresses are at most 255 bytes and denoms at most 128.
    key.push(component.len() as u8);
    key.extend_from_slice(component.as_bytes());
}

pub fn pool_key(asset: &Denom) -> Vec<u8> {
    let mut key = vec![POOL_PREFIX];
    push_component(&mut key, asset.as_str());
    key
}

/// Prefix shared by every snapshot of `asset`.
pub fn snapshot_prefix(asset: &Denom) -> Vec<u8> {
    let mut key = vec![SNAPSHOT_PREFIX];
    push_component(&mut key, asset.as_str());
    key
}

pub fn snapshot_key(asset: &Denom, period: u64) -> Vec<u8> {
    let mut key = snapshot_prefix(asset);
    key.extend_from_slice(&period.to_be_bytes());
    key
}

/// Prefix shared by every position of `staker`.
pub fn position_prefix(staker: &Address) -> Vec<u8> {
    let mut key = vec![POSITION_PREFIX];
    push_component(&mut key, staker.as_str());
    key
}

pub fn position_key(staker: &Address, asset: &Denom) -> Vec<u8> {
    let mut key = position_prefix(staker);
    push_component(&mut key, asset.as_str());
    key
}

/// Recover the period from a snapshot key.
pub fn period_from_snapshot_key(key: &[u8]) -> Result<u64, StoreError> {
    let tail = key
        .len()
        .checked_sub(8)
        .and_then(|start| key.get(start..))
        .ok_or_else(|| StoreError::Corruption(format!("snapshot key too short: {key:?}")))?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(tail);
    Ok(u64::from_be_bytes(bytes))
}

/// Recover the asset from a snapshot key.
pub fn asset_from_snapshot_key(key: &[u8]) -> Result<Denom, StoreError> {
    let corrupt = || StoreError::Corruption(format!("malformed snapshot key: {key:?}"));
    let len = usize::from(*key.get(1).ok_or_else(corrupt)?);
    if key.first() != Some(&SNAPSHOT_PREFIX) || key.len() != 2 + len + 8 {
        return Err(corrupt());
    }
    let name = std::str::from_utf8(&key[2..2 + len]).map_err(|_| corrupt())?;
    Denom::new(name).map_err(|e| StoreError::Corruption(e.to_string()))
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

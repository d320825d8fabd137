//! Registry of complex type descriptors.
//!
//! Scalar categories are fully described by their [`TypeWord`]; vectors with
//! an element type and composites (struct/pack/union/array) need a descriptor
//! blob. The registry maps dense 16-bit ids, assigned from 0 in registration
//! order, to those blobs. It is process-local state and is not serialized
//! into objects.

use crate::bytes::{self, Endian};
use crate::ty::TypeWord;
use crate::{Error, Result};

/// Build a vector descriptor: `[vector_type:u16, element_type:u16]`,
/// little-endian.
pub fn vector_descriptor(vector: TypeWord, element: TypeWord) -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    bytes::append_u16(&mut data, vector.raw(), Endian::Little);
    bytes::append_u16(&mut data, element.raw(), Endian::Little);
    data
}

/// Build a composite descriptor:
/// `[base:u16, count:u16, fields:u16[count]]`, little-endian.
pub fn composite_descriptor(base: TypeWord, fields: &[TypeWord]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + fields.len() * 2);
    bytes::append_u16(&mut data, base.raw(), Endian::Little);
    bytes::append_u16(&mut data, fields.len() as u16, Endian::Little);
    for field in fields {
        bytes::append_u16(&mut data, field.raw(), Endian::Little);
    }
    data
}

/// Append-only store of encoded complex-type descriptors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TypeRegistry {
    entries: Vec<Vec<u8>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, returning its dense id.
    pub fn register(&mut self, descriptor: Vec<u8>) -> u16 {
        self.entries.push(descriptor);
        (self.entries.len() - 1) as u16
    }

    /// The descriptor registered under `id`.
    pub fn get(&self, id: u16) -> Result<&[u8]> {
        self.entries
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFound(format!("type id {id} is not registered")))
    }

    /// Whether `id` has been registered.
    pub fn contains(&self, id: u16) -> bool {
        (id as usize) < self.entries.len()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registered descriptor. Ids restart at 0.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty;

    #[test]
    fn ids_are_dense_from_zero() {
        let mut registry = TypeRegistry::new();
        let a = registry.register(vector_descriptor(ty::V128, ty::INT32));
        let b = registry.register(composite_descriptor(ty::STRUCT, &[ty::INT8, ty::FP64]));
        assert_eq!((a, b), (0, 1));
        assert!(registry.contains(1));
        assert!(!registry.contains(2));
    }

    #[test]
    fn descriptors_are_little_endian() {
        assert_eq!(
            vector_descriptor(ty::V128, ty::INT32),
            [0x00, 0x30, 0x00, 0x03]
        );
        assert_eq!(
            composite_descriptor(ty::STRUCT, &[ty::INT8, ty::UNT16]),
            [0x00, 0xD0, 0x02, 0x00, 0x00, 0x01, 0x00, 0x11]
        );
    }

    #[test]
    fn missing_id_is_not_found() {
        let registry = TypeRegistry::new();
        assert!(matches!(registry.get(0), Err(Error::NotFound(_))));
    }

    #[test]
    fn clear_restarts_id_assignment() {
        let mut registry = TypeRegistry::new();
        registry.register(vector_descriptor(ty::V256, ty::FP32));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.register(vector_descriptor(ty::V512, ty::FP64)), 0);
    }
}

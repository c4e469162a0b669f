//! Per-type serializer/deserializer registry
//!
//! Maps a payload type (by [`TypeId`]) to a pair of [`TypedCallable`]s. The
//! wire shapes used by network endpoints are:
//!
//! - serializer: `Fn(T) -> Result<Vec<u8>>`
//! - deserializer: `Fn(Vec<u8>) -> Result<T>`
//!
//! Other shapes can be registered and fetched back through
//! [`TypeRegistry::get_serializer`], but only the shapes above are accepted by
//! [`TypeRegistry::serialize`] and [`TypeRegistry::deserialize`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::callable::{ArgList, IntoCallable, Signature, TypedCallable};
use crate::error::{CodecRole, Error, Result};

#[derive(Debug, Clone)]
struct CodecEntry {
    type_name: &'static str,
    serializer: TypedCallable,
    deserializer: TypedCallable,
}

impl CodecEntry {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            serializer: TypedCallable::new(),
            deserializer: TypedCallable::new(),
        }
    }

    fn slot(&self, role: CodecRole) -> &TypedCallable {
        match role {
            CodecRole::Serializer => &self.serializer,
            CodecRole::Deserializer => &self.deserializer,
        }
    }
}

/// Registry of wire codecs keyed by payload type
///
/// Registration takes `&mut self` and is expected to happen during startup;
/// share it behind a lock if it must be mutated while other threads read it.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: HashMap<TypeId, CodecEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the serializer for `T`, replacing any previous one
    pub fn register_serializer<T, Args, R, F>(&mut self, func: F)
    where
        T: 'static,
        Args: ArgList,
        R: Send + 'static,
        F: IntoCallable<Args, R>,
    {
        self.entry::<T>().serializer.assign(func);
    }

    /// Store the deserializer for `T`, replacing any previous one
    pub fn register_deserializer<T, Args, R, F>(&mut self, func: F)
    where
        T: 'static,
        Args: ArgList,
        R: Send + 'static,
        F: IntoCallable<Args, R>,
    {
        self.entry::<T>().deserializer.assign(func);
    }

    pub fn get_serializer<T: 'static>(&self) -> Result<TypedCallable> {
        self.lookup::<T>(CodecRole::Serializer)
    }

    pub fn get_deserializer<T: 'static>(&self) -> Result<TypedCallable> {
        self.lookup::<T>(CodecRole::Deserializer)
    }

    pub fn has_serializer<T: 'static>(&self) -> bool {
        self.get_serializer::<T>().is_ok()
    }

    pub fn has_deserializer<T: 'static>(&self) -> bool {
        self.get_deserializer::<T>().is_ok()
    }

    /// Serializer for `T`, checked to have the `Fn(T) -> Result<Vec<u8>>` shape
    pub fn wire_serializer<T: Send + 'static>(&self) -> Result<TypedCallable> {
        let serializer = self.get_serializer::<T>()?;
        expect_signature::<(T,), Result<Vec<u8>>>(&serializer)?;
        Ok(serializer)
    }

    /// Deserializer for `T`, checked to have the `Fn(Vec<u8>) -> Result<T>` shape
    pub fn wire_deserializer<T: Send + 'static>(&self) -> Result<TypedCallable> {
        let deserializer = self.get_deserializer::<T>()?;
        expect_signature::<(Vec<u8>,), Result<T>>(&deserializer)?;
        Ok(deserializer)
    }

    pub fn serialize<T: Send + 'static>(&self, value: T) -> Result<Vec<u8>> {
        self.get_serializer::<T>()?
            .invoke::<(T,), Result<Vec<u8>>>((value,))?
    }

    pub fn deserialize<T: Send + 'static>(&self, bytes: Vec<u8>) -> Result<T> {
        self.get_deserializer::<T>()?
            .invoke::<(Vec<u8>,), Result<T>>((bytes,))?
    }

    /// Number of payload types with at least one registered function
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }

    fn entry<T: 'static>(&mut self) -> &mut CodecEntry {
        self.entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| CodecEntry::new(type_name::<T>()))
    }

    fn lookup<T: 'static>(&self, role: CodecRole) -> Result<TypedCallable> {
        self.entries
            .get(&TypeId::of::<T>())
            .map(|entry| entry.slot(role))
            .filter(|callable| callable.is_assigned())
            .cloned()
            .ok_or(Error::UnregisteredType {
                role,
                type_name: type_name::<T>(),
            })
    }
}

fn expect_signature<Args: ArgList, R: 'static>(callable: &TypedCallable) -> Result<()> {
    let expected = Signature::of::<Args, R>();
    match callable.signature() {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        None => Err(Error::NotAssigned),
    }
}

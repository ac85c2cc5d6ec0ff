//! Lookup of platform members that generated state machines depend on.
//!
//! The binder owns the real symbol tables; lowering only asks whether a
//! member exists, keyed by a logical name, and references whatever comes back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Logical name of a platform member the lowering may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WellKnownMember {
    Int32,
    Boolean,
    Object,
    Disposable,
    DisposableDispose,
    Enumerator,
    EnumeratorMoveNext,
    EnumeratorCurrent,
    EnumeratorReset,
    GenericEnumerator,
    GenericEnumeratorCurrent,
    Enumerable,
    EnumerableGetEnumerator,
    GenericEnumerable,
    GenericEnumerableGetEnumerator,
    NotSupportedExceptionCtor,
    /// Fast accessor for the current thread's managed id.
    CurrentManagedThreadId,
    /// Slow path: fetch the current thread object ...
    ThreadCurrentThread,
    /// ... then read its managed id.
    ThreadManagedThreadId,
}

impl WellKnownMember {
    pub const ALL: [WellKnownMember; 19] = [
        WellKnownMember::Int32,
        WellKnownMember::Boolean,
        WellKnownMember::Object,
        WellKnownMember::Disposable,
        WellKnownMember::DisposableDispose,
        WellKnownMember::Enumerator,
        WellKnownMember::EnumeratorMoveNext,
        WellKnownMember::EnumeratorCurrent,
        WellKnownMember::EnumeratorReset,
        WellKnownMember::GenericEnumerator,
        WellKnownMember::GenericEnumeratorCurrent,
        WellKnownMember::Enumerable,
        WellKnownMember::EnumerableGetEnumerator,
        WellKnownMember::GenericEnumerable,
        WellKnownMember::GenericEnumerableGetEnumerator,
        WellKnownMember::NotSupportedExceptionCtor,
        WellKnownMember::CurrentManagedThreadId,
        WellKnownMember::ThreadCurrentThread,
        WellKnownMember::ThreadManagedThreadId,
    ];

    /// Human-readable logical name, used in logs.
    pub fn logical_name(self) -> &'static str {
        match self {
            WellKnownMember::Int32 => "integer type",
            WellKnownMember::Boolean => "boolean type",
            WellKnownMember::Object => "object type",
            WellKnownMember::Disposable => "disposable contract",
            WellKnownMember::DisposableDispose => "disposable contract dispose method",
            WellKnownMember::Enumerator => "non-generic enumerator contract",
            WellKnownMember::EnumeratorMoveNext => "enumerator advance method",
            WellKnownMember::EnumeratorCurrent => "non-generic enumerator current accessor",
            WellKnownMember::EnumeratorReset => "enumerator reset method",
            WellKnownMember::GenericEnumerator => "generic enumerator contract",
            WellKnownMember::GenericEnumeratorCurrent => "generic enumerator current accessor",
            WellKnownMember::Enumerable => "non-generic enumerable contract",
            WellKnownMember::EnumerableGetEnumerator => "non-generic enumerator vending method",
            WellKnownMember::GenericEnumerable => "generic enumerable contract",
            WellKnownMember::GenericEnumerableGetEnumerator => "generic enumerator vending method",
            WellKnownMember::NotSupportedExceptionCtor => "not-supported exception constructor",
            WellKnownMember::CurrentManagedThreadId => "current-thread-identity accessor",
            WellKnownMember::ThreadCurrentThread => "current thread accessor",
            WellKnownMember::ThreadManagedThreadId => "thread identity accessor",
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            WellKnownMember::Int32 => "rt.Int32",
            WellKnownMember::Boolean => "rt.Boolean",
            WellKnownMember::Object => "rt.Object",
            WellKnownMember::Disposable => "rt.Disposable",
            WellKnownMember::DisposableDispose => "rt.Disposable.dispose",
            WellKnownMember::Enumerator => "rt.iter.Enumerator",
            WellKnownMember::EnumeratorMoveNext => "rt.iter.Enumerator.move_next",
            WellKnownMember::EnumeratorCurrent => "rt.iter.Enumerator.current",
            WellKnownMember::EnumeratorReset => "rt.iter.Enumerator.reset",
            WellKnownMember::GenericEnumerator => "rt.iter.Enumerator`1",
            WellKnownMember::GenericEnumeratorCurrent => "rt.iter.Enumerator`1.current",
            WellKnownMember::Enumerable => "rt.iter.Enumerable",
            WellKnownMember::EnumerableGetEnumerator => "rt.iter.Enumerable.get_enumerator",
            WellKnownMember::GenericEnumerable => "rt.iter.Enumerable`1",
            WellKnownMember::GenericEnumerableGetEnumerator => {
                "rt.iter.Enumerable`1.get_enumerator"
            }
            WellKnownMember::NotSupportedExceptionCtor => "rt.NotSupportedException..ctor",
            WellKnownMember::CurrentManagedThreadId => "rt.Environment.current_managed_thread_id",
            WellKnownMember::ThreadCurrentThread => "rt.threading.Thread.current_thread",
            WellKnownMember::ThreadManagedThreadId => "rt.threading.Thread.managed_thread_id",
        }
    }
}

impl std::fmt::Display for WellKnownMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// A resolved platform member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub member: WellKnownMember,
    pub path: String,
}

impl std::fmt::Display for MemberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Well-known-symbol lookup provided by the binder.
pub trait WellKnownMembers {
    /// Resolve a member, or `None` when the platform does not provide it.
    fn lookup(&self, member: WellKnownMember) -> Option<MemberRef>;
}

/// A table-backed platform description.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformTable {
    members: BTreeMap<WellKnownMember, String>,
}

impl PlatformTable {
    /// A platform that provides every member.
    pub fn standard() -> Self {
        let members = WellKnownMember::ALL
            .iter()
            .map(|m| (*m, m.default_path().to_owned()))
            .collect();
        Self { members }
    }

    /// A platform with no members at all.
    pub fn empty() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Remove a member, simulating an incomplete platform library.
    pub fn without(mut self, member: WellKnownMember) -> Self {
        self.members.remove(&member);
        self
    }

    pub fn insert(&mut self, member: WellKnownMember, path: impl Into<String>) {
        self.members.insert(member, path.into());
    }

    pub fn contains(&self, member: WellKnownMember) -> bool {
        self.members.contains_key(&member)
    }
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl WellKnownMembers for PlatformTable {
    fn lookup(&self, member: WellKnownMember) -> Option<MemberRef> {
        self.members.get(&member).map(|path| MemberRef {
            member,
            path: path.clone(),
        })
    }
}

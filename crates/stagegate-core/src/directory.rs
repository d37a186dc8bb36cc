//! Member and department display names.
//!
//! Resolution never fails: an unknown reference is shown as the raw
//! reference itself.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::model::{DepartmentRef, MemberRef};
use crate::record::keyed::Keyed;
use crate::store::{DocPath, DocumentStore, StoreError};

/// Collection holding member records under the store root.
pub const MEMBERS: &str = "members";
/// Collection holding department records under the store root.
pub const DEPARTMENTS: &str = "departments";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    code: Option<String>,
    name: String,
    #[serde(default)]
    departments: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DepartmentRecord {
    #[serde(default)]
    code: Option<String>,
    name: String,
}

/// A resolved member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub departments: Vec<DepartmentRef>,
}

/// Lookup table for display names.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    members: HashMap<String, Member>,
    departments: HashMap<String, String>,
}

impl Directory {
    /// Build from the stored `members` and `departments` collections.
    ///
    /// Each record is reachable by its key and by its own `id`/`code`
    /// fields. Records that do not parse are skipped.
    #[must_use]
    pub fn from_records(members: Option<&Value>, departments: Option<&Value>) -> Self {
        let mut directory = Self::default();

        for (key, record) in parse_collection::<MemberRecord>(members, MEMBERS) {
            let member = Member {
                name: record.name,
                departments: record
                    .departments
                    .into_iter()
                    .map(DepartmentRef::new)
                    .collect(),
            };
            for alias in [record.id, record.code].into_iter().flatten() {
                directory.members.insert(alias, member.clone());
            }
            directory.members.insert(key, member);
        }

        for (key, record) in parse_collection::<DepartmentRecord>(departments, DEPARTMENTS) {
            if let Some(code) = record.code {
                directory.departments.insert(code, record.name.clone());
            }
            directory.departments.insert(key, record.name);
        }

        directory
    }

    /// Read both collections under `root`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if either collection cannot be read.
    pub fn load<S: DocumentStore + ?Sized>(store: &S, root: &DocPath) -> Result<Self, StoreError> {
        let members = store.read(&root.child(MEMBERS)?)?;
        let departments = store.read(&root.child(DEPARTMENTS)?)?;
        Ok(Self::from_records(members.as_ref(), departments.as_ref()))
    }

    /// Like [`Directory::load`], but an unreadable directory only costs
    /// display names.
    pub fn load_or_default<S: DocumentStore + ?Sized>(store: &S, root: &DocPath) -> Self {
        Self::load(store, root).unwrap_or_else(|err| {
            warn!(error = %err, "directory unavailable; showing raw references");
            Self::default()
        })
    }

    #[must_use]
    pub fn member(&self, member: &MemberRef) -> Option<&Member> {
        self.members.get(member.as_str())
    }

    /// Display name of a member, or the raw reference.
    #[must_use]
    pub fn member_name(&self, member: &MemberRef) -> String {
        self.member(member)
            .map_or_else(|| member.as_str().to_string(), |m| m.name.clone())
    }

    /// Display name of a department, or the raw reference.
    #[must_use]
    pub fn department_name(&self, department: &DepartmentRef) -> String {
        self.departments
            .get(department.as_str())
            .cloned()
            .unwrap_or_else(|| department.as_str().to_string())
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

fn parse_collection<T: for<'de> Deserialize<'de>>(
    value: Option<&Value>,
    collection: &str,
) -> Vec<(String, T)> {
    let Some(value) = value else {
        return Vec::new();
    };
    let entries = match Keyed::<Value>::deserialize(value) {
        Ok(keyed) => keyed.into_entries(),
        Err(err) => {
            warn!(collection, error = %err, "directory collection is not a collection");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|(key, raw)| match T::deserialize(&raw) {
            Ok(record) => Some((key, record)),
            Err(err) => {
                warn!(collection, key = %key, error = %err, "skipping unreadable directory record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn directory() -> Directory {
        Directory::from_records(
            Some(&json!({
                "-Nabc": {"id": "mem_01", "code": "NV01", "name": "Nguyễn Lan", "departments": ["DEPT_001"]},
                "mem_02": {"name": "Trần Huy"},
                "broken": {"phone": "0900"}
            })),
            Some(&json!({"DEPT_001": {"code": "DEPT_001", "name": "Phòng Xi Mạ"}})),
        )
    }

    #[test]
    fn members_resolve_by_key_id_and_code() {
        let dir = directory();
        assert_eq!(dir.member_name(&MemberRef::new("-Nabc")), "Nguyễn Lan");
        assert_eq!(dir.member_name(&MemberRef::new("mem_01")), "Nguyễn Lan");
        assert_eq!(dir.member_name(&MemberRef::new("NV01")), "Nguyễn Lan");
        assert_eq!(dir.member_name(&MemberRef::new("mem_02")), "Trần Huy");
        assert_eq!(
            dir.member(&MemberRef::new("mem_01")).unwrap().departments,
            vec![DepartmentRef::new("DEPT_001")]
        );
    }

    #[test]
    fn unknown_refs_fall_back_to_raw_value() {
        let dir = directory();
        assert_eq!(dir.member_name(&MemberRef::new("ghost")), "ghost");
        assert_eq!(dir.member_name(&MemberRef::new("broken")), "broken");
        assert_eq!(dir.department_name(&DepartmentRef::new("DEPT_009")), "DEPT_009");
        assert_eq!(dir.department_name(&DepartmentRef::new("DEPT_001")), "Phòng Xi Mạ");
    }

    #[test]
    fn load_reads_both_collections() {
        let store = MemoryStore::with_root(json!({"xoxo": {
            "members": [{"id": "mem_01", "name": "Lan"}],
            "departments": {"D1": {"name": "Đồ Da"}}
        }}));
        let root = DocPath::parse("xoxo").unwrap();
        let dir = Directory::load(&store, &root).unwrap();
        assert_eq!(dir.member_name(&MemberRef::new("mem_01")), "Lan");
        assert_eq!(dir.member_name(&MemberRef::new("0")), "Lan");
        assert_eq!(dir.department_name(&DepartmentRef::new("D1")), "Đồ Da");
    }

    #[test]
    fn offline_store_yields_empty_directory() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let dir = Directory::load_or_default(&store, &DocPath::parse("xoxo").unwrap());
        assert_eq!(dir.member_count(), 0);
    }
}

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::Value;

use crate::error::{Error, Result};

/// A resolved catalog document: the file it was loaded from plus the merged
/// TOML value after `extends` and `imports` have been applied.
#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn parse(label: &str, src: &str) -> Result<Self> {
        let value: Value = toml::from_str(src)?;
        Ok(Self {
            path: PathBuf::from(label),
            value,
        })
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }

        let mut cur = &self.value;
        for seg in path.split('.') {
            cur = cur.as_table()?.get(seg)?;
        }
        Some(cur)
    }

    pub fn table_path(&self, path: &str) -> Option<&toml::value::Table> {
        self.value_path(path)?.as_table()
    }

    pub fn has_table_path(&self, path: &str) -> bool {
        self.table_path(path).is_some()
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let parsed = v
            .clone()
            .try_into()
            .map_err(|e| Error::msg(format!("invalid catalog value at '{path}': {e}")))?;
        Ok(Some(parsed))
    }
}

// Tables merge key by key and scalars are overridden by the later value.
// Arrays accumulate, except that a table entry whose `name` matches an
// earlier entry is merged into it: a catalog can disable or amend an
// inherited `[[stores]]` entry by name.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(overlay_tbl)) => {
            for (k, v) in overlay_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(base_arr), Value::Array(overlay_arr)) => {
            for item in overlay_arr {
                let existing = entry_name(&item)
                    .and_then(|name| base_arr.iter_mut().find(|b| entry_name(b) == Some(name)));
                match existing {
                    Some(slot) => merge_values(slot, item),
                    None => base_arr.push(item),
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn entry_name(v: &Value) -> Option<&str> {
    v.as_table()?.get("name")?.as_str()
}

pub fn merge(base: &mut Value, overlay: Value) {
    merge_values(base, overlay);
}

fn relative_to(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        return p;
    }
    from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
}

fn import_list(path: &Path, table: &toml::value::Table) -> Result<Vec<String>> {
    let Some(raw) = table.get("imports") else {
        return Ok(Vec::new());
    };
    let Some(arr) = raw.as_array() else {
        return Err(Error::msg(format!(
            "'imports' in {} must be an array of paths",
            path.display()
        )));
    };
    arr.iter()
        .filter_map(|v| match v.as_str() {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(Ok(s.trim().to_string())),
            None => Some(Err(Error::msg(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            )))),
        })
        .collect()
}

fn inline_imports(file: &Path, value: &mut Value, stack: &mut HashSet<PathBuf>) -> Result<()> {
    let Value::Table(tbl) = value else {
        return Ok(());
    };

    let imports = import_list(file, tbl)?;
    tbl.remove("imports");
    if !imports.is_empty() {
        let mut acc = Value::Table(Default::default());
        for imp in imports {
            let loaded = load_value(&relative_to(file, &imp), stack)?;
            merge_values(&mut acc, loaded);
        }
        merge_values(&mut acc, Value::Table(std::mem::take(tbl)));
        if let Value::Table(merged) = acc {
            *tbl = merged;
        }
    }

    for (_, v) in tbl.iter_mut() {
        inline_imports(file, v, stack)?;
    }
    Ok(())
}

fn load_value(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "catalog import cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read catalog {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(parent) = value.get("extends").and_then(Value::as_str) {
        out = load_value(&relative_to(path, parent), stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }

    inline_imports(path, &mut value, stack)?;
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::new();
    let value = load_value(path, &mut stack)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

//! Market hash name resolution
//!
//! Maps catalog entry ids to the exact marketplace-facing strings.
//! Cases and keys come from lookup tables; items synthesize their
//! name from the composite `itemId|wear|statTrak|variant` key.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Parsed composite item key: `itemId|wear|statTrak01|variant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub item_id: String,
    pub wear: String,
    pub stattrak: bool,
    pub variant: String,
}

impl ItemKey {
    /// Parse a composite key. Exactly four pipe-separated parts are
    /// required; anything else is malformed.
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('|').collect();
        if parts.len() != 4 {
            return None;
        }
        let item_id = parts[0].trim();
        if item_id.is_empty() {
            return None;
        }
        let st = parts[2].trim().to_lowercase();
        Some(Self {
            item_id: item_id.to_string(),
            wear: parts[1].trim().to_string(),
            stattrak: matches!(st.as_str(), "1" | "true" | "yes" | "y"),
            variant: parts[3].trim().to_string(),
        })
    }

    /// Whether the variant carries meaning ("None"/"NA"/"N/A" do not).
    pub fn has_real_variant(&self) -> bool {
        !is_trivial(&self.variant)
    }
}

/// Placeholder values that mean "no wear" / "no variant".
pub fn is_trivial(s: &str) -> bool {
    s.is_empty() || matches!(s.to_lowercase().as_str(), "none" | "na" | "n/a")
}

/// Synthesize a marketplace name from display name, wear and flags.
/// `variant_prefix` is prepended verbatim when present (e.g.
/// "Souvenir ").
pub fn build_market_hash(
    display_name: &str,
    wear: &str,
    stattrak: bool,
    variant_prefix: Option<&str>,
) -> String {
    let mut name = String::new();
    if let Some(prefix) = variant_prefix {
        name.push_str(prefix);
    }
    if stattrak {
        name.push_str("StatTrak\u{2122} ");
    }
    name.push_str(display_name);
    if !is_trivial(wear) {
        name.push_str(" (");
        name.push_str(wear);
        name.push(')');
    }
    name
}

/// Manual per-entry market hash name substitutions. A malformed file
/// degrades to empty overrides rather than failing the run.
#[derive(Debug, Default)]
pub struct Overrides {
    pub cases: HashMap<String, String>,
    pub keys: HashMap<String, String>,
    pub items: HashMap<String, String>,
}

impl Overrides {
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        let doc: Value = match serde_json::from_str(&content) {
            Ok(d) => d,
            Err(e) => {
                log::warn!(
                    "Overrides file {} is malformed ({}); continuing without overrides",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };
        Self {
            cases: string_map(&doc, "cases"),
            keys: string_map(&doc, "keys"),
            items: string_map(&doc, "items"),
        }
    }

    pub fn get(&self, bucket: crate::catalog::Bucket, id: &str) -> Option<&str> {
        let map = match bucket {
            crate::catalog::Bucket::Cases => &self.cases,
            crate::catalog::Bucket::Keys => &self.keys,
            crate::catalog::Bucket::Items => &self.items,
        };
        map.get(id).map(String::as_str)
    }
}

fn string_map(doc: &Value, key: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(Value::Object(map)) = doc.get(key) {
        for (k, v) in map {
            if let Value::String(s) = v {
                out.insert(k.clone(), s.clone());
            }
        }
    }
    out
}

/// Lookup tables built from the case-odds export directory:
/// `caseId -> case name` and `itemId -> display name`.
#[derive(Debug, Default)]
pub struct CaseIndex {
    case_names: HashMap<String, String>,
    display_names: HashMap<String, String>,
}

impl CaseIndex {
    /// Scan the case-odds directory. Prefers `index.json` when
    /// present, otherwise walks every case JSON file. Supports both
    /// the older `{tiers}` and newer `{case: {tiers, goldPool}}`
    /// layouts.
    pub fn load(dir: &Path) -> Self {
        let mut index = Self::default();

        let files = case_files(dir);
        if files.is_empty() {
            log::warn!("No case JSON files found in {}", dir.display());
            return index;
        }

        for file in &files {
            let Ok(content) = std::fs::read_to_string(file) else {
                continue;
            };
            let Ok(doc) = serde_json::from_str::<Value>(&content) else {
                log::warn!("Skipping malformed case file {}", file.display());
                continue;
            };
            index.add_case_file(&doc);
        }

        // index.json may also carry case names directly.
        if let Some(idx) = read_index_json(dir) {
            for entry in idx {
                if let (Some(id), Some(name)) = (entry.0, entry.1) {
                    index.case_names.entry(id).or_insert(name);
                }
            }
        }

        log::info!(
            "Case index loaded: {} cases, {} item display names",
            index.case_names.len(),
            index.display_names.len()
        );
        index
    }

    fn add_case_file(&mut self, doc: &Value) {
        let case_obj = doc.get("case").filter(|c| c.is_object());

        if let Some(case) = case_obj {
            if let (Some(id), Some(name)) = (
                case.get("id").and_then(Value::as_str),
                case.get("name").and_then(Value::as_str),
            ) {
                self.case_names
                    .entry(id.to_string())
                    .or_insert_with(|| name.to_string());
            }
        }

        let tiers = doc
            .get("tiers")
            .filter(|t| t.is_object())
            .or_else(|| case_obj.and_then(|c| c.get("tiers")).filter(|t| t.is_object()));
        if let Some(Value::Object(tiers)) = tiers {
            for items in tiers.values() {
                self.add_items(items);
            }
        }

        let gold_pool = doc
            .get("goldPool")
            .filter(|g| g.is_object())
            .or_else(|| case_obj.and_then(|c| c.get("goldPool")).filter(|g| g.is_object()));
        if let Some(pool) = gold_pool {
            if let Some(items) = pool.get("items") {
                self.add_items(items);
            }
        }
    }

    fn add_items(&mut self, items: &Value) {
        let Value::Array(items) = items else {
            return;
        };
        for item in items {
            if let (Some(id), Some(display)) = (
                item.get("itemId").and_then(Value::as_str),
                item.get("displayName").and_then(Value::as_str),
            ) {
                self.display_names
                    .entry(id.to_string())
                    .or_insert_with(|| display.to_string());
            }
        }
    }

    pub fn case_name(&self, case_id: &str) -> Option<&str> {
        self.case_names.get(case_id).map(String::as_str)
    }

    pub fn display_name(&self, item_id: &str) -> Option<&str> {
        self.display_names.get(item_id).map(String::as_str)
    }

    #[cfg(test)]
    pub fn from_tables(
        case_names: HashMap<String, String>,
        display_names: HashMap<String, String>,
    ) -> Self {
        Self {
            case_names,
            display_names,
        }
    }
}

/// Case JSON file list: from index.json when valid, else a directory
/// scan (index.json itself excluded).
fn case_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();

    if let Some(entries) = read_index_json(dir) {
        for (_, _, filename) in entries {
            if let Some(fname) = filename {
                let path = dir.join(&fname);
                if path.is_file() {
                    files.push(path);
                }
            }
        }
    }
    if !files.is_empty() {
        return files;
    }

    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_lowercase();
        if lower.ends_with(".json") && lower != "index.json" && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    files
}

type IndexEntry = (Option<String>, Option<String>, Option<String>);

fn read_index_json(dir: &Path) -> Option<Vec<IndexEntry>> {
    let content = std::fs::read_to_string(dir.join("index.json")).ok()?;
    let doc: Value = serde_json::from_str(&content).ok()?;
    let cases = doc.get("cases")?.as_array()?;
    Some(
        cases
            .iter()
            .map(|c| {
                (
                    c.get("id").and_then(Value::as_str).map(str::to_string),
                    c.get("name").and_then(Value::as_str).map(str::to_string),
                    c.get("filename")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                )
            })
            .collect(),
    )
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;

//! Order-insensitive structural diff with empty-equivalence.
//!
//! Two projections compare equal when nothing but "emptiness spelled
//! differently" separates them: `null`, `""`, `[]`, and `{}` all stand for
//! the same absent value, and list order never matters.

use std::collections::BTreeSet;

use serde_json::Value;

static NULL: Value = Value::Null;

/// One differing node.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    /// Path to the node, e.g. `resources[2].format`.
    pub path: String,
    /// Value on the left side, if present there.
    pub left: Option<Value>,
    /// Value on the right side, if present there.
    pub right: Option<Value>,
}

/// Categorized differences between two JSON trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    /// Same path, same type, different value.
    pub values_changed: Vec<DiffEntry>,
    /// Present on the right side only.
    pub added: Vec<DiffEntry>,
    /// Present on the left side only.
    pub removed: Vec<DiffEntry>,
    /// Same path, different runtime type, at least one side non-empty.
    pub type_changed: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of differing nodes across all categories.
    pub fn len(&self) -> usize {
        self.values_changed.len() + self.added.len() + self.removed.len() + self.type_changed.len()
    }
}

/// Coarse JSON type name, used for type-change classification and for the
/// materializer's type enforcement.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// True for the empty-equivalent forms: `null`, `""`, `[]`, `{}`.
pub fn is_empty_equivalent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Relaxed deep equality: empty-equivalent values match each other, object
/// keys missing on one side count as null, and lists compare as multisets.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if is_empty_equivalent(left) && is_empty_equivalent(right) {
        return true;
    }
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => l
            .keys()
            .chain(r.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .all(|key| {
                let lv = l.get(key.as_str()).unwrap_or(&NULL);
                let rv = r.get(key.as_str()).unwrap_or(&NULL);
                values_equal(lv, rv)
            }),
        (Value::Array(l), Value::Array(r)) => multiset_equal(l, r),
        _ => left == right,
    }
}

fn multiset_equal(left: &[Value], right: &[Value]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut unmatched: Vec<&Value> = right.iter().collect();
    for item in left {
        match unmatched.iter().position(|&candidate| values_equal(item, candidate)) {
            Some(pos) => {
                unmatched.swap_remove(pos);
            }
            None => return false,
        }
    }
    true
}

/// Diff two JSON trees, categorizing every differing node.
pub fn diff(left: &Value, right: &Value) -> DiffReport {
    let mut report = DiffReport::default();
    diff_node("", left, right, &mut report);
    report
}

fn diff_node(path: &str, left: &Value, right: &Value, report: &mut DiffReport) {
    if values_equal(left, right) {
        return;
    }
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
            for key in keys {
                let child_path = join_key(path, key);
                match (l.get(key.as_str()), r.get(key.as_str())) {
                    (Some(lv), Some(rv)) => diff_node(&child_path, lv, rv, report),
                    (Some(lv), None) => {
                        if !is_empty_equivalent(lv) {
                            report.removed.push(DiffEntry {
                                path: child_path,
                                left: Some(lv.clone()),
                                right: None,
                            });
                        }
                    }
                    (None, Some(rv)) => {
                        if !is_empty_equivalent(rv) {
                            report.added.push(DiffEntry {
                                path: child_path,
                                left: None,
                                right: Some(rv.clone()),
                            });
                        }
                    }
                    (None, None) => {}
                }
            }
        }
        (Value::Array(l), Value::Array(r)) => diff_lists(path, l, r, report),
        _ => {
            let entry = DiffEntry {
                path: path.to_string(),
                left: Some(left.clone()),
                right: Some(right.clone()),
            };
            if json_type(left) == json_type(right) {
                report.values_changed.push(entry);
            } else {
                report.type_changed.push(entry);
            }
        }
    }
}

/// Order-insensitive list diff.
///
/// Identical elements cancel first; the remainder pairs up greedily by
/// best structural similarity and each pair diffs recursively; leftovers
/// become added/removed. The pairing is part of the diff's contract:
/// similarity is the fraction of matching immediate children, scalars of
/// the same type score 0.1, and zero-score candidates stay unpaired.
fn diff_lists(path: &str, left: &[Value], right: &[Value], report: &mut DiffReport) {
    let mut left_rest: Vec<(usize, &Value)> = left.iter().enumerate().collect();
    let mut right_rest: Vec<(usize, &Value)> = right.iter().enumerate().collect();

    left_rest.retain(|&(_, lv)| {
        match right_rest.iter().position(|&(_, rv)| values_equal(lv, rv)) {
            Some(pos) => {
                right_rest.remove(pos);
                false
            }
            None => true,
        }
    });

    while let Some((lidx, lv)) = left_rest.first().copied() {
        left_rest.remove(0);
        let best = right_rest
            .iter()
            .enumerate()
            .map(|(pos, &(_, rv))| (pos, similarity(lv, rv)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((pos, score)) if score > 0.0 => {
                let (_, rv) = right_rest.remove(pos);
                diff_node(&join_index(path, lidx), lv, rv, report);
            }
            _ => {
                if !is_empty_equivalent(lv) {
                    report.removed.push(DiffEntry {
                        path: join_index(path, lidx),
                        left: Some(lv.clone()),
                        right: None,
                    });
                }
            }
        }
    }

    for (ridx, rv) in right_rest {
        if !is_empty_equivalent(rv) {
            report.added.push(DiffEntry {
                path: join_index(path, ridx),
                left: None,
                right: Some(rv.clone()),
            });
        }
    }
}

/// Structural similarity in `[0, 1]` used for list pairing.
fn similarity(left: &Value, right: &Value) -> f64 {
    if values_equal(left, right) {
        return 1.0;
    }
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
            if keys.is_empty() {
                return 1.0;
            }
            let total = keys.len();
            let matching = keys
                .into_iter()
                .filter(|key| {
                    let lv = l.get(key.as_str()).unwrap_or(&NULL);
                    let rv = r.get(key.as_str()).unwrap_or(&NULL);
                    values_equal(lv, rv)
                })
                .count();
            matching as f64 / total as f64
        }
        (Value::Array(l), Value::Array(r)) => {
            let longest = l.len().max(r.len());
            if longest == 0 {
                return 1.0;
            }
            let mut unmatched: Vec<&Value> = r.iter().collect();
            let matched = l
                .iter()
                .filter(|&lv| {
                    match unmatched.iter().position(|&rv| values_equal(lv, rv)) {
                        Some(pos) => {
                            unmatched.swap_remove(pos);
                            true
                        }
                        None => false,
                    }
                })
                .count();
            matched as f64 / longest as f64
        }
        _ if json_type(left) == json_type(right) => 0.1,
        _ => 0.0,
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn join_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

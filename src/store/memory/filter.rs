//! Filter matching, projection and sorting over BSON documents.
//!
//! Covers the query-language subset the catalogue issues: implicit equality,
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex`, top-level `$and`/`$or`,
//! dotted field paths, inclusion/exclusion projections and multi-key sorts.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::RegexBuilder;

use crate::error::{BenchError, BenchResult};

/// Resolve a dotted field path such as `severity.level`
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }

    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

/// Position of a value's type in MongoDB's cross-type sort order
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Compare two values of the same type bracket; `None` when the types differ
pub fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

/// Total order used for sorting and grouping
pub fn sort_order(a: &Bson, b: &Bson) -> Ordering {
    compare_bson(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| bson_equal(x, y))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && bson_equal(va, vb))
        }
        _ => compare_bson(a, b) == Some(Ordering::Equal),
    }
}

/// Apply `test` to the value, or to each element when the value is an array
fn any_value(value: Option<&Bson>, test: &dyn Fn(&Bson) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items.iter().any(test) || test(&Bson::Array(items.clone())),
        Some(v) => test(v),
        None => test(&Bson::Null),
    }
}

/// Check whether `doc` satisfies `filter`
pub fn matches(doc: &Document, filter: &Document) -> BenchResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => all_clauses(condition)?
                .iter()
                .map(|clause| matches(doc, clause))
                .collect::<BenchResult<Vec<bool>>>()?
                .into_iter()
                .all(|m| m),
            "$or" => all_clauses(condition)?
                .iter()
                .map(|clause| matches(doc, clause))
                .collect::<BenchResult<Vec<bool>>>()?
                .into_iter()
                .any(|m| m),
            op if op.starts_with('$') => {
                return Err(BenchError::InvalidQuery(format!(
                    "unknown top level operator: {}",
                    op
                )))
            }
            path => match_condition(get_path(doc, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn all_clauses(condition: &Bson) -> BenchResult<Vec<&Document>> {
    let Bson::Array(items) = condition else {
        return Err(BenchError::InvalidQuery(
            "$and/$or requires an array".to_string(),
        ));
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            other => Err(BenchError::InvalidQuery(format!(
                "$and/$or entries must be documents, got {}",
                other
            ))),
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> bool {
    matches!(condition, Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')))
}

fn match_condition(value: Option<&Bson>, condition: &Bson) -> BenchResult<bool> {
    if let Bson::RegularExpression(regex) = condition {
        return match_regex(value, &regex.pattern, &regex.options);
    }

    let operators = match condition {
        Bson::Document(operators) if is_operator_document(condition) => operators,
        _ => return Ok(any_value(value, &|v| bson_equal(v, condition))),
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => any_value(value, &|v| bson_equal(v, operand)),
            "$ne" => !any_value(value, &|v| bson_equal(v, operand)),
            "$gt" => any_value(value, &|v| compare_bson(v, operand) == Some(Ordering::Greater)),
            "$gte" => any_value(value, &|v| {
                matches!(compare_bson(v, operand), Some(Ordering::Greater | Ordering::Equal))
            }),
            "$lt" => any_value(value, &|v| compare_bson(v, operand) == Some(Ordering::Less)),
            "$lte" => any_value(value, &|v| {
                matches!(compare_bson(v, operand), Some(Ordering::Less | Ordering::Equal))
            }),
            "$in" => {
                let candidates = operand_array(op, operand)?;
                any_value(value, &|v| candidates.iter().any(|c| bson_equal(v, c)))
            }
            "$nin" => {
                let candidates = operand_array(op, operand)?;
                !any_value(value, &|v| candidates.iter().any(|c| bson_equal(v, c)))
            }
            "$exists" => {
                let wanted = !matches!(operand, Bson::Boolean(false) | Bson::Int32(0));
                value.is_some() == wanted
            }
            "$regex" => {
                let options = operators.get_str("$options").unwrap_or_default();
                match operand {
                    Bson::String(pattern) => match_regex(value, pattern, options)?,
                    Bson::RegularExpression(regex) => {
                        match_regex(value, &regex.pattern, &regex.options)?
                    }
                    other => {
                        return Err(BenchError::InvalidQuery(format!(
                            "$regex has to be a string, got {}",
                            other
                        )))
                    }
                }
            }
            // consumed together with $regex
            "$options" => true,
            other => {
                return Err(BenchError::InvalidQuery(format!(
                    "unknown operator: {}",
                    other
                )))
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn operand_array<'a>(op: &str, operand: &'a Bson) -> BenchResult<&'a Vec<Bson>> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(BenchError::InvalidQuery(format!("{} needs an array", op))),
    }
}

fn match_regex(value: Option<&Bson>, pattern: &str, options: &str) -> BenchResult<bool> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| BenchError::InvalidQuery(format!("invalid regex '{}': {}", pattern, e)))?;

    Ok(any_value(value, &|v| match v {
        Bson::String(s) => regex.is_match(s),
        _ => false,
    }))
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).map(|n| n != 0.0).unwrap_or(true),
    }
}

fn insert_path(target: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            if let Bson::Document(child) = child {
                insert_path(child, rest, value);
            }
        }
        None => {
            target.insert(path, value);
        }
    }
}

fn remove_path(target: &mut Document, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = target.get_mut(head) {
                remove_path(child, rest);
            }
        }
        None => {
            target.remove(path);
        }
    }
}

/// Apply an inclusion or exclusion projection
pub fn project(doc: &Document, projection: &Document) -> BenchResult<Document> {
    let inclusive = projection
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .map(|(_, v)| is_truthy(v))
        .collect::<Vec<_>>();

    if inclusive.iter().any(|&i| i) && inclusive.iter().any(|&i| !i) {
        return Err(BenchError::InvalidQuery(
            "cannot mix inclusion and exclusion in a projection".to_string(),
        ));
    }

    let keep_id = projection.get("_id").map(is_truthy).unwrap_or(true);

    if inclusive.iter().any(|&i| i) {
        let mut out = Document::new();
        if keep_id {
            if let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
        }
        for (path, flag) in projection {
            if path == "_id" || !is_truthy(flag) {
                continue;
            }
            if let Some(value) = get_path(doc, path) {
                insert_path(&mut out, path, value.clone());
            }
        }
        Ok(out)
    } else {
        let mut out = doc.clone();
        for (path, _) in projection {
            if path != "_id" {
                remove_path(&mut out, path);
            }
        }
        if !keep_id {
            out.remove("_id");
        }
        Ok(out)
    }
}

/// Stable multi-key sort following a `{field: 1 | -1}` specification
pub fn sort_documents(docs: &mut [Document], sort: &Document) -> BenchResult<()> {
    let keys = sort
        .iter()
        .map(|(path, direction)| match as_f64(direction) {
            Some(d) if d == 1.0 => Ok((path.clone(), false)),
            Some(d) if d == -1.0 => Ok((path.clone(), true)),
            _ => Err(BenchError::InvalidQuery(format!(
                "sort direction for '{}' must be 1 or -1",
                path
            ))),
        })
        .collect::<BenchResult<Vec<_>>>()?;

    docs.sort_by(|a, b| {
        for (path, descending) in &keys {
            let left = get_path(a, path).unwrap_or(&Bson::Null);
            let right = get_path(b, path).unwrap_or(&Bson::Null);
            let ordering = sort_order(left, right);
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn event() -> Document {
        doc! {
            "_id": 1,
            "eventType": "Database Exception",
            "severity": { "level": 3, "label": "High" },
            "sourceSystem": "Main Database",
            "tags": ["Database", "Automated"],
        }
    }

    #[test]
    fn test_get_path() {
        let doc = event();
        assert_eq!(get_path(&doc, "severity.level"), Some(&Bson::Int32(3)));
        assert_eq!(get_path(&doc, "severity.missing"), None);
        assert_eq!(get_path(&doc, "eventType.nested"), None);
    }

    #[test]
    fn test_comparison_operators() {
        let doc = event();
        assert!(matches(&doc, &doc! { "severity.level": { "$gte": 3 } }).unwrap());
        assert!(matches(&doc, &doc! { "severity.level": { "$gt": 2.5 } }).unwrap());
        assert!(!matches(&doc, &doc! { "severity.level": { "$lt": 3_i64 } }).unwrap());
        assert!(matches(&doc, &doc! { "severity.level": { "$gte": 1, "$lte": 4 } }).unwrap());
        // strings never compare against numbers
        assert!(!matches(&doc, &doc! { "eventType": { "$gt": 1 } }).unwrap());
    }

    #[test]
    fn test_equality_in_and_arrays() {
        let doc = event();
        assert!(matches(&doc, &doc! { "sourceSystem": "Main Database" }).unwrap());
        assert!(matches(&doc, &doc! { "tags": "Automated" }).unwrap());
        assert!(matches(
            &doc,
            &doc! { "sourceSystem": { "$in": ["Database", "Main Database"] } }
        )
        .unwrap());
        assert!(!matches(&doc, &doc! { "sourceSystem": { "$nin": ["Main Database"] } }).unwrap());
        assert!(matches(&doc, &doc! { "assignedTo": { "$exists": false } }).unwrap());
        assert!(matches(&doc, &doc! { "_id": { "$eq": 1_i64 } }).unwrap());
    }

    #[test]
    fn test_regex_with_options() {
        let doc = event();
        assert!(matches(
            &doc,
            &doc! { "eventType": { "$regex": ".*database.*", "$options": "i" } }
        )
        .unwrap());
        assert!(!matches(&doc, &doc! { "eventType": { "$regex": ".*database.*" } }).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let doc = event();
        let filter = doc! { "$or": [ { "severity.level": 0 }, { "eventType": "Database Exception" } ] };
        assert!(matches(&doc, &filter).unwrap());
        let filter = doc! { "$and": [ { "severity.level": 3 }, { "eventType": "API Error" } ] };
        assert!(!matches(&doc, &filter).unwrap());
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let result = matches(&event(), &doc! { "severity.level": { "$near": 3 } });
        assert!(matches!(result, Err(BenchError::InvalidQuery(_))));
    }

    #[test]
    fn test_inclusion_projection_drops_id() {
        let projected = project(
            &event(),
            &doc! { "eventType": 1, "severity.level": 1, "_id": 0 },
        )
        .unwrap();
        assert_eq!(
            projected,
            doc! { "eventType": "Database Exception", "severity": { "level": 3 } }
        );
    }

    #[test]
    fn test_exclusion_projection() {
        let projected = project(&event(), &doc! { "tags": 0, "severity": 0 }).unwrap();
        assert_eq!(
            projected,
            doc! { "_id": 1, "eventType": "Database Exception", "sourceSystem": "Main Database" }
        );
    }

    #[test]
    fn test_sort_multiple_keys() {
        let mut docs = vec![
            doc! { "level": 1, "name": "b" },
            doc! { "level": 3, "name": "a" },
            doc! { "level": 1, "name": "a" },
            doc! { "name": "z" },
        ];
        sort_documents(&mut docs, &doc! { "level": -1, "name": 1 }).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.get_str("name").unwrap()).collect();
        assert_eq!(names, vec!["a", "a", "b", "z"]);
        assert_eq!(docs[0].get_i32("level").unwrap(), 3);
    }
}

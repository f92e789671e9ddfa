//! Aggregation pipeline evaluation for the in-memory store.
//!
//! Supported stages: `$match`, `$group`, `$sort`, `$limit`, `$skip`, `$project`.
//! Group accumulators: `$sum $avg $min $max $first $last $push $addToSet`.

use bson::{Bson, Document};

use super::filter::{bson_equal, get_path, matches, project, sort_documents, sort_order};
use crate::error::{BenchError, BenchResult};

/// Evaluate an aggregation expression against a document
pub fn evaluate(doc: &Document, expr: &Bson) -> BenchResult<Bson> {
    match expr {
        Bson::String(s) if s == "$$ROOT" => Ok(Bson::Document(doc.clone())),
        Bson::String(s) if s.starts_with("$$") => Err(BenchError::InvalidQuery(format!(
            "unsupported variable: {}",
            s
        ))),
        Bson::String(s) if s.starts_with('$') => {
            Ok(get_path(doc, &s[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Document(inner) => match inner.iter().next() {
            Some((op, arg)) if inner.len() == 1 && op.starts_with('$') => {
                evaluate_operator(doc, op, arg)
            }
            _ => {
                let mut out = Document::new();
                for (key, value) in inner {
                    out.insert(key.clone(), evaluate(doc, value)?);
                }
                Ok(Bson::Document(out))
            }
        },
        other => Ok(other.clone()),
    }
}

fn evaluate_operator(doc: &Document, op: &str, arg: &Bson) -> BenchResult<Bson> {
    match op {
        "$toLong" => {
            let value = evaluate(doc, arg)?;
            to_long(&value)
        }
        "$literal" => Ok(arg.clone()),
        other => Err(BenchError::InvalidQuery(format!(
            "unsupported expression operator: {}",
            other
        ))),
    }
}

fn to_long(value: &Bson) -> BenchResult<Bson> {
    match value {
        Bson::Null | Bson::Undefined => Ok(Bson::Null),
        Bson::DateTime(dt) => Ok(Bson::Int64(dt.timestamp_millis())),
        Bson::Int32(i) => Ok(Bson::Int64(*i as i64)),
        Bson::Int64(i) => Ok(Bson::Int64(*i)),
        Bson::Double(d) => Ok(Bson::Int64(d.trunc() as i64)),
        Bson::Boolean(b) => Ok(Bson::Int64(*b as i64)),
        Bson::String(s) => s
            .parse::<i64>()
            .map(Bson::Int64)
            .map_err(|_| BenchError::InvalidQuery(format!("$toLong cannot convert '{}'", s))),
        other => Err(BenchError::InvalidQuery(format!(
            "$toLong cannot convert {}",
            other
        ))),
    }
}

fn numeric(value: &Bson) -> Option<Numeric> {
    match value {
        Bson::Int32(i) => Some(Numeric::Int(*i as i64)),
        Bson::Int64(i) => Some(Numeric::Int(*i)),
        Bson::Double(d) => Some(Numeric::Float(*d)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

/// Running state of one accumulator inside one group
#[derive(Debug, Clone)]
enum Accumulator {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Option<Bson>),
    Push(Vec<Bson>),
    AddToSet(Vec<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> BenchResult<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(None),
            "$push" => Accumulator::Push(Vec::new()),
            "$addToSet" => Accumulator::AddToSet(Vec::new()),
            other => {
                return Err(BenchError::InvalidQuery(format!(
                    "unknown group operator '{}'",
                    other
                )))
            }
        })
    }

    fn add(&mut self, value: Bson) {
        match self {
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => match numeric(&value) {
                Some(Numeric::Int(i)) => {
                    match int.checked_add(i) {
                        Some(total) => *int = total,
                        None => *is_float = true,
                    }
                    *float += i as f64;
                }
                Some(Numeric::Float(f)) => {
                    *float += f;
                    *is_float = true;
                }
                None => {}
            },
            Accumulator::Avg { total, count } => match numeric(&value) {
                Some(Numeric::Int(i)) => {
                    *total += i as f64;
                    *count += 1;
                }
                Some(Numeric::Float(f)) => {
                    *total += f;
                    *count += 1;
                }
                None => {}
            },
            Accumulator::Min(current) => {
                if !matches!(value, Bson::Null)
                    && current
                        .as_ref()
                        .map_or(true, |c| sort_order(&value, c).is_lt())
                {
                    *current = Some(value);
                }
            }
            Accumulator::Max(current) => {
                if !matches!(value, Bson::Null)
                    && current
                        .as_ref()
                        .map_or(true, |c| sort_order(&value, c).is_gt())
                {
                    *current = Some(value);
                }
            }
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Accumulator::Last(current) => *current = Some(value),
            Accumulator::Push(items) => items.push(value),
            Accumulator::AddToSet(items) => {
                if !items.iter().any(|existing| bson_equal(existing, &value)) {
                    items.push(value);
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Bson::Double(float)
                } else if let Ok(small) = i32::try_from(int) {
                    Bson::Int32(small)
                } else {
                    Bson::Int64(int)
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / count as f64)
                }
            }
            Accumulator::Min(v)
            | Accumulator::Max(v)
            | Accumulator::First(v)
            | Accumulator::Last(v) => v.unwrap_or(Bson::Null),
            Accumulator::Push(items) | Accumulator::AddToSet(items) => Bson::Array(items),
        }
    }
}

struct GroupSpec {
    id: Bson,
    fields: Vec<(String, String, Bson)>,
}

fn parse_group(spec: &Document) -> BenchResult<GroupSpec> {
    let id = spec
        .get("_id")
        .cloned()
        .ok_or_else(|| BenchError::InvalidQuery("a group specification must include an _id".to_string()))?;

    let mut fields = Vec::new();
    for (name, definition) in spec {
        if name == "_id" {
            continue;
        }
        let accumulator = match definition {
            Bson::Document(d) if d.len() == 1 => d,
            _ => {
                return Err(BenchError::InvalidQuery(format!(
                    "the field '{}' must be an accumulator object",
                    name
                )))
            }
        };
        let (op, expr) = accumulator
            .iter()
            .next()
            .map(|(op, expr)| (op.clone(), expr.clone()))
            .ok_or_else(|| BenchError::InvalidQuery(format!("empty accumulator for '{}'", name)))?;
        // validate the operator early
        Accumulator::new(&op)?;
        fields.push((name.clone(), op, expr));
    }

    Ok(GroupSpec { id, fields })
}

fn group(docs: Vec<Document>, spec: &Document) -> BenchResult<Vec<Document>> {
    let spec = parse_group(spec)?;
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();

    for doc in &docs {
        let key = evaluate(doc, &spec.id)?;
        let index = match groups.iter().position(|(k, _)| bson_equal(k, &key)) {
            Some(index) => index,
            None => {
                let accumulators = spec
                    .fields
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<BenchResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for ((_, _, expr), accumulator) in spec.fields.iter().zip(groups[index].1.iter_mut()) {
            accumulator.add(evaluate(doc, expr)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), accumulator) in spec.fields.iter().zip(accumulators) {
                out.insert(name.clone(), accumulator.finish());
            }
            out
        })
        .collect())
}

/// Encoded size of a document in bytes
pub fn document_size(doc: &Document) -> BenchResult<usize> {
    let mut buffer = Vec::new();
    doc.to_writer(&mut buffer)?;
    Ok(buffer.len())
}

fn check_sizes(docs: &[Document], max_document_size: usize) -> BenchResult<()> {
    for doc in docs {
        let size = document_size(doc)?;
        if size > max_document_size {
            return Err(BenchError::DocumentTooLarge {
                size,
                limit: max_document_size,
            });
        }
    }
    Ok(())
}

fn stage_count(stage: &Bson) -> BenchResult<usize> {
    match stage {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        Bson::Double(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        other => Err(BenchError::InvalidQuery(format!(
            "expected a non-negative integer, got {}",
            other
        ))),
    }
}

/// Run `pipeline` over `docs`, enforcing `max_document_size` on every group result
pub fn run_pipeline(
    mut docs: Vec<Document>,
    pipeline: &[Document],
    max_document_size: usize,
) -> BenchResult<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => {
                return Err(BenchError::InvalidQuery(
                    "a pipeline stage specification must contain exactly one field".to_string(),
                ))
            }
        };

        docs = match (name.as_str(), spec) {
            ("$match", Bson::Document(filter)) => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            ("$group", Bson::Document(spec)) => {
                let grouped = group(docs, spec)?;
                check_sizes(&grouped, max_document_size)?;
                grouped
            }
            ("$sort", Bson::Document(spec)) => {
                sort_documents(&mut docs, spec)?;
                docs
            }
            ("$project", Bson::Document(spec)) => docs
                .iter()
                .map(|doc| project(doc, spec))
                .collect::<BenchResult<Vec<_>>>()?,
            ("$limit", count) => {
                docs.truncate(stage_count(count)?);
                docs
            }
            ("$skip", count) => docs.into_iter().skip(stage_count(count)?).collect(),
            (other, _) => {
                return Err(BenchError::InvalidQuery(format!(
                    "unrecognized pipeline stage name: '{}'",
                    other
                )))
            }
        };
    }

    Ok(docs)
}

use std::cmp::Ordering;

use bson::{Bson, Document};

/// Backend-neutral predicate over stored documents. Field names may be dotted
/// paths into nested documents (`place.id`).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    All,
    Eq(String, Bson),
    Gte(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
    /// Case-insensitive substring match on any of the fields.
    Search {
        fields: Vec<String>,
        text: String,
    },
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Lte(field.to_string(), value.into())
    }

    pub fn is_in<V: Into<Bson>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn search(fields: &[&str], text: &str) -> Self {
        Filter::Search {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            text: text.to_string(),
        }
    }

    pub fn by_id(id: i64) -> Self {
        Filter::eq("id", id)
    }

    /// Conjunction; `All` is the identity and nested conjunctions are flattened.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, Filter::And(mut right)) => {
                right.insert(0, this);
                Filter::And(right)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        match self {
            Filter::All => {}
            Filter::Eq(field, value) => {
                document.insert(field.clone(), value.clone());
            }
            Filter::Gte(field, value) => {
                document.insert(field.clone(), operator("$gte", value.clone()));
            }
            Filter::Lte(field, value) => {
                document.insert(field.clone(), operator("$lte", value.clone()));
            }
            Filter::In(field, values) => {
                document.insert(field.clone(), operator("$in", Bson::Array(values.clone())));
            }
            Filter::Search { fields, text } => {
                let pattern = regex::escape(text);
                let clauses = fields
                    .iter()
                    .map(|field| {
                        let mut regex = Document::new();
                        regex.insert("$regex", pattern.clone());
                        regex.insert("$options", "i");
                        let mut clause = Document::new();
                        clause.insert(field.clone(), regex);
                        Bson::Document(clause)
                    })
                    .collect();
                document.insert("$or", Bson::Array(clauses));
            }
            Filter::And(filters) => {
                if !filters.is_empty() {
                    let clauses = filters
                        .iter()
                        .map(|filter| Bson::Document(filter.to_document()))
                        .collect();
                    document.insert("$and", Bson::Array(clauses));
                }
            }
        }
        document
    }

    /// Evaluates the filter against a document with MongoDB's semantics for
    /// the operators used here (missing fields equal `null`, range operators
    /// never match across types).
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => {
                let actual = lookup(document, field).unwrap_or(&Bson::Null);
                values_equal(actual, value)
            }
            Filter::Gte(field, value) => lookup(document, field)
                .and_then(|actual| compare(actual, value))
                .map_or(false, |ordering| ordering != Ordering::Less),
            Filter::Lte(field, value) => lookup(document, field)
                .and_then(|actual| compare(actual, value))
                .map_or(false, |ordering| ordering != Ordering::Greater),
            Filter::In(field, values) => {
                let actual = lookup(document, field).unwrap_or(&Bson::Null);
                values.iter().any(|value| values_equal(actual, value))
            }
            Filter::Search { fields, text } => {
                let needle = text.to_lowercase();
                fields.iter().any(|field| match lookup(document, field) {
                    Some(Bson::String(haystack)) => haystack.to_lowercase().contains(&needle),
                    _ => false,
                })
            }
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(document)),
        }
    }
}

fn operator(name: &str, value: Bson) -> Document {
    let mut document = Document::new();
    document.insert(name, value);
    document
}

pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Orders two BSON values of comparable types; `None` when the types differ.
pub fn compare(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (Bson::String(l), Bson::String(r)) => Some(l.cmp(r)),
        (Bson::Boolean(l), Bson::Boolean(r)) => Some(l.cmp(r)),
        (Bson::DateTime(l), Bson::DateTime(r)) => Some(l.cmp(r)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    match compare(left, right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => left == right,
    }
}

/// Sort comparison used by the in-memory backend: missing and `null` values
/// come first, mismatched types compare equal.
pub fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.filter(|value| !matches!(value, Bson::Null));
    let right = right.filter(|value| !matches!(value, Bson::Null));
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => compare(l, r).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> Document {
        doc! {
            "id": 7_i64,
            "name": "Roque de los Muchachos",
            "description": "Highest point of the island",
            "day": 2_i32,
            "place": { "kind": "poi", "id": 3_i64 },
            "start_date": "2024-03-15",
            "user": Bson::Null,
        }
    }

    #[test]
    fn test_eq_compares_numbers_across_types() {
        assert!(Filter::eq("day", 2_i64).matches(&sample()));
        assert!(Filter::eq("id", 7.0).matches(&sample()));
        assert!(!Filter::eq("day", 3_i64).matches(&sample()));
    }

    #[test]
    fn test_eq_null_matches_missing_and_null() {
        assert!(Filter::eq("user", Bson::Null).matches(&sample()));
        assert!(Filter::eq("owner", Bson::Null).matches(&sample()));
        assert!(!Filter::eq("name", Bson::Null).matches(&sample()));
    }

    #[test]
    fn test_dotted_paths() {
        let filter = Filter::eq("place.kind", "poi").and(Filter::eq("place.id", 3_i64));
        assert!(filter.matches(&sample()));
        assert!(!Filter::eq("place.id", 4_i64).matches(&sample()));
        assert!(!Filter::eq("name.first", "x").matches(&sample()));
    }

    #[test]
    fn test_range_operators() {
        assert!(Filter::gte("start_date", "2024-03-01").matches(&sample()));
        assert!(!Filter::gte("start_date", "2024-04-01").matches(&sample()));
        assert!(Filter::lte("day", 2_i64).matches(&sample()));
        // Mismatched types never match a range.
        assert!(!Filter::gte("start_date", 1_i64).matches(&sample()));
        assert!(!Filter::lte("missing", 1_i64).matches(&sample()));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        assert!(Filter::search(&["name", "description"], "ISLAND").matches(&sample()));
        assert!(Filter::search(&["name"], "muchachos").matches(&sample()));
        assert!(!Filter::search(&["name"], "beach").matches(&sample()));
    }

    #[test]
    fn test_in() {
        assert!(Filter::is_in("id", [1_i64, 7_i64]).matches(&sample()));
        assert!(!Filter::is_in("id", Vec::<i64>::new()).matches(&sample()));
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let filter = Filter::All
            .and(Filter::eq("a", 1_i64))
            .and(Filter::eq("b", 2_i64))
            .and(Filter::All);
        assert_eq!(
            filter,
            Filter::And(vec![Filter::eq("a", 1_i64), Filter::eq("b", 2_i64)])
        );
    }

    #[test]
    fn test_to_document() {
        let filter = Filter::eq("day", 1_i64)
            .and(Filter::search(&["name"], "a.b"))
            .and(Filter::is_in("id", [1_i64, 2_i64]));
        let document = filter.to_document();
        assert_eq!(
            document,
            doc! {
                "$and": [
                    { "day": 1_i64 },
                    { "$or": [ { "name": { "$regex": "a\\.b", "$options": "i" } } ] },
                    { "id": { "$in": [1_i64, 2_i64] } },
                ]
            }
        );
        assert!(Filter::All.to_document().is_empty());
    }

    #[test]
    fn test_sort_order_puts_missing_first() {
        let one = Bson::Int64(1);
        assert_eq!(sort_order(None, Some(&one)), Ordering::Less);
        assert_eq!(sort_order(Some(&Bson::Null), None), Ordering::Equal);
        assert_eq!(
            sort_order(Some(&Bson::Int32(2)), Some(&one)),
            Ordering::Greater
        );
    }
}

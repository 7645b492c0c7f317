use serde::Serialize;

/// One page of a list endpoint. `next` and `previous` are absolute URLs.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

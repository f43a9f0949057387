use serde_json::Value;

/// One step of a JSON path such as `content[0].sku` or `content.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Field(String),
    Index(usize),
    Len,
}

impl PathToken {
    /// Split a dotted path into tokens. Panics on malformed brackets.
    pub fn parse_all(path: &str) -> Vec<PathToken> {
        let mut tokens = Vec::new();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            if matches!(segment, "len()" | "size()") {
                tokens.push(PathToken::Len);
                continue;
            }
            let (field, mut indices) = match segment.split_once('[') {
                Some((field, rest)) => (field, Some(rest)),
                None => (segment, None),
            };
            if !field.is_empty() {
                tokens.push(PathToken::Field(field.to_string()));
            }
            while let Some(rest) = indices {
                let (index, tail) = rest
                    .split_once(']')
                    .unwrap_or_else(|| panic!("unclosed bracket in JSON path `{path}`"));
                let index = index
                    .parse()
                    .unwrap_or_else(|_| panic!("non-numeric index `{index}` in JSON path `{path}`"));
                tokens.push(PathToken::Index(index));
                indices = tail.strip_prefix('[');
            }
        }
        tokens
    }
}

/// Resolve `path` against `root`. Missing fields and indices yield `Null`.
pub fn resolve_path(root: &Value, path: &str) -> Value {
    let mut current = root.clone();
    for token in PathToken::parse_all(path) {
        current = match token {
            PathToken::Field(name) => current.get(&name).cloned().unwrap_or(Value::Null),
            PathToken::Index(idx) => current.get(idx).cloned().unwrap_or(Value::Null),
            PathToken::Len => {
                let len = match &current {
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    Value::String(s) => s.len(),
                    other => panic!("len() applied to non-collection in `{path}`: {other}"),
                };
                Value::from(len)
            }
        };
    }
    current
}

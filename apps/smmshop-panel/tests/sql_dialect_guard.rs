use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
        } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

fn line_number(content: &str, byte_idx: usize) -> usize {
    content[..byte_idx].bytes().filter(|b| *b == b'\n').count() + 1
}

fn parse_sql_literal_from_call(content: &str, call_idx: usize) -> Option<(usize, String)> {
    let open_paren_rel = content[call_idx..].find('(')?;
    let mut i = call_idx + open_paren_rel + 1;
    let bytes = content.as_bytes();

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    // Raw string: r"..." or r#"..."# etc.
    if bytes[i] == b'r' {
        let mut j = i + 1;
        let mut hashes = 0usize;
        while j < bytes.len() && bytes[j] == b'#' {
            hashes += 1;
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'"' {
            return None;
        }
        let start = j + 1;
        let mut end_marker = String::from("\"");
        end_marker.push_str(&"#".repeat(hashes));
        let end_rel = content[start..].find(&end_marker)?;
        let end = start + end_rel;
        return Some((i, content[start..end].to_string()));
    }

    // Standard string: "..."
    if bytes[i] == b'"' {
        let start = i + 1;
        let mut j = start;
        let mut escaped = false;
        while j < bytes.len() {
            let b = bytes[j];
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                return Some((i, content[start..j].to_string()));
            }
            j += 1;
        }
    }

    None
}

fn extract_sql_literals(content: &str) -> Vec<(usize, String)> {
    let mut result = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = content[pos..].find("sqlx::query") {
        let idx = pos + rel;
        if let Some(parsed) = parse_sql_literal_from_call(content, idx) {
            result.push(parsed);
        }
        pos = idx + "sqlx::query".len();
    }
    result
}

fn query_files() -> Vec<PathBuf> {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rs_files(&manifest.join("src"), &mut files);
    collect_rs_files(&manifest.join("../../libs/smmshop-db/src"), &mut files);
    files
}

/// `$1`, `$2`, ... are Postgres placeholders; SQLite binds with `?` / `?N`.
fn has_dollar_placeholder(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'$' && w[1].is_ascii_digit())
}

fn postgres_only(sql: &str) -> Option<&'static str> {
    let lower = sql.to_lowercase();
    if has_dollar_placeholder(sql) {
        Some("$N placeholder")
    } else if lower.contains("now()") {
        Some("NOW()")
    } else if lower.contains("ilike") {
        Some("ILIKE")
    } else if lower.contains("for update") {
        Some("FOR UPDATE")
    } else if sql.contains("::") {
        Some(":: cast")
    } else if lower.contains("serial") {
        Some("SERIAL")
    } else {
        None
    }
}

#[test]
fn sqlx_queries_must_not_use_postgres_placeholders() {
    let mut violations = Vec::new();
    for file in query_files() {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (byte_idx, sql) in extract_sql_literals(&content) {
            if has_dollar_placeholder(&sql) {
                let line = line_number(&content, byte_idx);
                violations.push(format!(
                    "{}:{} contains '$N' placeholder in sqlx query literal",
                    file.display(),
                    line
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found Postgres placeholders in SQL literals:\n{}",
        violations.join("\n")
    );
}

#[test]
fn sqlx_queries_must_not_use_postgres_specific_syntax() {
    let mut violations = Vec::new();
    for file in query_files() {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (byte_idx, sql) in extract_sql_literals(&content) {
            if let Some(what) = postgres_only(&sql) {
                let line = line_number(&content, byte_idx);
                violations.push(format!("{}:{} uses {}", file.display(), line, what));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found Postgres-only SQL in query literals:\n{}",
        violations.join("\n")
    );
}

#[test]
fn guard_flags_postgres_syntax() {
    assert_eq!(postgres_only("SELECT * FROM users WHERE id = $1"), Some("$N placeholder"));
    assert_eq!(postgres_only("UPDATE orders SET updated_at = NOW()"), Some("NOW()"));
    assert_eq!(postgres_only("SELECT id::text FROM orders"), Some(":: cast"));
    assert_eq!(postgres_only("SELECT * FROM users WHERE telegram_id = ?1"), None);
}

use rand::Rng;

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const REFERRAL_CODE_LEN: usize = 8;

pub fn generate_referral_code() -> String {
    let mut rng = rand::rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_ALPHABET[rng.random_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

pub fn is_referral_code(candidate: &str) -> bool {
    candidate.len() == REFERRAL_CODE_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// True when `err` is a UNIQUE constraint failure, optionally on `column`.
pub fn is_unique_violation(err: &sqlx::Error, column: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match column {
            Some(col) => db.message().contains(col),
            None => true,
        },
        _ => false,
    }
}

/// Same as [`is_unique_violation`] for errors already wrapped by anyhow.
pub fn anyhow_is_unique_violation(err: &anyhow::Error, column: Option<&str>) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<sqlx::Error>())
        .any(|e| is_unique_violation(e, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_match_alphabet() {
        for _ in 0..50 {
            let code = generate_referral_code();
            assert!(is_referral_code(&code), "bad code {code}");
        }
        assert!(!is_referral_code("abc12345"));
        assert!(!is_referral_code("SERVICE_1"));
    }
}

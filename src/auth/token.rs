use super::AuthError;

/// Pull the raw token out of an `Authorization` header value. The header must
/// be exactly `Bearer <token>`: two segments, one space.
pub fn extract_token(header_value: &str) -> Result<&str, AuthError> {
    let mut segments = header_value.split(' ');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_header() {
        assert_eq!(extract_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(matches!(
            extract_token("abc.def.ghi"),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert!(matches!(
            extract_token("Basic abc"),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn rejects_extra_segments() {
        assert!(matches!(
            extract_token("Bearer abc def"),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn rejects_double_space() {
        assert!(matches!(
            extract_token("Bearer  abc"),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(
            extract_token("Bearer "),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            extract_token("Bearer"),
            Err(AuthError::MalformedHeader)
        ));
    }
}

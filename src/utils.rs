use rand::RngCore;

/// Generate a random single-use access key, as 32 lowercase hex digits.
pub fn generate_random_key() -> String {
    let mut key = [0; 16];
    rand::thread_rng().fill_bytes(&mut key);
    to_hex(&key)
}

pub fn to_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(data.len() * 2);

    for byte in data {
        let _ = write!(hex, "{:02x}", byte);
    }

    hex
}

/// Split a `Name <address>` mailbox line into its name and address parts.
///
/// Either part may be missing; a bare address is recognised by the presence
/// of an `@`.
pub fn parse_mailbox(line: &str) -> (Option<String>, Option<String>) {
    let line = line.trim();

    if line.is_empty() {
        return (None, None);
    }

    if let (Some(start), Some(end)) = (line.find('<'), line.rfind('>')) {
        if start < end {
            let name = line[..start].trim();
            let addr = line[start + 1..end].trim();
            return (
                if name.is_empty() { None } else { Some(name.to_string()) },
                if addr.is_empty() { None } else { Some(addr.to_string()) },
            );
        }
    }

    if line.contains('@') && !line.contains(char::is_whitespace) {
        (None, Some(line.to_string()))
    } else {
        (Some(line.to_string()), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_mailbox() {
        assert_eq!(
            parse_mailbox("Jane Doe <jane@example.com>"),
            (Some("Jane Doe".to_string()), Some("jane@example.com".to_string())),
        );
    }

    #[test]
    fn parse_bare_address() {
        assert_eq!(
            parse_mailbox("jane@example.com"),
            (None, Some("jane@example.com".to_string())),
        );
    }

    #[test]
    fn parse_bare_name() {
        assert_eq!(
            parse_mailbox("Jane Doe"),
            (Some("Jane Doe".to_string()), None),
        );
    }

    #[test]
    fn random_keys_are_unique() {
        assert_ne!(generate_random_key(), generate_random_key());
        assert_eq!(generate_random_key().len(), 32);
    }
}

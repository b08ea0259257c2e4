use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

const LOWER_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const IDENTIFIER_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
// No quotes, backslashes or '@'/'%' so passwords survive any DDL literal or URL unescaped
const PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$^&*()-_=+[]{}<>?~";

pub const NAME_LENGTH: usize = 24;
pub const USER_LENGTH: usize = 24;
pub const PASSWORD_LENGTH: usize = 32;

/// Randomized credential triple for a new tenant database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub name: String,
    pub user: String,
    pub password: String,
}

/// Generate a fresh name/user/password triple from the OS random source.
///
/// Names and users start with a letter and contain only lowercase ASCII
/// alphanumerics, so they are safe as unquoted SQL identifiers on both
/// engines. Uniqueness against stored records is the caller's job.
pub fn generate() -> DbCredentials {
    let mut rng = OsRng;
    DbCredentials {
        name: identifier(&mut rng, NAME_LENGTH),
        user: identifier(&mut rng, USER_LENGTH),
        password: random_string(&mut rng, PASSWORD_CHARS, PASSWORD_LENGTH),
    }
}

fn identifier<R: Rng>(rng: &mut R, len: usize) -> String {
    let mut out = String::with_capacity(len);
    // Leading letter keeps the identifier valid on engines that reject leading digits
    out.push(*LOWER_ALPHA.choose(rng).unwrap_or(&b'a') as char);
    out.push_str(&random_string(rng, IDENTIFIER_CHARS, len - 1));
    out
}

fn random_string<R: Rng>(rng: &mut R, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::is_identifier_safe;
    use std::collections::HashSet;

    #[test]
    fn generated_names_are_identifier_safe() {
        for _ in 0..200 {
            let creds = generate();
            assert_eq!(creds.name.len(), NAME_LENGTH);
            assert_eq!(creds.user.len(), USER_LENGTH);
            assert!(is_identifier_safe(&creds.name), "unsafe name {}", creds.name);
            assert!(is_identifier_safe(&creds.user), "unsafe user {}", creds.user);
            assert!(creds.name.chars().next().unwrap().is_ascii_lowercase());
        }
    }

    #[test]
    fn passwords_avoid_quoting_characters() {
        for _ in 0..200 {
            let password = generate().password;
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(!password.chars().any(|c| "'\"\\`@%".contains(c)));
        }
    }

    #[test]
    fn triples_do_not_collide() {
        let names: HashSet<String> = (0..1000).map(|_| generate().name).collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn mysql_user_length_limit_is_respected() {
        // MySQL account names are limited to 32 characters
        assert!(USER_LENGTH <= 32);
    }
}

use std::{env, str::FromStr};

/// Parse an `envvar` as `T`. Return `fallback` if env missing or parsing fails.
pub fn parse_env_or<T: FromStr>(envvar: &str, fallback: T) -> T {
    env::var(envvar)
        .map(|s| T::from_str(&s).ok())
        .ok()
        .flatten()
        .unwrap_or(fallback)
}

/// Reads an `envvar`, treating an empty value the same as a missing one.
pub fn get_nonempty_env(envvar: &str) -> Option<String> {
    env::var(envvar).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_fallbacks() {
        env::set_var("GOLIATH_TEST_PARSE_ENV", "not-a-number");
        assert_eq!(parse_env_or("GOLIATH_TEST_PARSE_ENV", 7u64), 7);

        env::set_var("GOLIATH_TEST_PARSE_ENV", "42");
        assert_eq!(parse_env_or("GOLIATH_TEST_PARSE_ENV", 7u64), 42);

        assert_eq!(parse_env_or("GOLIATH_TEST_PARSE_ENV_MISSING", 3u32), 3);
    }

    #[test]
    fn test_nonempty_env() {
        env::set_var("GOLIATH_TEST_NONEMPTY_ENV", "  ");
        assert_eq!(get_nonempty_env("GOLIATH_TEST_NONEMPTY_ENV"), None);

        env::set_var("GOLIATH_TEST_NONEMPTY_ENV", "ws://localhost:1");
        assert_eq!(
            get_nonempty_env("GOLIATH_TEST_NONEMPTY_ENV").as_deref(),
            Some("ws://localhost:1")
        );
    }
}

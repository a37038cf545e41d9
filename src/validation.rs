//! Field rules shared by the request DTOs, for use with
//! `#[validate(custom(function = ...))]`.

use std::borrow::Cow;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

use crate::auth::password;
use crate::provisioning::database_stem;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}$")
        .expect("valid regex")
});

static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("valid regex"));

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// A fully qualified host name such as `shop.flapi.org`, without scheme or path.
pub fn hostname(value: &str) -> Result<(), ValidationError> {
    if value.len() <= 253 && HOSTNAME.is_match(value) {
        Ok(())
    } else {
        Err(error("hostname", "The value is not a valid domain name"))
    }
}

pub fn ipv4(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| error("ip_address", "The value is not a valid IPv4 address"))
}

pub fn strong_password(value: &str) -> Result<(), ValidationError> {
    if password::is_strong(value) {
        Ok(())
    } else {
        Err(error(
            "password_strength",
            "The password must contain at least 8 characters, with upper and lower case letters, a digit and a symbol",
        ))
    }
}

/// Repository, workflow and database names: letters, digits, `_`, `.`, `-`.
pub fn resource_name(value: &str) -> Result<(), ValidationError> {
    if RESOURCE_NAME.is_match(value) {
        Ok(())
    } else {
        Err(error(
            "resource_name",
            "Only letters, digits, '_', '.' and '-' are allowed",
        ))
    }
}

/// A project name that still leaves something once reduced to a database stem.
pub fn project_name(value: &str) -> Result<(), ValidationError> {
    if database_stem(value).is_empty() {
        Err(error(
            "project_name",
            "The project name must contain at least one letter or digit",
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostnames() {
        assert!(hostname("shop.flapi.org").is_ok());
        assert!(hostname("dev.shop-1.flapi.org").is_ok());
        assert!(hostname("flapi").is_err());
        assert!(hostname("https://shop.flapi.org").is_err());
        assert!(hostname("-bad.flapi.org").is_err());
        assert!(hostname("shop.flapi.org/path").is_err());
    }

    #[test]
    fn ipv4_only() {
        assert!(ipv4("192.168.1.10").is_ok());
        assert!(ipv4("::1").is_err());
        assert!(ipv4("300.1.1.1").is_err());
    }

    #[test]
    fn resource_names() {
        assert!(resource_name("shop_app").is_ok());
        assert!(resource_name("deploy.yml").is_ok());
        assert!(resource_name("../etc").is_err());
        assert!(resource_name("has space").is_err());
    }

    #[test]
    fn project_names_need_a_database_stem() {
        assert!(project_name("My Shop").is_ok());
        assert!(project_name("a-1").is_ok());
        assert!(project_name("!!!").is_err());
        assert!(project_name("- _ -").is_err());
    }
}

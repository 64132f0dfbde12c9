//! Image tag and container name helpers.

use rand::Rng;

/// Build the tag of a session image.
///
/// The base image's tag (default `latest`) is kept and suffixed with the
/// session name, so every session gets its own image:
/// `[registry/]dockerdo-<repository>:<tag>-<session_name>`.
pub fn make_image_tag(registry: Option<&str>, base_image: &str, session_name: &str) -> String {
    // A ':' after the last '/' separates the tag; one before it is a registry port.
    let (repository, tag) = match base_image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, tag),
        _ => (base_image, "latest"),
    };
    let image = format!("dockerdo-{repository}:{tag}-{session_name}");
    match registry {
        Some(registry) => format!("{registry}/{image}"),
        None => image,
    }
}

/// Generate a probably unique name for an ephemeral container.
///
/// Ten random lowercase letters followed by the current UNIX timestamp.
pub fn ephemeral_container_name() -> String {
    let mut rng = rand::thread_rng();
    let letters: String = (0..10)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect();
    format!("{letters}{}", chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_image_tag_no_registry() {
        assert_eq!(
            make_image_tag(None, "alpine:nightly", "test"),
            "dockerdo-alpine:nightly-test"
        );
    }

    #[test]
    fn test_make_image_tag_default_tag() {
        assert_eq!(
            make_image_tag(Some("harbor.local"), "alpine", "foobar"),
            "harbor.local/dockerdo-alpine:latest-foobar"
        );
    }

    #[test]
    fn test_make_image_tag_registry_port_in_base() {
        assert_eq!(
            make_image_tag(None, "localhost:5000/ubuntu", "s"),
            "dockerdo-localhost:5000/ubuntu:latest-s"
        );
    }

    #[test]
    fn test_ephemeral_container_name() {
        let before = chrono::Utc::now().timestamp();
        let name = ephemeral_container_name();
        let after = chrono::Utc::now().timestamp();

        let (letters, digits) = name.split_at(10);
        assert!(letters.chars().all(|c| c.is_ascii_lowercase()));
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        let timestamp: i64 = digits.parse().unwrap();
        assert!(before <= timestamp && timestamp <= after);
    }

    #[test]
    fn test_ephemeral_container_names_differ() {
        assert_ne!(ephemeral_container_name(), ephemeral_container_name());
    }
}

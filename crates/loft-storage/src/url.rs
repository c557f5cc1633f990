use uuid::Uuid;

/// How a finalized file's externally reachable URL is derived.
///
/// Outside production the static file tree is exposed directly, so the URL
/// encodes the volume and stored filename. In production files are reachable
/// only through the ownership-checked secure endpoint keyed by file id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPolicy {
    PathBased,
    SecureEndpoint,
}

impl UrlPolicy {
    pub fn from_environment(environment: &str) -> Self {
        let env = environment.to_lowercase();
        if env == "production" || env == "prod" {
            UrlPolicy::SecureEndpoint
        } else {
            UrlPolicy::PathBased
        }
    }

    pub fn file_url(
        &self,
        base_url: &str,
        volume_name: &str,
        stored_name: &str,
        file_id: Uuid,
    ) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            UrlPolicy::PathBased => format!("{}/files/{}/{}", base, volume_name, stored_name),
            UrlPolicy::SecureEndpoint => format!("{}/files/secure/{}", base, file_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_uses_secure_endpoint() {
        assert_eq!(
            UrlPolicy::from_environment("production"),
            UrlPolicy::SecureEndpoint
        );
        assert_eq!(UrlPolicy::from_environment("prod"), UrlPolicy::SecureEndpoint);
        assert_eq!(
            UrlPolicy::from_environment("development"),
            UrlPolicy::PathBased
        );
    }

    #[test]
    fn derives_urls_per_policy() {
        let id = Uuid::now_v7();
        assert_eq!(
            UrlPolicy::PathBased.file_url("http://localhost:4000/", "2", "abc.pdf", id),
            "http://localhost:4000/files/2/abc.pdf"
        );
        assert_eq!(
            UrlPolicy::SecureEndpoint.file_url("https://loft.example", "2", "abc.pdf", id),
            format!("https://loft.example/files/secure/{}", id)
        );
    }
}

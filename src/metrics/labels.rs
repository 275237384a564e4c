//! Metric names and label keys

/// Tokens issued by the credential service
pub const TOKENS_ISSUED: &str = "fraiseql_iam_tokens_issued_total";
/// Token issuance failures
pub const TOKEN_FAILURES: &str = "fraiseql_iam_token_failures_total";
/// Connections that kept a static password
pub const PASSWORD_BYPASS: &str = "fraiseql_iam_password_bypass_total";
/// CA bundles downloaded and written
pub const BUNDLE_DOWNLOADS: &str = "fraiseql_iam_bundle_downloads_total";
/// CA bundle provisioning failures
pub const BUNDLE_FAILURES: &str = "fraiseql_iam_bundle_failures_total";

/// Failure reason label key
pub const REASON: &str = "reason";

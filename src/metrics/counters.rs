//! Counter helpers

use super::labels;

/// A token was issued
pub fn token_issued() {
    ::metrics::counter!(labels::TOKENS_ISSUED).increment(1);
}

/// Token issuance failed
pub fn token_failed(reason: &'static str) {
    ::metrics::counter!(labels::TOKEN_FAILURES, labels::REASON => reason).increment(1);
}

/// A static password bypassed token issuance
pub fn password_bypass() {
    ::metrics::counter!(labels::PASSWORD_BYPASS).increment(1);
}

/// A CA bundle was downloaded and written
pub fn bundle_downloaded() {
    ::metrics::counter!(labels::BUNDLE_DOWNLOADS).increment(1);
}

/// CA bundle provisioning failed
pub fn bundle_failed(reason: &'static str) {
    ::metrics::counter!(labels::BUNDLE_FAILURES, labels::REASON => reason).increment(1);
}

pub mod assertions;
pub mod fakes;
pub mod server;
pub mod stores;

pub use assertions::{assert_api_error, assert_api_ok};
pub use fakes::{RecordingMailer, SentEmail, StaticTokenVerifier, google_identity};
pub use server::{
    TEST_ACCESS_SECRET, TEST_PASSWORD, TEST_REFRESH_SECRET, TestApp, cookie_header,
    create_test_app, create_test_config, login_via_api, register_and_verify, register_via_api,
    send_request, send_request_full, wait_for_email, wait_for_email_with_subject,
};
pub use stores::{TestStores, create_test_stores};

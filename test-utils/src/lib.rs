//! `test-utils` is used for testing in both `metafetch-lib` and `metafetch`.
//! This crate does not depend on `metafetch-lib` or `metafetch`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock Drive API, which answers every metadata request
/// (`GET /files/<id>`) with a predefined status
#[macro_export]
macro_rules! mock_api {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new($status);
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path_regex(r"^/files/[^/]+$"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Create a mock Drive API with one response per file ID.
///
/// ```ignore
/// let server = mock_drive! {
///     "id1" => ResponseTemplate::new(200).set_body_json(json!({"id": "id1"})),
///     "id2" => ResponseTemplate::new(404),
/// };
/// ```
///
/// Requests for any other ID are answered with `404 Not Found` by wiremock.
#[macro_export]
macro_rules! mock_drive {
    ($($id:expr => $template:expr),* $(,)?) => {{
        let mock_server = wiremock::MockServer::start().await;
        $(
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path(format!("/files/{}", $id)))
                .respond_with($template)
                .mount(&mock_server)
                .await;
        )*
        mock_server
    }};
}

/// The body the Drive API sends along with a failed request
#[macro_export]
macro_rules! api_error_body {
    ($code:expr, $message:expr) => {
        serde_json::json!({
            "error": {
                "code": $code,
                "message": $message,
                "errors": [{"domain": "global", "message": $message}],
            }
        })
    };
}

/// Get the root path of the project.
#[macro_export]
macro_rules! root_path {
    () => {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .to_path_buf()
    };
}

/// Get the path to the `fixtures` directory.
#[macro_export]
macro_rules! fixtures_path {
    () => {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .join("fixtures")
    };
}

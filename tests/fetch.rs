use std::time::Duration;

use edgequake_pdf2img::{Fetcher, HttpFetcher, Pdf2ImgError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAKE_PDF: &[u8] = b"%PDF-1.7\n%fake body\n%%EOF";

#[tokio::test]
async fn fetcher_returns_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(FAKE_PDF, "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let bytes = fetcher
        .fetch(&format!("{}/files/report.pdf", server.uri()))
        .await
        .expect("fetch succeeds");

    assert_eq!(&bytes[..], FAKE_PDF);
}

#[tokio::test]
async fn fetcher_reports_http_status_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}/missing.pdf", server.uri());
    let err = fetcher.fetch(&url).await.expect_err("404 must fail");

    match &err {
        Pdf2ImgError::DownloadFailed { url: failed, reason } => {
            assert_eq!(failed, &url);
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().starts_with("Failed to download"));
}

#[tokio::test]
async fn fetcher_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old.pdf"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/new.pdf", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(FAKE_PDF, "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let bytes = fetcher
        .fetch(&format!("{}/old.pdf", server.uri()))
        .await
        .expect("redirect followed");

    assert_eq!(&bytes[..], FAKE_PDF);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(FAKE_PDF, "application/pdf")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/slow.pdf", server.uri()))
        .await
        .expect_err("must time out");

    assert!(
        matches!(err, Pdf2ImgError::DownloadTimeout { secs: 1, .. }),
        "got: {err:?}"
    );
}

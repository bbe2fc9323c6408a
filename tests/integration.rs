use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

const BOUNDARY: &str = "----docqTestBoundary7MA4YWxkTrZu0gW";
const STORY: &str = "The cat sat on the mat. The dog ran fast.";
const NOT_RELATED: &str = "This Context is not related to pdf";

fn docq_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docq");
    path
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn setup_test_env(port: u16) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:{}"
upload_dir = "{}/uploads"

[embedding]
provider = "hash"

[logging]
level = "warn"
"#,
        port,
        root.display()
    );

    let config_path = root.join("docq.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docq(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docq_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docq binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// A running `docq serve` process, killed on drop.
struct Server {
    child: Child,
    base: String,
    _tmp: TempDir,
    root: PathBuf,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server() -> Server {
    let port = find_free_port();
    let (tmp, config_path) = setup_test_env(port);
    let child = Command::new(docq_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn docq serve");

    let server = Server {
        child,
        base: format!("http://127.0.0.1:{}", port),
        root: tmp.path().to_path_buf(),
        _tmp: tmp,
    };
    wait_for_server(&server.base);
    server
}

fn wait_for_server(base: &str) {
    let client = reqwest::blocking::Client::new();
    for _ in 0..100 {
        std::thread::sleep(Duration::from_millis(100));
        if let Ok(resp) = client.get(base).send() {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 10 seconds");
}

fn multipart_body(disposition: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(base: &str, filename: &str, content: &[u8]) -> reqwest::blocking::Response {
    let disposition = format!("form-data; name=\"file\"; filename=\"{}\"", filename);
    post_multipart(base, multipart_body(&disposition, content))
}

fn post_multipart(base: &str, body: Vec<u8>) -> reqwest::blocking::Response {
    reqwest::blocking::Client::new()
        .post(format!("{}/upload", base))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .send()
        .unwrap()
}

fn ask(base: &str, question: &str) -> (u16, Value) {
    let resp = reqwest::blocking::Client::new()
        .post(base)
        .json(&serde_json::json!({ "question": question }))
        .send()
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().unwrap())
}

/// Minimal single-page PDF showing each of `lines` in Helvetica, one below
/// the other.
fn minimal_pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let shown: Vec<String> = lines.iter().map(|l| format!("({}) Tj", l)).collect();
    let stream = format!(
        "BT /F1 12 Tf 100 700 Td {} ET",
        shown.join(" 0 -14 Td ")
    );
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

// ─── HTTP ───────────────────────────────────────────────────────────

#[test]
fn test_query_before_upload_is_rejected() {
    let server = start_server();
    let (status, body) = ask(&server.base, "x");
    assert_eq!(status, 400);
    assert_eq!(body["message"], "No PDF uploaded or processed");
}

#[test]
fn test_upload_then_related_and_unrelated_questions() {
    let server = start_server();

    let resp = upload(&server.base, "story.txt", STORY.as_bytes());
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["filename"], "story.txt");

    let stored = server.root.join("uploads").join("story.txt");
    assert_eq!(fs::read(&stored).unwrap(), STORY.as_bytes());

    let (status, body) = ask(&server.base, "Where did the cat sit?");
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "The cat sat on the mat.");
    let similarity = body["similarity"].as_f64().unwrap();
    assert!(similarity >= 0.3 && similarity <= 1.0, "{}", similarity);

    let (status, body) = ask(&server.base, "What is the capital of France?");
    assert_eq!(status, 200);
    assert_eq!(body["answer"], NOT_RELATED);
    let similarity = body["similarity"].as_f64().unwrap();
    assert!(similarity < 0.3 && similarity >= -1.0, "{}", similarity);
}

#[test]
fn test_repeated_question_is_idempotent() {
    let server = start_server();
    upload(&server.base, "story.txt", STORY.as_bytes());
    let first = ask(&server.base, "Where did the cat sit?");
    let second = ask(&server.base, "Where did the cat sit?");
    assert_eq!(first, second);
}

#[test]
fn test_later_upload_replaces_document() {
    let server = start_server();
    upload(&server.base, "story.txt", STORY.as_bytes());
    let resp = upload(&server.base, "geo.txt", b"Paris is the capital of France.");
    assert_eq!(resp.status(), 200);

    let (status, body) = ask(&server.base, "What is the capital of France?");
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "Paris is the capital of France.");
}

#[test]
fn test_upload_without_filename_is_rejected() {
    let server = start_server();
    let body = multipart_body("form-data; name=\"file\"", STORY.as_bytes());
    let resp = post_multipart(&server.base, body);
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["message"], "File part not found in the request");
}

#[test]
fn test_upload_requires_multipart_content_type() {
    let server = start_server();
    let resp = reqwest::blocking::Client::new()
        .post(format!("{}/upload", server.base))
        .header("Content-Type", "application/json")
        .body("{}")
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().unwrap();
    assert_eq!(body["message"], "Content-Type must be multipart/form-data");
}

#[test]
fn test_pdf_upload_is_extracted() {
    let server = start_server();
    let pdf = minimal_pdf_with_lines(&["The cat sat on the mat."]);
    let resp = upload(&server.base, "story.pdf", &pdf);
    assert_eq!(resp.status(), 200);

    let (status, body) = ask(&server.base, "Where did the cat sit?");
    assert_eq!(status, 200);
    assert!(
        body["answer"].as_str().unwrap().contains("cat sat on the mat"),
        "{}",
        body
    );
}

#[test]
fn test_wrapped_pdf_lines_answer_with_whole_sentence() {
    let server = start_server();
    let pdf = minimal_pdf_with_lines(&["The cat sat on", "the mat. The dog ran", "fast."]);
    let resp = upload(&server.base, "wrapped.pdf", &pdf);
    assert_eq!(resp.status(), 200);

    let (status, body) = ask(&server.base, "Where did the cat sit?");
    assert_eq!(status, 200);
    let answer = body["answer"].as_str().unwrap();
    let collapsed = answer.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(collapsed, "The cat sat on the mat.", "{}", body);
}

#[test]
fn test_cors_and_not_found() {
    let server = start_server();
    let client = reqwest::blocking::Client::new();

    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{}/upload", server.base))
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let methods = resp.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"), "{}", methods);

    let resp = client
        .get(format!("{}/missing", server.base))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let body: Value = resp.json().unwrap();
    assert_eq!(body["message"], "Not Found");

    let resp = client.get(format!("{}/upload", server.base)).send().unwrap();
    assert_eq!(resp.status(), 404);
}

#[test]
fn test_index_page_served() {
    let server = start_server();
    let resp = reqwest::blocking::get(&server.base).unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().unwrap().contains("<form"));
}

// ─── CLI ────────────────────────────────────────────────────────────

#[test]
fn test_cli_ask_prints_match_json() {
    let (tmp, config_path) = setup_test_env(find_free_port());
    let doc = tmp.path().join("story.txt");
    fs::write(&doc, STORY).unwrap();

    let (stdout, stderr, success) = run_docq(
        &config_path,
        &["ask", doc.to_str().unwrap(), "Where did the cat sit?"],
    );
    assert!(success, "ask failed: {}", stderr);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["answer"], "The cat sat on the mat.");
    assert!(result["similarity"].as_f64().unwrap() >= 0.3);
}

#[test]
fn test_cli_ask_empty_document_fails() {
    let (tmp, config_path) = setup_test_env(find_free_port());
    let doc = tmp.path().join("empty.txt");
    fs::write(&doc, "   \n").unwrap();

    let (_, stderr, success) = run_docq(&config_path, &["ask", doc.to_str().unwrap(), "anything"]);
    assert!(!success);
    assert!(stderr.contains("No PDF uploaded or processed"), "{}", stderr);
}

#[test]
fn test_cli_extract_prints_text() {
    let (tmp, config_path) = setup_test_env(find_free_port());
    let doc = tmp.path().join("notes.md");
    fs::write(&doc, "# Notes\n\nPlain text passes through.").unwrap();

    let (stdout, stderr, success) = run_docq(&config_path, &["extract", doc.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    assert_eq!(stdout, "# Notes\n\nPlain text passes through.");
}
